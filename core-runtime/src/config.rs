//! # Core Configuration Module
//!
//! Configuration for the offline cache manager and the playback state store.
//!
//! ## Overview
//!
//! [`CoreConfig`] is built through [`CoreConfigBuilder`], which fills in the
//! production defaults and validates everything in [`build`](CoreConfigBuilder::build)
//! so a bad value fails at startup instead of deep inside a request handler.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .origin("https://music.example")
//!     .cache_version("v4")
//!     .max_audio_items(20)
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.offline.namespace_prefix(), "aiamusic-");
//! ```
//!
//! ## Environment
//!
//! [`CoreConfigBuilder::from_env`] starts from the defaults and applies:
//!
//! | Variable                   | Field                      |
//! |----------------------------|----------------------------|
//! | `AIAMUSIC_ORIGIN`          | `origin`                   |
//! | `AIAMUSIC_CACHE_VERSION`   | `offline.cache_version`    |
//! | `AIAMUSIC_MAX_AUDIO_ITEMS` | `offline.max_audio_items`  |
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .max_audio_items(0)
//!     .build()
//!     .expect("Should fail - the audio cache needs room for one entry");
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const ENV_ORIGIN: &str = "AIAMUSIC_ORIGIN";
pub const ENV_CACHE_VERSION: &str = "AIAMUSIC_CACHE_VERSION";
pub const ENV_MAX_AUDIO_ITEMS: &str = "AIAMUSIC_MAX_AUDIO_ITEMS";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Origin that relative request URLs resolve against (scheme + host + port).
    pub origin: String,

    /// Offline cache manager settings.
    pub offline: OfflineCacheConfig,

    /// Playback state store settings.
    pub playback: PlaybackConfig,
}

/// Settings for the offline cache manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfflineCacheConfig {
    /// Application token used in namespace names (`{app}-{kind}-{version}`).
    pub app_name: String,

    /// Current deploy version. Bumping it is the only upgrade mechanism.
    pub cache_version: String,

    /// Path prefix routed to the API namespace.
    pub api_prefix: String,

    /// Path suffixes treated as audio.
    pub audio_extensions: Vec<String>,

    /// Host substrings treated as audio hosting.
    pub audio_host_tokens: Vec<String>,

    /// Path suffixes served network-first from the static namespace.
    pub network_first_extensions: Vec<String>,

    /// Upper bound on entries in the audio namespace.
    pub max_audio_items: usize,

    /// Application-shell resources fetched on install.
    pub precache_manifest: Vec<String>,

    /// Document served for failed navigations.
    pub shell_document: String,
}

impl Default for OfflineCacheConfig {
    fn default() -> Self {
        Self {
            app_name: "aiamusic".to_string(),
            cache_version: "v3".to_string(),
            api_prefix: "/api/".to_string(),
            audio_extensions: vec![".mp3".into(), ".wav".into(), ".m4a".into()],
            audio_host_tokens: vec!["suno".into(), "blob.core.windows.net".into()],
            network_first_extensions: vec![".js".into(), ".css".into()],
            max_audio_items: 50,
            precache_manifest: vec![
                "/".into(),
                "/index.html".into(),
                "/manifest.json".into(),
                "/favicon.svg".into(),
            ],
            shell_document: "/index.html".to_string(),
        }
    }
}

impl OfflineCacheConfig {
    /// Prefix shared by every namespace this application owns.
    pub fn namespace_prefix(&self) -> String {
        format!("{}-", self.app_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.app_name.is_empty() || self.app_name.contains('-') {
            return Err(Error::invalid(
                "offline.app_name",
                "must be non-empty and must not contain '-'",
            ));
        }

        if self.cache_version.is_empty() || self.cache_version.contains('-') {
            return Err(Error::invalid(
                "offline.cache_version",
                "must be non-empty and must not contain '-'",
            ));
        }

        if !self.api_prefix.starts_with('/') || !self.api_prefix.ends_with('/') {
            return Err(Error::invalid(
                "offline.api_prefix",
                format!("'{}' must start and end with '/'", self.api_prefix),
            ));
        }

        if self.max_audio_items == 0 {
            return Err(Error::invalid(
                "offline.max_audio_items",
                "must be at least 1",
            ));
        }

        if !self.precache_manifest.contains(&self.shell_document) {
            return Err(Error::invalid(
                "offline.shell_document",
                format!(
                    "'{}' must be part of the precache manifest",
                    self.shell_document
                ),
            ));
        }

        Ok(())
    }
}

/// Device class of the host, as far as auto-resume is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    Desktop,
    Mobile,
}

/// Whether a restored session starts playing on its own.
///
/// Mobile browsers reject `play()` without a user gesture, so the default
/// only auto-resumes on desktop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoResumePolicy {
    Always,
    Never,
    #[default]
    DesktopOnly,
}

impl AutoResumePolicy {
    pub fn should_auto_play(&self, device: DeviceClass) -> bool {
        match self {
            AutoResumePolicy::Always => true,
            AutoResumePolicy::Never => false,
            AutoResumePolicy::DesktopOnly => device == DeviceClass::Desktop,
        }
    }
}

/// Settings for the playback state store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Durable storage key holding the snapshot.
    pub storage_key: String,

    /// Delay before a selection change is written.
    pub save_debounce_ms: u64,

    /// Interval between saves while playing.
    pub periodic_save_ms: u64,

    pub auto_resume: AutoResumePolicy,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            storage_key: "aiamusic_playback_state".to_string(),
            save_debounce_ms: 500,
            periodic_save_ms: 5_000,
            auto_resume: AutoResumePolicy::default(),
        }
    }
}

impl PlaybackConfig {
    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn periodic_save_interval(&self) -> Duration {
        Duration::from_millis(self.periodic_save_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_key.is_empty() {
            return Err(Error::invalid("playback.storage_key", "cannot be empty"));
        }

        if self.save_debounce_ms == 0 {
            return Err(Error::invalid(
                "playback.save_debounce_ms",
                "must be greater than 0",
            ));
        }

        if self.periodic_save_ms == 0 {
            return Err(Error::invalid(
                "playback.periodic_save_ms",
                "must be greater than 0",
            ));
        }

        Ok(())
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Parse a JSON document and validate it. Missing sections take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CoreConfig = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid configuration JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.origin.starts_with("http://") || self.origin.starts_with("https://")) {
            return Err(Error::invalid(
                "origin",
                format!("'{}' must be an http(s) origin", self.origin),
            ));
        }

        self.offline.validate()?;
        self.playback.validate()
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost:3000".to_string(),
            offline: OfflineCacheConfig::default(),
            playback: PlaybackConfig::default(),
        }
    }
}

/// Builder for [`CoreConfig`].
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    config: CoreConfig,
    errors: Vec<Error>,
}

impl CoreConfigBuilder {
    /// Defaults overridden by the `AIAMUSIC_*` environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_vars(std::env::vars())
    }

    /// Apply `AIAMUSIC_*` overrides from an explicit variable list.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                ENV_ORIGIN => self = self.origin(value),
                ENV_CACHE_VERSION => self = self.cache_version(value),
                ENV_MAX_AUDIO_ITEMS => match value.parse::<usize>() {
                    Ok(n) => self = self.max_audio_items(n),
                    Err(e) => self.errors.push(Error::invalid(
                        "offline.max_audio_items",
                        format!("{}='{}': {}", ENV_MAX_AUDIO_ITEMS, value, e),
                    )),
                },
                _ => {}
            }
        }
        self
    }

    pub fn origin(mut self, origin: impl Into<String>) -> Self {
        self.config.origin = origin.into().trim_end_matches('/').to_string();
        self
    }

    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.config.offline.app_name = name.into();
        self
    }

    pub fn cache_version(mut self, version: impl Into<String>) -> Self {
        self.config.offline.cache_version = version.into();
        self
    }

    pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.offline.api_prefix = prefix.into();
        self
    }

    pub fn audio_host_token(mut self, token: impl Into<String>) -> Self {
        self.config.offline.audio_host_tokens.push(token.into());
        self
    }

    pub fn max_audio_items(mut self, max: usize) -> Self {
        self.config.offline.max_audio_items = max;
        self
    }

    pub fn precache_manifest<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.offline.precache_manifest = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn storage_key(mut self, key: impl Into<String>) -> Self {
        self.config.playback.storage_key = key.into();
        self
    }

    pub fn save_debounce(mut self, delay: Duration) -> Self {
        self.config.playback.save_debounce_ms = delay.as_millis() as u64;
        self
    }

    pub fn periodic_save_interval(mut self, interval: Duration) -> Self {
        self.config.playback.periodic_save_ms = interval.as_millis() as u64;
        self
    }

    pub fn auto_resume(mut self, policy: AutoResumePolicy) -> Self {
        self.config.playback.auto_resume = policy;
        self
    }

    /// Validate and return the configuration.
    ///
    /// The first problem found (including unparsable environment values) is
    /// returned as the error.
    pub fn build(mut self) -> Result<CoreConfig> {
        if !self.errors.is_empty() {
            return Err(self.errors.remove(0));
        }
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CoreConfig::builder().build().unwrap();

        assert_eq!(config.offline.app_name, "aiamusic");
        assert_eq!(config.offline.cache_version, "v3");
        assert_eq!(config.offline.max_audio_items, 50);
        assert_eq!(config.offline.precache_manifest.len(), 4);
        assert_eq!(config.playback.storage_key, "aiamusic_playback_state");
        assert_eq!(config.playback.save_debounce(), Duration::from_millis(500));
        assert_eq!(config.playback.periodic_save_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .origin("https://music.example/")
            .cache_version("v4")
            .max_audio_items(10)
            .audio_host_token("cdn.music.example")
            .auto_resume(AutoResumePolicy::Never)
            .build()
            .unwrap();

        assert_eq!(config.origin, "https://music.example");
        assert_eq!(config.offline.cache_version, "v4");
        assert_eq!(config.offline.max_audio_items, 10);
        assert!(config
            .offline
            .audio_host_tokens
            .contains(&"cdn.music.example".to_string()));
        assert_eq!(config.playback.auto_resume, AutoResumePolicy::Never);
    }

    #[test]
    fn test_validate_rejects_zero_audio_items() {
        let err = CoreConfig::builder().max_audio_items(0).build().unwrap_err();
        assert!(matches!(
            err,
            Error::InvalidField {
                field: "offline.max_audio_items",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_dash_in_app_name() {
        assert!(CoreConfig::builder().app_name("aia-music").build().is_err());
        assert!(CoreConfig::builder().app_name("").build().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_api_prefix() {
        assert!(CoreConfig::builder().api_prefix("api/").build().is_err());
        assert!(CoreConfig::builder().api_prefix("/api").build().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_origin() {
        assert!(CoreConfig::builder().origin("ftp://x").build().is_err());
    }

    #[test]
    fn test_validate_requires_shell_in_manifest() {
        let err = CoreConfig::builder()
            .precache_manifest(["/", "/manifest.json"])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("shell_document"));
    }

    #[test]
    fn test_validate_rejects_zero_debounce() {
        assert!(CoreConfig::builder()
            .save_debounce(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_env_overrides() {
        let config = CoreConfigBuilder::default()
            .with_env_vars([
                (ENV_CACHE_VERSION, "v9"),
                (ENV_MAX_AUDIO_ITEMS, "12"),
                (ENV_ORIGIN, "https://music.example"),
                ("UNRELATED", "ignored"),
            ])
            .build()
            .unwrap();

        assert_eq!(config.offline.cache_version, "v9");
        assert_eq!(config.offline.max_audio_items, 12);
        assert_eq!(config.origin, "https://music.example");
    }

    #[test]
    fn test_env_unparsable_number_fails_build() {
        let err = CoreConfigBuilder::default()
            .with_env_vars([(ENV_MAX_AUDIO_ITEMS, "lots")])
            .build()
            .unwrap_err();
        assert!(err.to_string().contains(ENV_MAX_AUDIO_ITEMS));
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = CoreConfig::from_json(
            r#"{
                "origin": "https://music.example",
                "offline": { "cache_version": "v5" },
                "playback": { "auto_resume": "always" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.offline.cache_version, "v5");
        assert_eq!(config.offline.max_audio_items, 50);
        assert_eq!(config.playback.auto_resume, AutoResumePolicy::Always);
        assert_eq!(config.playback.storage_key, "aiamusic_playback_state");
    }

    #[test]
    fn test_auto_resume_policy() {
        assert!(AutoResumePolicy::DesktopOnly.should_auto_play(DeviceClass::Desktop));
        assert!(!AutoResumePolicy::DesktopOnly.should_auto_play(DeviceClass::Mobile));
        assert!(AutoResumePolicy::Always.should_auto_play(DeviceClass::Mobile));
        assert!(!AutoResumePolicy::Never.should_auto_play(DeviceClass::Desktop));
    }

    #[test]
    fn test_config_is_cloneable() {
        let config = CoreConfig::default();
        assert_eq!(config.clone(), config);
    }
}
