//! Request classification.
//!
//! Decides, for every intercepted request, which caching strategy applies and
//! which namespace it reads and writes. Rules are checked in order; the first
//! match wins.
//!
//! | # | Rule                                                   | Strategy                   | Namespace |
//! |---|--------------------------------------------------------|----------------------------|-----------|
//! | 1 | non-GET, or non-http(s) scheme                          | passthrough                | none      |
//! | 2 | path starts with the API prefix                        | network-first              | api       |
//! | 3 | audio extension, or host contains an audio host token   | cache-first with eviction  | audio     |
//! | 4 | script or stylesheet extension                          | network-first              | static    |
//! | 5 | anything else                                          | cache-first                | static    |

use bridge_traits::HttpMethod;
use core_runtime::config::OfflineCacheConfig;
use url::Url;

use crate::namespace::CacheKind;

/// How a handled request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache; on miss fetch and store.
    CacheFirst,
    /// Fetch and refresh the cache; on failure serve from cache.
    NetworkFirst,
    /// Cache-first into the bounded audio namespace, with an offline fallback.
    CacheFirstWithEviction,
}

/// Classification result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not intercepted; the request goes straight to the network.
    Passthrough,
    Handle { strategy: Strategy, kind: CacheKind },
}

impl Route {
    fn handle(strategy: Strategy, kind: CacheKind) -> Self {
        Route::Handle { strategy, kind }
    }
}

/// Classifies requests by method, scheme, host and path.
#[derive(Debug, Clone)]
pub struct RequestClassifier {
    api_prefix: String,
    audio_extensions: Vec<String>,
    audio_host_tokens: Vec<String>,
    network_first_extensions: Vec<String>,
}

impl RequestClassifier {
    pub fn from_config(config: &OfflineCacheConfig) -> Self {
        Self {
            api_prefix: config.api_prefix.clone(),
            audio_extensions: lowercase(&config.audio_extensions),
            audio_host_tokens: lowercase(&config.audio_host_tokens),
            network_first_extensions: lowercase(&config.network_first_extensions),
        }
    }

    /// Classify an absolute request URL.
    pub fn classify(&self, method: HttpMethod, url: &Url) -> Route {
        if method != HttpMethod::Get || !matches!(url.scheme(), "http" | "https") {
            return Route::Passthrough;
        }

        let path = url.path();
        if path.starts_with(&self.api_prefix) {
            return Route::handle(Strategy::NetworkFirst, CacheKind::Api);
        }

        let lower_path = path.to_ascii_lowercase();
        if self.is_audio(url, &lower_path) {
            return Route::handle(Strategy::CacheFirstWithEviction, CacheKind::Audio);
        }

        if ends_with_any(&lower_path, &self.network_first_extensions) {
            return Route::handle(Strategy::NetworkFirst, CacheKind::Static);
        }

        Route::handle(Strategy::CacheFirst, CacheKind::Static)
    }

    /// Whether a URL would be stored in the audio namespace.
    pub fn is_audio_url(&self, url: &Url) -> bool {
        self.is_audio(url, &url.path().to_ascii_lowercase())
    }

    fn is_audio(&self, url: &Url, lower_path: &str) -> bool {
        if ends_with_any(lower_path, &self.audio_extensions) {
            return true;
        }
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        self.audio_host_tokens
            .iter()
            .any(|token| host.contains(token.as_str()))
    }
}

fn lowercase(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.to_ascii_lowercase()).collect()
}

fn ends_with_any(path: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|suffix| path.ends_with(suffix.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> RequestClassifier {
        RequestClassifier::from_config(&OfflineCacheConfig::default())
    }

    fn classify(url: &str) -> Route {
        let origin = Url::parse("https://aiamusic.app").unwrap();
        classifier().classify(HttpMethod::Get, &origin.join(url).unwrap())
    }

    #[test]
    fn test_routing_table() {
        assert_eq!(
            classify("/api/songs"),
            Route::handle(Strategy::NetworkFirst, CacheKind::Api)
        );
        assert_eq!(
            classify("https://x.blob.core.windows.net/a.mp3"),
            Route::handle(Strategy::CacheFirstWithEviction, CacheKind::Audio)
        );
        assert_eq!(
            classify("/static/app.js"),
            Route::handle(Strategy::NetworkFirst, CacheKind::Static)
        );
        assert_eq!(
            classify("/favicon.svg"),
            Route::handle(Strategy::CacheFirst, CacheKind::Static)
        );
    }

    #[test]
    fn test_api_prefix_wins_over_audio_extension() {
        assert_eq!(
            classify("/api/tracks/42.mp3"),
            Route::handle(Strategy::NetworkFirst, CacheKind::Api)
        );
    }

    #[test]
    fn test_audio_host_without_extension() {
        assert_eq!(
            classify("https://cdn1.suno.ai/stream/abc?sig=1"),
            Route::handle(Strategy::CacheFirstWithEviction, CacheKind::Audio)
        );
    }

    #[test]
    fn test_extension_match_ignores_query_and_case() {
        assert_eq!(
            classify("/media/Song.MP3?v=2"),
            Route::handle(Strategy::CacheFirstWithEviction, CacheKind::Audio)
        );
        assert_eq!(
            classify("/assets/main.css?hash=abc"),
            Route::handle(Strategy::NetworkFirst, CacheKind::Static)
        );
    }

    #[test]
    fn test_passthrough() {
        let url = Url::parse("https://aiamusic.app/api/songs").unwrap();
        assert_eq!(
            classifier().classify(HttpMethod::Post, &url),
            Route::Passthrough
        );

        let ext = Url::parse("chrome-extension://abcdef/script.js").unwrap();
        assert_eq!(classifier().classify(HttpMethod::Get, &ext), Route::Passthrough);
    }
}
