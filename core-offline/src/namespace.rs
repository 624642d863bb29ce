//! Versioned cache namespaces.
//!
//! Every cache this application owns is named `{app}-{kind}-{version}`. For a
//! given deploy exactly one name per kind is current; every other name with
//! the application prefix is condemned and purged on activation.

use std::fmt;
use std::str::FromStr;

/// What a namespace holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Application shell, scripts, stylesheets, images.
    Static,
    /// Large binary audio assets, size-bounded.
    Audio,
    /// REST API responses.
    Api,
}

impl CacheKind {
    pub const ALL: [CacheKind; 3] = [CacheKind::Static, CacheKind::Audio, CacheKind::Api];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheKind::Static => "static",
            CacheKind::Audio => "audio",
            CacheKind::Api => "api",
        }
    }
}

impl fmt::Display for CacheKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "static" => Ok(CacheKind::Static),
            "audio" => Ok(CacheKind::Audio),
            "api" => Ok(CacheKind::Api),
            other => Err(format!("unknown cache kind '{}'", other)),
        }
    }
}

/// One versioned namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    app: String,
    kind: CacheKind,
    version: String,
}

impl Namespace {
    pub fn new(app: impl Into<String>, kind: CacheKind, version: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            kind,
            version: version.into(),
        }
    }

    /// Parse a cache name of the form `{app}-{kind}-{version}`.
    pub fn parse(name: &str) -> Option<Self> {
        let mut parts = name.splitn(3, '-');
        let app = parts.next().filter(|s| !s.is_empty())?;
        let kind = parts.next()?.parse().ok()?;
        let version = parts.next().filter(|s| !s.is_empty())?;
        Some(Self::new(app, kind, version))
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn kind(&self) -> CacheKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The cache name used with [`CacheStorage`](bridge_traits::CacheStorage).
    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.app, self.kind, self.version)
    }
}

/// The current namespace of each kind for one deploy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceSet {
    app: String,
    version: String,
    static_ns: Namespace,
    audio: Namespace,
    api: Namespace,
}

impl NamespaceSet {
    pub fn new(app: impl Into<String>, version: impl Into<String>) -> Self {
        let app = app.into();
        let version = version.into();
        Self {
            static_ns: Namespace::new(app.clone(), CacheKind::Static, version.clone()),
            audio: Namespace::new(app.clone(), CacheKind::Audio, version.clone()),
            api: Namespace::new(app.clone(), CacheKind::Api, version.clone()),
            app,
            version,
        }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, kind: CacheKind) -> &Namespace {
        match kind {
            CacheKind::Static => &self.static_ns,
            CacheKind::Audio => &self.audio,
            CacheKind::Api => &self.api,
        }
    }

    /// Whether this application owns the cache name at all.
    pub fn owns(&self, name: &str) -> bool {
        name.strip_prefix(self.app.as_str())
            .is_some_and(|rest| rest.starts_with('-'))
    }

    /// Owned by this application but not one of the current names.
    ///
    /// Matching is on the exact current names, not on the version suffix:
    /// an owned name of a kind this build no longer uses (`aiamusic-images-v4`
    /// while `v4` is current) is purged as well.
    pub fn is_condemned(&self, name: &str) -> bool {
        self.owns(name)
            && !CacheKind::ALL
                .iter()
                .any(|kind| self.get(*kind).name() == name)
    }
}
