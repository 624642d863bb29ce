//! Response Cache Abstractions
//!
//! Models the host's named response caches: a set of independently named
//! caches, each mapping a request identity to a stored response.
//!
//! - Web: the Cache Storage API inside a service worker
//! - Desktop: [`MemoryCacheStorage`](../../bridge_desktop/struct.MemoryCacheStorage.html)
//!
//! # Ordering contract
//!
//! [`Cache::keys`] returns keys oldest-inserted first. Eviction relies on this,
//! so implementations must keep an explicit insertion log rather than iterate a
//! hash map. Re-putting an existing key replaces the response and moves the key
//! to the newest position.
//!
//! # Concurrency
//!
//! Each call is atomic on its own; there are no multi-call transactions.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Request identity used as a cache key: method plus absolute URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub method: HttpMethod,
    pub url: String,
}

impl CacheKey {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }
}

impl From<&HttpRequest> for CacheKey {
    fn from(request: &HttpRequest) -> Self {
        Self::new(request.method, request.url.clone())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// A single named cache.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Look up a stored response.
    async fn match_key(&self, key: &CacheKey) -> Result<Option<HttpResponse>>;

    /// Store a response, replacing any previous entry for the key.
    ///
    /// The entry becomes visible only once the call returns `Ok`.
    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()>;

    /// Remove an entry. Returns `true` if something was deleted.
    async fn delete(&self, key: &CacheKey) -> Result<bool>;

    /// All keys, oldest-inserted first.
    async fn keys(&self) -> Result<Vec<CacheKey>>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize> {
        Ok(self.keys().await?.len())
    }

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }
}

/// The registry of named caches.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Open a cache by name, creating it if it does not exist.
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>>;

    /// Check whether a cache with this name exists.
    async fn has(&self, name: &str) -> Result<bool>;

    /// Delete a cache and all its entries. Returns `true` if it existed.
    ///
    /// Handles opened before the delete keep working on a detached cache; a
    /// later [`open`](CacheStorage::open) starts from empty.
    async fn delete(&self, name: &str) -> Result<bool>;

    /// Names of all existing caches.
    async fn keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_from_request() {
        let request = HttpRequest::get("https://app.example/api/songs");
        let key = CacheKey::from(&request);

        assert_eq!(key, CacheKey::get("https://app.example/api/songs"));
        assert_eq!(key.to_string(), "GET https://app.example/api/songs");
    }
}
