//! In-memory response caches
//!
//! Each cache keeps its entries in a hash map plus an explicit insertion log,
//! so `keys()` order is a property of this type rather than of map iteration.

use async_trait::async_trait;
use bridge_traits::{
    cache::{Cache, CacheKey, CacheStorage},
    error::{BridgeError, Result},
    http::HttpResponse,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;

#[derive(Default)]
struct Entries {
    responses: HashMap<CacheKey, HttpResponse>,
    order: VecDeque<CacheKey>,
    bytes: usize,
}

impl Entries {
    fn remove(&mut self, key: &CacheKey) -> Option<HttpResponse> {
        let removed = self.responses.remove(key)?;
        self.order.retain(|k| k != key);
        self.bytes -= removed.body.len();
        Some(removed)
    }
}

/// A single named in-memory cache.
pub struct MemoryCache {
    name: String,
    entries: Mutex<Entries>,
    quota_bytes: Option<usize>,
}

impl MemoryCache {
    fn new(name: &str, quota_bytes: Option<usize>) -> Self {
        Self {
            name: name.to_string(),
            entries: Mutex::new(Entries::default()),
            quota_bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total body bytes currently stored.
    pub fn stored_bytes(&self) -> usize {
        self.entries.lock().bytes
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn match_key(&self, key: &CacheKey) -> Result<Option<HttpResponse>> {
        Ok(self.entries.lock().responses.get(key).cloned())
    }

    async fn put(&self, key: CacheKey, response: HttpResponse) -> Result<()> {
        let mut entries = self.entries.lock();

        let replaced = entries
            .responses
            .get(&key)
            .map(|r| r.body.len())
            .unwrap_or(0);
        if let Some(quota) = self.quota_bytes {
            if entries.bytes - replaced + response.body.len() > quota {
                return Err(BridgeError::QuotaExceeded);
            }
        }

        entries.remove(&key);
        entries.bytes += response.body.len();
        entries.order.push_back(key.clone());
        entries.responses.insert(key, response);
        Ok(())
    }

    async fn delete(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.entries.lock().remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<CacheKey>> {
        Ok(self.entries.lock().order.iter().cloned().collect())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().order.len())
    }
}

/// Process-local [`CacheStorage`].
///
/// Suitable for desktop hosts and tests. Contents do not survive a restart.
#[derive(Default)]
pub struct MemoryCacheStorage {
    caches: RwLock<HashMap<String, Arc<MemoryCache>>>,
    quota_bytes: Option<usize>,
}

impl MemoryCacheStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit every cache to `bytes` of stored bodies; `put` beyond that fails
    /// with [`BridgeError::QuotaExceeded`].
    pub fn with_quota_bytes(mut self, bytes: usize) -> Self {
        self.quota_bytes = Some(bytes);
        self
    }
}

#[async_trait]
impl CacheStorage for MemoryCacheStorage {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>> {
        if let Some(cache) = self.caches.read().get(name) {
            return Ok(cache.clone());
        }

        let mut caches = self.caches.write();
        let cache = caches
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(cache = name, "Created cache");
                Arc::new(MemoryCache::new(name, self.quota_bytes))
            })
            .clone();
        Ok(cache)
    }

    async fn has(&self, name: &str) -> Result<bool> {
        Ok(self.caches.read().contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let removed = self.caches.write().remove(name).is_some();
        if removed {
            debug!(cache = name, "Deleted cache");
        }
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.caches.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
