//! Size bound for the audio namespace.
//!
//! Eviction runs before the insert, oldest-inserted first, so the namespace
//! never holds more than `max_items` entries even momentarily. Reads do not
//! refresh an entry's position: this is FIFO, not LRU.

use bridge_traits::{Cache, CacheKey, HttpResponse};
use tracing::debug;

use crate::error::Result;

/// Enforces the maximum entry count of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioCacheBound {
    max_items: usize,
}

impl AudioCacheBound {
    pub fn new(max_items: usize) -> Self {
        Self {
            max_items: max_items.max(1),
        }
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    /// Evict the oldest entries so that storing `incoming` keeps the cache
    /// within bounds. Returns the evicted keys, oldest first.
    pub async fn make_room(&self, cache: &dyn Cache, incoming: &CacheKey) -> Result<Vec<CacheKey>> {
        let keys = cache.keys().await?;
        let replacing = keys.contains(incoming);
        let after_insert = keys.len() + usize::from(!replacing);
        let excess = after_insert.saturating_sub(self.max_items);

        let mut evicted = Vec::with_capacity(excess);
        for key in keys.into_iter().filter(|k| k != incoming).take(excess) {
            if cache.delete(&key).await? {
                debug!(key = %key, "Evicted audio entry");
                evicted.push(key);
            }
        }
        Ok(evicted)
    }

    /// Make room, then store the response.
    pub async fn insert(
        &self,
        cache: &dyn Cache,
        key: CacheKey,
        response: HttpResponse,
    ) -> Result<Vec<CacheKey>> {
        let evicted = self.make_room(cache, &key).await?;
        cache.put(key, response).await?;
        Ok(evicted)
    }
}

impl Default for AudioCacheBound {
    fn default() -> Self {
        Self::new(50)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_desktop::MemoryCacheStorage;
    use bridge_traits::CacheStorage;

    fn key(i: usize) -> CacheKey {
        CacheKey::get(format!("https://cdn.example/{}.mp3", i))
    }

    #[tokio::test]
    async fn test_bound_is_never_exceeded() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("aiamusic-audio-v3").await.unwrap();
        let bound = AudioCacheBound::new(3);

        for i in 0..5 {
            bound
                .insert(cache.as_ref(), key(i), HttpResponse::ok(vec![i as u8]))
                .await
                .unwrap();
            assert!(cache.len().await.unwrap() <= 3);
        }

        assert_eq!(cache.keys().await.unwrap(), vec![key(2), key(3), key(4)]);
    }

    #[tokio::test]
    async fn test_eviction_is_fifo() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("aiamusic-audio-v3").await.unwrap();
        let bound = AudioCacheBound::new(2);

        bound.insert(cache.as_ref(), key(0), HttpResponse::ok("a")).await.unwrap();
        bound.insert(cache.as_ref(), key(1), HttpResponse::ok("b")).await.unwrap();

        // A read does not protect the oldest entry.
        assert!(cache.match_key(&key(0)).await.unwrap().is_some());

        let evicted = bound
            .insert(cache.as_ref(), key(2), HttpResponse::ok("c"))
            .await
            .unwrap();
        assert_eq!(evicted, vec![key(0)]);
    }

    #[tokio::test]
    async fn test_replacing_existing_key_evicts_nothing() {
        let storage = MemoryCacheStorage::new();
        let cache = storage.open("aiamusic-audio-v3").await.unwrap();
        let bound = AudioCacheBound::new(2);

        bound.insert(cache.as_ref(), key(0), HttpResponse::ok("a")).await.unwrap();
        bound.insert(cache.as_ref(), key(1), HttpResponse::ok("b")).await.unwrap();

        let evicted = bound
            .insert(cache.as_ref(), key(0), HttpResponse::ok("a2"))
            .await
            .unwrap();
        assert!(evicted.is_empty());
        assert_eq!(cache.len().await.unwrap(), 2);
    }

    #[test]
    fn test_zero_bound_is_clamped() {
        assert_eq!(AudioCacheBound::new(0).max_items(), 1);
    }
}
