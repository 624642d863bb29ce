//! Caching strategies.
//!
//! Each strategy reads and writes a single namespace. Only successful
//! responses (2xx) are stored; anything else is returned to the caller
//! untouched. A failed cache read is treated as a miss and a failed cache
//! write is logged and skipped, so storage trouble never fails a request that
//! the network could answer.

use bridge_traits::{Cache, CacheKey, HttpClient, HttpRequest, HttpResponse};
use core_runtime::logging::redact_url_query;
use tracing::{debug, warn};

use crate::error::{OfflineError, Result};
use crate::eviction::AudioCacheBound;

/// Body of the synthesized response for audio that is neither cached nor
/// reachable.
pub const OFFLINE_AUDIO_BODY: &str = "Audio unavailable offline";

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServedFrom {
    Cache,
    Network,
    /// Navigation fallback to the cached shell document.
    Shell,
    /// Synthesized offline response.
    Fallback,
}

/// A served response plus what happened to the cache along the way.
#[derive(Debug, Clone)]
pub struct Served {
    pub response: HttpResponse,
    pub from: ServedFrom,
    /// Whether the response was written to cache.
    pub stored: bool,
    /// Entries evicted to make room for it.
    pub evicted: Vec<CacheKey>,
}

impl Served {
    fn new(response: HttpResponse, from: ServedFrom) -> Self {
        Self {
            response,
            from,
            stored: false,
            evicted: Vec::new(),
        }
    }
}

/// `503 Service Unavailable` with a plain-text explanation.
pub fn offline_audio_response() -> HttpResponse {
    HttpResponse::new(503, OFFLINE_AUDIO_BODY)
        .with_status_text("Service Unavailable")
        .with_header("Content-Type", "text/plain")
}

/// Cache-first: serve from cache, otherwise fetch and store.
///
/// When a navigation cannot be fetched, the cached `shell` document is served
/// instead so client-side routing keeps working offline.
pub async fn cache_first(
    http: &dyn HttpClient,
    cache: &dyn Cache,
    request: HttpRequest,
    shell: Option<&CacheKey>,
) -> Result<Served> {
    let key = CacheKey::from(&request);
    if let Some(hit) = lookup(cache, &key).await {
        return Ok(Served::new(hit, ServedFrom::Cache));
    }

    let is_navigation = request.is_navigation();
    let url = request.url.clone();
    match http.execute(request).await {
        Ok(response) => {
            let stored = response.is_success() && store(cache, key, &response).await;
            Ok(Served {
                stored,
                ..Served::new(response, ServedFrom::Network)
            })
        }
        Err(source) => {
            if is_navigation {
                if let Some(shell_key) = shell {
                    if let Some(document) = lookup(cache, shell_key).await {
                        debug!(url = %redact_url_query(&url), "Serving shell for offline navigation");
                        return Ok(Served::new(document, ServedFrom::Shell));
                    }
                }
            }
            Err(OfflineError::Network { url, source })
        }
    }
}

/// Network-first: fetch and refresh the cache, fall back to cache on failure.
pub async fn network_first(
    http: &dyn HttpClient,
    cache: &dyn Cache,
    request: HttpRequest,
) -> Result<Served> {
    let key = CacheKey::from(&request);
    let url = request.url.clone();
    match http.execute(request).await {
        Ok(response) => {
            let stored = response.is_success() && store(cache, key, &response).await;
            Ok(Served {
                stored,
                ..Served::new(response, ServedFrom::Network)
            })
        }
        Err(source) => match lookup(cache, &key).await {
            Some(cached) => {
                debug!(url = %redact_url_query(&url), "Network failed, serving cached copy");
                Ok(Served::new(cached, ServedFrom::Cache))
            }
            None => Err(OfflineError::Network { url, source }),
        },
    }
}

/// Cache-first into a bounded cache. Never fails: when the network is
/// unreachable and nothing is cached, returns [`offline_audio_response`].
pub async fn cache_first_with_eviction(
    http: &dyn HttpClient,
    cache: &dyn Cache,
    bound: &AudioCacheBound,
    request: HttpRequest,
) -> Served {
    let key = CacheKey::from(&request);
    if let Some(hit) = lookup(cache, &key).await {
        return Served::new(hit, ServedFrom::Cache);
    }

    let url = request.url.clone();
    match http.execute(request).await {
        Ok(response) => {
            let mut served = Served::new(response, ServedFrom::Network);
            if served.response.is_success() {
                match bound.insert(cache, key, served.response.clone()).await {
                    Ok(evicted) => {
                        served.stored = true;
                        served.evicted = evicted;
                    }
                    Err(error) => {
                        warn!(url = %redact_url_query(&url), error = %error, "Failed to cache audio");
                    }
                }
            }
            served
        }
        Err(error) => {
            debug!(url = %redact_url_query(&url), error = %error, "Audio unavailable offline");
            Served::new(offline_audio_response(), ServedFrom::Fallback)
        }
    }
}

async fn lookup(cache: &dyn Cache, key: &CacheKey) -> Option<HttpResponse> {
    match cache.match_key(key).await {
        Ok(hit) => hit,
        Err(error) => {
            warn!(url = %redact_url_query(&key.url), error = %error, "Cache read failed, treating as miss");
            None
        }
    }
}

async fn store(cache: &dyn Cache, key: CacheKey, response: &HttpResponse) -> bool {
    let url = key.url.clone();
    match cache.put(key, response.clone()).await {
        Ok(()) => true,
        Err(error) => {
            warn!(url = %redact_url_query(&url), error = %error, "Cache write failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_audio_response() {
        let response = offline_audio_response();
        assert_eq!(response.status, 503);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.text().unwrap(), "Audio unavailable offline");
        assert!(!response.is_success());
    }
}
