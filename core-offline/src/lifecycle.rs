//! Install and activate steps of the worker lifecycle.
//!
//! ```text
//! Parsed ──install──▶ Installing ──ok──▶ Installed ──activate──▶ Activating ──▶ Activated
//!                         │
//!                         └──err──▶ Redundant (retry install)
//! ```

use std::fmt;

use bridge_traits::{CacheKey, CacheStorage, HttpClient, HttpRequest, HttpResponse};
use futures::future::try_join_all;
use tracing::{debug, info};
use url::Url;

use crate::error::{OfflineError, Result};
use crate::namespace::{CacheKind, NamespaceSet};

/// Lifecycle state of a worker version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Parsed,
    Installing,
    /// Installed and waiting to take control.
    Installed,
    Activating,
    /// In control of the application's requests.
    Activated,
    /// Install failed; a fresh install may be attempted.
    Redundant,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WorkerState::Parsed => "parsed",
            WorkerState::Installing => "installing",
            WorkerState::Installed => "installed",
            WorkerState::Activating => "activating",
            WorkerState::Activated => "activated",
            WorkerState::Redundant => "redundant",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
    pub version: String,
    pub assets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
    pub version: String,
    /// Names of the namespaces that were deleted.
    pub purged: Vec<String>,
}

/// Pre-warm the static namespace with the application shell.
///
/// All-or-nothing: every asset is fetched before anything is stored, so a
/// single failure leaves the namespace untouched.
pub async fn install(
    http: &dyn HttpClient,
    caches: &dyn CacheStorage,
    namespaces: &NamespaceSet,
    manifest: &[Url],
) -> Result<InstallReport> {
    let version = namespaces.version().to_string();
    let failed = |reason: String| OfflineError::InstallFailed {
        version: version.clone(),
        reason,
    };

    let fetches = manifest.iter().map(|url| async move {
        let response = http
            .execute(HttpRequest::get(url.as_str()))
            .await
            .map_err(|e| failed(format!("{}: {}", url, e)))?;
        if !response.is_success() {
            return Err(failed(format!("{}: HTTP {}", url, response.status)));
        }
        Ok::<(CacheKey, HttpResponse), OfflineError>((CacheKey::get(url.as_str()), response))
    });
    let responses = try_join_all(fetches).await?;

    let cache = caches
        .open(&namespaces.get(CacheKind::Static).name())
        .await
        .map_err(|e| failed(e.to_string()))?;
    for (key, response) in responses {
        debug!(key = %key, "Pre-cached shell asset");
        cache
            .put(key, response)
            .await
            .map_err(|e| failed(e.to_string()))?;
    }

    info!(version = %version, assets = manifest.len(), "Offline cache installed");
    Ok(InstallReport {
        version,
        assets: manifest.len(),
    })
}

/// Delete every namespace this application owns that is not current.
pub async fn activate(caches: &dyn CacheStorage, namespaces: &NamespaceSet) -> Result<ActivateReport> {
    let mut purged = Vec::new();
    for name in caches.keys().await? {
        if namespaces.is_condemned(&name) && caches.delete(&name).await? {
            info!(name = %name, "Purged stale cache namespace");
            purged.push(name);
        }
    }

    info!(version = %namespaces.version(), purged = purged.len(), "Offline cache activated");
    Ok(ActivateReport {
        version: namespaces.version().to_string(),
        purged,
    })
}
