//! # Offline Cache Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors surfaced by the offline cache manager.
///
/// A `handle_fetch` error is the equivalent of the page seeing a network
/// error: it only happens where the request could be served neither from the
/// network nor from cache, and never for audio.
#[derive(Error, Debug)]
pub enum OfflineError {
    /// The network produced no response.
    #[error("Network request failed for {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: BridgeError,
    },

    /// Cache storage rejected an operation that could not be skipped.
    #[error("Cache storage error: {0}")]
    Storage(#[from] BridgeError),

    /// Pre-warming the application shell failed; the host should retry.
    #[error("Install of {version} failed: {reason}")]
    InstallFailed { version: String, reason: String },

    /// A lifecycle step was requested from the wrong state.
    #[error("Cannot {action} while {state}")]
    InvalidState { action: &'static str, state: String },

    /// The request URL could not be resolved.
    #[error("Invalid request URL '{url}': {reason}")]
    InvalidRequest { url: String, reason: String },

    /// A control message did not match any known kind.
    #[error("Invalid control message: {0}")]
    InvalidMessage(String),

    /// The worker's message loop has stopped.
    #[error("Worker message channel closed")]
    ChannelClosed,
}

impl OfflineError {
    /// Returns `true` if retrying later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            OfflineError::Network { .. } | OfflineError::InstallFailed { .. }
        )
    }
}

/// Result type for offline cache operations.
pub type Result<T> = std::result::Result<T, OfflineError>;
