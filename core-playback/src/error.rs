//! # Playback Error Types

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur in the playback state store and player session.
///
/// Store reads and writes never surface these to the player: a broken
/// snapshot reads as absent and a failed write is logged.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Durable storage rejected an operation.
    #[error("Storage error: {0}")]
    Storage(#[from] BridgeError),

    /// A stored snapshot is missing required fields or has the wrong shape.
    #[error("Invalid playback snapshot: {0}")]
    InvalidSnapshot(String),

    /// Snapshot (de)serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Only tracks 1 and 2 exist.
    #[error("Invalid track: {0} (must be 1 or 2)")]
    InvalidTrack(u8),

    /// Song index outside the loaded playlist.
    #[error("Song index {index} out of range for a playlist of {len} songs")]
    SongOutOfRange { index: usize, len: usize },

    /// An operation needed playlist detail that has not arrived yet.
    #[error("No playlist loaded")]
    NoPlaylistLoaded,
}

impl PlaybackError {
    /// Returns `true` if the error came from the storage backend.
    pub fn is_storage_error(&self) -> bool {
        matches!(self, PlaybackError::Storage(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
