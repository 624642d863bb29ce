//! # Playback State Module
//!
//! Persists "where was the user in playback" across reloads and replays it
//! when the player comes back.
//!
//! ## Overview
//!
//! This module handles:
//! - The persisted snapshot and its validation ([`snapshot`])
//! - A synchronous single-slot store over durable local storage ([`store`])
//! - Debounced and periodic saves ([`persistence`])
//! - The restoration state machine ([`restore`])
//! - The player session that ties them to user actions ([`session`])
//!
//! The store knows nothing about the offline cache; the two only meet in the
//! host application.

pub mod error;
pub mod models;
pub mod persistence;
pub mod restore;
pub mod session;
pub mod snapshot;
pub mod store;

pub use error::{PlaybackError, Result};
pub use models::{PlaylistDetail, PlaylistId, PlaylistSummary, Song, Track};
pub use persistence::{SaveScheduler, StateSource};
pub use restore::{
    detect_device, PendingRestore, RestorationMachine, RestorePhase, RestoreSelection,
    RestoreStart, ResumeCommand, SkipReason,
};
pub use session::PlayerSession;
pub use snapshot::{PlaybackSnapshot, PlaybackState};
pub use store::PlaybackStateStore;
