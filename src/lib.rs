//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates (`core-service`, `core-offline`, `core-playback`). Host
//! applications can depend on `aiamusic-workspace` and enable the documented
//! features without needing to wire each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service;

#[cfg(feature = "offline-cache")]
pub use core_offline;

#[cfg(feature = "playback-state")]
pub use core_playback;
