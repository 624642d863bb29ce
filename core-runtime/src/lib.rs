//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by the offline cache manager and
//! the playback state store:
//! - Logging and tracing setup
//! - Configuration with fail-fast validation
//! - Event bus for cache and playback notifications

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
