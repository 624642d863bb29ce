//! # Offline Cache Manager
//!
//! Request interception and versioned response caching for the web client.
//!
//! ## Overview
//!
//! The worker sits between the application and the network. Every request is
//! classified ([`classify`]) into one of three strategies, each bound to one
//! versioned namespace ([`namespace`]):
//!
//! - **static**: application shell and assets, cache-first; scripts and
//!   stylesheets network-first so deploys show up on the next load
//! - **api**: network-first with cached fallback
//! - **audio**: cache-first into a FIFO-bounded namespace ([`eviction`]);
//!   a synthesized `503` when offline and uncached
//!
//! On install the shell is pre-warmed all-or-nothing; on activation every
//! namespace from an older deploy is purged ([`lifecycle`]). The application
//! steers the worker with JSON control messages ([`messages`]) sent through a
//! [`WorkerHandle`].
//!
//! ## Example
//!
//! ```ignore
//! let worker = Arc::new(OfflineWorker::new(&config, http, caches)?);
//! worker.start().await?;
//! let (handle, _task) = worker.spawn();
//! handle.cache_audio(["https://cdn.example/song.mp3"])?;
//! let response = worker.handle_fetch(HttpRequest::get("/api/songs")).await?;
//! ```

pub mod classify;
pub mod error;
pub mod eviction;
pub mod lifecycle;
pub mod messages;
pub mod namespace;
pub mod strategy;
pub mod worker;

pub use classify::{RequestClassifier, Route, Strategy};
pub use error::{OfflineError, Result};
pub use eviction::AudioCacheBound;
pub use lifecycle::{ActivateReport, InstallReport, WorkerState};
pub use messages::ControlMessage;
pub use namespace::{CacheKind, Namespace, NamespaceSet};
pub use strategy::{offline_audio_response, Served, ServedFrom, OFFLINE_AUDIO_BODY};
pub use worker::{OfflineWorker, PrecacheReport, WorkerHandle};
