//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the offline/playback core and the
//! environment it runs in. The cache manager only ever talks to the network
//! and to response caches through these traits, and the playback store only
//! ever talks to durable local storage.
//!
//! ## Traits
//!
//! - [`HttpClient`](http::HttpClient) - Network fetch
//! - [`CacheStorage`](cache::CacheStorage) / [`Cache`](cache::Cache) - Named response caches
//! - [`LocalStorage`](storage::LocalStorage) - Synchronous durable key-value storage
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! | Platform | Implementation Crate |
//! |----------|---------------------|
//! | Desktop  | `bridge-desktop`    |
//! | Web      | host-provided       |
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should map platform errors onto it and keep the message actionable (URL,
//! cache name, storage key).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so a single instance can be shared
//! by concurrent request handlers behind an `Arc`.

pub mod cache;
pub mod error;
pub mod http;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use cache::{Cache, CacheKey, CacheStorage};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RequestMode};
pub use storage::LocalStorage;
pub use time::{Clock, LogLevel, ManualClock, SystemClock};
