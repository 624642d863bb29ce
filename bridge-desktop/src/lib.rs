//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! - `HttpClient` using `reqwest`
//! - `CacheStorage` as insertion-ordered in-memory caches
//! - `LocalStorage` as a JSON file in the app data directory
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{FileLocalStorage, MemoryCacheStorage, ReqwestHttpClient};
//!
//! let http = ReqwestHttpClient::new()?;
//! let caches = MemoryCacheStorage::new();
//! let local = FileLocalStorage::in_data_dir("aiamusic")?;
//! ```

mod cache_storage;
mod http;
mod local_storage;

pub use cache_storage::{MemoryCache, MemoryCacheStorage};
pub use http::ReqwestHttpClient;
pub use local_storage::{FileLocalStorage, MemoryLocalStorage};
