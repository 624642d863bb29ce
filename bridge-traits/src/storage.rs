//! Durable Local Storage Abstraction
//!
//! A small synchronous string key-value store, the equivalent of the web
//! platform's `localStorage`:
//! - Web: `window.localStorage`
//! - Desktop: a JSON file in the app data directory
//!
//! The API is deliberately blocking. Callers write from teardown handlers
//! where no further async work is guaranteed to run.

use crate::error::Result;

/// Synchronous key-value storage for small values.
pub trait LocalStorage: Send + Sync {
    /// Read a value. Returns `Ok(None)` if the key doesn't exist.
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<()>;

    /// Check if a key exists
    fn has_item(&self, key: &str) -> Result<bool> {
        Ok(self.get_item(key)?.is_some())
    }
}
