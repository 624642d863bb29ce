//! Local storage backed by a JSON file

use bridge_traits::{
    error::{BridgeError, Result},
    storage::LocalStorage,
};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed [`LocalStorage`].
///
/// The whole store lives in one JSON object on disk. Every write rewrites the
/// file through a temporary sibling and a rename, so a crash mid-write leaves
/// the previous contents intact.
pub struct FileLocalStorage {
    path: PathBuf,
    items: Mutex<BTreeMap<String, String>>,
}

impl FileLocalStorage {
    /// Open (or create) the store at `path`.
    ///
    /// An unreadable or corrupt file is treated as empty, matching how a
    /// browser presents a wiped `localStorage`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let items = match fs::read_to_string(&path) {
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = ?path, error = %e, "Discarding corrupt local storage file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(BridgeError::Io(e)),
        };

        debug!(path = ?path, items = items.len(), "Opened local storage");
        Ok(Self {
            path,
            items: Mutex::new(items),
        })
    }

    /// Open the store in the platform data directory.
    pub fn in_data_dir(app: &str) -> Result<Self> {
        let base = dirs::data_dir().ok_or_else(|| {
            BridgeError::NotAvailable("No data directory on this platform".to_string())
        })?;
        Self::open(base.join(app).join("local_storage.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, items: &BTreeMap<String, String>) -> Result<()> {
        let json = serde_json::to_vec_pretty(items)
            .map_err(|e| BridgeError::Storage(format!("Failed to encode store: {}", e)))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl LocalStorage for FileLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.lock();
        let previous = items.insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist(&items) {
            // Keep memory and disk in agreement.
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let mut items = self.items.lock();
        if let Some(old) = items.remove(key) {
            if let Err(e) = self.persist(&items) {
                items.insert(key.to_string(), old);
                return Err(e);
            }
        }
        Ok(())
    }
}

/// Process-local [`LocalStorage`] for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryLocalStorage {
    items: Mutex<BTreeMap<String, String>>,
}

impl MemoryLocalStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryLocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.items.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_storage_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");

        let store = FileLocalStorage::open(&path).unwrap();
        store.set_item("aiamusic_playback_state", "{\"a\":1}").unwrap();
        drop(store);

        let reopened = FileLocalStorage::open(&path).unwrap();
        assert_eq!(
            reopened.get_item("aiamusic_playback_state").unwrap(),
            Some("{\"a\":1}".to_string())
        );
    }

    #[test]
    fn test_file_storage_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileLocalStorage::open(dir.path().join("nested/store.json")).unwrap();

        store.set_item("k", "v").unwrap();
        assert!(store.has_item("k").unwrap());

        store.remove_item("k").unwrap();
        store.remove_item("k").unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_failed_writes_leave_memory_matching_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let store = FileLocalStorage::open(&path).unwrap();
        store.set_item("k", "v").unwrap();

        // A directory where the temporary file goes makes every write fail.
        fs::create_dir(dir.path().join("store.json.tmp")).unwrap();

        assert!(store.set_item("k", "w").is_err());
        assert_eq!(store.get_item("k").unwrap(), Some("v".to_string()));

        assert!(store.remove_item("k").is_err());
        assert_eq!(store.get_item("k").unwrap(), Some("v".to_string()));
        assert_eq!(
            FileLocalStorage::open(&path).unwrap().get_item("k").unwrap(),
            Some("v".to_string())
        );
    }

    #[test]
    fn test_corrupt_file_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "not json").unwrap();

        let store = FileLocalStorage::open(&path).unwrap();
        assert_eq!(store.get_item("k").unwrap(), None);
    }

    #[test]
    fn test_memory_storage() {
        let store = MemoryLocalStorage::new();
        store.set_item("k", "1").unwrap();
        store.set_item("k", "2").unwrap();
        assert_eq!(store.get_item("k").unwrap(), Some("2".to_string()));
    }
}
