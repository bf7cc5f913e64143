//! Best-effort local key-value persistence.
//!
//! Used for small cross-session caches (the static asset base URL, the
//! active theme of a collaborator). All persistence is best-effort: a
//! missing or unwritable backing file degrades to in-memory behavior
//! without surfacing an error to the user.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, warn};

/// String-keyed store with best-effort durability.
pub trait Storage: Send + Sync {
    /// The stored value, or `None` if absent.
    fn get(&self, key: &str) -> Option<String>;

    /// Store a value. Failures are logged, never raised.
    fn set(&self, key: &str, value: &str);

    /// Remove a value. Failures are logged, never raised.
    fn remove(&self, key: &str);
}

// ============================================================================
// MemoryStorage
// ============================================================================

/// Purely in-memory storage; the fallback when no backing file is usable,
/// and the default in tests.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }

    fn remove(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

// ============================================================================
// FileStorage
// ============================================================================

/// JSON-file-backed storage under the platform data dir.
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open (or lazily create) the store at `path`. A missing or corrupt
    /// file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let cache = Self::load(&path);
        Self {
            path,
            cache: Mutex::new(cache),
        }
    }

    /// The store at the default location
    /// (`~/.local/share/weft/client-store.json`).
    pub fn open_default() -> Self {
        let base = dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::open(base.join("weft").join("client-store.json"))
    }

    fn load(path: &Path) -> HashMap<String, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(map) => map,
                Err(err) => {
                    warn!("ignoring corrupt client store at {}: {err}", path.display());
                    HashMap::new()
                }
            },
            Err(err) => {
                debug!("no client store at {} ({err}); starting empty", path.display());
                HashMap::new()
            }
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!("cannot create {}: {err}", parent.display());
                return;
            }
        }
        match serde_json::to_string_pretty(entries) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&self.path, json) {
                    warn!("cannot persist client store to {}: {err}", self.path.display());
                }
            }
            Err(err) => warn!("cannot serialize client store: {err}"),
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.lock().unwrap().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut cache = self.cache.lock().unwrap();
        cache.insert(key.to_string(), value.to_string());
        self.persist(&cache);
    }

    fn remove(&self, key: &str) {
        let mut cache = self.cache.lock().unwrap();
        cache.remove(key);
        self.persist(&cache);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage_round_trip() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("k"), None);
        storage.set("k", "v");
        assert_eq!(storage.get("k"), Some("v".to_string()));
        storage.remove("k");
        assert_eq!(storage.get("k"), None);
    }

    #[test]
    fn test_file_storage_round_trip_and_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let storage = FileStorage::open(&path);
        storage.set("weft.staticAssetUrl", "https://cdn.example.com/static");
        drop(storage);

        let reopened = FileStorage::open(&path);
        assert_eq!(
            reopened.get("weft.staticAssetUrl"),
            Some("https://cdn.example.com/static".to_string())
        );
    }

    #[test]
    fn test_file_storage_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json at all").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("anything"), None);
    }

    #[test]
    fn test_file_storage_unwritable_path_degrades_to_memory() {
        // A path whose parent cannot be created: writes fail, reads still
        // reflect the in-memory cache.
        let storage = FileStorage::open("/dev/null/impossible/store.json");
        storage.set("k", "v");
        assert_eq!(storage.get("k"), Some("v".to_string()));
    }

    #[test]
    fn test_file_storage_remove_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let storage = FileStorage::open(&path);
        storage.set("k", "v");
        storage.remove("k");
        drop(storage);

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("k"), None);
    }
}
