//! Local key-value persistence
//!
//! Two scopes are used by the guard:
//! - durable: last activity timestamp and configured lock-after duration
//! - session: the "unlocked in this session" marker, gone when the process ends

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::StoreError;

/// Durable key holding the last activity timestamp (epoch millis)
pub const LAST_ACTIVE_AT_KEY: &str = "applock.last_active_at";
/// Durable key holding the idle budget in milliseconds
pub const LOCK_AFTER_MS_KEY: &str = "applock.lock_after_ms";
/// Session key set after a successful setup/unlock
pub const SESSION_UNLOCKED_KEY: &str = "applock.session_unlocked";

/// String key-value storage
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Process-lifetime store; use it for session scope
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Durable store backed by a JSON file
///
/// Entries are cached in memory; every write rewrites the file atomically.
#[derive(Debug)]
pub struct FileKeyValueStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileKeyValueStore {
    /// Open the store, loading existing entries
    ///
    /// A missing file starts empty. An unreadable one is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        let contents = serde_json::to_string_pretty(entries)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, contents)?;
        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_memory_store() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get("k").is_none());

        store.set("k", "v").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v"));

        store.remove("k").unwrap();
        assert!(store.get("k").is_none());

        // Removing a missing key is fine
        store.remove("k").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("state").join("local.json");

        let store = FileKeyValueStore::open(&path).unwrap();
        store.set(LOCK_AFTER_MS_KEY, "120000").unwrap();
        store.set(LAST_ACTIVE_AT_KEY, "1700000000000").unwrap();
        store.remove(LAST_ACTIVE_AT_KEY).unwrap();
        drop(store);

        let reopened = FileKeyValueStore::open(&path).unwrap();
        assert_eq!(reopened.get(LOCK_AFTER_MS_KEY).as_deref(), Some("120000"));
        assert!(reopened.get(LAST_ACTIVE_AT_KEY).is_none());
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("local.json");
        fs::write(&path, "{").unwrap();

        let result = FileKeyValueStore::open(&path);
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }
}
