//! Durable storage for serialized operation lists.
//!
//! The queue and the dead-letter log are each a single JSON array under a
//! well-known file name. Every mutation rewrites the whole list.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use super::data_dir;
use crate::error::QueueError;

/// File holding the pending operation queue.
pub const QUEUE_FILE: &str = "pending_sync_queue.json";
/// File holding permanently failed operations.
pub const FAILED_FILE: &str = "failed_sync_operations.json";
/// File holding timestamps of successful syncs.
pub const HISTORY_FILE: &str = "sync_history.json";

/// Full read-then-overwrite storage for a list of records.
pub trait ListStore<T>: Send + Sync {
    /// Read the stored list. A missing list reads as empty.
    fn load(&self) -> Result<Vec<T>, QueueError>;

    /// Replace the stored list.
    fn save(&self, items: &[T]) -> Result<(), QueueError>;
}

/// JSON file backed list.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store for `file_name` inside the default data directory.
    pub fn in_data_dir(file_name: &str) -> Self {
        let dir = data_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self::new(dir.join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> ListStore<T> for JsonFileStore
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<T>, QueueError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|source| QueueError::Read {
            path: self.path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn save(&self, items: &[T]) -> Result<(), QueueError> {
        let write_err = |source| QueueError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let data = serde_json::to_string_pretty(items)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(write_err)?;
        std::fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }
}

/// In-memory list. Clones share the same backing storage, so a clone can
/// stand in for "the same file" across a simulated restart.
#[derive(Debug)]
pub struct MemoryStore<T> {
    items: Arc<Mutex<Vec<T>>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self {
            items: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            items: Arc::clone(&self.items),
        }
    }
}

impl<T> ListStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Vec<T>, QueueError> {
        Ok(self.items.lock().map(|items| items.clone()).unwrap_or_default())
    }

    fn save(&self, items: &[T]) -> Result<(), QueueError> {
        if let Ok(mut stored) = self.items.lock() {
            *stored = items.to_vec();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_loads_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nothing.json"));
        let items: Vec<String> = store.load().unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn save_creates_parent_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonFileStore::new(temp_dir.path().join("nested/list.json"));

        store.save(&["a".to_string(), "b".to_string()]).unwrap();
        store.save(&["c".to_string()]).unwrap();

        let items: Vec<String> = store.load().unwrap();
        assert_eq!(items, vec!["c".to_string()]);
        assert!(!temp_dir.path().join("nested/list.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("list.json");
        std::fs::write(&path, "{not a list").unwrap();

        let store = JsonFileStore::new(path);
        let result: Result<Vec<String>, _> = store.load();
        assert!(matches!(result, Err(QueueError::Corrupt(_))));
    }

    #[test]
    fn memory_store_clones_share_contents() {
        let store = MemoryStore::new();
        let other = store.clone();
        store.save(&[1u32, 2, 3]).unwrap();
        assert_eq!(other.load().unwrap(), vec![1, 2, 3]);
    }
}
