//! Local entity store boundary.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::LocalStoreError;
use crate::sync::record_codec::EntityRecord;
use crate::sync::types::EntityType;

/// Typed local records keyed by (entity type, id).
///
/// Writes become durable on [`LocalStore::save`], which is assumed atomic.
pub trait LocalStore: Send + Sync {
    fn get(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<EntityRecord>, LocalStoreError>;

    fn upsert(&self, record: EntityRecord) -> Result<(), LocalStoreError>;

    fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, LocalStoreError>;

    fn save(&self) -> Result<(), LocalStoreError>;
}

type RecordMap = BTreeMap<(EntityType, String), EntityRecord>;

/// Volatile store; `save` is a no-op.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    records: Mutex<RecordMap>,
}

impl MemoryLocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = EntityRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| ((r.entity_type, r.id.clone()), r))
            .collect();
        Self {
            records: Mutex::new(map),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LocalStore for MemoryLocalStore {
    fn get(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<EntityRecord>, LocalStoreError> {
        let records = self.records.lock().map_err(|_| LocalStoreError::Poisoned)?;
        Ok(records.get(&(entity_type, id.to_string())).cloned())
    }

    fn upsert(&self, record: EntityRecord) -> Result<(), LocalStoreError> {
        let mut records = self.records.lock().map_err(|_| LocalStoreError::Poisoned)?;
        records.insert((record.entity_type, record.id.clone()), record);
        Ok(())
    }

    fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, LocalStoreError> {
        let records = self.records.lock().map_err(|_| LocalStoreError::Poisoned)?;
        Ok(records
            .values()
            .filter(|r| r.entity_type == entity_type)
            .cloned()
            .collect())
    }

    fn save(&self) -> Result<(), LocalStoreError> {
        Ok(())
    }
}

/// All records in one JSON file, rewritten on `save`.
pub struct JsonFileLocalStore {
    path: PathBuf,
    inner: MemoryLocalStore,
}

impl JsonFileLocalStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LocalStoreError> {
        let path = path.into();
        let records: Vec<EntityRecord> = match std::fs::read_to_string(&path) {
            Ok(content) if !content.trim().is_empty() => serde_json::from_str(&content)?,
            Ok(_) => Vec::new(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(LocalStoreError::Persist { path, source }),
        };
        Ok(Self {
            path,
            inner: MemoryLocalStore::with_records(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LocalStore for JsonFileLocalStore {
    fn get(
        &self,
        entity_type: EntityType,
        id: &str,
    ) -> Result<Option<EntityRecord>, LocalStoreError> {
        self.inner.get(entity_type, id)
    }

    fn upsert(&self, record: EntityRecord) -> Result<(), LocalStoreError> {
        self.inner.upsert(record)
    }

    fn list(&self, entity_type: EntityType) -> Result<Vec<EntityRecord>, LocalStoreError> {
        self.inner.list(entity_type)
    }

    fn save(&self) -> Result<(), LocalStoreError> {
        let records: Vec<EntityRecord> = {
            let map = self.inner.records.lock().map_err(|_| LocalStoreError::Poisoned)?;
            map.values().cloned().collect()
        };
        let persist_err = |source| LocalStoreError::Persist {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(persist_err)?;
        }
        let data = serde_json::to_string_pretty(&records)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, data).map_err(persist_err)?;
        std::fs::rename(&tmp, &self.path).map_err(persist_err)?;
        Ok(())
    }
}
