//! Persisted list of operations dropped from the queue.

use chrono::Utc;

use crate::error::QueueError;
use crate::storage::list_store::{JsonFileStore, ListStore, FAILED_FILE};
use crate::sync::types::{FailedOperation, FailureReason, SyncOperation};

pub struct DeadLetterLog {
    entries: Vec<FailedOperation>,
    store: Box<dyn ListStore<FailedOperation>>,
}

impl DeadLetterLog {
    pub fn open_default() -> Result<Self, QueueError> {
        Self::open(JsonFileStore::in_data_dir(FAILED_FILE))
    }

    pub fn open(store: impl ListStore<FailedOperation> + 'static) -> Result<Self, QueueError> {
        Ok(Self {
            entries: store.load()?,
            store: Box::new(store),
        })
    }

    pub fn record(
        &mut self,
        operation: SyncOperation,
        reason: FailureReason,
    ) -> Result<(), QueueError> {
        self.entries.push(FailedOperation {
            operation,
            reason,
            failed_at: Utc::now(),
        });
        self.store.save(&self.entries)
    }

    pub fn entries(&self) -> &[FailedOperation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) -> Result<(), QueueError> {
        self.entries.clear();
        self.store.save(&self.entries)
    }
}
