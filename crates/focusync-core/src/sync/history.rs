//! Persisted timestamps of completed syncs.

use chrono::{DateTime, Utc};

use crate::error::QueueError;
use crate::storage::list_store::{JsonFileStore, ListStore, HISTORY_FILE};

/// Most recent successful syncs kept on disk.
pub const HISTORY_LIMIT: usize = 20;

/// Successful sync timestamps, oldest first.
pub struct SyncHistory {
    entries: Vec<DateTime<Utc>>,
    store: Box<dyn ListStore<DateTime<Utc>>>,
}

impl SyncHistory {
    pub fn open_default() -> Result<Self, QueueError> {
        Self::open(JsonFileStore::in_data_dir(HISTORY_FILE))
    }

    pub fn open(store: impl ListStore<DateTime<Utc>> + 'static) -> Result<Self, QueueError> {
        let mut entries = store.load()?;
        entries.sort();
        Ok(Self {
            entries,
            store: Box::new(store),
        })
    }

    /// Record a successful sync, dropping the oldest entries past the limit.
    pub fn record(&mut self, at: DateTime<Utc>) -> Result<(), QueueError> {
        self.entries.push(at);
        if self.entries.len() > HISTORY_LIMIT {
            let excess = self.entries.len() - HISTORY_LIMIT;
            self.entries.drain(..excess);
        }
        self.store.save(&self.entries)
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.entries.last().copied()
    }

    pub fn entries(&self) -> &[DateTime<Utc>] {
        &self.entries
    }
}
