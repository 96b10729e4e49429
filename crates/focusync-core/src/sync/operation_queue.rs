//! Durable FIFO queue of pending mutations, deduplicated per entity.

use tracing::{debug, warn};

use crate::error::QueueError;
use crate::storage::list_store::{JsonFileStore, ListStore, QUEUE_FILE};
use crate::sync::types::{EntityType, SyncOperation};

/// Pending operation queue.
///
/// Holds at most one operation per (entity type, entity id). The full list is
/// written to the backing store after every mutation so it survives restarts.
pub struct OperationQueue {
    pending: Vec<SyncOperation>,
    store: Box<dyn ListStore<SyncOperation>>,
}

impl OperationQueue {
    /// Open the queue persisted in the default data directory.
    pub fn open_default() -> Result<Self, QueueError> {
        Self::open(JsonFileStore::in_data_dir(QUEUE_FILE))
    }

    /// Open a queue over `store`, loading whatever it already holds.
    pub fn open(store: impl ListStore<SyncOperation> + 'static) -> Result<Self, QueueError> {
        let pending = store.load()?;
        debug!(count = pending.len(), "loaded pending sync queue");
        Ok(Self {
            pending,
            store: Box::new(store),
        })
    }

    /// Enqueue an operation, replacing any pending one for the same entity.
    pub fn enqueue(&mut self, op: SyncOperation) -> Result<(), QueueError> {
        let before = self.pending.len();
        self.pending.retain(|pending| !pending.same_entity(&op));
        if self.pending.len() != before {
            debug!(
                entity_type = %op.entity_type,
                entity_id = %op.entity_id,
                "replaced pending operation"
            );
        }
        self.pending.push(op);
        self.persist()
    }

    /// Oldest pending operation.
    pub fn dequeue_next(&self) -> Option<&SyncOperation> {
        self.pending.first()
    }

    /// Remove an operation by its id. Returns the removed operation.
    pub fn remove(&mut self, op_id: &str) -> Result<Option<SyncOperation>, QueueError> {
        let Some(pos) = self.pending.iter().position(|op| op.id == op_id) else {
            return Ok(None);
        };
        let removed = self.pending.remove(pos);
        self.persist()?;
        Ok(Some(removed))
    }

    /// Cancel any pending operation for `entity_id`, across entity types.
    /// Returns how many were removed.
    pub fn remove_by_entity(&mut self, entity_id: &str) -> Result<usize, QueueError> {
        let before = self.pending.len();
        self.pending.retain(|op| op.entity_id != entity_id);
        let removed = before - self.pending.len();
        if removed > 0 {
            self.persist()?;
        }
        Ok(removed)
    }

    /// Replace a pending operation in place, keeping its queue position.
    /// Returns false if the operation is no longer queued.
    pub fn update(&mut self, op: SyncOperation) -> Result<bool, QueueError> {
        match self.pending.iter_mut().find(|pending| pending.id == op.id) {
            Some(slot) => {
                *slot = op;
                self.persist()?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Drop every pending operation.
    pub fn clear(&mut self) -> Result<(), QueueError> {
        self.pending.clear();
        self.persist()
    }

    /// Copy of the queue in FIFO order.
    pub fn snapshot(&self) -> Vec<SyncOperation> {
        self.pending.clone()
    }

    pub fn get(&self, op_id: &str) -> Option<&SyncOperation> {
        self.pending.iter().find(|op| op.id == op_id)
    }

    pub fn contains_entity(&self, entity_type: EntityType, entity_id: &str) -> bool {
        self.pending
            .iter()
            .any(|op| op.entity_type == entity_type && op.entity_id == entity_id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn persist(&self) -> Result<(), QueueError> {
        self.store.save(&self.pending).map_err(|e| {
            warn!(error = %e, "failed to persist sync queue");
            e
        })
    }
}
