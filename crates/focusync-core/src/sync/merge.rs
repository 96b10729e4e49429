//! Last-write-wins reconciliation of remote records into the local store.

use tracing::{debug, trace};

use crate::error::LocalStoreError;
use crate::sync::local_store::LocalStore;
use crate::sync::record_codec::EntityRecord;

/// Merge outcome for one remote record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    /// No local copy exists.
    Insert,
    /// Remote is strictly newer.
    Overwrite,
    /// Local is newer or equally new.
    KeepLocal,
}

/// Decide how a remote record lands locally. Ties keep the local copy.
pub fn decide_merge(local: Option<&EntityRecord>, remote: &EntityRecord) -> MergeDecision {
    match local {
        None => MergeDecision::Insert,
        Some(local) if remote.updated_at > local.updated_at => MergeDecision::Overwrite,
        Some(_) => MergeDecision::KeepLocal,
    }
}

/// Counts from merging one batch of remote records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub overwritten: usize,
    pub kept_local: usize,
}

impl MergeSummary {
    /// Records whose local copy changed.
    pub fn applied(&self) -> usize {
        self.inserted + self.overwritten
    }
}

/// Apply remote records to `store`. Local-only records are left alone.
/// The caller commits with [`LocalStore::save`].
pub fn merge_remote_records<S: LocalStore + ?Sized>(
    store: &S,
    remote: Vec<EntityRecord>,
) -> Result<MergeSummary, LocalStoreError> {
    let mut summary = MergeSummary::default();
    for record in remote {
        let local = store.get(record.entity_type, &record.id)?;
        match decide_merge(local.as_ref(), &record) {
            MergeDecision::Insert => {
                trace!(
                    entity_type = %record.entity_type,
                    id = %record.id,
                    "inserting remote record"
                );
                store.upsert(record)?;
                summary.inserted += 1;
            }
            MergeDecision::Overwrite => {
                trace!(
                    entity_type = %record.entity_type,
                    id = %record.id,
                    "remote record is newer"
                );
                store.upsert(record)?;
                summary.overwritten += 1;
            }
            MergeDecision::KeepLocal => {
                summary.kept_local += 1;
            }
        }
    }
    debug!(?summary, "merged remote records");
    Ok(summary)
}
