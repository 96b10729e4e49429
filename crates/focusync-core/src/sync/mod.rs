//! Offline-first sync layer.
//!
//! Local mutations become [`SyncOperation`]s in a persisted FIFO queue. The
//! [`SyncCoordinator`] drains that queue against a [`RemoteGateway`] once the
//! device is online, retrying transient failures with backoff, and pulls
//! remote state back into the [`LocalStore`] by last-write-wins.

pub mod connectivity;
pub mod coordinator;
pub mod dead_letter;
pub mod gateway;
pub mod history;
pub mod local_store;
pub mod merge;
pub mod operation_queue;
pub mod record_codec;
pub mod retry;
pub mod timer;
pub mod types;

#[cfg(test)]
mod testing;

pub use connectivity::{
    ConnectionStatus, ConnectivityMonitor, ConnectivitySnapshot, ConnectivityTransition,
    InterfaceType, NetworkQuality, PathUpdate,
};
pub use coordinator::{SyncCoordinator, SyncOutcome, SyncSettings};
pub use dead_letter::DeadLetterLog;
pub use gateway::{HttpGateway, RemoteGateway};
pub use history::SyncHistory;
pub use local_store::{JsonFileLocalStore, LocalStore, MemoryLocalStore};
pub use merge::{decide_merge, merge_remote_records, MergeDecision, MergeSummary};
pub use operation_queue::OperationQueue;
pub use record_codec::EntityRecord;
pub use retry::RetryPolicy;
pub use timer::CancellableTimer;
pub use types::{
    EntityType, FailedOperation, FailureReason, OperationType, SyncOperation, SyncSnapshot,
    SyncState,
};
