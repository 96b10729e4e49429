//! # Focusync Core Library
//!
//! Offline-first synchronization for a productivity app's entities (tasks,
//! goals, achievements, users, streaks). The CLI binary and any GUI shell are
//! thin layers over the same core.
//!
//! ## Architecture
//!
//! - **Operation queue**: persisted FIFO of pending mutations, deduplicated
//!   per entity
//! - **Sync coordinator**: debounced draining with retry backoff, plus full
//!   pull-and-merge reconciliation by `updated_at`
//! - **Connectivity**: reachability and quality tracking with restored/lost edges
//! - **Storage**: JSON list files and TOML-based configuration
//!
//! ## Key Components
//!
//! - [`SyncCoordinator`]: Drain and reconciliation orchestration
//! - [`OperationQueue`]: Pending operation persistence
//! - [`RemoteGateway`]: Trait for the remote store
//! - [`Config`]: Application configuration management

pub mod error;
pub mod storage;
pub mod sync;

pub use error::{ConfigError, CoreError, GatewayError, LocalStoreError, QueueError};
pub use storage::Config;
pub use sync::{
    ConnectivityMonitor, EntityRecord, EntityType, HttpGateway, LocalStore, OperationQueue,
    OperationType, RemoteGateway, RetryPolicy, SyncCoordinator, SyncOperation, SyncOutcome,
    SyncSettings, SyncState,
};
