//! Sync coordinator: debounced queue draining, retry bookkeeping and
//! last-write-wins pull reconciliation.
//!
//! All coordinator work runs on the caller's tokio runtime. Queue and state
//! mutations never overlap a remote call: locks are taken, used and released
//! between awaits, and at most one drain runs at a time.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{CoreError, GatewayError, QueueError};
use crate::storage::SyncConfig;
use crate::sync::connectivity::{ConnectivityMonitor, ConnectivityTransition};
use crate::sync::dead_letter::DeadLetterLog;
use crate::sync::gateway::RemoteGateway;
use crate::sync::history::SyncHistory;
use crate::sync::local_store::LocalStore;
use crate::sync::merge::merge_remote_records;
use crate::sync::operation_queue::OperationQueue;
use crate::sync::record_codec::{operation_record, record_to_operation, EntityRecord};
use crate::sync::retry::RetryPolicy;
use crate::sync::timer::CancellableTimer;
use crate::sync::types::{
    EntityType, FailedOperation, FailureReason, OperationType, SyncOperation, SyncSnapshot,
    SyncState,
};

/// Coordinator tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub debounce: Duration,
    pub success_reset: Duration,
    pub auto_retry: bool,
    pub drop_permanent_failures: bool,
    pub retry: RetryPolicy,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for SyncSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            debounce: config.debounce(),
            success_reset: config.success_reset(),
            auto_retry: config.auto_retry,
            drop_permanent_failures: config.drop_permanent_failures,
            retry: config.retry_policy(),
        }
    }
}

/// Result of a drain or full sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pass ran to the end. `synced` counts applied operations (plus
    /// merged records for a full sync), `failed` counts failed operations.
    Completed { synced: usize, failed: usize },
    /// No connection; nothing was sent, or the pass stopped early.
    Offline,
    /// Another pass was already running.
    AlreadyRunning,
}

/// Clears the running flag when a pass ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncCoordinator {
    gateway: Arc<dyn RemoteGateway>,
    local: Arc<dyn LocalStore>,
    connectivity: Arc<ConnectivityMonitor>,
    queue: Mutex<OperationQueue>,
    dead_letters: Mutex<DeadLetterLog>,
    state: watch::Sender<SyncState>,
    running: AtomicBool,
    history: StdMutex<SyncHistory>,
    settings: SyncSettings,
    debounce: CancellableTimer,
    idle_reset: CancellableTimer,
    retry_timer: CancellableTimer,
    weak_self: Weak<SyncCoordinator>,
}

impl SyncCoordinator {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        local: Arc<dyn LocalStore>,
        queue: OperationQueue,
        dead_letters: DeadLetterLog,
        history: SyncHistory,
        connectivity: Arc<ConnectivityMonitor>,
        settings: SyncSettings,
    ) -> Arc<Self> {
        let initial = if connectivity.is_online() {
            SyncState::Idle
        } else {
            SyncState::Offline
        };
        let (state, _) = watch::channel(initial);
        Arc::new_cyclic(|weak_self| Self {
            gateway,
            local,
            connectivity,
            queue: Mutex::new(queue),
            dead_letters: Mutex::new(dead_letters),
            state,
            running: AtomicBool::new(false),
            history: StdMutex::new(history),
            settings,
            debounce: CancellableTimer::new(),
            idle_reset: CancellableTimer::new(),
            retry_timer: CancellableTimer::new(),
            weak_self: weak_self.clone(),
        })
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn pending_operations(&self) -> Vec<SyncOperation> {
        self.queue.lock().await.snapshot()
    }

    pub fn last_successful_sync(&self) -> Option<DateTime<Utc>> {
        self.history.lock().map(|h| h.last()).unwrap_or(None)
    }

    pub async fn failed_operations_count(&self) -> usize {
        self.dead_letters.lock().await.len()
    }

    pub async fn failed_operations(&self) -> Vec<FailedOperation> {
        self.dead_letters.lock().await.entries().to_vec()
    }

    /// True when local changes are waiting or no sync has ever succeeded.
    pub async fn needs_sync(&self) -> bool {
        self.pending_count().await > 0 || self.last_successful_sync().is_none()
    }

    pub async fn snapshot(&self) -> SyncSnapshot {
        let pending_count = self.pending_count().await;
        let last_successful_sync = self.last_successful_sync();
        SyncSnapshot {
            state: self.state(),
            pending_count,
            last_successful_sync,
            failed_operations_count: self.failed_operations_count().await,
            needs_sync: pending_count > 0 || last_successful_sync.is_none(),
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Queue a mutation and (re)start the debounce window.
    pub async fn enqueue(&self, op: SyncOperation) -> Result<(), QueueError> {
        info!(
            op_type = %op.op_type,
            entity_type = %op.entity_type,
            entity_id = %op.entity_id,
            "queued sync operation"
        );
        self.queue.lock().await.enqueue(op)?;
        self.schedule_drain();
        Ok(())
    }

    /// Queue the change of a local record.
    pub async fn record_mutation(
        &self,
        op_type: OperationType,
        record: &EntityRecord,
    ) -> Result<(), QueueError> {
        self.enqueue(record_to_operation(op_type, record)).await
    }

    /// Cancel pending operations for an entity that no longer needs syncing.
    pub async fn cancel_entity(&self, entity_id: &str) -> Result<usize, QueueError> {
        self.queue.lock().await.remove_by_entity(entity_id)
    }

    /// Drop every pending operation and any scheduled drain.
    pub async fn clear_pending_queue(&self) -> Result<(), QueueError> {
        self.debounce.cancel();
        self.retry_timer.cancel();
        self.queue.lock().await.clear()?;
        info!("cleared pending sync queue");
        Ok(())
    }

    pub async fn clear_failed_operations(&self) -> Result<(), QueueError> {
        self.dead_letters.lock().await.clear()
    }

    /// Push every pending operation to the remote, in FIFO order.
    pub async fn process_pending_queue(&self) -> Result<SyncOutcome, QueueError> {
        let _guard = match self.begin_pass() {
            Ok(guard) => guard,
            Err(outcome) => return Ok(outcome),
        };

        match self.push_pending().await {
            Ok(SyncOutcome::Completed { synced, failed }) => {
                self.finish(synced, failed);
                Ok(SyncOutcome::Completed { synced, failed })
            }
            Ok(other) => {
                self.set_state(SyncState::Offline);
                Ok(other)
            }
            Err(e) => {
                error!(error = %e, "sync queue drain failed");
                self.set_state(SyncState::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Push local changes, then pull every entity type and merge it into the
    /// local store by `updated_at`.
    ///
    /// A failure aborts the pass; entity types merged before it stay merged.
    pub async fn perform_full_sync(&self) -> Result<SyncOutcome, CoreError> {
        let _guard = match self.begin_pass() {
            Ok(guard) => guard,
            Err(outcome) => return Ok(outcome),
        };

        let (pushed, push_failed) = match self.push_pending().await {
            Ok(SyncOutcome::Completed { synced, failed }) => (synced, failed),
            Ok(other) => {
                self.set_state(SyncState::Offline);
                return Ok(other);
            }
            Err(e) => {
                error!(error = %e, "sync queue drain failed");
                self.set_state(SyncState::Error {
                    message: e.to_string(),
                });
                return Err(e.into());
            }
        };

        match self.pull_all().await {
            Ok(Some(merged)) => {
                let synced = pushed + merged;
                self.finish(synced, push_failed);
                Ok(SyncOutcome::Completed {
                    synced,
                    failed: push_failed,
                })
            }
            Ok(None) => {
                self.set_state(SyncState::Offline);
                Ok(SyncOutcome::Offline)
            }
            Err(e) => {
                error!(error = %e, "full sync failed");
                self.set_state(SyncState::Error {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Follow connectivity edges: go offline on loss, drain on restore.
    pub fn spawn_connectivity_listener(&self) -> JoinHandle<()> {
        let mut transitions = self.connectivity.subscribe();
        let weak = self.weak_self.clone();
        tokio::spawn(async move {
            loop {
                let transition = match transitions.recv().await {
                    Ok(transition) => transition,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "missed connectivity transitions");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let Some(this) = weak.upgrade() else { break };
                this.handle_transition(transition).await;
            }
        })
    }

    async fn handle_transition(&self, transition: ConnectivityTransition) {
        match transition {
            ConnectivityTransition::Lost => {
                self.debounce.cancel();
                self.retry_timer.cancel();
                self.set_state(SyncState::Offline);
            }
            ConnectivityTransition::Restored => {
                self.state.send_if_modified(|state| {
                    if *state == SyncState::Offline {
                        *state = SyncState::Idle;
                        true
                    } else {
                        false
                    }
                });
                if let Err(e) = self.process_pending_queue().await {
                    warn!(error = %e, "drain after reconnect failed");
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Gate a drain or full sync on connectivity and the single-pass rule.
    fn begin_pass(&self) -> Result<RunGuard<'_>, SyncOutcome> {
        if !self.connectivity.is_online() {
            debug!("sync requested while offline");
            self.set_state(SyncState::Offline);
            return Err(SyncOutcome::Offline);
        }
        let Some(guard) = self.try_begin() else {
            debug!("sync already running");
            return Err(SyncOutcome::AlreadyRunning);
        };
        self.retry_timer.cancel();
        Ok(guard)
    }

    fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()?;
        self.set_state(SyncState::Syncing { progress: 0.0 });
        Some(RunGuard(&self.running))
    }

    fn set_state(&self, next: SyncState) {
        if !matches!(next, SyncState::Success { .. }) {
            self.idle_reset.cancel();
        }
        let previous = self.state.send_replace(next.clone());
        if std::mem::discriminant(&previous) != std::mem::discriminant(&next) {
            debug!(from = %previous, to = %next, "sync state changed");
        }
    }

    fn report_progress(&self, done: usize, total: usize) {
        let progress = if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        };
        self.state.send_replace(SyncState::Syncing { progress });
    }

    fn schedule_drain(&self) {
        let weak = self.weak_self.clone();
        self.debounce.arm(self.settings.debounce, async move {
            let Some(this) = weak.upgrade() else { return };
            match this.process_pending_queue().await {
                // The running pass only sees its own snapshot; try again
                // once it has had time to finish.
                Ok(SyncOutcome::AlreadyRunning) => this.schedule_drain(),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "debounced drain failed"),
            }
        });
    }

    fn schedule_retry(&self, delay: Duration) {
        debug!(?delay, "scheduling retry drain");
        let weak = self.weak_self.clone();
        self.retry_timer.arm(delay, async move {
            if let Some(this) = weak.upgrade() {
                if let Err(e) = this.process_pending_queue().await {
                    warn!(error = %e, "retry drain failed");
                }
            }
        });
    }

    /// Settle the final state of a completed pass.
    fn finish(&self, synced: usize, failed: usize) {
        if failed == 0 {
            if let Ok(mut history) = self.history.lock() {
                if let Err(e) = history.record(Utc::now()) {
                    warn!(error = %e, "failed to persist sync history");
                }
            }
            info!(synced, "sync completed");
            self.set_state(SyncState::Success {
                synced_count: synced,
            });
            let weak = self.weak_self.clone();
            self.idle_reset.arm(self.settings.success_reset, async move {
                if let Some(this) = weak.upgrade() {
                    this.state.send_if_modified(|state| {
                        if matches!(state, SyncState::Success { .. }) {
                            *state = SyncState::Idle;
                            true
                        } else {
                            false
                        }
                    });
                }
            });
        } else {
            warn!(synced, failed, "sync completed with failures");
            self.set_state(SyncState::Error {
                message: format!("{failed} operations failed"),
            });
        }
    }

    /// One FIFO pass over a snapshot of the queue.
    async fn push_pending(&self) -> Result<SyncOutcome, QueueError> {
        let ops = self.queue.lock().await.snapshot();
        let total = ops.len();
        debug!(total, "draining sync queue");

        let mut synced = 0;
        let mut failed = 0;
        let mut retry_after: Option<u32> = None;

        for (index, op) in ops.into_iter().enumerate() {
            if !self.connectivity.is_online() {
                warn!(remaining = total - index, "connection lost mid-drain");
                return Ok(SyncOutcome::Offline);
            }

            match self.apply(&op).await {
                Ok(()) => {
                    self.queue.lock().await.remove(&op.id)?;
                    synced += 1;
                }
                Err(err) => {
                    failed += 1;
                    if let Some(attempts) = self.handle_failure(op, err).await? {
                        retry_after = Some(retry_after.map_or(attempts, |a| a.min(attempts)));
                    }
                }
            }
            self.report_progress(index + 1, total);
        }

        if let (true, Some(attempts)) = (self.settings.auto_retry, retry_after) {
            self.schedule_retry(self.settings.retry.retry_delay(attempts.saturating_sub(1)));
        }
        Ok(SyncOutcome::Completed { synced, failed })
    }

    async fn apply(&self, op: &SyncOperation) -> Result<(), GatewayError> {
        match op.op_type {
            OperationType::Create | OperationType::Update => {
                let record = operation_record(op)?;
                self.gateway.create_or_update(op.entity_type, &record).await
            }
            OperationType::Delete => self.gateway.delete(op.entity_type, &op.entity_id).await,
        }
    }

    /// Retry bookkeeping for a failed operation. Returns the attempt count if
    /// the operation stays queued for another try.
    async fn handle_failure(
        &self,
        mut op: SyncOperation,
        err: GatewayError,
    ) -> Result<Option<u32>, QueueError> {
        let permanent = !err.is_transient() && self.settings.drop_permanent_failures;
        self.settings.retry.record_failure(&mut op, err.to_string());

        if !permanent && !self.settings.retry.is_exhausted(&op) {
            debug!(
                entity_id = %op.entity_id,
                attempts = op.attempts,
                error = %err,
                "sync operation failed, will retry"
            );
            let still_queued = self.queue.lock().await.update(op.clone())?;
            return Ok(still_queued.then_some(op.attempts));
        }

        let reason = if permanent {
            FailureReason::Permanent
        } else {
            FailureReason::RetriesExhausted
        };
        // A newer mutation for the entity may have replaced this one mid-drain.
        if self.queue.lock().await.remove(&op.id)?.is_some() {
            warn!(
                op_type = %op.op_type,
                entity_type = %op.entity_type,
                entity_id = %op.entity_id,
                attempts = op.attempts,
                ?reason,
                error = %err,
                "dropping sync operation"
            );
            self.dead_letters.lock().await.record(op, reason)?;
        }
        Ok(None)
    }

    /// Pull and merge every entity type. `None` means the connection dropped.
    async fn pull_all(&self) -> Result<Option<usize>, CoreError> {
        let total = EntityType::ALL.len();
        let mut merged = 0;
        for (index, entity_type) in EntityType::ALL.into_iter().enumerate() {
            if !self.connectivity.is_online() {
                warn!(%entity_type, "connection lost during pull");
                return Ok(None);
            }
            let remote = self.gateway.fetch_all(entity_type).await?;
            let summary = merge_remote_records(self.local.as_ref(), remote)?;
            self.local.save()?;
            debug!(%entity_type, applied = summary.applied(), "pulled remote records");
            merged += summary.applied();
            self.report_progress(index + 1, total);
        }
        Ok(Some(merged))
    }
}
