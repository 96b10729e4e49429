//! Bounded retry bookkeeping with a fixed backoff schedule.

use chrono::Utc;
use std::time::Duration;

use crate::sync::types::SyncOperation;

/// Default backoff schedule in seconds.
pub const DEFAULT_BACKOFF_SECS: [u64; 5] = [1, 2, 5, 10, 30];
/// Default number of failed attempts before an operation is dropped.
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    schedule: Vec<Duration>,
    max_attempts: u32,
}

impl RetryPolicy {
    /// Build a policy from a schedule in seconds. An empty schedule falls back
    /// to the default one; the schedule is sorted so delays never shrink.
    pub fn new(schedule_secs: &[u64], max_attempts: u32) -> Self {
        let mut secs: Vec<u64> = if schedule_secs.is_empty() {
            DEFAULT_BACKOFF_SECS.to_vec()
        } else {
            schedule_secs.to_vec()
        };
        secs.sort_unstable();
        Self {
            schedule: secs.into_iter().map(Duration::from_secs).collect(),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Delay before retrying after `attempts` failures, clamped to the last
    /// schedule entry.
    pub fn retry_delay(&self, attempts: u32) -> Duration {
        let idx = (attempts as usize).min(self.schedule.len() - 1);
        self.schedule[idx]
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Record one failed remote application.
    pub fn record_failure(&self, op: &mut SyncOperation, message: impl Into<String>) {
        op.attempts = op.attempts.saturating_add(1);
        op.last_attempt = Some(Utc::now());
        op.last_error = Some(message.into());
    }

    /// Whether `op` has used up its retry budget.
    pub fn is_exhausted(&self, op: &SyncOperation) -> bool {
        op.attempts >= self.max_attempts
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(&DEFAULT_BACKOFF_SECS, DEFAULT_MAX_RETRY_ATTEMPTS)
    }
}
