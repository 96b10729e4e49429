//! Re-armable scheduled task handle.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// A single pending delayed task. Arming again supersedes the previous run,
/// so at most one scheduled run is ever outstanding (trailing-edge debounce).
///
/// A superseded run that is still sleeping never fires. A run that already
/// started is left to finish, so a drain is never torn down halfway through a
/// remote call.
///
/// Must be used from inside a tokio runtime.
#[derive(Debug, Default)]
pub struct CancellableTimer {
    generation: Arc<AtomicU64>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl CancellableTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` after `delay`, superseding anything already scheduled.
    pub fn arm<F>(&self, delay: Duration, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let armed_at = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation = Arc::clone(&self.generation);
        let next = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if generation.load(Ordering::SeqCst) == armed_at {
                task.await;
            }
        });
        if let Ok(mut slot) = self.handle.lock() {
            *slot = Some(next);
        }
    }

    /// Cancel the scheduled run, if it has not started yet.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut slot) = self.handle.lock() {
            slot.take();
        }
    }

    /// Whether a scheduled run is still pending or running.
    pub fn is_armed(&self) -> bool {
        self.handle
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|h| !h.is_finished()))
            .unwrap_or(false)
    }
}

impl Drop for CancellableTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
