//! Task registry for in-flight module fetches.
//!
//! Fetches are fire-and-forget for callers; the registry keeps their handles
//! so tests and shutdown paths can wait for them to settle. After
//! [`TaskRegistry::shutdown`] every tracked fetch is aborted and new spawns
//! are refused.

use futures::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Why a fetch could not be spawned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No Tokio runtime is available to spawn on
    NoRuntime,
    /// The registry was shut down
    ShutDown,
}

#[derive(Debug)]
pub struct TaskRegistry {
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Spawn onto the current runtime and track the handle
    pub fn spawn<F>(&self, fut: F) -> Result<(), SpawnError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(SpawnError::ShutDown);
        }
        let runtime = Handle::try_current().map_err(|_| SpawnError::NoRuntime)?;
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let handle = runtime.spawn(async move {
            tokio::select! {
                _ = shutdown_rx.wait_for(|stopped| *stopped) => {}
                _ = fut => {}
            }
        });
        let mut handles = self.handles.lock();
        handles.retain(|handle| !handle.is_finished());
        handles.push(handle);
        Ok(())
    }

    /// Abort every tracked task and refuse new ones
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send_replace(true);
        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        if !handles.is_empty() {
            tracing::debug!(aborted = handles.len(), "aborting in-flight fetches");
        }
        for handle in handles {
            handle.abort();
        }
    }

    /// Whether [`TaskRegistry::shutdown`] has been called
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Number of tracked tasks that have not finished
    pub fn in_flight(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Wait for every tracked task, including ones spawned while waiting
    pub async fn settle(&self) {
        loop {
            let batch: Vec<_> = self.handles.lock().drain(..).collect();
            if batch.is_empty() {
                break;
            }
            for result in join_all(batch).await {
                if let Err(err) = result {
                    if err.is_panic() {
                        tracing::warn!(error = %err, "fetch task panicked");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_settle_waits_for_spawned_tasks() {
        let registry = TaskRegistry::new();
        let done = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let done = Arc::clone(&done);
            registry
                .spawn(async move {
                    tokio::task::yield_now().await;
                    done.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        registry.settle().await;
        assert_eq!(done.load(Ordering::SeqCst), 3);
        assert_eq!(registry.in_flight(), 0);
    }

    #[test]
    fn test_spawn_without_runtime_fails() {
        let registry = TaskRegistry::new();
        assert_eq!(registry.spawn(async {}), Err(SpawnError::NoRuntime));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_tasks_and_refuses_new_ones() {
        let registry = TaskRegistry::new();
        let (gate_tx, gate_rx) = tokio::sync::oneshot::channel::<()>();
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ran);

        registry
            .spawn(async move {
                let _ = gate_rx.await;
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        tokio::task::yield_now().await;
        assert_eq!(registry.in_flight(), 1);

        registry.shutdown();
        assert!(registry.is_shut_down());
        let _ = gate_tx.send(());
        for _ in 0..4 {
            tokio::task::yield_now().await;
        }

        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(registry.in_flight(), 0);
        assert_eq!(registry.spawn(async {}), Err(SpawnError::ShutDown));
        registry.settle().await;
    }
}
