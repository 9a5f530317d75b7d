//! SyncHandle: a background task that runs sync cycles.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::manager::SyncManager;

/// Runs [`SyncManager::sync`] whenever `wakeup` is notified (after every
/// mutation) and on a fixed interval. The task is aborted on drop.
pub struct SyncHandle {
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Spawn on the current tokio runtime.
    pub fn spawn(manager: Arc<SyncManager>, wakeup: Arc<Notify>, interval: Duration) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = wakeup.notified() => {}
                    _ = ticker.tick() => {}
                }
                let result = manager.sync().await;
                if !result.is_ok() {
                    tracing::debug!(errors = result.errors.len(), "background sync finished with errors");
                }
            }
        });
        Self { task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stop the task now rather than at drop.
    pub fn stop(self) {
        self.task.abort();
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
