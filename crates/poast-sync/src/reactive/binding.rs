//! Scoped subscription handles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::snapshot::Snapshot;

/// An owned one-shot closure that removes a subscription when called.
pub type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// Releases its subscription when dropped or on [`Subscription::unsubscribe`].
#[must_use = "dropping a Subscription immediately unsubscribes"]
pub struct Subscription {
    release: Option<Unsubscribe>,
}

impl Subscription {
    pub(crate) fn new(release: Unsubscribe) -> Self {
        Self {
            release: Some(release),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Hook-style binding: always holds the latest delivered snapshot.
pub struct Binding {
    current: Arc<Mutex<Snapshot>>,
    version: Arc<AtomicU64>,
    _subscription: Subscription,
}

impl Binding {
    pub(crate) fn new(current: Arc<Mutex<Snapshot>>, version: Arc<AtomicU64>, subscription: Subscription) -> Self {
        Self {
            current,
            version,
            _subscription: subscription,
        }
    }

    /// The current known snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.current.lock().clone()
    }

    /// How many snapshots have been delivered, starting at 1 for the initial
    /// one.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }
}
