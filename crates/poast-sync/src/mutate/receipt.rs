//! Mutation receipts: an optional way to await the authority's verdict.

use std::collections::HashMap;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::SyncError;

use super::types::{MutationId, MutationOutcome};

/// Returned by every mutation call. Dropping it is fire-and-forget.
#[derive(Debug)]
pub struct MutationReceipt {
    id: MutationId,
    rx: oneshot::Receiver<MutationOutcome>,
}

impl MutationReceipt {
    pub fn id(&self) -> MutationId {
        self.id
    }

    /// Wait for the authority's outcome. Errors with [`SyncError::Stopped`]
    /// if the client is dropped before one arrives.
    pub async fn outcome(self) -> Result<MutationOutcome, SyncError> {
        self.rx.await.map_err(|_| SyncError::Stopped)
    }

    /// The outcome if it has already arrived.
    pub fn try_outcome(&mut self) -> Option<MutationOutcome> {
        self.rx.try_recv().ok()
    }
}

/// Outstanding receipt senders, keyed by mutation id.
#[derive(Default)]
pub struct ReceiptRegistry {
    senders: Mutex<HashMap<MutationId, oneshot::Sender<MutationOutcome>>>,
}

impl ReceiptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, id: MutationId) -> MutationReceipt {
        let (tx, rx) = oneshot::channel();
        self.senders.lock().insert(id, tx);
        MutationReceipt { id, rx }
    }

    /// Deliver an outcome. Returns `false` if nobody was registered.
    pub fn resolve(&self, id: MutationId, outcome: MutationOutcome) -> bool {
        let Some(tx) = self.senders.lock().remove(&id) else {
            return false;
        };
        // The receiver may have been dropped; that is the fire-and-forget case.
        let _ = tx.send(outcome);
        true
    }

    pub fn outstanding(&self) -> usize {
        self.senders.lock().len()
    }
}
