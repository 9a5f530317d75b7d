//! ChangeEvent: what moved in the replica.
//!
//! Emitted by [`ReactiveReplica`](super::ReactiveReplica) after each local
//! write, rollback and reconciled pull.

use crate::mutate::{MutationId, MutationKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// An optimistic mutation was applied locally.
    Local {
        table: String,
        kind: MutationKind,
        mutation_id: MutationId,
    },
    /// The authority rejected a mutation and its effect was removed.
    Rollback {
        table: String,
        mutation_id: MutationId,
        reason: String,
    },
    /// Authoritative rows arrived for a table.
    Remote { table: String, changes: usize },
    /// Pending mutations were confirmed and dropped from the log.
    Confirmed { mutation_ids: Vec<MutationId> },
    /// The first pull was reconciled; "empty" results are now trustworthy.
    Complete,
}

impl ChangeEvent {
    /// The table affected, if the event is scoped to one.
    pub fn table(&self) -> Option<&str> {
        match self {
            Self::Local { table, .. } | Self::Rollback { table, .. } | Self::Remote { table, .. } => {
                Some(table)
            }
            Self::Confirmed { .. } | Self::Complete => None,
        }
    }
}
