//! Mutation records and their authoritative outcomes.

use serde::{Deserialize, Serialize};

use crate::auth::WriteOp;
use crate::schema::RowShape;
use crate::types::Row;

/// Client-assigned, monotonically increasing mutation identifier.
pub type MutationId = u64;

/// CRUD operation carried by a [`Mutation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MutationKind {
    /// Create the row; a no-op locally (and a rejection upstream) if the key exists.
    Insert,
    /// Create or fully replace the row.
    Upsert,
    /// Merge the supplied columns into an existing row.
    Update,
    /// Remove the row identified by its primary key.
    Delete,
}

impl MutationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MutationKind::Insert => "insert",
            MutationKind::Upsert => "upsert",
            MutationKind::Update => "update",
            MutationKind::Delete => "delete",
        }
    }

    /// Columns the row payload must carry.
    pub fn shape(self) -> RowShape {
        match self {
            MutationKind::Insert | MutationKind::Upsert => RowShape::Full,
            MutationKind::Update => RowShape::Partial,
            MutationKind::Delete => RowShape::Key,
        }
    }

    /// The authorization operation, given whether the row already exists.
    pub fn write_op(self, exists: bool) -> WriteOp {
        match self {
            MutationKind::Insert => WriteOp::Insert,
            MutationKind::Upsert if exists => WriteOp::Update,
            MutationKind::Upsert => WriteOp::Insert,
            MutationKind::Update => WriteOp::Update,
            MutationKind::Delete => WriteOp::Delete,
        }
    }
}

/// One logged write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mutation {
    pub id: MutationId,
    pub table: String,
    pub kind: MutationKind,
    /// Full row (insert/upsert), key plus changed columns (update), or key
    /// columns only (delete).
    pub row: Row,
}

/// Authoritative result of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MutationOutcome {
    Applied,
    Rejected { reason: String },
}

impl MutationOutcome {
    pub fn rejected(reason: impl Into<String>) -> Self {
        MutationOutcome::Rejected {
            reason: reason.into(),
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }
}
