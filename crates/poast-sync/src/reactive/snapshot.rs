//! Snapshot: the value delivered to query subscribers.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Whether a result can be trusted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    /// Nothing matched and no pull has been reconciled; the rows may simply
    /// not have arrived.
    Unknown,
    /// Nothing matched, and the replica is complete.
    Empty,
    /// At least one row matched.
    Populated,
}

/// Materialized result of a query at one point in time.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub rows: Vec<Value>,
    /// Whether the replica had reconciled a pull when this was taken.
    pub complete: bool,
}

impl Snapshot {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SnapshotState {
        if !self.rows.is_empty() {
            SnapshotState::Populated
        } else if self.complete {
            SnapshotState::Empty
        } else {
            SnapshotState::Unknown
        }
    }

    /// First row, for singular queries.
    pub fn one(&self) -> Option<&Value> {
        self.rows.first()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Deserialize every row into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Vec<T>, serde_json::Error> {
        self.rows.iter().cloned().map(serde_json::from_value).collect()
    }
}
