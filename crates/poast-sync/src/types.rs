//! Shared row-level types used across the schema, storage, mutation and sync
//! layers.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// Row
// ============================================================================

/// A single table row: column name → JSON value.
pub type Row = Map<String, Value>;

/// Build a [`Row`] from a `json!({...})` object. Non-object values yield an
/// empty row.
pub fn row_from_value(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

// ============================================================================
// RowKey
// ============================================================================

/// Canonical encoding of a row's primary-key values, in declared key order.
///
/// Stored as the JSON text of the value array (`["m1"]`), which keeps
/// composite keys unambiguous and gives a stable total order for scans.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RowKey(String);

impl RowKey {
    /// Encode the given key values. Returns `None` if any value is missing or
    /// null.
    pub fn from_row(primary_key: &[String], row: &Row) -> Option<Self> {
        let mut values = Vec::with_capacity(primary_key.len());
        for column in primary_key {
            match row.get(column) {
                None | Some(Value::Null) => return None,
                Some(v) => values.push(v.clone()),
            }
        }
        Some(Self(Value::Array(values).to_string()))
    }

    /// Rebuild a key from its stored encoding.
    pub fn from_encoded(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// RowChange
// ============================================================================

/// A single authoritative change to a table, as delivered by a pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum RowChange {
    /// Insert or replace the full row.
    Put { table: String, row: Row },
    /// Remove the row identified by the primary-key columns in `key`.
    Delete { table: String, key: Row },
}

impl RowChange {
    pub fn table(&self) -> &str {
        match self {
            Self::Put { table, .. } | Self::Delete { table, .. } => table,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
