//! PendingLog: the ordered list of optimistic mutations not yet confirmed
//! by the authority, and the replay rules that overlay them on confirmed
//! rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::TableSchema;
use crate::types::{Row, RowKey};

use super::types::{Mutation, MutationId, MutationKind};

// ============================================================================
// Replay
// ============================================================================

/// Fill absent optional columns with null so full rows have every column.
pub fn normalize_full_row(table: &TableSchema, mut row: Row) -> Row {
    for (name, column) in &table.columns {
        if column.optional && !row.contains_key(name) {
            row.insert(name.clone(), Value::Null);
        }
    }
    row
}

/// Keep only the primary-key columns of `row`.
pub fn key_columns(table: &TableSchema, row: &Row) -> Row {
    table
        .primary_key
        .iter()
        .filter_map(|c| row.get(c).map(|v| (c.clone(), v.clone())))
        .collect()
}

/// Apply one mutation to a table's rows. Returns `true` if anything changed.
pub fn apply_mutation(table: &TableSchema, rows: &mut BTreeMap<RowKey, Row>, mutation: &Mutation) -> bool {
    let key = match RowKey::from_row(&table.primary_key, &mutation.row) {
        Some(key) => key,
        None => return false,
    };

    match mutation.kind {
        MutationKind::Insert => {
            if rows.contains_key(&key) {
                return false;
            }
            rows.insert(key, normalize_full_row(table, mutation.row.clone()));
            true
        }
        MutationKind::Upsert => {
            let row = normalize_full_row(table, mutation.row.clone());
            rows.insert(key, row.clone()) != Some(row)
        }
        MutationKind::Update => match rows.get_mut(&key) {
            Some(existing) => {
                let mut changed = false;
                for (column, value) in &mutation.row {
                    if existing.get(column) != Some(value) {
                        existing.insert(column.clone(), value.clone());
                        changed = true;
                    }
                }
                changed
            }
            None => false,
        },
        MutationKind::Delete => rows.remove(&key).is_some(),
    }
}

// ============================================================================
// PendingLog
// ============================================================================

/// Pending mutations in ascending id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingLog {
    entries: Vec<Mutation>,
}

impl PendingLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[Mutation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_id(&self) -> Option<MutationId> {
        self.entries.last().map(|m| m.id)
    }

    /// Append a mutation. Ids must increase.
    pub fn push(&mut self, mutation: Mutation) {
        debug_assert!(self.last_id().map_or(true, |last| mutation.id > last));
        self.entries.push(mutation);
    }

    /// Remove a single entry (a rejected mutation).
    pub fn remove(&mut self, id: MutationId) -> Option<Mutation> {
        let idx = self.entries.iter().position(|m| m.id == id)?;
        Some(self.entries.remove(idx))
    }

    /// Remove every entry with `id <= last` (confirmed by the authority).
    pub fn remove_through(&mut self, last: MutationId) -> Vec<Mutation> {
        let split = self.entries.partition_point(|m| m.id <= last);
        self.entries.drain(..split).collect()
    }

    /// Tables touched by at least one pending entry.
    pub fn tables(&self) -> BTreeSet<String> {
        self.entries.iter().map(|m| m.table.clone()).collect()
    }

    /// Replay every entry for `table` on top of `rows`, in order.
    pub fn replay(&self, table: &TableSchema, rows: &mut BTreeMap<RowKey, Row>) {
        for mutation in self.entries.iter().filter(|m| m.table == table.name) {
            apply_mutation(table, rows, mutation);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
