//! TableMutator: the `mutate.<table>` entry point.
//!
//! Each call validates locally, applies optimistically, and returns at once.
//! The authority's verdict arrives later through the sync cycle.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Notify;

use crate::error::{MutationError, Result, ValidationError, ValidationErrors};
use crate::reactive::ReactiveReplica;
use crate::schema::{validate_row, value_type_name, TableSchema};

use super::log::{key_columns, normalize_full_row};
use super::receipt::{MutationReceipt, ReceiptRegistry};
use super::types::MutationKind;

pub struct TableMutator {
    table: Arc<TableSchema>,
    replica: Arc<ReactiveReplica>,
    receipts: Arc<ReceiptRegistry>,
    sync_wakeup: Option<Arc<Notify>>,
}

impl TableMutator {
    pub(crate) fn new(
        table: Arc<TableSchema>,
        replica: Arc<ReactiveReplica>,
        receipts: Arc<ReceiptRegistry>,
        sync_wakeup: Option<Arc<Notify>>,
    ) -> Self {
        Self {
            table,
            replica,
            receipts,
            sync_wakeup,
        }
    }

    pub fn table(&self) -> &TableSchema {
        &self.table
    }

    /// Create a row. Every non-optional column is required.
    pub fn insert(&self, row: impl Into<Value>) -> Result<MutationReceipt> {
        self.submit(MutationKind::Insert, row.into())
    }

    /// Alias of [`insert`](Self::insert).
    pub fn create(&self, row: impl Into<Value>) -> Result<MutationReceipt> {
        self.insert(row)
    }

    /// Create or fully replace a row.
    pub fn upsert(&self, row: impl Into<Value>) -> Result<MutationReceipt> {
        self.submit(MutationKind::Upsert, row.into())
    }

    /// Merge the supplied columns into the row named by the primary key.
    pub fn update(&self, partial: impl Into<Value>) -> Result<MutationReceipt> {
        self.submit(MutationKind::Update, partial.into())
    }

    /// Delete the row named by the primary key. Other columns are ignored.
    pub fn delete(&self, key: impl Into<Value>) -> Result<MutationReceipt> {
        self.submit(MutationKind::Delete, key.into())
    }

    fn submit(&self, kind: MutationKind, value: Value) -> Result<MutationReceipt> {
        let invalid = |source: ValidationErrors| MutationError::InvalidRow {
            table: self.table.name.clone(),
            kind: kind.as_str().to_string(),
            source,
        };

        let row = match value {
            Value::Object(row) => row,
            other => {
                return Err(invalid(ValidationErrors(vec![ValidationError {
                    path: String::new(),
                    expected: "object".to_string(),
                    received: value_type_name(&other).to_string(),
                }]))
                .into())
            }
        };

        validate_row(&self.table, &row, kind.shape()).map_err(invalid)?;

        let row = match kind {
            MutationKind::Insert | MutationKind::Upsert => normalize_full_row(&self.table, row),
            MutationKind::Update => row,
            MutationKind::Delete => key_columns(&self.table, &row),
        };

        let (_, receipt) = self
            .replica
            .apply_new(&self.table.name, kind, row, |id| self.receipts.register(id))?;

        if let Some(wakeup) = &self.sync_wakeup {
            wakeup.notify_one();
        }
        Ok(receipt)
    }
}
