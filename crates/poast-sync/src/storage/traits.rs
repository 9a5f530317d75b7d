/// Replica backend trait.
///
/// `ReplicaBackend` is the narrow key-value trait implemented by concrete
/// backends (in-memory, SQLite). It stores confirmed rows keyed by table and
/// encoded primary key, plus string metadata (cookie, client id, the pending
/// mutation log). Overlay and query semantics live in [`Replica`](super::Replica).
use std::collections::BTreeMap;

use crate::error::Result;
use crate::types::{Row, RowKey};

/// One write inside a [`ReplicaBackend::apply_batch`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum RowWrite {
    Put { table: String, key: RowKey, row: Row },
    Delete { table: String, key: RowKey },
}

/// Low-level replica storage: raw row I/O with no schema semantics.
///
/// Implementors must be `Send + Sync` so they can be shared across threads.
pub trait ReplicaBackend: Send + Sync {
    /// Fetch one confirmed row.
    fn get_row(&self, table: &str, key: &RowKey) -> Result<Option<Row>>;

    /// Insert or replace one confirmed row.
    fn put_row(&self, table: &str, key: &RowKey, row: &Row) -> Result<()>;

    /// Remove one confirmed row. Returns `true` if it existed.
    fn delete_row(&self, table: &str, key: &RowKey) -> Result<bool>;

    /// All confirmed rows of a table, in key order.
    fn scan_table(&self, table: &str) -> Result<BTreeMap<RowKey, Row>>;

    /// Read a metadata value.
    fn get_meta(&self, key: &str) -> Result<Option<String>>;

    /// Write a metadata value.
    fn set_meta(&self, key: &str, value: &str) -> Result<()>;

    /// Drop every confirmed row, keeping metadata.
    fn clear_rows(&self) -> Result<()>;

    /// Apply several writes. Backends with transactions apply them atomically.
    fn apply_batch(&self, writes: &[RowWrite]) -> Result<()> {
        for write in writes {
            match write {
                RowWrite::Put { table, key, row } => self.put_row(table, key, row)?,
                RowWrite::Delete { table, key } => {
                    self.delete_row(table, key)?;
                }
            }
        }
        Ok(())
    }
}
