//! SQLite replica backend.
//!
//! Implements `ReplicaBackend` using rusqlite (bundled). Rows are stored as
//! JSON text in a single `rows` table keyed by `(tbl, pk)`; metadata lives in
//! a `meta` key-value table.

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, OptionalExtension};

use crate::error::{Result, StorageError, SyncClientError};
use crate::types::{Row, RowKey};

use super::traits::{ReplicaBackend, RowWrite};

/// Map a rusqlite error to a `SyncClientError`.
fn storage_err(e: rusqlite::Error) -> SyncClientError {
    SyncClientError::Storage(StorageError::Sqlite(e))
}

fn parse_row(table: &str, key: &str, data: &str) -> Result<Row> {
    serde_json::from_str(data).map_err(|source| {
        StorageError::Corruption {
            table: table.to_string(),
            key: key.to_string(),
            source,
        }
        .into()
    })
}

fn encode_row(row: &Row) -> String {
    serde_json::Value::Object(row.clone()).to_string()
}

// ============================================================================
// SqliteBackend
// ============================================================================

pub struct SqliteBackend {
    conn: Mutex<rusqlite::Connection>,
}

impl SqliteBackend {
    /// Open (creating if needed) a file-backed database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = rusqlite::Connection::open(path).map_err(storage_err)?;
        Self::init(conn)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = rusqlite::Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS rows (
                 tbl  TEXT NOT NULL,
                 pk   TEXT NOT NULL,
                 data TEXT NOT NULL,
                 PRIMARY KEY (tbl, pk)
             );
             CREATE TABLE IF NOT EXISTS meta (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );",
        )
        .map_err(storage_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl ReplicaBackend for SqliteBackend {
    fn get_row(&self, table: &str, key: &RowKey) -> Result<Option<Row>> {
        let conn = self.conn.lock();
        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM rows WHERE tbl = ?1 AND pk = ?2",
                params![table, key.as_str()],
                |r| r.get(0),
            )
            .optional()
            .map_err(storage_err)?;
        data.map(|d| parse_row(table, key.as_str(), &d)).transpose()
    }

    fn put_row(&self, table: &str, key: &RowKey, row: &Row) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO rows (tbl, pk, data) VALUES (?1, ?2, ?3)",
                params![table, key.as_str(), encode_row(row)],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn delete_row(&self, table: &str, key: &RowKey) -> Result<bool> {
        let n = self
            .conn
            .lock()
            .execute(
                "DELETE FROM rows WHERE tbl = ?1 AND pk = ?2",
                params![table, key.as_str()],
            )
            .map_err(storage_err)?;
        Ok(n > 0)
    }

    fn scan_table(&self, table: &str) -> Result<BTreeMap<RowKey, Row>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT pk, data FROM rows WHERE tbl = ?1")
            .map_err(storage_err)?;
        let pairs = stmt
            .query_map(params![table], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
            })
            .map_err(storage_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(storage_err)?;

        let mut out = BTreeMap::new();
        for (pk, data) in pairs {
            let row = parse_row(table, &pk, &data)?;
            out.insert(RowKey::from_encoded(pk), row);
        }
        Ok(out)
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .lock()
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |r| r.get(0))
            .optional()
            .map_err(storage_err)
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "INSERT OR REPLACE INTO meta (key, value) VALUES (?1, ?2)",
                params![key, value],
            )
            .map_err(storage_err)?;
        Ok(())
    }

    fn clear_rows(&self) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM rows", [])
            .map_err(storage_err)?;
        Ok(())
    }

    fn apply_batch(&self, writes: &[RowWrite]) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(storage_err)?;
        for write in writes {
            match write {
                RowWrite::Put { table, key, row } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO rows (tbl, pk, data) VALUES (?1, ?2, ?3)",
                        params![table, key.as_str(), encode_row(row)],
                    )
                    .map_err(storage_err)?;
                }
                RowWrite::Delete { table, key } => {
                    tx.execute(
                        "DELETE FROM rows WHERE tbl = ?1 AND pk = ?2",
                        params![table, key.as_str()],
                    )
                    .map_err(storage_err)?;
                }
            }
        }
        tx.commit().map_err(storage_err)
    }
}
