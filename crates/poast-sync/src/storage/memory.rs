//! In-memory backend. Contents are lost when the process exits.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use crate::error::Result;
use crate::types::{Row, RowKey};

use super::traits::{ReplicaBackend, RowWrite};

#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<HashMap<String, BTreeMap<RowKey, Row>>>,
    meta: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReplicaBackend for MemoryBackend {
    fn get_row(&self, table: &str, key: &RowKey) -> Result<Option<Row>> {
        Ok(self.rows.lock().get(table).and_then(|t| t.get(key)).cloned())
    }

    fn put_row(&self, table: &str, key: &RowKey, row: &Row) -> Result<()> {
        self.rows
            .lock()
            .entry(table.to_string())
            .or_default()
            .insert(key.clone(), row.clone());
        Ok(())
    }

    fn delete_row(&self, table: &str, key: &RowKey) -> Result<bool> {
        Ok(self
            .rows
            .lock()
            .get_mut(table)
            .is_some_and(|t| t.remove(key).is_some()))
    }

    fn scan_table(&self, table: &str) -> Result<BTreeMap<RowKey, Row>> {
        Ok(self.rows.lock().get(table).cloned().unwrap_or_default())
    }

    fn get_meta(&self, key: &str) -> Result<Option<String>> {
        Ok(self.meta.lock().get(key).cloned())
    }

    fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.meta.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear_rows(&self) -> Result<()> {
        self.rows.lock().clear();
        Ok(())
    }

    fn apply_batch(&self, writes: &[RowWrite]) -> Result<()> {
        let mut rows = self.rows.lock();
        for write in writes {
            match write {
                RowWrite::Put { table, key, row } => {
                    rows.entry(table.clone()).or_default().insert(key.clone(), row.clone());
                }
                RowWrite::Delete { table, key } => {
                    if let Some(t) = rows.get_mut(table) {
                        t.remove(key);
                    }
                }
            }
        }
        Ok(())
    }
}
