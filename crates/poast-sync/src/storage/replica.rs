//! Replica: confirmed rows from the authority, overlaid with the pending
//! mutation log.
//!
//! Reads see confirmed state with every pending mutation replayed on top, in
//! order. The pending log, the pull cookie and the client identity are
//! persisted as metadata so a durable backend survives restarts with its
//! optimistic writes intact.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::{Result, StorageError};
use crate::mutate::{Mutation, MutationId, PendingLog};
use crate::query::RowSource;
use crate::schema::Schema;
use crate::types::{Row, RowChange, RowKey};

use super::traits::{ReplicaBackend, RowWrite};

const META_PENDING: &str = "pending_mutations";
const META_LAST_MUTATION_ID: &str = "last_mutation_id";
const META_COOKIE: &str = "cookie";
const META_CLIENT_ID: &str = "client_id";

pub struct Replica {
    backend: Box<dyn ReplicaBackend>,
    schema: Arc<Schema>,
    pending: PendingLog,
    complete: bool,
}

impl Replica {
    /// Open a replica over `backend`, restoring any persisted pending log.
    pub fn open(backend: Box<dyn ReplicaBackend>, schema: Arc<Schema>) -> Result<Self> {
        let pending = match backend.get_meta(META_PENDING)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Meta {
                key: META_PENDING.to_string(),
                message: e.to_string(),
            })?,
            None => PendingLog::new(),
        };
        Ok(Self {
            backend,
            schema,
            pending,
            complete: false,
        })
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    // ------------------------------------------------------------------------
    // Identity and cursor metadata
    // ------------------------------------------------------------------------

    /// The persisted client id, generating one on first use.
    pub fn client_id(&self) -> Result<String> {
        if let Some(id) = self.backend.get_meta(META_CLIENT_ID)? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.backend.set_meta(META_CLIENT_ID, &id)?;
        Ok(id)
    }

    pub fn set_client_id(&self, id: &str) -> Result<()> {
        self.backend.set_meta(META_CLIENT_ID, id)
    }

    pub fn cookie(&self) -> Result<Option<String>> {
        self.backend.get_meta(META_COOKIE)
    }

    pub fn set_cookie(&self, cookie: &str) -> Result<()> {
        self.backend.set_meta(META_COOKIE, cookie)
    }

    /// Allocate the next mutation id. Ids are never reused, even across
    /// restarts.
    pub fn next_mutation_id(&self) -> Result<MutationId> {
        let stored = match self.backend.get_meta(META_LAST_MUTATION_ID)? {
            Some(raw) => raw.parse::<MutationId>().map_err(|e| StorageError::Meta {
                key: META_LAST_MUTATION_ID.to_string(),
                message: e.to_string(),
            })?,
            None => 0,
        };
        let next = stored.max(self.pending.last_id().unwrap_or(0)) + 1;
        self.backend.set_meta(META_LAST_MUTATION_ID, &next.to_string())?;
        Ok(next)
    }

    // ------------------------------------------------------------------------
    // Completeness
    // ------------------------------------------------------------------------

    /// Whether at least one pull has been reconciled into this replica.
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn mark_complete(&mut self) {
        self.complete = true;
    }

    // ------------------------------------------------------------------------
    // Pending log
    // ------------------------------------------------------------------------

    pub fn pending(&self) -> &[Mutation] {
        self.pending.entries()
    }

    pub fn add_pending(&mut self, mutation: Mutation) -> Result<()> {
        self.pending.push(mutation);
        self.persist_pending()
    }

    /// Drop a rejected mutation.
    pub fn drop_pending(&mut self, id: MutationId) -> Result<Option<Mutation>> {
        let removed = self.pending.remove(id);
        if removed.is_some() {
            self.persist_pending()?;
        }
        Ok(removed)
    }

    /// Drop every mutation the authority reports as processed.
    pub fn drop_pending_through(&mut self, last: MutationId) -> Result<Vec<Mutation>> {
        let removed = self.pending.remove_through(last);
        if !removed.is_empty() {
            self.persist_pending()?;
        }
        Ok(removed)
    }

    fn persist_pending(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.pending).map_err(|e| StorageError::Meta {
            key: META_PENDING.to_string(),
            message: e.to_string(),
        })?;
        self.backend.set_meta(META_PENDING, &raw)
    }

    // ------------------------------------------------------------------------
    // Confirmed state
    // ------------------------------------------------------------------------

    /// Apply an authoritative patch. With `reset`, every confirmed row is
    /// dropped first. Returns the tables whose confirmed rows changed.
    pub fn apply_patch(&mut self, changes: &[RowChange], reset: bool) -> Result<BTreeSet<String>> {
        let mut touched = BTreeSet::new();
        if reset {
            self.backend.clear_rows()?;
            touched.extend(self.schema.table_names().into_iter().map(str::to_string));
        }

        let mut writes = Vec::with_capacity(changes.len());
        for change in changes {
            let Some(table) = self.schema.table(change.table()) else {
                tracing::warn!(table = change.table(), "patch references unknown table; skipped");
                continue;
            };
            match change {
                RowChange::Put { row, .. } => {
                    let Some(key) = RowKey::from_row(&table.primary_key, row) else {
                        tracing::warn!(table = %table.name, "patch row without primary key; skipped");
                        continue;
                    };
                    writes.push(RowWrite::Put {
                        table: table.name.clone(),
                        key,
                        row: row.clone(),
                    });
                }
                RowChange::Delete { key, .. } => {
                    let Some(key) = RowKey::from_row(&table.primary_key, key) else {
                        continue;
                    };
                    writes.push(RowWrite::Delete {
                        table: table.name.clone(),
                        key,
                    });
                }
            }
            touched.insert(table.name.clone());
        }

        self.backend.apply_batch(&writes)?;
        Ok(touched)
    }

    /// One confirmed row, ignoring pending mutations.
    pub fn confirmed_row(&self, table: &str, key: &RowKey) -> Result<Option<Row>> {
        self.backend.get_row(table, key)
    }

    /// Current rows of `table`: confirmed state with pending mutations replayed.
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let Some(def) = self.schema.table(table) else {
            return Ok(Vec::new());
        };
        let mut rows = self.backend.scan_table(table)?;
        self.pending.replay(def, &mut rows);
        Ok(rows.into_values().collect())
    }
}

impl RowSource for Replica {
    fn scan(&self, table: &str) -> Result<Vec<Row>> {
        self.rows(table)
    }
}
