//! MemoryUpstream: an in-process authority implementing [`SyncTransport`].
//!
//! Holds the authoritative rows, enforces row validation, primary-key
//! constraints and the authorization config, and serves incremental pulls
//! from a versioned change log. Rows loaded with [`MemoryUpstream::seed`]
//! bypass authorization.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::auth::{AuthData, AuthorizationConfig, Authorizer, WriteOp};
use crate::error::{MutationError, Result, ValidationErrors};
use crate::identity::auth_data_from_token;
use crate::mutate::{
    apply_mutation, key_columns, normalize_full_row, Mutation, MutationId, MutationKind, MutationOutcome,
};
use crate::query::RowSource;
use crate::schema::{validate_row, RowShape, Schema, TableSchema};
use crate::sync::{
    MutationAck, PullRequest, PullResponse, PushRequest, SyncErrorKind, SyncTransport, SyncTransportError,
};
use crate::types::{Row, RowChange, RowKey};

// ============================================================================
// Authoritative state
// ============================================================================

#[derive(Default)]
struct UpstreamState {
    rows: HashMap<String, BTreeMap<RowKey, Row>>,
    version: u64,
    /// `(version, change)` in ascending version order.
    changes: Vec<(u64, RowChange)>,
    last_mutation_ids: HashMap<String, MutationId>,
    offline: bool,
}

impl UpstreamState {
    fn record(&mut self, change: RowChange) {
        self.version += 1;
        self.changes.push((self.version, change));
    }
}

impl RowSource for UpstreamState {
    fn scan(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self
            .rows
            .get(table)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }
}

// ============================================================================
// MemoryUpstream
// ============================================================================

pub struct MemoryUpstream {
    schema: Arc<Schema>,
    authorizer: Authorizer,
    state: Mutex<UpstreamState>,
}

impl MemoryUpstream {
    pub fn new(schema: Arc<Schema>, authorization: AuthorizationConfig) -> Self {
        Self {
            schema,
            authorizer: Authorizer::new(authorization),
            state: Mutex::new(UpstreamState::default()),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Load rows directly, bypassing authorization. Rows must be complete.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) -> Result<()> {
        let def = self
            .schema
            .table(table)
            .ok_or_else(|| MutationError::UnknownTable(table.to_string()))?;

        let mut state = self.state.lock();
        for row in rows {
            validate_row(def, &row, RowShape::Full).map_err(|source| MutationError::InvalidRow {
                table: table.to_string(),
                kind: "seed".to_string(),
                source,
            })?;
            let row = normalize_full_row(def, row);
            let Some(key) = RowKey::from_row(&def.primary_key, &row) else {
                continue;
            };
            state.rows.entry(def.name.clone()).or_default().insert(key, row.clone());
            state.record(RowChange::Put {
                table: def.name.clone(),
                row,
            });
        }
        Ok(())
    }

    /// Current authoritative rows of `table`, in key order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state.lock().scan(table).unwrap_or_default()
    }

    /// One authoritative row by its primary-key columns.
    pub fn row(&self, table: &str, key: &Row) -> Option<Row> {
        let def = self.schema.table(table)?;
        let key = RowKey::from_row(&def.primary_key, key)?;
        self.state.lock().rows.get(table)?.get(&key).cloned()
    }

    /// Simulate a network outage: every push and pull fails transiently.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Highest processed mutation id for `client_id`.
    pub fn last_mutation_id(&self, client_id: &str) -> MutationId {
        self.state.lock().last_mutation_ids.get(client_id).copied().unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Mutation processing
    // -----------------------------------------------------------------------

    /// Process one mutation from `client_id`, acting as `auth`.
    pub fn process(&self, client_id: &str, auth: Option<&AuthData>, mutation: &Mutation) -> MutationOutcome {
        let mut state = self.state.lock();

        let last = state.last_mutation_ids.get(client_id).copied().unwrap_or(0);
        if mutation.id <= last {
            // Already processed; pushes are retried after lost acks.
            return MutationOutcome::Applied;
        }
        state.last_mutation_ids.insert(client_id.to_string(), mutation.id);

        let outcome = match self.schema.table(&mutation.table) {
            Some(def) => self.apply(&mut state, def, auth, mutation),
            None => MutationOutcome::rejected(format!("unknown table \"{}\"", mutation.table)),
        };

        match &outcome {
            MutationOutcome::Applied => {
                tracing::debug!(client_id, table = %mutation.table, mutation_id = mutation.id, "upstream applied mutation")
            }
            MutationOutcome::Rejected { reason } => {
                tracing::debug!(client_id, table = %mutation.table, mutation_id = mutation.id, reason = %reason, "upstream rejected mutation")
            }
        }
        outcome
    }

    fn apply(
        &self,
        state: &mut UpstreamState,
        def: &TableSchema,
        auth: Option<&AuthData>,
        mutation: &Mutation,
    ) -> MutationOutcome {
        if let Err(errors) = validate_row(def, &mutation.row, mutation.kind.shape()) {
            return MutationOutcome::rejected(describe_validation(&errors));
        }
        let Some(key) = RowKey::from_row(&def.primary_key, &mutation.row) else {
            return MutationOutcome::rejected("missing primary key");
        };

        let existing = state.rows.get(&def.name).and_then(|t| t.get(&key)).cloned();
        match (mutation.kind, &existing) {
            (MutationKind::Insert, Some(_)) => return MutationOutcome::rejected("duplicate primary key"),
            (MutationKind::Update | MutationKind::Delete, None) => {
                return MutationOutcome::rejected("row not found")
            }
            _ => {}
        }

        let op = mutation.kind.write_op(existing.is_some());
        let subject = match op {
            WriteOp::Insert => normalize_full_row(def, mutation.row.clone()),
            _ => existing.clone().unwrap_or_default(),
        };
        if let Err(denial) = self.authorizer.check(op, &def.name, auth, Some(&subject), &*state) {
            return MutationOutcome::rejected(denial.to_string());
        }

        let table_rows = state.rows.entry(def.name.clone()).or_default();
        apply_mutation(def, table_rows, mutation);

        let change = match table_rows.get(&key) {
            Some(row) => RowChange::Put {
                table: def.name.clone(),
                row: row.clone(),
            },
            None => RowChange::Delete {
                table: def.name.clone(),
                key: key_columns(def, &mutation.row),
            },
        };
        state.record(change);
        MutationOutcome::Applied
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    fn pull_since(&self, client_id: &str, cookie: Option<&str>) -> PullResponse {
        let state = self.state.lock();
        let last_mutation_id = state.last_mutation_ids.get(client_id).copied().unwrap_or(0);
        let since = cookie
            .and_then(|c| c.parse::<u64>().ok())
            .filter(|v| *v <= state.version);

        let (patch, reset) = match since {
            Some(since) => {
                let start = state.changes.partition_point(|(v, _)| *v <= since);
                (state.changes[start..].iter().map(|(_, c)| c.clone()).collect(), false)
            }
            None => {
                let mut tables: Vec<&String> = state.rows.keys().collect();
                tables.sort();
                let patch = tables
                    .into_iter()
                    .flat_map(|table| {
                        state.rows[table].values().map(move |row| RowChange::Put {
                            table: table.clone(),
                            row: row.clone(),
                        })
                    })
                    .collect();
                (patch, true)
            }
        };

        PullResponse {
            cookie: state.version.to_string(),
            last_mutation_id,
            patch,
            reset,
        }
    }

    fn check_online(&self) -> std::result::Result<(), SyncTransportError> {
        if self.state.lock().offline {
            return Err(SyncTransportError::new("upstream unreachable"));
        }
        Ok(())
    }
}

fn describe_validation(errors: &ValidationErrors) -> String {
    errors
        .0
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// SyncTransport
// ============================================================================

#[async_trait]
impl SyncTransport for MemoryUpstream {
    async fn push(&self, request: &PushRequest) -> std::result::Result<Vec<MutationAck>, SyncTransportError> {
        self.check_online()?;
        if request.schema_version != self.schema.version() {
            return Err(SyncTransportError::with_kind(
                format!(
                    "schema version mismatch: client {}, upstream {}",
                    request.schema_version,
                    self.schema.version()
                ),
                SyncErrorKind::Permanent,
            ));
        }

        let auth = request.auth.as_deref().and_then(auth_data_from_token);
        Ok(request
            .mutations
            .iter()
            .map(|m| MutationAck {
                id: m.id,
                outcome: self.process(&request.client_id, auth.as_ref(), m),
            })
            .collect())
    }

    async fn pull(&self, request: &PullRequest) -> std::result::Result<PullResponse, SyncTransportError> {
        self.check_online()?;
        Ok(self.pull_since(&request.client_id, request.cookie.as_deref()))
    }
}
