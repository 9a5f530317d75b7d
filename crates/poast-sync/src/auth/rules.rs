//! Declarative row-level write rules.
//!
//! A rule maps the acting identity (and the affected row, when there is one)
//! to a query; the rule passes when that query yields at least one row.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::query::{Query, QueryFactory};
use crate::schema::Schema;
use crate::types::Row;

// ============================================================================
// Identity payload
// ============================================================================

/// Decoded identity claims of the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthData {
    pub sub: String,
}

impl AuthData {
    pub fn new(sub: impl Into<String>) -> Self {
        Self { sub: sub.into() }
    }
}

// ============================================================================
// Rules and policies
// ============================================================================

/// A row-scoped authorization predicate.
pub type Rule = Arc<dyn Fn(&AuthData, Option<&Row>) -> Query + Send + Sync>;

/// Which write operation is being authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteOp {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for WriteOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            WriteOp::Insert => "insert",
            WriteOp::Update => "update",
            WriteOp::Delete => "delete",
        })
    }
}

/// Policy for one operation on one table.
#[derive(Clone)]
pub enum OpPolicy {
    /// No restriction.
    Unrestricted,
    /// Permitted iff at least one rule passes. An empty list always denies.
    Rules(Vec<Rule>),
}

impl OpPolicy {
    pub fn deny() -> Self {
        OpPolicy::Rules(Vec::new())
    }

    pub fn rule(rule: impl Fn(&AuthData, Option<&Row>) -> Query + Send + Sync + 'static) -> Self {
        OpPolicy::Rules(vec![Arc::new(rule)])
    }

    pub fn is_always_denied(&self) -> bool {
        matches!(self, OpPolicy::Rules(rules) if rules.is_empty())
    }

    fn manifest(&self) -> Value {
        match self {
            OpPolicy::Unrestricted => Value::Null,
            OpPolicy::Rules(rules) => Value::from(rules.len()),
        }
    }
}

impl fmt::Debug for OpPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpPolicy::Unrestricted => f.write_str("Unrestricted"),
            OpPolicy::Rules(rules) => write!(f, "Rules(<{} fn>)", rules.len()),
        }
    }
}

/// Row policies for each write operation.
#[derive(Debug, Clone)]
pub struct RowPolicy {
    pub insert: OpPolicy,
    pub update: OpPolicy,
    pub delete: OpPolicy,
}

impl RowPolicy {
    /// No client writes at all.
    pub fn locked() -> Self {
        Self {
            insert: OpPolicy::deny(),
            update: OpPolicy::deny(),
            delete: OpPolicy::deny(),
        }
    }

    pub fn unrestricted() -> Self {
        Self {
            insert: OpPolicy::Unrestricted,
            update: OpPolicy::Unrestricted,
            delete: OpPolicy::Unrestricted,
        }
    }

    pub fn op(&self, op: WriteOp) -> &OpPolicy {
        match op {
            WriteOp::Insert => &self.insert,
            WriteOp::Update => &self.update,
            WriteOp::Delete => &self.delete,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TablePolicy {
    pub row: RowPolicy,
}

// ============================================================================
// AuthorizationConfig
// ============================================================================

/// Policies keyed by table name. Tables without an entry are unrestricted.
#[derive(Debug, Clone, Default)]
pub struct AuthorizationConfig {
    tables: HashMap<String, TablePolicy>,
}

impl AuthorizationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(mut self, name: impl Into<String>, row: RowPolicy) -> Self {
        self.tables.insert(name.into(), TablePolicy { row });
        self
    }

    pub fn policy(&self, table: &str) -> Option<&TablePolicy> {
        self.tables.get(table)
    }

    /// The nested `table → { row: { insert, update, delete } }` mapping with
    /// `null` for unrestricted operations and the rule count otherwise.
    pub fn manifest(&self) -> Value {
        let mut out = BTreeMap::new();
        for (name, policy) in &self.tables {
            out.insert(
                name.clone(),
                serde_json::json!({
                    "row": {
                        "insert": policy.row.insert.manifest(),
                        "update": policy.row.update.manifest(),
                        "delete": policy.row.delete.manifest(),
                    }
                }),
            );
        }
        serde_json::to_value(out).unwrap_or(Value::Null)
    }
}

/// Build an [`AuthorizationConfig`] with a query factory for the schema, so
/// rules can capture it and build their predicate queries.
pub fn define_authorization(
    schema: &Arc<Schema>,
    define: impl FnOnce(&QueryFactory) -> AuthorizationConfig,
) -> AuthorizationConfig {
    let factory = QueryFactory::new(Arc::clone(schema));
    define(&factory)
}
