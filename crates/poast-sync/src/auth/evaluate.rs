//! Authorizer: evaluates an [`AuthorizationConfig`] against authoritative
//! rows.

use std::fmt;

use crate::query::{materialize, RowSource};
use crate::types::Row;

use super::rules::{AuthData, AuthorizationConfig, OpPolicy, WriteOp};

/// Why a write was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub table: String,
    pub op: WriteOp,
    pub reason: String,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on \"{}\" denied: {}", self.op, self.table, self.reason)
    }
}

impl std::error::Error for Denial {}

pub struct Authorizer {
    config: AuthorizationConfig,
}

impl Authorizer {
    pub fn new(config: AuthorizationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AuthorizationConfig {
        &self.config
    }

    /// Decide whether `auth` may perform `op` on `row` in `table`.
    ///
    /// `row` is the existing row for update/delete and the new row for
    /// insert. Rule queries run against `source`.
    pub fn check(
        &self,
        op: WriteOp,
        table: &str,
        auth: Option<&AuthData>,
        row: Option<&Row>,
        source: &dyn RowSource,
    ) -> Result<(), Denial> {
        let deny = |reason: &str| Denial {
            table: table.to_string(),
            op,
            reason: reason.to_string(),
        };

        let policy = match self.config.policy(table) {
            Some(policy) => policy.row.op(op),
            None => return Ok(()),
        };

        let rules = match policy {
            OpPolicy::Unrestricted => return Ok(()),
            OpPolicy::Rules(rules) if rules.is_empty() => {
                return Err(deny("no client writes are permitted"))
            }
            OpPolicy::Rules(rules) => rules,
        };

        let auth = auth.ok_or_else(|| deny("anonymous identity"))?;

        for rule in rules {
            let query = rule(auth, row);
            match materialize(&query, source) {
                Ok(rows) if !rows.is_empty() => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(table, %op, error = %e, "authorization rule query failed");
                }
            }
        }

        Err(deny("no rule matched the acting identity"))
    }
}
