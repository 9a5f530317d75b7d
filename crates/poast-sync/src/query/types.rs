//! Query descriptor types: operators, conditions, sort order, relationship
//! traversals, and the immutable [`Query`] builder itself.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::QueryError;
use crate::schema::Schema;

// ============================================================================
// Operators
// ============================================================================

/// Comparison operator for a single-column condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    ILike,
    NotILike,
    In,
    NotIn,
    /// Null-safe equality.
    Is,
    /// Null-safe inequality.
    IsNot,
}

impl Operator {
    pub fn as_str(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
            Operator::ILike => "ILIKE",
            Operator::NotILike => "NOT ILIKE",
            Operator::In => "IN",
            Operator::NotIn => "NOT IN",
            Operator::Is => "IS",
            Operator::IsNot => "IS NOT",
        }
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            Operator::Like | Operator::NotLike | Operator::ILike | Operator::NotILike
        )
    }

    pub fn is_set(self) -> bool {
        matches!(self, Operator::In | Operator::NotIn)
    }

    pub fn is_null_safe(self) -> bool {
        matches!(self, Operator::Is | Operator::IsNot)
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        let op = match normalized.as_str() {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "LIKE" => Operator::Like,
            "NOT LIKE" => Operator::NotLike,
            "ILIKE" => Operator::ILike,
            "NOT ILIKE" => Operator::NotILike,
            "IN" => Operator::In,
            "NOT IN" => Operator::NotIn,
            "IS" => Operator::Is,
            "IS NOT" => Operator::IsNot,
            _ => return Err(QueryError::UnknownOperator(s.to_string())),
        };
        Ok(op)
    }
}

/// A single-column filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

// ============================================================================
// Sort Types
// ============================================================================

/// Sort direction for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(QueryError::UnknownOperator(s.to_string())),
        }
    }
}

/// A sort specification for a single column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

// ============================================================================
// LIKE escaping
// ============================================================================

/// Escape LIKE wildcards (`%`, `_`) and the escape character (`\`) so that
/// user-supplied text matches literally inside a pattern.
pub fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ============================================================================
// Query
// ============================================================================

/// A relationship traversal with its own nested descriptor.
#[derive(Debug, Clone)]
pub struct Related {
    pub name: String,
    pub query: Query,
}

/// Immutable, composable description of a read against one table.
///
/// Every builder method consumes the descriptor and returns a new one; no
/// I/O happens until the descriptor is bound or executed.
#[derive(Debug, Clone)]
pub struct Query {
    schema: Arc<Schema>,
    table: String,
    conditions: Vec<Condition>,
    related: Vec<Related>,
    order: Vec<SortEntry>,
    limit: Option<usize>,
    singular: bool,
}

impl Query {
    pub fn new(schema: Arc<Schema>, table: impl Into<String>) -> Self {
        Self {
            schema,
            table: table.into(),
            conditions: Vec::new(),
            related: Vec::new(),
            order: Vec::new(),
            limit: None,
            singular: false,
        }
    }

    // -----------------------------------------------------------------------
    // Builders
    // -----------------------------------------------------------------------

    /// `column = value`.
    pub fn where_eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.where_op(column, Operator::Eq, value)
    }

    /// `column <op> value`.
    ///
    /// `=` and `!=` against null become `IS` / `IS NOT`. Other operators with
    /// a null operand are kept as written and rejected by [`Query::validate`].
    pub fn where_op(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        let op = match (op, value.is_null()) {
            (Operator::Eq, true) => Operator::Is,
            (Operator::Ne, true) => Operator::IsNot,
            (op, _) => op,
        };
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value,
        });
        self
    }

    /// Traverse relationship `name`, refining the related rows with `build`.
    pub fn related(mut self, name: impl Into<String>, build: impl FnOnce(Query) -> Query) -> Self {
        let name = name.into();
        let dest = self
            .schema
            .relationship(&self.table, &name)
            .map(|r| r.dest.name.clone())
            .unwrap_or_default();
        let nested = build(Query::new(Arc::clone(&self.schema), dest));
        self.related.push(Related { name, query: nested });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push(SortEntry {
            field: column.into(),
            direction,
        });
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Restrict to at most one row; relationship results flatten to a single
    /// row or null.
    pub fn one(mut self) -> Self {
        self.singular = true;
        self.limit = Some(1);
        self
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn related_queries(&self) -> &[Related] {
        &self.related
    }

    pub fn order(&self) -> &[SortEntry] {
        &self.order
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_singular(&self) -> bool {
        self.singular
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Check the descriptor against the schema, recursively.
    pub fn validate(&self) -> Result<(), QueryError> {
        let table = self
            .schema
            .table(&self.table)
            .ok_or_else(|| QueryError::UnknownTable(self.table.clone()))?;

        for cond in &self.conditions {
            let column = table.column(&cond.column).ok_or_else(|| QueryError::UnknownColumn {
                table: self.table.clone(),
                column: cond.column.clone(),
            })?;
            let invalid = |expected: &str| QueryError::InvalidOperand {
                table: self.table.clone(),
                column: cond.column.clone(),
                op: cond.op.to_string(),
                expected: expected.to_string(),
                received: crate::schema::column::value_type_name(&cond.value).to_string(),
            };

            if cond.value.is_null() {
                if cond.op.is_null_safe() {
                    continue;
                }
                return Err(QueryError::NullComparison {
                    table: self.table.clone(),
                    column: cond.column.clone(),
                    op: cond.op.to_string(),
                });
            }

            if cond.op.is_pattern() {
                if column.ty != crate::schema::ColumnType::String || !cond.value.is_string() {
                    return Err(invalid("string"));
                }
            } else if cond.op.is_set() {
                let items = cond.value.as_array().ok_or_else(|| invalid("array"))?;
                if items.iter().any(|v| !column.ty.accepts(v)) {
                    return Err(invalid(&format!("array of {}", column.ty.name())));
                }
            } else if !column.ty.accepts(&cond.value) {
                return Err(invalid(column.ty.name()));
            }
        }

        for entry in &self.order {
            if table.column(&entry.field).is_none() {
                return Err(QueryError::UnknownColumn {
                    table: self.table.clone(),
                    column: entry.field.clone(),
                });
            }
        }

        for related in &self.related {
            if self.schema.relationship(&self.table, &related.name).is_none() {
                return Err(QueryError::UnknownRelationship {
                    table: self.table.clone(),
                    relationship: related.name.clone(),
                });
            }
            related.query.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// QueryFactory
// ============================================================================

/// Entry point for base descriptors: `factory.table("message")`.
#[derive(Debug, Clone)]
pub struct QueryFactory {
    schema: Arc<Schema>,
}

impl QueryFactory {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Base descriptor selecting every row of `name`.
    pub fn table(&self, name: impl Into<String>) -> Query {
        Query::new(Arc::clone(&self.schema), name)
    }
}

// ============================================================================
// Tests
// ============================================================================
