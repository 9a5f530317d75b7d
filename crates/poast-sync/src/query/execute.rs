//! Query execution engine: scan-and-filter with sorting, limits and
//! relationship embedding.

use std::cmp::Ordering;
use std::collections::HashMap;

use serde_json::Value;

use crate::error::{QueryError, Result};
use crate::types::Row;

use super::operators::{compare_values, compile_conditions, matches_all, values_equal, CompiledCondition};
use super::tables::referenced_tables;
use super::types::{Query, SortDirection, SortEntry};

// ============================================================================
// Row Sources
// ============================================================================

/// Anything that can list the current rows of a table.
pub trait RowSource {
    fn scan(&self, table: &str) -> Result<Vec<Row>>;
}

/// Plain in-memory rows keyed by table name.
pub type TableRows = HashMap<String, Vec<Row>>;

impl RowSource for TableRows {
    fn scan(&self, table: &str) -> Result<Vec<Row>> {
        Ok(self.get(table).cloned().unwrap_or_default())
    }
}

// ============================================================================
// Sorting
// ============================================================================

/// Sort rows by the declared entries, then by primary key ascending so that
/// equal sort keys still produce a stable, deterministic order.
pub fn sort_rows(rows: &mut [&Row], order: &[SortEntry], primary_key: &[String]) {
    rows.sort_by(|a, b| {
        for entry in order {
            let va = a.get(&entry.field).unwrap_or(&Value::Null);
            let vb = b.get(&entry.field).unwrap_or(&Value::Null);
            let cmp = compare_values(va, vb);
            if cmp != Ordering::Equal {
                return if entry.direction == SortDirection::Desc {
                    cmp.reverse()
                } else {
                    cmp
                };
            }
        }
        for column in primary_key {
            let va = a.get(column).unwrap_or(&Value::Null);
            let vb = b.get(column).unwrap_or(&Value::Null);
            let cmp = compare_values(va, vb);
            if cmp != Ordering::Equal {
                return cmp;
            }
        }
        Ordering::Equal
    });
}

// ============================================================================
// Execution
// ============================================================================

/// Validate and execute `query` against `source`.
///
/// 1. Load every referenced table once.
/// 2. Compile the descriptor tree: conditions and relationship joins are
///    resolved once per call, not once per joined parent row.
/// 3. Filter the root table, sort, then apply the limit.
/// 4. Embed each relationship under its name: an array, or a single row /
///    null for descriptors that called `one()`.
pub fn materialize(query: &Query, source: &dyn RowSource) -> Result<Vec<Value>> {
    query.validate()?;

    let mut tables = TableRows::new();
    for name in referenced_tables(query) {
        let rows = source.scan(&name)?;
        tables.insert(name, rows);
    }

    let plan = Plan::compile(query)?;
    plan.run(&tables, None)
}

/// A descriptor with its conditions compiled and its relationships resolved.
struct Plan<'q> {
    query: &'q Query,
    primary_key: Vec<String>,
    conditions: Vec<CompiledCondition<'q>>,
    related: Vec<RelatedPlan<'q>>,
}

struct RelatedPlan<'q> {
    name: &'q str,
    source_field: String,
    dest_field: String,
    plan: Plan<'q>,
}

impl<'q> Plan<'q> {
    fn compile(query: &'q Query) -> Result<Self> {
        let schema = query.schema();
        let table = schema
            .table(query.table())
            .ok_or_else(|| QueryError::UnknownTable(query.table().to_string()))?;

        let mut related = Vec::new();
        for nested in query.related_queries() {
            let resolved = schema
                .relationship(query.table(), &nested.name)
                .ok_or_else(|| QueryError::UnknownRelationship {
                    table: query.table().to_string(),
                    relationship: nested.name.clone(),
                })?;
            related.push(RelatedPlan {
                name: &nested.name,
                source_field: resolved.relationship.source_field.clone(),
                dest_field: resolved.relationship.dest_field.clone(),
                plan: Plan::compile(&nested.query)?,
            });
        }

        Ok(Self {
            query,
            primary_key: table.primary_key.clone(),
            conditions: compile_conditions(query.conditions())?,
            related,
        })
    }

    fn run(&self, tables: &TableRows, join: Option<(&str, &Value)>) -> Result<Vec<Value>> {
        let rows = tables.get(self.query.table()).map(Vec::as_slice).unwrap_or(&[]);

        let mut matched: Vec<&Row> = rows
            .iter()
            .filter(|row| match join {
                Some((column, value)) => row.get(column).is_some_and(|v| values_equal(v, value)),
                None => true,
            })
            .filter(|row| matches_all(&self.conditions, row))
            .collect();

        sort_rows(&mut matched, self.query.order(), &self.primary_key);

        if let Some(n) = self.query.limit_value() {
            matched.truncate(n);
        }

        matched
            .into_iter()
            .map(|row| self.embed_related(tables, row))
            .collect()
    }

    fn embed_related(&self, tables: &TableRows, row: &Row) -> Result<Value> {
        let mut out = row.clone();

        for related in &self.related {
            let source_value = row.get(&related.source_field).unwrap_or(&Value::Null);
            let children = if source_value.is_null() {
                Vec::new()
            } else {
                related
                    .plan
                    .run(tables, Some((related.dest_field.as_str(), source_value)))?
            };

            let value = if related.plan.query.is_singular() {
                children.into_iter().next().unwrap_or(Value::Null)
            } else {
                Value::Array(children)
            };
            out.insert(related.name.to_string(), value);
        }

        Ok(Value::Object(out))
    }
}
