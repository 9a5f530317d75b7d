//! Table descriptors with a fluent builder.
//!
//! Relationship destinations are named, not referenced: the destination table
//! is looked up in the [`Schema`](super::Schema) registry when the schema is
//! built, so a table may relate to itself or to a table declared later.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::column::ColumnSchema;

// ============================================================================
// Relationship
// ============================================================================

/// Join descriptor: rows of `dest_table` whose `dest_field` equals this
/// row's `source_field`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub source_field: String,
    pub dest_table: String,
    pub dest_field: String,
}

impl Relationship {
    pub fn new(
        source_field: impl Into<String>,
        dest_table: impl Into<String>,
        dest_field: impl Into<String>,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            dest_table: dest_table.into(),
            dest_field: dest_field.into(),
        }
    }
}

// ============================================================================
// TableSchema
// ============================================================================

/// Complete table descriptor produced by [`TableBuilder::build`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: BTreeMap<String, ColumnSchema>,
    pub primary_key: Vec<String>,
    pub relationships: BTreeMap<String, Relationship>,
}

impl TableSchema {
    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.get(name)
    }

    pub fn relationship(&self, name: &str) -> Option<&Relationship> {
        self.relationships.get(name)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|c| c == column)
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Start a table declaration.
pub fn table(name: impl Into<String>) -> TableBuilder {
    TableBuilder {
        name: name.into(),
        columns: BTreeMap::new(),
        primary_key: Vec::new(),
        relationships: BTreeMap::new(),
    }
}

/// Fluent table builder. Consistency is checked by
/// [`SchemaBuilder::build`](super::SchemaBuilder::build), not here.
pub struct TableBuilder {
    name: String,
    columns: BTreeMap<String, ColumnSchema>,
    primary_key: Vec<String>,
    relationships: BTreeMap<String, Relationship>,
}

impl TableBuilder {
    pub fn column(mut self, name: impl Into<String>, column: ColumnSchema) -> Self {
        self.columns.insert(name.into(), column);
        self
    }

    pub fn primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn relationship(mut self, name: impl Into<String>, relationship: Relationship) -> Self {
        self.relationships.insert(name.into(), relationship);
        self
    }

    pub fn build(self) -> TableSchema {
        TableSchema {
            name: self.name,
            columns: self.columns,
            primary_key: self.primary_key,
            relationships: self.relationships,
        }
    }
}
