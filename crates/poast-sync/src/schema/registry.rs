//! Schema registry: the full set of table descriptors, checked for
//! consistency as a unit.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use crate::error::SchemaError;

use super::table::{Relationship, TableSchema};

// ============================================================================
// Regex
// ============================================================================

fn name_regex() -> &'static regex::Regex {
    static NAME_REGEX: OnceLock<regex::Regex> = OnceLock::new();
    NAME_REGEX.get_or_init(|| {
        regex::Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_]*$").expect("name regex is valid")
    })
}

fn check_name(name: &str) -> Result<(), SchemaError> {
    if name_regex().is_match(name) {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(name.to_string()))
    }
}

// ============================================================================
// Schema
// ============================================================================

/// A validated set of tables. Every relationship destination is known to be
/// registered and to declare its destination column.
#[derive(Debug)]
pub struct Schema {
    version: u32,
    tables: Vec<Arc<TableSchema>>,
    by_name: HashMap<String, usize>,
}

/// A relationship with its destination table looked up.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRelationship<'a> {
    pub name: &'a str,
    pub relationship: &'a Relationship,
    pub dest: &'a TableSchema,
}

impl Schema {
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn table(&self, name: &str) -> Option<&Arc<TableSchema>> {
        self.by_name.get(name).map(|&idx| &self.tables[idx])
    }

    /// All tables in declaration order.
    pub fn tables(&self) -> impl Iterator<Item = &Arc<TableSchema>> {
        self.tables.iter()
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name.as_str()).collect()
    }

    /// Look up `table.relationship` and its destination table.
    pub fn relationship(&self, table: &str, name: &str) -> Option<ResolvedRelationship<'_>> {
        let source = self.table(table)?;
        let (name, relationship) = source.relationships.get_key_value(name)?;
        let dest = self.table(&relationship.dest_table)?;
        Some(ResolvedRelationship {
            name: name.as_str(),
            relationship,
            dest: dest.as_ref(),
        })
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Start a schema declaration at the given version.
pub fn schema(version: u32) -> SchemaBuilder {
    SchemaBuilder {
        version,
        tables: Vec::new(),
    }
}

pub struct SchemaBuilder {
    version: u32,
    tables: Vec<TableSchema>,
}

impl SchemaBuilder {
    pub fn table(mut self, table: TableSchema) -> Self {
        self.tables.push(table);
        self
    }

    /// Register every table, then resolve and check relationships.
    ///
    /// All configuration errors surface here rather than when a query runs.
    pub fn build(self) -> Result<Schema, SchemaError> {
        let mut by_name = HashMap::new();
        for (idx, table) in self.tables.iter().enumerate() {
            check_name(&table.name)?;
            if by_name.insert(table.name.clone(), idx).is_some() {
                return Err(SchemaError::DuplicateTable(table.name.clone()));
            }
        }

        for table in &self.tables {
            check_table(table)?;
        }

        for table in &self.tables {
            for (rel_name, rel) in &table.relationships {
                check_name(rel_name)?;
                if !table.columns.contains_key(&rel.source_field) {
                    return Err(SchemaError::RelationshipSourceMissing {
                        table: table.name.clone(),
                        relationship: rel_name.clone(),
                        column: rel.source_field.clone(),
                    });
                }
                let dest = match by_name.get(&rel.dest_table) {
                    Some(&idx) => &self.tables[idx],
                    None => {
                        return Err(SchemaError::RelationshipTableMissing {
                            table: table.name.clone(),
                            relationship: rel_name.clone(),
                            dest: rel.dest_table.clone(),
                        })
                    }
                };
                if !dest.columns.contains_key(&rel.dest_field) {
                    return Err(SchemaError::RelationshipColumnMissing {
                        table: table.name.clone(),
                        relationship: rel_name.clone(),
                        dest: dest.name.clone(),
                        column: rel.dest_field.clone(),
                    });
                }
            }
        }

        Ok(Schema {
            version: self.version,
            tables: self.tables.into_iter().map(Arc::new).collect(),
            by_name,
        })
    }
}

fn check_table(table: &TableSchema) -> Result<(), SchemaError> {
    for column in table.columns.keys() {
        check_name(column)?;
    }
    if table.primary_key.is_empty() {
        return Err(SchemaError::EmptyPrimaryKey(table.name.clone()));
    }
    for column in &table.primary_key {
        match table.columns.get(column) {
            None => {
                return Err(SchemaError::PrimaryKeyColumnMissing {
                    table: table.name.clone(),
                    column: column.clone(),
                })
            }
            Some(col) if col.optional => {
                return Err(SchemaError::OptionalPrimaryKey {
                    table: table.name.clone(),
                    column: column.clone(),
                })
            }
            Some(_) => {}
        }
    }
    Ok(())
}
