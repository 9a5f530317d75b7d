//! Row validation against a [`TableSchema`].

use serde_json::Value;

use crate::error::{ValidationError, ValidationErrors};
use crate::types::Row;

use super::column::value_type_name;
use super::table::TableSchema;

/// Which columns a row is expected to carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowShape {
    /// Every required column must be present (insert / upsert).
    Full,
    /// Primary key plus any subset of the other columns (update).
    Partial,
    /// Primary key only; other columns are ignored (delete).
    Key,
}

struct ValidationContext {
    errors: Vec<ValidationError>,
}

impl ValidationContext {
    fn add_error(&mut self, path: &str, expected: impl Into<String>, received: impl Into<String>) {
        self.errors.push(ValidationError {
            path: path.to_string(),
            expected: expected.into(),
            received: received.into(),
        });
    }
}

fn expected_name(table: &TableSchema, column: &str) -> String {
    match table.column(column) {
        Some(col) if col.optional => format!("{} or null", col.ty.name()),
        Some(col) => col.ty.name().to_string(),
        None => "no such column".to_string(),
    }
}

/// Validate `row` against `table` for the given shape.
///
/// Errors are collected rather than short-circuited so callers see every
/// problem at once.
pub fn validate_row(table: &TableSchema, row: &Row, shape: RowShape) -> Result<(), ValidationErrors> {
    let mut ctx = ValidationContext { errors: Vec::new() };

    for column in &table.primary_key {
        match row.get(column) {
            None => ctx.add_error(column, expected_name(table, column), "missing"),
            Some(Value::Null) => ctx.add_error(column, expected_name(table, column), "null"),
            Some(_) => {}
        }
    }

    if shape != RowShape::Key {
        for (column, value) in row {
            match table.column(column) {
                None => ctx.add_error(column, "no such column", value_type_name(value)),
                Some(col) if !col.accepts(value) && !(value.is_null() && table.is_primary_key(column)) => {
                    ctx.add_error(column, expected_name(table, column), value_type_name(value));
                }
                Some(_) => {}
            }
        }
    }

    if shape == RowShape::Full {
        for (column, col) in &table.columns {
            if !col.optional && !table.is_primary_key(column) && !row.contains_key(column) {
                ctx.add_error(column, col.ty.name(), "missing");
            }
        }
    }

    if ctx.errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors(ctx.errors))
    }
}
