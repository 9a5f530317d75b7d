//! Declarative table schema: column types, primary keys and relationships.
//!
//! - [`column`]: [`ColumnType`], [`ColumnSchema`] and the `t` builder helpers.
//! - [`table`]: [`TableSchema`] fluent builder and [`Relationship`].
//! - [`registry`]: [`Schema`], which resolves relationship destinations by
//!   name once every table is registered.
//! - [`validate`]: row validation against a table.

pub mod column;
pub mod registry;
pub mod table;
pub mod validate;

pub use column::{t, value_type_name, ColumnSchema, ColumnType};
pub use registry::{schema, ResolvedRelationship, Schema, SchemaBuilder};
pub use table::{table, Relationship, TableBuilder, TableSchema};
pub use validate::{validate_row, RowShape};
