use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// ValidationError / ValidationErrors
// ---------------------------------------------------------------------------

/// A single column-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub path: String,
    pub expected: String,
    pub received: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"Validation failed at "{}": expected {}, received {}"#,
            self.path, self.expected, self.received
        )
    }
}

impl std::error::Error for ValidationError {}

/// A collection of one or more `ValidationError`s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Validation failed:")?;
        for e in &self.0 {
            write!(f, "\n  - {}: expected {}, received {}", e.path, e.expected, e.received)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

// ---------------------------------------------------------------------------
// SchemaError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid name \"{0}\": must be an identifier")]
    InvalidName(String),

    #[error("Table \"{0}\" is declared more than once")]
    DuplicateTable(String),

    #[error("Table \"{0}\" has an empty primary key")]
    EmptyPrimaryKey(String),

    #[error("Primary key column \"{column}\" is not declared on table \"{table}\"")]
    PrimaryKeyColumnMissing { table: String, column: String },

    #[error("Primary key column \"{column}\" on table \"{table}\" cannot be optional")]
    OptionalPrimaryKey { table: String, column: String },

    #[error("Relationship \"{table}.{relationship}\": source column \"{column}\" is not declared")]
    RelationshipSourceMissing {
        table: String,
        relationship: String,
        column: String,
    },

    #[error("Relationship \"{table}.{relationship}\": destination table \"{dest}\" is not registered")]
    RelationshipTableMissing {
        table: String,
        relationship: String,
        dest: String,
    },

    #[error(
        "Relationship \"{table}.{relationship}\": destination column \"{dest}.{column}\" is not declared"
    )]
    RelationshipColumnMissing {
        table: String,
        relationship: String,
        dest: String,
        column: String,
    },

    #[error(transparent)]
    Validation(#[from] ValidationErrors),
}

// ---------------------------------------------------------------------------
// QueryError
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unknown column \"{column}\" on table \"{table}\"")]
    UnknownColumn { table: String, column: String },

    #[error("Unknown relationship \"{relationship}\" on table \"{table}\"")]
    UnknownRelationship { table: String, relationship: String },

    #[error(
        "Cannot compare \"{table}.{column}\" with null using {op}; use IS / IS NOT \
         or filter the snapshot instead"
    )]
    NullComparison {
        table: String,
        column: String,
        op: String,
    },

    #[error("Operand for \"{table}.{column}\" {op}: expected {expected}, received {received}")]
    InvalidOperand {
        table: String,
        column: String,
        op: String,
        expected: String,
        received: String,
    },

    #[error("Invalid LIKE pattern: {0}")]
    InvalidPattern(String),
}

// ---------------------------------------------------------------------------
// MutationError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum MutationError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Invalid {kind} on \"{table}\": {source}")]
    InvalidRow {
        table: String,
        kind: String,
        #[source]
        source: ValidationErrors,
    },
}

// ---------------------------------------------------------------------------
// StorageError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage corruption in {table}/{key}: failed to parse stored row")]
    Corruption {
        table: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid metadata \"{key}\": {message}")]
    Meta { key: String, message: String },

    #[error("Storage mode \"{0}\" is not available in this build")]
    Unsupported(String),

    #[error("Invalid kv store \"{0}\": expected \"mem\", \"idb\" or \"sqlite:<path>\"")]
    InvalidKvStore(String),

    #[cfg(feature = "sqlite")]
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

// ---------------------------------------------------------------------------
// SyncError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Sync task stopped")]
    Stopped,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

// ---------------------------------------------------------------------------
// SyncClientError: top-level rollup
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SyncClientError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Mutation(#[from] MutationError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias: the default error type is `SyncClientError`.
pub type Result<T, E = SyncClientError> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
