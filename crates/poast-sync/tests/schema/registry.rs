//! Schema registry: relationship resolution and integrity checks.

use poast_sync::error::SchemaError;
use poast_sync::schema::{schema, t, table, Relationship, TableSchema};

// ============================================================================
// Helpers
// ============================================================================

fn user() -> TableSchema {
    table("user")
        .column("id", t::string())
        .column("name", t::string())
        .column("partner", t::boolean())
        .primary_key(&["id"])
        .build()
}

fn message() -> TableSchema {
    table("message")
        .column("id", t::string())
        .column("senderID", t::string())
        .column("replyToID", t::optional(t::string()))
        .column("body", t::string())
        .column("timestamp", t::number())
        .primary_key(&["id"])
        .relationship("sender", Relationship::new("senderID", "user", "id"))
        .relationship("replies", Relationship::new("id", "message", "replyToID"))
        .build()
}

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn self_and_forward_references_resolve_regardless_of_order() {
    // message is registered before the user table it points at.
    let s = schema(1).table(message()).table(user()).build().unwrap();

    let replies = s.relationship("message", "replies").unwrap();
    assert_eq!(replies.dest.name, "message");
    let sender = s.relationship("message", "sender").unwrap();
    assert_eq!(sender.dest.name, "user");
    assert!(s.relationship("message", "nope").is_none());
}

#[test]
fn every_relationship_destination_column_exists() {
    let s = schema(1).table(user()).table(message()).build().unwrap();
    for def in s.tables() {
        for name in def.relationships.keys() {
            let resolved = s.relationship(&def.name, name).unwrap();
            assert!(resolved.dest.column(&resolved.relationship.dest_field).is_some());
        }
    }
}

#[test]
fn every_primary_key_column_is_declared() {
    let s = schema(1).table(user()).table(message()).build().unwrap();
    for def in s.tables() {
        assert!(!def.primary_key.is_empty());
        for column in &def.primary_key {
            assert!(def.columns.contains_key(column), "{}.{column}", def.name);
        }
    }
}

// ============================================================================
// Configuration errors
// ============================================================================

#[test]
fn missing_destination_table_fails_at_build() {
    let err = schema(1).table(message()).build().unwrap_err();
    assert!(matches!(
        err,
        SchemaError::RelationshipTableMissing { ref dest, .. } if dest == "user"
    ));
}

#[test]
fn missing_destination_column_fails_at_build() {
    let broken = table("message")
        .column("id", t::string())
        .column("senderID", t::string())
        .primary_key(&["id"])
        .relationship("sender", Relationship::new("senderID", "user", "uid"))
        .build();
    let err = schema(1).table(user()).table(broken).build().unwrap_err();
    assert!(matches!(
        err,
        SchemaError::RelationshipColumnMissing { ref column, .. } if column == "uid"
    ));
}

#[test]
fn missing_source_column_fails_at_build() {
    let broken = table("message")
        .column("id", t::string())
        .primary_key(&["id"])
        .relationship("sender", Relationship::new("senderID", "user", "id"))
        .build();
    let err = schema(1).table(user()).table(broken).build().unwrap_err();
    assert!(matches!(err, SchemaError::RelationshipSourceMissing { .. }));
}

#[test]
fn primary_key_must_be_declared_and_required() {
    let undeclared = table("medium")
        .column("name", t::string())
        .primary_key(&["id"])
        .build();
    assert!(matches!(
        schema(1).table(undeclared).build().unwrap_err(),
        SchemaError::PrimaryKeyColumnMissing { .. }
    ));

    let optional = table("medium")
        .column("id", t::optional(t::string()))
        .primary_key(&["id"])
        .build();
    assert!(matches!(
        schema(1).table(optional).build().unwrap_err(),
        SchemaError::OptionalPrimaryKey { .. }
    ));

    let empty = table("medium").column("id", t::string()).build();
    assert!(matches!(
        schema(1).table(empty).build().unwrap_err(),
        SchemaError::EmptyPrimaryKey(_)
    ));
}

#[test]
fn duplicate_tables_and_bad_names_are_rejected() {
    assert!(matches!(
        schema(1).table(user()).table(user()).build().unwrap_err(),
        SchemaError::DuplicateTable(_)
    ));
    let bad = table("bad name").column("id", t::string()).primary_key(&["id"]).build();
    assert!(matches!(
        schema(1).table(bad).build().unwrap_err(),
        SchemaError::InvalidName(_)
    ));
}
