//! The board's tables: `user`, `medium` and `message`.
//!
//! Users and mediums are fixed by seed data. Messages point at both, and a
//! message with a `replyToID` is a reply to a top-level post.

use std::sync::Arc;

use poast_sync::error::SchemaError;
use poast_sync::schema::{schema, t, table, Relationship, Schema};

pub const SCHEMA_VERSION: u32 = 1;

pub fn poast_schema() -> Result<Arc<Schema>, SchemaError> {
    let user = table("user")
        .column("id", t::string())
        .column("name", t::string())
        .column("partner", t::boolean())
        .primary_key(&["id"])
        .build();

    let medium = table("medium")
        .column("id", t::string())
        .column("name", t::string())
        .primary_key(&["id"])
        .build();

    let message = table("message")
        .column("id", t::string())
        .column("senderID", t::string())
        .column("mediumID", t::string())
        .column("replyToID", t::optional(t::string()))
        .column("body", t::string())
        .column("timestamp", t::number())
        .primary_key(&["id"])
        .relationship("sender", Relationship::new("senderID", "user", "id"))
        .relationship("medium", Relationship::new("mediumID", "medium", "id"))
        .relationship("replies", Relationship::new("id", "message", "replyToID"))
        .build();

    schema(SCHEMA_VERSION)
        .table(user)
        .table(medium)
        .table(message)
        .build()
        .map(Arc::new)
}
