//! Write permissions for the board.
//!
//! Nobody can write `user` or `medium`; they are populated by the seed.
//! Anyone may post, only the sender may edit, and deleting requires a login.

use std::sync::Arc;

use poast_sync::auth::{define_authorization, AuthData, AuthorizationConfig, OpPolicy, RowPolicy};
use poast_sync::schema::Schema;
use poast_sync::types::Row;
use serde_json::Value;

pub fn poast_authorization(schema: &Arc<Schema>) -> AuthorizationConfig {
    define_authorization(schema, |query| {
        let logged_in = {
            let query = query.clone();
            move |auth: &AuthData, _row: Option<&Row>| query.table("user").where_eq("id", auth.sub.as_str())
        };

        let message_sender = {
            let query = query.clone();
            move |auth: &AuthData, row: Option<&Row>| {
                let id = row.and_then(|r| r.get("id")).cloned().unwrap_or(Value::Null);
                query
                    .table("message")
                    .where_eq("id", id)
                    .where_eq("senderID", auth.sub.as_str())
            }
        };

        AuthorizationConfig::new()
            .table("medium", RowPolicy::locked())
            .table("user", RowPolicy::locked())
            .table(
                "message",
                RowPolicy {
                    insert: OpPolicy::Unrestricted,
                    update: OpPolicy::rule(message_sender),
                    delete: OpPolicy::rule(logged_in),
                },
            )
    })
}
