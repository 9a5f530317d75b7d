//! Authorizer: default-deny, rule evaluation and anonymous identities.

use std::sync::Arc;

use poast_sync::auth::{define_authorization, AuthData, Authorizer, OpPolicy, RowPolicy, WriteOp};
use poast_sync::query::TableRows;
use poast_sync::schema::{schema, t, table, Schema};
use poast_sync::types::{row_from_value, Row};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn board() -> Arc<Schema> {
    Arc::new(
        schema(1)
            .table(
                table("user")
                    .column("id", t::string())
                    .column("name", t::string())
                    .primary_key(&["id"])
                    .build(),
            )
            .table(
                table("message")
                    .column("id", t::string())
                    .column("senderID", t::string())
                    .column("body", t::string())
                    .primary_key(&["id"])
                    .build(),
            )
            .build()
            .unwrap(),
    )
}

fn authorizer(s: &Arc<Schema>) -> Authorizer {
    let config = define_authorization(s, |q| {
        let is_sender = {
            let q = q.clone();
            move |auth: &AuthData, row: Option<&Row>| {
                let sender = row
                    .and_then(|r| r.get("senderID"))
                    .cloned()
                    .unwrap_or_default();
                q.table("user")
                    .where_eq("id", auth.sub.as_str())
                    .where_eq("id", sender)
            }
        };
        let logged_in = {
            let q = q.clone();
            move |auth: &AuthData, _row: Option<&Row>| q.table("user").where_eq("id", auth.sub.as_str())
        };
        poast_sync::auth::AuthorizationConfig::new()
            .table("user", RowPolicy::locked())
            .table(
                "message",
                RowPolicy {
                    insert: OpPolicy::Unrestricted,
                    update: OpPolicy::rule(is_sender),
                    delete: OpPolicy::rule(logged_in),
                },
            )
    });
    Authorizer::new(config)
}

fn data() -> TableRows {
    let mut rows = TableRows::new();
    rows.insert(
        "user".into(),
        vec![
            row_from_value(json!({ "id": "u1", "name": "Dax" })),
            row_from_value(json!({ "id": "u2", "name": "Ana" })),
        ],
    );
    rows
}

fn m1() -> Row {
    row_from_value(json!({ "id": "m1", "senderID": "u1", "body": "hello" }))
}

// ============================================================================
// Tests
// ============================================================================

#[test]
fn locked_tables_deny_every_operation() {
    let s = board();
    let a = authorizer(&s);
    let auth = AuthData::new("u1");
    let row = row_from_value(json!({ "id": "u9", "name": "x" }));
    for op in [WriteOp::Insert, WriteOp::Update, WriteOp::Delete] {
        assert!(a.check(op, "user", Some(&auth), Some(&row), &data()).is_err());
    }
}

#[test]
fn update_is_sender_only() {
    let s = board();
    let a = authorizer(&s);
    let row = m1();
    assert!(a
        .check(WriteOp::Update, "message", Some(&AuthData::new("u1")), Some(&row), &data())
        .is_ok());
    let denial = a
        .check(WriteOp::Update, "message", Some(&AuthData::new("u2")), Some(&row), &data())
        .unwrap_err();
    assert_eq!(denial.op, WriteOp::Update);
    assert_eq!(denial.table, "message");
}

#[test]
fn delete_requires_a_known_identity() {
    let s = board();
    let a = authorizer(&s);
    let row = m1();
    assert!(a
        .check(WriteOp::Delete, "message", Some(&AuthData::new("u2")), Some(&row), &data())
        .is_ok());
    assert!(a
        .check(WriteOp::Delete, "message", Some(&AuthData::new("ghost")), Some(&row), &data())
        .is_err());
    assert!(a.check(WriteOp::Delete, "message", None, Some(&row), &data()).is_err());
}

#[test]
fn unrestricted_insert_and_unlisted_tables_pass() {
    let s = board();
    let a = authorizer(&s);
    let row = m1();
    assert!(a.check(WriteOp::Insert, "message", None, Some(&row), &data()).is_ok());
    assert!(a.check(WriteOp::Delete, "medium", None, None, &data()).is_ok());
}

#[test]
fn manifest_mirrors_the_policy_shape() {
    let s = board();
    let a = authorizer(&s);
    let manifest = a.config().manifest();
    assert_eq!(manifest["user"]["row"]["insert"], json!(0));
    assert_eq!(manifest["message"]["row"]["insert"], json!(null));
    assert_eq!(manifest["message"]["row"]["update"], json!(1));
}
