//! End-to-end: clients syncing through the in-process authority.

use std::sync::Arc;

use poast_sync::auth::{define_authorization, AuthData, AuthorizationConfig, OpPolicy, RowPolicy};
use poast_sync::identity::{mint_unsigned_token, ANON_USER_ID};
use poast_sync::mutate::MutationOutcome;
use poast_sync::query::{Query, SortDirection};
use poast_sync::reactive::SnapshotState;
use poast_sync::schema::{schema, t, table, Relationship, Schema};
use poast_sync::sync::{SyncErrorKind, SyncPhase};
use poast_sync::types::{row_from_value, Row};
use poast_sync::upstream::MemoryUpstream;
use poast_sync::{Client, ClientOptions};
use serde_json::{json, Value};

// ============================================================================
// Helpers
// ============================================================================

fn board(version: u32) -> Arc<Schema> {
    Arc::new(
        schema(version)
            .table(
                table("user")
                    .column("id", t::string())
                    .column("name", t::string())
                    .primary_key(&["id"])
                    .build(),
            )
            .table(
                table("medium")
                    .column("id", t::string())
                    .column("name", t::string())
                    .primary_key(&["id"])
                    .build(),
            )
            .table(
                table("message")
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
                    .build(),
            )
            .build()
            .unwrap(),
    )
}

fn rules(s: &Arc<Schema>) -> AuthorizationConfig {
    define_authorization(s, |q| {
        let sender = q.clone();
        let member = q.clone();
        AuthorizationConfig::new()
            .table("user", RowPolicy::locked())
            .table("medium", RowPolicy::locked())
            .table(
                "message",
                RowPolicy {
                    insert: OpPolicy::Unrestricted,
                    update: OpPolicy::rule(move |auth: &AuthData, row: Option<&Row>| {
                        let id = row.and_then(|r| r.get("senderID")).cloned().unwrap_or_default();
                        sender
                            .table("user")
                            .where_eq("id", auth.sub.as_str())
                            .where_eq("id", id)
                    }),
                    delete: OpPolicy::rule(move |auth: &AuthData, _row: Option<&Row>| {
                        member.table("user").where_eq("id", auth.sub.as_str())
                    }),
                },
            )
    })
}

fn seeded_upstream() -> Arc<MemoryUpstream> {
    let s = board(1);
    let upstream = MemoryUpstream::new(Arc::clone(&s), rules(&s));
    upstream
        .seed(
            "user",
            [
                row_from_value(json!({ "id": "u1", "name": "Dax" })),
                row_from_value(json!({ "id": "u2", "name": "Ana" })),
            ],
        )
        .unwrap();
    upstream
        .seed("medium", [row_from_value(json!({ "id": "d1", "name": "Discord" }))])
        .unwrap();
    Arc::new(upstream)
}

fn client_as(upstream: &Arc<MemoryUpstream>, user: &str) -> Client {
    client_with_schema(upstream, user, board(1))
}

fn client_with_schema(upstream: &Arc<MemoryUpstream>, user: &str, s: Arc<Schema>) -> Client {
    let mut options = ClientOptions::new(user, s);
    if user != ANON_USER_ID {
        let token = mint_unsigned_token(user);
        options.auth = Some(Arc::new(move || Some(token.clone())));
    }
    Client::new(options, upstream.clone()).unwrap()
}

fn m1() -> Value {
    json!({
        "id": "m1", "senderID": "u1", "mediumID": "d1",
        "body": "hello", "timestamp": 1000
    })
}

fn top_level(client: &Client) -> Query {
    client
        .query()
        .table("message")
        .where_eq("replyToID", Value::Null)
        .related("sender", |s| s.one())
        .related("medium", |m| m.one())
        .order_by("timestamp", SortDirection::Desc)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn inserted_post_appears_with_sender_and_medium() {
    let upstream = seeded_upstream();
    let client = client_as(&upstream, "u1");
    let feed = client.bind(top_level(&client)).unwrap();
    assert_eq!(feed.snapshot().state(), SnapshotState::Unknown);

    client.mutate("message").unwrap().insert(m1()).unwrap();
    client.sync().await;

    let snap = feed.snapshot();
    assert!(snap.complete);
    assert_eq!(snap.rows.len(), 1);
    assert_eq!(snap.rows[0]["id"], json!("m1"));
    assert_eq!(snap.rows[0]["sender"]["name"], json!("Dax"));
    assert_eq!(snap.rows[0]["medium"]["name"], json!("Discord"));
}

#[tokio::test]
async fn reply_is_listed_under_its_parent() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    let ana = client_as(&upstream, "u2");

    dax.mutate("message").unwrap().insert(m1()).unwrap();
    dax.sync().await;

    ana.mutate("message")
        .unwrap()
        .insert(json!({
            "id": "m2", "senderID": "u2", "mediumID": "d1",
            "body": "hi", "timestamp": 1500, "replyToID": "m1"
        }))
        .unwrap();
    ana.sync().await;
    dax.sync().await;

    let thread = dax
        .run(
            &dax.query()
                .table("message")
                .where_eq("id", "m1")
                .related("replies", |r| r.order_by("timestamp", SortDirection::Asc)),
        )
        .unwrap();
    let replies = thread.rows[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0]["id"], json!("m2"));

    // Replies are not top-level posts.
    assert_eq!(dax.run(&top_level(&dax)).unwrap().rows.len(), 1);
}

#[tokio::test]
async fn edit_by_non_sender_rolls_back() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    let ana = client_as(&upstream, "u2");

    dax.mutate("message").unwrap().insert(m1()).unwrap();
    dax.sync().await;
    ana.sync().await;

    let binding = ana
        .bind(ana.query().table("message").where_eq("id", "m1"))
        .unwrap();
    let receipt = ana
        .mutate("message")
        .unwrap()
        .update(json!({ "id": "m1", "body": "edited" }))
        .unwrap();
    assert_eq!(binding.snapshot().rows[0]["body"], json!("edited"));

    let result = ana.sync().await;
    assert_eq!(result.rejected, 1);
    assert_eq!(result.errors[0].kind, SyncErrorKind::Permanent);
    assert!(matches!(receipt.outcome().await.unwrap(), MutationOutcome::Rejected { .. }));
    assert_eq!(binding.snapshot().rows[0]["body"], json!("hello"));

    let authoritative = upstream
        .row("message", &row_from_value(json!({ "id": "m1" })))
        .unwrap();
    assert_eq!(authoritative["body"], json!("hello"));
}

#[tokio::test]
async fn sender_may_edit_their_own_post() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    dax.mutate("message").unwrap().insert(m1()).unwrap();
    let receipt = dax
        .mutate("message")
        .unwrap()
        .update(json!({ "id": "m1", "body": "edited" }))
        .unwrap();

    let result = dax.sync().await;
    assert!(result.is_ok());
    assert_eq!(receipt.outcome().await.unwrap(), MutationOutcome::Applied);
    let row = dax
        .run(&dax.query().table("message").where_eq("id", "m1").one())
        .unwrap();
    assert_eq!(row.one().unwrap()["body"], json!("edited"));
}

// ============================================================================
// Authorization
// ============================================================================

#[tokio::test]
async fn anonymous_delete_is_denied() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    dax.mutate("message").unwrap().insert(m1()).unwrap();
    dax.sync().await;

    let anon = client_as(&upstream, ANON_USER_ID);
    assert!(anon.is_anonymous());
    anon.sync().await;
    anon.mutate("message")
        .unwrap()
        .delete(json!({ "id": "m1" }))
        .unwrap();
    let result = anon.sync().await;
    assert_eq!(result.rejected, 1);
    assert_eq!(anon.run(&top_level(&anon)).unwrap().rows.len(), 1);
}

#[tokio::test]
async fn seeded_tables_are_read_only() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    dax.mutate("user")
        .unwrap()
        .update(json!({ "id": "u1", "name": "Mallory" }))
        .unwrap();
    let result = dax.sync().await;
    assert_eq!(result.rejected, 1);
    let row = upstream
        .row("user", &row_from_value(json!({ "id": "u1" })))
        .unwrap();
    assert_eq!(row["name"], json!("Dax"));
}

// ============================================================================
// Transport behavior
// ============================================================================

#[tokio::test]
async fn pulls_are_incremental_after_the_first() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");

    let first = dax.sync().await;
    assert_eq!(first.pulled, 3);

    let ana = client_as(&upstream, "u2");
    ana.mutate("message").unwrap().insert(m1()).unwrap();
    ana.sync().await;

    let second = dax.sync().await;
    assert_eq!(second.pulled, 1);
    assert_eq!(dax.run(&top_level(&dax)).unwrap().rows.len(), 1);
}

#[tokio::test]
async fn offline_upstream_keeps_mutations_pending() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    upstream.set_offline(true);

    dax.mutate("message").unwrap().insert(m1()).unwrap();
    let result = dax.sync().await;
    assert_eq!(result.errors.len(), 2);
    assert!(result.errors.iter().all(|e| e.kind == SyncErrorKind::Transient));
    assert_eq!(result.errors[1].phase, SyncPhase::Pull);
    assert_eq!(dax.pending_count(), 1);
    assert_eq!(dax.run(&top_level(&dax)).unwrap().rows.len(), 1);

    upstream.set_offline(false);
    assert!(dax.sync().await.is_ok());
    assert_eq!(dax.pending_count(), 0);
    assert_eq!(upstream.rows("message").len(), 1);
}

#[tokio::test]
async fn schema_version_mismatch_is_permanent() {
    let upstream = seeded_upstream();
    let stale = client_with_schema(&upstream, "u1", board(2));
    stale.mutate("message").unwrap().insert(m1()).unwrap();

    let result = stale.sync().await;
    assert_eq!(result.errors[0].phase, SyncPhase::Push);
    assert_eq!(result.errors[0].kind, SyncErrorKind::Permanent);
    assert!(upstream.rows("message").is_empty());
}

#[tokio::test]
async fn clients_converge_after_sync() {
    let upstream = seeded_upstream();
    let dax = client_as(&upstream, "u1");
    let ana = client_as(&upstream, "u2");

    dax.mutate("message").unwrap().insert(m1()).unwrap();
    ana.mutate("message")
        .unwrap()
        .insert(json!({
            "id": "m9", "senderID": "u2", "mediumID": "d1",
            "body": "later", "timestamp": 2000
        }))
        .unwrap();

    dax.sync().await;
    ana.sync().await;
    dax.sync().await;

    let a = dax.run(&top_level(&dax)).unwrap();
    let b = ana.run(&top_level(&ana)).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.rows.len(), 2);
    assert_eq!(a.rows[0]["id"], json!("m9"));

    // Nothing else to do: further cycles are stable.
    dax.sync().await;
    assert_eq!(dax.run(&top_level(&dax)).unwrap(), a);
}

#[tokio::test]
async fn inserts_from_many_threads_all_reach_the_authority() {
    let upstream = seeded_upstream();
    let dax = Arc::new(client_as(&upstream, "u1"));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let dax = Arc::clone(&dax);
            std::thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        dax.mutate("message")
                            .unwrap()
                            .insert(json!({
                                "id": format!("t{t}-{i}"), "senderID": "u1", "mediumID": "d1",
                                "body": "hi", "timestamp": i
                            }))
                            .unwrap()
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();
    let receipts: Vec<_> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    assert_eq!(dax.pending_count(), 400);

    assert!(dax.sync().await.is_ok());
    assert_eq!(upstream.rows("message").len(), 400);
    assert_eq!(dax.pending_count(), 0);
    assert_eq!(dax.run(&top_level(&dax)).unwrap().rows.len(), 400);
    for receipt in receipts {
        assert_eq!(receipt.outcome().await.unwrap(), MutationOutcome::Applied);
    }
}
