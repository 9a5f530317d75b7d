//! TableMutator: local validation, optimistic apply and receipts.

use std::sync::Arc;

use poast_sync::auth::AuthorizationConfig;
use poast_sync::error::{MutationError, SyncClientError};
use poast_sync::identity::mint_unsigned_token;
use poast_sync::mutate::MutationOutcome;
use poast_sync::reactive::SnapshotState;
use poast_sync::schema::{schema, t, table, Schema};
use poast_sync::upstream::MemoryUpstream;
use poast_sync::{Client, ClientOptions};
use serde_json::json;

// ============================================================================
// Helpers
// ============================================================================

fn notes() -> Arc<Schema> {
    Arc::new(
        schema(1)
            .table(
                table("note")
                    .column("id", t::string())
                    .column("title", t::string())
                    .column("stars", t::number())
                    .column("tag", t::optional(t::string()))
                    .primary_key(&["id"])
                    .build(),
            )
            .build()
            .unwrap(),
    )
}

fn make_client() -> (Client, Arc<MemoryUpstream>) {
    let s = notes();
    let upstream = Arc::new(MemoryUpstream::new(Arc::clone(&s), AuthorizationConfig::new()));
    let mut options = ClientOptions::new("u1", s);
    let token = mint_unsigned_token("u1");
    options.auth = Some(Arc::new(move || Some(token.clone())));
    let client = Client::new(options, upstream.clone()).unwrap();
    (client, upstream)
}

fn is_invalid_row(err: &SyncClientError) -> bool {
    matches!(err, SyncClientError::Mutation(MutationError::InvalidRow { .. }))
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn unknown_table_fails_loudly() {
    let (client, _) = make_client();
    assert!(matches!(
        client.mutate("nope"),
        Err(SyncClientError::Mutation(MutationError::UnknownTable(_)))
    ));
}

#[test]
fn insert_requires_every_required_column() {
    let (client, _) = make_client();
    let notes = client.mutate("note").unwrap();

    let err = notes.insert(json!({ "id": "n1", "title": "x" })).unwrap_err();
    assert!(is_invalid_row(&err));
    let err = notes
        .insert(json!({ "id": "n1", "title": "x", "stars": "many" }))
        .unwrap_err();
    assert!(is_invalid_row(&err));
    let err = notes
        .insert(json!({ "id": "n1", "title": "x", "stars": 1, "extra": true }))
        .unwrap_err();
    assert!(is_invalid_row(&err));
    assert!(is_invalid_row(&notes.insert(json!("n1")).unwrap_err()));
    assert_eq!(client.pending_count(), 0);
}

#[test]
fn update_and_delete_need_only_the_key() {
    let (client, _) = make_client();
    let notes = client.mutate("note").unwrap();

    assert!(is_invalid_row(&notes.update(json!({ "title": "x" })).unwrap_err()));
    assert!(is_invalid_row(&notes.delete(json!({})).unwrap_err()));
    notes.update(json!({ "id": "n1", "stars": 3 })).unwrap();
    notes.delete(json!({ "id": "n1" })).unwrap();
    assert_eq!(client.pending_count(), 2);
}

// ============================================================================
// Optimistic apply
// ============================================================================

#[test]
fn mutations_apply_before_any_sync() {
    let (client, _) = make_client();
    let binding = client.bind(client.query().table("note")).unwrap();
    let notes = client.mutate("note").unwrap();

    notes.create(json!({ "id": "n1", "title": "first", "stars": 1 })).unwrap();
    let snap = binding.snapshot();
    assert_eq!(snap.state(), SnapshotState::Populated);
    assert_eq!(snap.rows[0]["tag"], json!(null), "absent optional columns are filled");

    notes.update(json!({ "id": "n1", "stars": 5 })).unwrap();
    let row = binding.snapshot().rows[0].clone();
    assert_eq!(row["stars"], json!(5));
    assert_eq!(row["title"], json!("first"), "update leaves other columns alone");

    notes.delete(json!({ "id": "n1" })).unwrap();
    assert!(binding.snapshot().rows.is_empty());
}

#[tokio::test]
async fn receipts_report_the_authoritative_outcome() {
    let (client, upstream) = make_client();
    let notes = client.mutate("note").unwrap();

    let applied = notes
        .insert(json!({ "id": "n1", "title": "first", "stars": 1 }))
        .unwrap();
    let duplicate = notes
        .insert(json!({ "id": "n1", "title": "again", "stars": 2 }))
        .unwrap();
    let missing = notes.update(json!({ "id": "ghost", "stars": 2 })).unwrap();

    let result = client.sync().await;
    assert_eq!(result.pushed, 1);
    assert_eq!(result.rejected, 2);

    assert_eq!(applied.outcome().await.unwrap(), MutationOutcome::Applied);
    assert!(matches!(
        duplicate.outcome().await.unwrap(),
        MutationOutcome::Rejected { reason } if reason.contains("duplicate")
    ));
    assert!(matches!(
        missing.outcome().await.unwrap(),
        MutationOutcome::Rejected { reason } if reason.contains("not found")
    ));

    assert_eq!(upstream.rows("note").len(), 1);
    assert_eq!(client.pending_count(), 0);
}

#[tokio::test]
async fn upsert_creates_then_replaces() {
    let (client, upstream) = make_client();
    let notes = client.mutate("note").unwrap();
    notes
        .upsert(json!({ "id": "n1", "title": "a", "stars": 1, "tag": "x" }))
        .unwrap();
    notes.upsert(json!({ "id": "n1", "title": "b", "stars": 2 })).unwrap();
    client.sync().await;

    let row = upstream
        .row("note", &poast_sync::types::row_from_value(json!({ "id": "n1" })))
        .unwrap();
    assert_eq!(row["title"], json!("b"));
    assert_eq!(row["tag"], json!(null));
}

#[test]
fn mutation_ids_are_unique_across_threads() {
    let (client, _upstream) = make_client();
    let client = Arc::new(client);

    let handles: Vec<_> = (0..6)
        .map(|t| {
            let client = Arc::clone(&client);
            std::thread::spawn(move || {
                (0..40)
                    .map(|i| {
                        client
                            .mutate("note")
                            .unwrap()
                            .create(json!({ "id": format!("t{t}-{i}"), "title": "x", "stars": i }))
                            .unwrap()
                            .id()
                    })
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut all = Vec::new();
    for handle in handles {
        let ids = handle.join().unwrap();
        assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids from one thread ascend");
        all.extend(ids);
    }
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), 240);
    assert_eq!(client.pending_count(), 240);
}
