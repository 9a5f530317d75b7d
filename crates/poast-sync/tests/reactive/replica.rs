//! ReactiveReplica: initial delivery, change-only redelivery, teardown and
//! the unknown/empty/populated tri-state.

use std::sync::Arc;

use parking_lot::Mutex;
use poast_sync::mutate::MutationKind;
use poast_sync::query::{QueryFactory, SortDirection};
use poast_sync::reactive::{ChangeEvent, ReactiveReplica, Snapshot, SnapshotState};
use poast_sync::schema::{schema, t, table, Relationship, Schema};
use poast_sync::storage::{MemoryBackend, Replica};
use poast_sync::types::{row_from_value, RowChange};
use serde_json::{json, Value};

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
                    .relationship("sender", Relationship::new("senderID", "user", "id"))
                    .build(),
            )
            .build()
            .unwrap(),
    )
}

fn make_replica() -> (ReactiveReplica, QueryFactory) {
    let s = board();
    let replica = Replica::open(Box::new(MemoryBackend::new()), Arc::clone(&s)).unwrap();
    (ReactiveReplica::new(replica), QueryFactory::new(s))
}

fn make_log<T: Clone + Send + 'static>() -> Arc<Mutex<Vec<T>>> {
    Arc::new(Mutex::new(Vec::new()))
}

fn local(replica: &ReactiveReplica, table: &str, kind: MutationKind, row: Value) -> u64 {
    let (id, ()) = replica
        .apply_new(table, kind, row_from_value(row), |_| ())
        .unwrap();
    id
}

fn put(table: &str, row: Value) -> RowChange {
    RowChange::Put {
        table: table.into(),
        row: row_from_value(row),
    }
}

// ============================================================================
// observe_query
// ============================================================================

#[test]
fn initial_snapshot_is_delivered_synchronously_and_unknown() {
    let (replica, q) = make_replica();
    let calls: Arc<Mutex<Vec<Snapshot>>> = make_log();
    let c = Arc::clone(&calls);

    let _sub = replica
        .observe_query(q.table("message"), move |s| c.lock().push(s.clone()))
        .unwrap();

    let calls = calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].state(), SnapshotState::Unknown);
}

#[test]
fn local_write_redelivers_only_affected_queries() {
    let (replica, q) = make_replica();
    let messages: Arc<Mutex<Vec<Snapshot>>> = make_log();
    let users: Arc<Mutex<Vec<Snapshot>>> = make_log();
    let (m, u) = (Arc::clone(&messages), Arc::clone(&users));

    let _a = replica
        .observe_query(q.table("message"), move |s| m.lock().push(s.clone()))
        .unwrap();
    let _b = replica
        .observe_query(q.table("user"), move |s| u.lock().push(s.clone()))
        .unwrap();

    local(
        &replica,
        "message",
        MutationKind::Insert,
        json!({ "id": "m1", "senderID": "u1", "body": "hello" }),
    );

    assert_eq!(messages.lock().len(), 2);
    assert_eq!(messages.lock()[1].rows[0]["body"], json!("hello"));
    assert_eq!(users.lock().len(), 1);
}

#[test]
fn relationship_tables_invalidate_the_root_query() {
    let (replica, q) = make_replica();
    let binding = replica
        .bind(q.table("message").related("sender", |s| s.one()))
        .unwrap();

    local(
        &replica,
        "message",
        MutationKind::Insert,
        json!({ "id": "m1", "senderID": "u1", "body": "hello" }),
    );
    assert_eq!(binding.snapshot().rows[0]["sender"], Value::Null);

    replica
        .apply_remote(&[put("user", json!({ "id": "u1", "name": "Dax" }))], false, 0, "1")
        .unwrap();
    assert_eq!(binding.snapshot().rows[0]["sender"]["name"], json!("Dax"));
}

#[test]
fn unchanged_results_are_not_redelivered() {
    let (replica, q) = make_replica();
    let binding = replica
        .bind(q.table("message").order_by("body", SortDirection::Asc))
        .unwrap();
    replica.apply_remote(&[], false, 0, "1").unwrap();
    let version = binding.version();

    // A user row cannot change a plain message query.
    replica
        .apply_remote(&[put("user", json!({ "id": "u1", "name": "Dax" }))], false, 0, "2")
        .unwrap();
    assert_eq!(binding.version(), version);
}

#[test]
fn unsubscribe_and_drop_release_the_subscription() {
    let (replica, q) = make_replica();
    let calls: Arc<Mutex<Vec<Snapshot>>> = make_log();
    let c = Arc::clone(&calls);

    let sub = replica
        .observe_query(q.table("message"), move |s| c.lock().push(s.clone()))
        .unwrap();
    let binding = replica.bind(q.table("message")).unwrap();
    assert_eq!(replica.subscription_count(), 2);

    sub.unsubscribe();
    drop(binding);
    assert_eq!(replica.subscription_count(), 0);

    local(
        &replica,
        "message",
        MutationKind::Insert,
        json!({ "id": "m1", "senderID": "u1", "body": "hello" }),
    );
    assert_eq!(calls.lock().len(), 1);
}

#[test]
fn invalid_descriptor_is_rejected_before_subscribing() {
    let (replica, q) = make_replica();
    assert!(replica.bind(q.table("message").where_eq("nope", 1)).is_err());
    assert_eq!(replica.subscription_count(), 0);
}

// ============================================================================
// Tri-state and reconciliation
// ============================================================================

#[test]
fn first_pull_turns_unknown_into_empty() {
    let (replica, q) = make_replica();
    let binding = replica.bind(q.table("message")).unwrap();
    assert_eq!(binding.snapshot().state(), SnapshotState::Unknown);

    replica.apply_remote(&[], true, 0, "0").unwrap();
    assert_eq!(binding.snapshot().state(), SnapshotState::Empty);
}

#[test]
fn rollback_restores_the_confirmed_value() {
    let (replica, q) = make_replica();
    replica
        .apply_remote(
            &[put("message", json!({ "id": "m1", "senderID": "u1", "body": "hello" }))],
            true,
            0,
            "1",
        )
        .unwrap();
    let binding = replica.bind(q.table("message")).unwrap();

    let id = local(
        &replica,
        "message",
        MutationKind::Update,
        json!({ "id": "m1", "body": "edited" }),
    );
    assert_eq!(binding.snapshot().rows[0]["body"], json!("edited"));

    let removed = replica.rollback(id, "denied").unwrap();
    assert!(removed.is_some());
    assert_eq!(binding.snapshot().rows[0]["body"], json!("hello"));
    assert!(replica.rollback(id, "denied").unwrap().is_none());
}

#[test]
fn change_events_describe_each_step() {
    let (replica, _q) = make_replica();
    let events: Arc<Mutex<Vec<ChangeEvent>>> = make_log();
    let e = Arc::clone(&events);
    let _sub = replica.on_change(move |ev| e.lock().push(ev.clone()));

    let id = local(
        &replica,
        "message",
        MutationKind::Insert,
        json!({ "id": "m1", "senderID": "u1", "body": "hello" }),
    );
    replica
        .apply_remote(
            &[put("message", json!({ "id": "m1", "senderID": "u1", "body": "hello" }))],
            false,
            id,
            "1",
        )
        .unwrap();

    let events = events.lock();
    assert!(matches!(events[0], ChangeEvent::Local { mutation_id, .. } if mutation_id == id));
    assert_eq!(
        events[1],
        ChangeEvent::Remote {
            table: "message".into(),
            changes: 1
        }
    );
    assert_eq!(events[2], ChangeEvent::Confirmed { mutation_ids: vec![id] });
    assert_eq!(events[3], ChangeEvent::Complete);
    assert_eq!(replica.pending_count(), 0);
}

#[test]
fn table_scoped_change_listener_ignores_other_tables() {
    let (replica, _q) = make_replica();
    let events: Arc<Mutex<Vec<ChangeEvent>>> = make_log();
    let e = Arc::clone(&events);
    let sub = replica.on_table_change("user", move |ev| e.lock().push(ev.clone()));

    local(
        &replica,
        "message",
        MutationKind::Insert,
        json!({ "id": "m1", "senderID": "u1", "body": "hello" }),
    );
    assert!(events.lock().is_empty());

    local(&replica, "user", MutationKind::Insert, json!({ "id": "u1", "name": "Dax" }));
    assert_eq!(events.lock().len(), 1);

    sub.unsubscribe();
    local(&replica, "user", MutationKind::Insert, json!({ "id": "u2", "name": "Ana" }));
    assert_eq!(events.lock().len(), 1);
}

// ============================================================================
// Concurrent writers
// ============================================================================

fn insert_from_threads(replica: &Arc<ReactiveReplica>, round: usize, threads: usize, per_thread: usize) {
    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let replica = Arc::clone(replica);
            std::thread::spawn(move || {
                for i in 0..per_thread {
                    local(
                        &replica,
                        "message",
                        MutationKind::Insert,
                        json!({ "id": format!("r{round}-t{t}-{i}"), "senderID": "u1", "body": "hi" }),
                    );
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn concurrent_writers_keep_the_pending_log_in_id_order() {
    let (replica, _q) = make_replica();
    let replica = Arc::new(replica);

    insert_from_threads(&replica, 0, 8, 50);

    let ids: Vec<u64> = replica.pending().iter().map(|m| m.id).collect();
    assert_eq!(ids.len(), 400);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "pending log out of order");
}

#[test]
fn binding_settles_on_the_latest_snapshot_under_concurrent_writes() {
    let (replica, q) = make_replica();
    let replica = Arc::new(replica);
    let query = q.table("message").order_by("id", SortDirection::Asc);
    let binding = replica.bind(query.clone()).unwrap();

    for round in 0..10 {
        insert_from_threads(&replica, round, 8, 20);
        assert_eq!(binding.snapshot(), replica.query_once(&query).unwrap());
    }
    assert_eq!(binding.snapshot().len(), 10 * 8 * 20);
}
