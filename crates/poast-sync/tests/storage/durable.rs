//! Durable replicas survive a restart.

use std::path::Path;
use std::sync::Arc;

use poast_sync::auth::AuthorizationConfig;
use poast_sync::schema::{schema, t, table, Schema};
use poast_sync::storage::KvStore;
use poast_sync::upstream::MemoryUpstream;
use poast_sync::{Client, ClientOptions};
use serde_json::json;

fn notes() -> Arc<Schema> {
    Arc::new(
        schema(1)
            .table(
                table("note")
                    .column("id", t::string())
                    .column("title", t::string())
                    .primary_key(&["id"])
                    .build(),
            )
            .build()
            .unwrap(),
    )
}

fn open(path: &Path, upstream: &Arc<MemoryUpstream>) -> Client {
    let mut options = ClientOptions::new("u1", notes());
    options.kv_store = KvStore::Sqlite(path.to_path_buf());
    Client::new(options, upstream.clone()).unwrap()
}

#[tokio::test]
async fn pending_mutations_and_client_id_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replica.db");
    let upstream = Arc::new(MemoryUpstream::new(notes(), AuthorizationConfig::new()));
    upstream.set_offline(true);

    let client_id = {
        let client = open(&path, &upstream);
        client
            .mutate("note")
            .unwrap()
            .insert(json!({ "id": "n1", "title": "draft" }))
            .unwrap();
        client.sync().await;
        assert_eq!(client.pending_count(), 1);
        client.client_id().to_string()
    };

    upstream.set_offline(false);
    let client = open(&path, &upstream);
    assert_eq!(client.client_id(), client_id);
    assert_eq!(client.pending_count(), 1);

    assert!(client.sync().await.is_ok());
    assert_eq!(client.pending_count(), 0);
    assert_eq!(upstream.rows("note").len(), 1);
    assert_eq!(upstream.last_mutation_id(&client_id), 1);
}

#[tokio::test]
async fn confirmed_rows_and_mutation_ids_persist() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replica.db");
    let upstream = Arc::new(MemoryUpstream::new(notes(), AuthorizationConfig::new()));

    {
        let client = open(&path, &upstream);
        client
            .mutate("note")
            .unwrap()
            .insert(json!({ "id": "n1", "title": "kept" }))
            .unwrap();
        assert!(client.sync().await.is_ok());
    }

    let client = open(&path, &upstream);
    let snap = client.run(&client.query().table("note")).unwrap();
    assert_eq!(snap.rows[0]["title"], json!("kept"));

    // A fresh id, not a reused one, or the authority would treat it as a retry.
    let receipt = client
        .mutate("note")
        .unwrap()
        .insert(json!({ "id": "n2", "title": "second" }))
        .unwrap();
    assert_eq!(receipt.id(), 2);
    client.sync().await;
    assert_eq!(upstream.rows("note").len(), 2);
}

#[test]
fn kv_store_strings_parse() {
    assert_eq!("mem".parse::<KvStore>().unwrap(), KvStore::Mem);
    assert_eq!(
        "sqlite:/tmp/x.db".parse::<KvStore>().unwrap(),
        KvStore::Sqlite("/tmp/x.db".into())
    );
    assert!("redis://".parse::<KvStore>().is_err());
}
