//! Client: the application-facing entry point.
//!
//! Owns the local replica, the query factory, the mutation façade and the
//! sync manager. Construct one per identity with [`Client::new`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::error::{MutationError, Result};
use crate::identity::ANON_USER_ID;
use crate::mutate::{ReceiptRegistry, TableMutator};
use crate::query::{Query, QueryFactory};
use crate::reactive::{Binding, ChangeEvent, ReactiveReplica, Snapshot, Subscription};
use crate::schema::Schema;
use crate::storage::{KvStore, Replica};
use crate::sync::{AuthProvider, SyncErrorCallback, SyncHandle, SyncManager, SyncManagerOptions, SyncResult, SyncTransport};

// ============================================================================
// ClientOptions
// ============================================================================

/// Configuration for [`Client`].
pub struct ClientOptions {
    /// Acting identity; [`ANON_USER_ID`] when not logged in.
    pub user_id: String,
    /// Bearer-token provider consulted on every push.
    pub auth: Option<AuthProvider>,
    pub schema: Arc<Schema>,
    /// Where the replica lives. `Mem` discards everything on exit.
    pub kv_store: KvStore,
    /// Fixed client id; generated and persisted when `None`.
    pub client_id: Option<String>,
    /// Upstream origin, informational for transports that need it.
    pub server: Option<String>,
    /// Push batch size (`None` = default 50).
    pub push_batch_size: Option<usize>,
    pub on_sync_error: Option<Arc<SyncErrorCallback>>,
}

impl ClientOptions {
    pub fn new(user_id: impl Into<String>, schema: Arc<Schema>) -> Self {
        Self {
            user_id: user_id.into(),
            auth: None,
            schema,
            kv_store: KvStore::Mem,
            client_id: None,
            server: None,
            push_batch_size: None,
            on_sync_error: None,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct Client {
    user_id: String,
    client_id: String,
    server: Option<String>,
    kv_store: KvStore,
    query: QueryFactory,
    replica: Arc<ReactiveReplica>,
    receipts: Arc<ReceiptRegistry>,
    sync: Arc<SyncManager>,
    wakeup: Arc<Notify>,
}

impl Client {
    pub fn new(options: ClientOptions, transport: Arc<dyn SyncTransport>) -> Result<Self> {
        let backend = options.kv_store.open()?;
        let replica = Replica::open(backend, Arc::clone(&options.schema))?;

        let client_id = match options.client_id {
            Some(id) => {
                replica.set_client_id(&id)?;
                id
            }
            None => replica.client_id()?,
        };

        let replica = Arc::new(ReactiveReplica::new(replica));
        let receipts = Arc::new(ReceiptRegistry::new());
        let sync = Arc::new(SyncManager::new(SyncManagerOptions {
            transport,
            replica: Arc::clone(&replica),
            receipts: Arc::clone(&receipts),
            client_id: client_id.clone(),
            user_id: options.user_id.clone(),
            auth: options.auth,
            push_batch_size: options.push_batch_size,
            on_error: options.on_sync_error,
        }));

        tracing::info!(
            client_id = %client_id,
            user_id = %options.user_id,
            kv_store = %options.kv_store,
            pending = replica.pending_count(),
            "sync client opened"
        );

        Ok(Self {
            user_id: options.user_id,
            client_id,
            server: options.server,
            kv_store: options.kv_store,
            query: QueryFactory::new(options.schema),
            replica,
            receipts,
            sync,
            wakeup: Arc::new(Notify::new()),
        })
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == ANON_USER_ID
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    pub fn kv_store(&self) -> &KvStore {
        &self.kv_store
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// The `query.<table>` entry point.
    pub fn query(&self) -> &QueryFactory {
        &self.query
    }

    pub fn bind(&self, query: Query) -> Result<Binding> {
        self.replica.bind(query)
    }

    pub fn observe(&self, query: Query, callback: impl Fn(&Snapshot) + Send + Sync + 'static) -> Result<Subscription> {
        self.replica.observe_query(query, callback)
    }

    /// One-off read without subscribing.
    pub fn run(&self, query: &Query) -> Result<Snapshot> {
        self.replica.query_once(query)
    }

    pub fn on_change(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        self.replica.on_change(callback)
    }

    pub fn on_table_change(
        &self,
        table: &str,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        self.replica.on_table_change(table, callback)
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// The `mutate.<table>` entry point.
    pub fn mutate(&self, table: &str) -> Result<TableMutator> {
        let def = self
            .query
            .schema()
            .table(table)
            .ok_or_else(|| MutationError::UnknownTable(table.to_string()))?;
        Ok(TableMutator::new(
            Arc::clone(def),
            Arc::clone(&self.replica),
            Arc::clone(&self.receipts),
            Some(Arc::clone(&self.wakeup)),
        ))
    }

    pub fn pending_count(&self) -> usize {
        self.replica.pending_count()
    }

    // -----------------------------------------------------------------------
    // Sync
    // -----------------------------------------------------------------------

    /// Run one push + pull cycle.
    pub async fn sync(&self) -> SyncResult {
        self.sync.sync().await
    }

    /// Sync in the background after every mutation and every `interval`.
    /// Must be called inside a tokio runtime.
    pub fn spawn_sync(&self, interval: Duration) -> SyncHandle {
        SyncHandle::spawn(Arc::clone(&self.sync), Arc::clone(&self.wakeup), interval)
    }

    pub fn replica(&self) -> &Arc<ReactiveReplica> {
        &self.replica
    }

    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.sync
    }
}
