//! Board: a sync client wired to a seeded in-process authority.

use std::sync::Arc;

use poast_sync::query::SortDirection;
use poast_sync::storage::KvStore;
use poast_sync::sync::{SyncPhase, SyncResult};
use poast_sync::upstream::MemoryUpstream;
use poast_sync::{Client, ClientOptions};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{PoastError, Result};
use crate::feed::{self, FeedFilter};
use crate::login::Session;
use crate::models::{Medium, Message, User};
use crate::rules::poast_authorization;
use crate::schema::poast_schema;
use crate::seed::seed_upstream;

pub struct Board {
    client: Client,
    upstream: Arc<MemoryUpstream>,
}

impl Board {
    pub fn open(session: &Session, kv_store: KvStore, server: Option<String>) -> Result<Self> {
        let schema = poast_schema()?;
        let upstream = Arc::new(MemoryUpstream::new(
            Arc::clone(&schema),
            poast_authorization(&schema),
        ));
        seed_upstream(&upstream)?;

        let mut options = ClientOptions::new(session.user_id(), schema);
        options.auth = session.auth_provider();
        options.kv_store = kv_store;
        options.server = server;
        let client = Client::new(options, upstream.clone())?;

        Ok(Self { client, upstream })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn upstream(&self) -> &Arc<MemoryUpstream> {
        &self.upstream
    }

    /// One push + pull cycle. Failures are logged and returned, not raised.
    pub async fn sync(&self) -> SyncResult {
        let result = self.client.sync().await;
        for e in &result.errors {
            let phase = match e.phase {
                SyncPhase::Push => "push",
                SyncPhase::Pull => "pull",
            };
            tracing::warn!(phase, table = ?e.table, mutation_id = ?e.mutation_id, error = %e.error, "sync error");
        }
        result
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    fn decode<T: DeserializeOwned>(&self, query: poast_sync::query::Query) -> Result<Vec<T>> {
        Ok(self.client.run(&query)?.decode()?)
    }

    pub fn users(&self) -> Result<Vec<User>> {
        self.decode(self.client.query().table("user"))
    }

    pub fn mediums(&self) -> Result<Vec<Medium>> {
        self.decode(self.client.query().table("medium"))
    }

    pub fn messages(&self) -> Result<Vec<Message>> {
        self.decode(feed::all_messages_query(self.client.query()))
    }

    /// Top-level posts, oldest first.
    pub fn posts(&self) -> Result<Vec<Message>> {
        self.decode(
            self.client
                .query()
                .table("message")
                .where_eq("replyToID", Value::Null)
                .order_by("timestamp", SortDirection::Asc),
        )
    }

    pub fn message(&self, id: &str) -> Result<Message> {
        self.decode::<Message>(self.client.query().table("message").where_eq("id", id).one())?
            .into_iter()
            .next()
            .ok_or_else(|| PoastError::UnknownMessage(id.to_string()))
    }

    /// Name of the acting user, or `anon`.
    pub fn display_name(&self) -> Result<String> {
        let id = self.client.user_id();
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.id == id)
            .map(|u| u.name)
            .unwrap_or_else(|| poast_sync::identity::ANON_USER_ID.to_string()))
    }

    /// Accept a user name or id for the "From" filter.
    pub fn resolve_sender(&self, name_or_id: &str) -> Result<String> {
        Ok(self
            .users()?
            .into_iter()
            .find(|u| u.name.eq_ignore_ascii_case(name_or_id))
            .map(|u| u.id)
            .unwrap_or_else(|| name_or_id.to_string()))
    }

    // -----------------------------------------------------------------------
    // Views
    // -----------------------------------------------------------------------

    pub fn render_feed(&self, filter: &FeedFilter) -> Result<Option<String>> {
        let q = self.client.query();
        let snapshot = self.client.run(&feed::feed_query(q, filter))?;
        let total = self.client.run(&feed::all_messages_query(q))?.len();
        feed::render_feed(&snapshot, total, filter, feed::format_timestamp)
    }

    pub fn render_threads(&self) -> Result<Option<String>> {
        let snapshot = self.client.run(&feed::threads_query(self.client.query()))?;
        feed::render_threads(&snapshot, feed::format_timestamp)
    }
}
