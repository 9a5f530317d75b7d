//! ReactiveReplica: wraps [`Replica`] with query subscriptions that are
//! notified synchronously whenever the rows they read change.
//!
//! # Threading model
//!
//! `ReactiveReplica` is `Send + Sync`. Three independent locks are used:
//!   - `inner`: the wrapped `Replica` (`parking_lot::Mutex`).
//!   - `state`: subscription bookkeeping (`Arc<Mutex<..>>`; cloned into
//!     unsubscribe closures).
//!   - `changes`: the [`ChangeFeed`], which releases its own lock before
//!     firing listeners.
//!
//! `inner` and `state` are never held at the same time, and neither is held
//! while a callback runs, so callbacks may re-enter the replica. Each
//! subscription also has a reentrant delivery lock, always taken before
//! `inner`.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};

use crate::error::{Result, SyncClientError};
use crate::mutate::{Mutation, MutationId, MutationKind};
use crate::query::{materialize, referenced_tables, Query};
use crate::schema::Schema;
use crate::storage::Replica;
use crate::types::{Row, RowChange};

use super::binding::{Binding, Subscription};
use super::event::ChangeEvent;
use super::change_feed::{ChangeFeed, ListenerId};
use super::snapshot::Snapshot;

pub type SnapshotCallback = Arc<dyn Fn(&Snapshot) + Send + Sync>;
pub type ErrorCallback = Arc<dyn Fn(&SyncClientError) + Send + Sync>;

// ============================================================================
// Subscription state
// ============================================================================

struct QuerySub {
    id: u64,
    query: Query,
    tables: BTreeSet<String>,
    callback: SnapshotCallback,
    on_error: Option<ErrorCallback>,
    /// Last delivered snapshot; redelivery is skipped when unchanged. Held
    /// from materialization through delivery, so flushes racing on other
    /// threads deliver in the order they read the replica. Reentrant so a
    /// callback may write back into the replica.
    last: ReentrantMutex<RefCell<Option<Snapshot>>>,
}

#[derive(Default)]
struct ReactiveState {
    query_subs: Vec<Arc<QuerySub>>,
    dirty: Vec<Arc<QuerySub>>,
    next_id: u64,
}

impl ReactiveState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn push_dirty(&mut self, sub: &Arc<QuerySub>) {
        if !self.dirty.iter().any(|s| s.id == sub.id) {
            self.dirty.push(Arc::clone(sub));
        }
    }

    /// Mark every subscription reading any of `tables` dirty.
    fn mark_tables(&mut self, tables: &BTreeSet<String>) {
        let hits: Vec<Arc<QuerySub>> = self
            .query_subs
            .iter()
            .filter(|s| !s.tables.is_disjoint(tables))
            .cloned()
            .collect();
        for sub in &hits {
            self.push_dirty(sub);
        }
    }

    fn mark_all(&mut self) {
        let all: Vec<Arc<QuerySub>> = self.query_subs.clone();
        for sub in &all {
            self.push_dirty(sub);
        }
    }
}

// ============================================================================
// ReactiveReplica
// ============================================================================

pub struct ReactiveReplica {
    inner: Mutex<Replica>,
    state: Arc<Mutex<ReactiveState>>,
    changes: Arc<ChangeFeed>,
}

impl ReactiveReplica {
    pub fn new(replica: Replica) -> Self {
        Self {
            inner: Mutex::new(replica),
            state: Arc::new(Mutex::new(ReactiveState::default())),
            changes: Arc::new(ChangeFeed::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn schema(&self) -> Arc<Schema> {
        Arc::clone(self.inner.lock().schema())
    }

    pub fn is_complete(&self) -> bool {
        self.inner.lock().is_complete()
    }

    pub fn client_id(&self) -> Result<String> {
        self.inner.lock().client_id()
    }

    pub fn cookie(&self) -> Result<Option<String>> {
        self.inner.lock().cookie()
    }

    pub fn pending(&self) -> Vec<Mutation> {
        self.inner.lock().pending().to_vec()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending().len()
    }

    /// Materialize `query` once without subscribing.
    pub fn query_once(&self, query: &Query) -> Result<Snapshot> {
        let inner = self.inner.lock();
        Ok(Snapshot {
            rows: materialize(query, &*inner)?,
            complete: inner.is_complete(),
        })
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Subscribe to `query`. The initial snapshot is delivered before this
    /// returns; later snapshots are delivered only when they differ.
    pub fn observe_query(
        &self,
        query: Query,
        callback: impl Fn(&Snapshot) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        self.observe_query_with(query, Arc::new(callback), None)
    }

    /// [`observe_query`](Self::observe_query) with an error callback for
    /// failed re-materializations. Without one, failures are logged.
    pub fn observe_query_with(
        &self,
        query: Query,
        callback: SnapshotCallback,
        on_error: Option<ErrorCallback>,
    ) -> Result<Subscription> {
        query.validate()?;
        let tables = referenced_tables(&query);

        let sub_id = {
            let mut st = self.state.lock();
            let id = st.next_id();
            let sub = Arc::new(QuerySub {
                id,
                query,
                tables,
                callback,
                on_error,
                last: ReentrantMutex::new(RefCell::new(None)),
            });
            st.query_subs.push(Arc::clone(&sub));
            st.push_dirty(&sub);
            id
        };

        self.flush();

        let state = Arc::clone(&self.state);
        Ok(Subscription::new(Box::new(move || {
            let mut st = state.lock();
            st.query_subs.retain(|s| s.id != sub_id);
            st.dirty.retain(|s| s.id != sub_id);
        })))
    }

    /// Bind `query` and keep the latest snapshot in the returned handle.
    pub fn bind(&self, query: Query) -> Result<Binding> {
        let current = Arc::new(Mutex::new(Snapshot::unknown()));
        let version = Arc::new(AtomicU64::new(0));

        let subscription = {
            let current = Arc::clone(&current);
            let version = Arc::clone(&version);
            self.observe_query(query, move |snapshot| {
                *current.lock() = snapshot.clone();
                version.fetch_add(1, Ordering::AcqRel);
            })?
        };

        Ok(Binding::new(current, version, subscription))
    }

    pub fn on_change(&self, callback: impl Fn(&ChangeEvent) + Send + Sync + 'static) -> Subscription {
        let listener_id = self.changes.listen(callback);
        self.change_subscription(listener_id)
    }

    /// Like [`on_change`](Self::on_change), limited to events for `table`
    /// and the table-less `Confirmed`/`Complete` events.
    pub fn on_table_change(
        &self,
        table: &str,
        callback: impl Fn(&ChangeEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let listener_id = self.changes.listen_table(table, callback);
        self.change_subscription(listener_id)
    }

    fn change_subscription(&self, listener_id: ListenerId) -> Subscription {
        let changes = Arc::clone(&self.changes);
        Subscription::new(Box::new(move || changes.remove(listener_id)))
    }

    /// Number of live query subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().query_subs.len()
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Allocate the next mutation id, apply the mutation optimistically and
    /// notify affected subscribers. `on_id` runs with the new id before the
    /// lock is released, so a sync on another thread cannot push the entry
    /// before `on_id` has run.
    ///
    /// Allocation and the append happen under one lock: the pending log is
    /// always in ascending id order, even with writers on several threads.
    pub fn apply_new<R>(
        &self,
        table: &str,
        kind: MutationKind,
        row: Row,
        on_id: impl FnOnce(MutationId) -> R,
    ) -> Result<(MutationId, R)> {
        let (mutation_id, out) = {
            let mut inner = self.inner.lock();
            let mutation_id = inner.next_mutation_id()?;
            let out = on_id(mutation_id);
            inner.add_pending(Mutation {
                id: mutation_id,
                table: table.to_string(),
                kind,
                row,
            })?;
            (mutation_id, out)
        };
        tracing::debug!(table, mutation_id, kind = kind.as_str(), "applied optimistic mutation");

        self.emit_event(ChangeEvent::Local {
            table: table.to_string(),
            kind,
            mutation_id,
        });
        self.mark_tables(BTreeSet::from([table.to_string()]));
        self.flush();
        Ok((mutation_id, out))
    }

    /// Remove a rejected mutation's effect.
    pub fn rollback(&self, mutation_id: MutationId, reason: &str) -> Result<Option<Mutation>> {
        let removed = self.inner.lock().drop_pending(mutation_id)?;
        let Some(mutation) = removed else {
            return Ok(None);
        };
        tracing::warn!(table = %mutation.table, mutation_id, reason, "rolled back rejected mutation");

        self.emit_event(ChangeEvent::Rollback {
            table: mutation.table.clone(),
            mutation_id,
            reason: reason.to_string(),
        });
        self.mark_tables(BTreeSet::from([mutation.table.clone()]));
        self.flush();
        Ok(Some(mutation))
    }

    /// Reconcile a pull: apply the authoritative patch, drop pending entries
    /// up to `last_mutation_id`, store the cookie and mark the replica
    /// complete. Returns the ids of the confirmed mutations.
    pub fn apply_remote(
        &self,
        patch: &[RowChange],
        reset: bool,
        last_mutation_id: MutationId,
        cookie: &str,
    ) -> Result<Vec<MutationId>> {
        let (touched, confirmed, newly_complete) = {
            let mut inner = self.inner.lock();
            let touched = inner.apply_patch(patch, reset)?;
            let confirmed = inner.drop_pending_through(last_mutation_id)?;
            inner.set_cookie(cookie)?;
            let newly_complete = !inner.is_complete();
            inner.mark_complete();
            (touched, confirmed, newly_complete)
        };

        for table in &touched {
            let changes = patch.iter().filter(|c| c.table() == table).count();
            self.emit_event(ChangeEvent::Remote {
                table: table.clone(),
                changes,
            });
        }
        let confirmed_ids: Vec<MutationId> = confirmed.iter().map(|m| m.id).collect();
        if !confirmed_ids.is_empty() {
            tracing::debug!(count = confirmed_ids.len(), last_mutation_id, "confirmed pending mutations");
            self.emit_event(ChangeEvent::Confirmed {
                mutation_ids: confirmed_ids.clone(),
            });
        }
        if newly_complete {
            self.emit_event(ChangeEvent::Complete);
        }

        if newly_complete {
            self.state.lock().mark_all();
        } else {
            let mut tables = touched;
            tables.extend(confirmed.into_iter().map(|m| m.table));
            self.mark_tables(tables);
        }
        self.flush();
        Ok(confirmed_ids)
    }

    // -----------------------------------------------------------------------
    // Flush
    // -----------------------------------------------------------------------

    /// Re-materialize every dirty subscription and deliver changed
    /// snapshots. Callbacks run with only their own subscription's delivery
    /// lock held; `inner` and `state` are released.
    ///
    /// Dirty subscriptions are drained under the state lock first; one that
    /// unsubscribes after the drain still receives this round.
    pub fn flush(&self) {
        let dirty: Vec<Arc<QuerySub>> = self.state.lock().dirty.drain(..).collect();

        for sub in dirty {
            let last = sub.last.lock();
            let result = {
                let inner = self.inner.lock();
                materialize(&sub.query, &*inner).map(|rows| Snapshot {
                    rows,
                    complete: inner.is_complete(),
                })
            };

            match result {
                Ok(snapshot) => {
                    {
                        let mut last = last.borrow_mut();
                        if last.as_ref() == Some(&snapshot) {
                            continue;
                        }
                        *last = Some(snapshot.clone());
                    }
                    let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        (sub.callback)(&snapshot);
                    }));
                }
                Err(e) => match &sub.on_error {
                    Some(on_err) => {
                        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                            on_err(&e);
                        }));
                    }
                    None => tracing::warn!(table = sub.query.table(), error = %e, "query refresh failed"),
                },
            }
        }
    }

    // -----------------------------------------------------------------------
    // Internal helpers
    // -----------------------------------------------------------------------

    fn emit_event(&self, event: ChangeEvent) {
        self.changes.emit(&event);
    }

    fn mark_tables(&self, tables: BTreeSet<String>) {
        self.state.lock().mark_tables(&tables);
    }
}
