//! SyncManager: push/pull orchestration between the replica and the
//! authority.
//!
//! All public methods are async and never return `Err`; failures are
//! collected in `SyncResult.errors` and passed to the optional error
//! callback.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Mutex as TokioMutex;

use crate::mutate::{MutationId, MutationOutcome, ReceiptRegistry};
use crate::reactive::ReactiveReplica;

use super::types::*;

const DEFAULT_PUSH_BATCH_SIZE: usize = 50;

/// Configuration for [`SyncManager`].
pub struct SyncManagerOptions {
    pub transport: Arc<dyn SyncTransport>,
    pub replica: Arc<ReactiveReplica>,
    pub receipts: Arc<ReceiptRegistry>,
    pub client_id: String,
    pub user_id: String,
    pub auth: Option<AuthProvider>,
    /// Push batch size (`None` = default 50).
    pub push_batch_size: Option<usize>,
    pub on_error: Option<Arc<SyncErrorCallback>>,
}

pub struct SyncManager {
    transport: Arc<dyn SyncTransport>,
    replica: Arc<ReactiveReplica>,
    receipts: Arc<ReceiptRegistry>,
    client_id: String,
    user_id: String,
    auth: Option<AuthProvider>,
    push_batch_size: usize,
    on_error: Option<Arc<SyncErrorCallback>>,
    /// Serializes whole cycles so pushes and pulls never interleave.
    lock: TokioMutex<()>,
    /// Mutations acked as applied but not yet confirmed by a pull.
    acked: Mutex<HashSet<MutationId>>,
}

impl SyncManager {
    pub fn new(options: SyncManagerOptions) -> Self {
        Self {
            transport: options.transport,
            replica: options.replica,
            receipts: options.receipts,
            client_id: options.client_id,
            user_id: options.user_id,
            auth: options.auth,
            push_batch_size: options.push_batch_size.unwrap_or(DEFAULT_PUSH_BATCH_SIZE),
            on_error: options.on_error,
            lock: TokioMutex::new(()),
            acked: Mutex::new(HashSet::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Public API
    // -----------------------------------------------------------------------

    /// Push pending mutations, then pull.
    pub async fn sync(&self) -> SyncResult {
        let _guard = self.lock.lock().await;
        let mut result = self.push_impl().await;
        result.merge(self.pull_impl().await);
        result
    }

    pub async fn push(&self) -> SyncResult {
        let _guard = self.lock.lock().await;
        self.push_impl().await
    }

    pub async fn pull(&self) -> SyncResult {
        let _guard = self.lock.lock().await;
        self.pull_impl().await
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    // -----------------------------------------------------------------------
    // Push
    // -----------------------------------------------------------------------

    async fn push_impl(&self) -> SyncResult {
        let mut result = SyncResult::default();

        if self.push_batch_size == 0 {
            result.errors.push(self.make_error(
                SyncPhase::Push,
                None,
                None,
                "push batch size must be positive",
                SyncErrorKind::Permanent,
            ));
            return result;
        }

        let outbound: Vec<_> = {
            let acked = self.acked.lock();
            self.replica
                .pending()
                .into_iter()
                .filter(|m| !acked.contains(&m.id))
                .collect()
        };
        if outbound.is_empty() {
            return result;
        }

        let auth = self.auth.as_ref().and_then(|provider| provider());
        let schema_version = self.replica.schema().version();

        for chunk in outbound.chunks(self.push_batch_size) {
            let request = PushRequest {
                client_id: self.client_id.clone(),
                user_id: self.user_id.clone(),
                auth: auth.clone(),
                schema_version,
                mutations: chunk.to_vec(),
            };

            let acks = match self.transport.push(&request).await {
                Ok(acks) => acks,
                Err(e) => {
                    tracing::warn!(error = %e, pending = chunk.len(), "push failed");
                    result.errors.push(self.make_error(SyncPhase::Push, None, None, &e.message, e.kind));
                    return result;
                }
            };

            for ack in acks {
                let Some(mutation) = chunk.iter().find(|m| m.id == ack.id) else {
                    tracing::debug!(mutation_id = ack.id, "ack for unknown mutation ignored");
                    continue;
                };
                match &ack.outcome {
                    MutationOutcome::Applied => {
                        tracing::debug!(table = %mutation.table, mutation_id = ack.id, "mutation applied upstream");
                        self.acked.lock().insert(ack.id);
                        result.pushed += 1;
                    }
                    MutationOutcome::Rejected { reason } => {
                        result.rejected += 1;
                        if let Err(e) = self.replica.rollback(ack.id, reason) {
                            result.errors.push(self.make_error(
                                SyncPhase::Push,
                                Some(&mutation.table),
                                Some(ack.id),
                                &e.to_string(),
                                SyncErrorKind::Transient,
                            ));
                        }
                        result.errors.push(self.make_error(
                            SyncPhase::Push,
                            Some(&mutation.table),
                            Some(ack.id),
                            reason,
                            SyncErrorKind::Permanent,
                        ));
                    }
                }
                self.receipts.resolve(ack.id, ack.outcome);
            }
        }

        result
    }

    // -----------------------------------------------------------------------
    // Pull
    // -----------------------------------------------------------------------

    async fn pull_impl(&self) -> SyncResult {
        let mut result = SyncResult::default();

        let cookie = match self.replica.cookie() {
            Ok(cookie) => cookie,
            Err(e) => {
                result.errors.push(self.make_error(
                    SyncPhase::Pull,
                    None,
                    None,
                    &e.to_string(),
                    SyncErrorKind::Transient,
                ));
                return result;
            }
        };

        let request = PullRequest {
            client_id: self.client_id.clone(),
            cookie,
        };
        let response = match self.transport.pull(&request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "pull failed");
                result.errors.push(self.make_error(SyncPhase::Pull, None, None, &e.message, e.kind));
                return result;
            }
        };

        tracing::debug!(
            changes = response.patch.len(),
            reset = response.reset,
            last_mutation_id = response.last_mutation_id,
            "pulled"
        );

        match self.replica.apply_remote(
            &response.patch,
            response.reset,
            response.last_mutation_id,
            &response.cookie,
        ) {
            Ok(confirmed) => {
                result.pulled = response.patch.len();
                result.confirmed = confirmed.len();
                let mut acked = self.acked.lock();
                for id in confirmed {
                    acked.remove(&id);
                    // Processed by the authority without an ack reaching us;
                    // rejections always arrive as push acks.
                    self.receipts.resolve(id, MutationOutcome::Applied);
                }
            }
            Err(e) => {
                result.errors.push(self.make_error(
                    SyncPhase::Pull,
                    None,
                    None,
                    &e.to_string(),
                    SyncErrorKind::Transient,
                ));
            }
        }

        result
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn make_error(
        &self,
        phase: SyncPhase,
        table: Option<&str>,
        mutation_id: Option<MutationId>,
        error: &str,
        kind: SyncErrorKind,
    ) -> SyncErrorEvent {
        let event = SyncErrorEvent {
            phase,
            table: table.map(str::to_string),
            mutation_id,
            error: error.to_string(),
            kind,
        };
        if let Some(cb) = &self.on_error {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(&event)));
        }
        event
    }
}
