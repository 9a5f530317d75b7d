//! Sync-specific types: the transport seam and push/pull payloads.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mutate::{Mutation, MutationId, MutationOutcome};
use crate::types::RowChange;

// ============================================================================
// SyncTransport: the seam to the authority
// ============================================================================

/// Carries mutations to the authority and authoritative rows back.
///
/// Implementations own the wire (HTTP, WebSocket, in-process). The in-process
/// [`MemoryUpstream`](crate::upstream::MemoryUpstream) is the reference one.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Submit pending mutations. Returns one ack per processed mutation;
    /// unacked mutations stay pending and are pushed again next cycle.
    async fn push(&self, request: &PushRequest) -> Result<Vec<MutationAck>, SyncTransportError>;

    /// Fetch authoritative changes since `request.cookie`.
    async fn pull(&self, request: &PullRequest) -> Result<PullResponse, SyncTransportError>;
}

/// Transport-level error.
#[derive(Debug, Clone)]
pub struct SyncTransportError {
    pub message: String,
    pub kind: SyncErrorKind,
}

impl SyncTransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: SyncErrorKind::Transient,
        }
    }

    pub fn with_kind(message: impl Into<String>, kind: SyncErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }
}

impl std::fmt::Display for SyncTransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SyncTransportError {}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    pub client_id: String,
    pub user_id: String,
    /// Bearer token from the client's auth provider, if any.
    pub auth: Option<String>,
    pub schema_version: u32,
    pub mutations: Vec<Mutation>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationAck {
    pub id: MutationId,
    pub outcome: MutationOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub client_id: String,
    /// Opaque cursor from the previous pull; `None` requests a full reset.
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    pub cookie: String,
    /// Highest mutation id from this client the authority has processed.
    pub last_mutation_id: MutationId,
    pub patch: Vec<RowChange>,
    /// Drop all confirmed rows before applying `patch`.
    pub reset: bool,
}

// ============================================================================
// Sync Result Types
// ============================================================================

/// Aggregated result of a sync cycle (push, pull, or both).
#[derive(Debug, Clone, Default)]
pub struct SyncResult {
    pub pushed: usize,
    pub rejected: usize,
    pub pulled: usize,
    pub confirmed: usize,
    pub errors: Vec<SyncErrorEvent>,
}

impl SyncResult {
    pub fn merge(&mut self, other: SyncResult) {
        self.pushed += other.pushed;
        self.rejected += other.rejected;
        self.pulled += other.pulled;
        self.confirmed += other.confirmed;
        self.errors.extend(other.errors);
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Classification of sync errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorKind {
    /// Retriable (network, temporary failures).
    Transient,
    /// Not retriable (rejections, validation).
    Permanent,
    /// Authentication failed.
    Auth,
}

/// Which phase of sync an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    Push,
    Pull,
}

/// A sync error event: collected in `SyncResult.errors`, never thrown.
#[derive(Debug, Clone)]
pub struct SyncErrorEvent {
    pub phase: SyncPhase,
    pub table: Option<String>,
    pub mutation_id: Option<MutationId>,
    pub error: String,
    pub kind: SyncErrorKind,
}

pub type SyncErrorCallback = dyn Fn(&SyncErrorEvent) + Send + Sync;

/// Produces the current bearer token, if any.
pub type AuthTokenFn = dyn Fn() -> Option<String> + Send + Sync;

/// Shared handle to an [`AuthTokenFn`].
pub type AuthProvider = Arc<AuthTokenFn>;
