//! Optimistic mutations.
//!
//! - [`types`]: [`Mutation`], [`MutationKind`], [`MutationOutcome`].
//! - [`log`]: the ordered [`PendingLog`] and its replay rules.
//! - [`receipt`]: [`MutationReceipt`] for awaiting the authority's verdict.
//! - [`facade`]: [`TableMutator`], the per-table write entry point.

pub mod facade;
pub mod log;
pub mod receipt;
pub mod types;

pub use facade::TableMutator;
pub use log::{apply_mutation, key_columns, normalize_full_row, PendingLog};
pub use receipt::{MutationReceipt, ReceiptRegistry};
pub use types::{Mutation, MutationId, MutationKind, MutationOutcome};
