//! Query descriptors and their in-memory execution.
//!
//! - [`types`]: [`Query`] builder, [`Operator`], [`escape_like`].
//! - [`operators`]: condition evaluation and LIKE matching.
//! - [`execute`]: [`materialize`] a descriptor against a [`RowSource`].
//! - [`tables`]: [`referenced_tables`] for invalidation.

pub mod execute;
pub mod operators;
pub mod tables;
pub mod types;

pub use execute::{materialize, RowSource, TableRows};
pub use tables::referenced_tables;
pub use types::{
    escape_like, Condition, Operator, Query, QueryFactory, Related, SortDirection, SortEntry,
};
