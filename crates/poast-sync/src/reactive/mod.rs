//! Reactive layer: synchronous query subscriptions over the replica.
//!
//! [`ReactiveReplica`] wraps a [`Replica`](crate::storage::Replica) and adds
//! `observe_query` / `bind` / `on_change` / `on_table_change`. Every write
//! marks subscriptions over the affected tables dirty and flushes them before
//! returning.

pub mod binding;
pub mod change_feed;
pub mod event;
pub mod replica;
pub mod snapshot;

pub use binding::{Binding, Subscription, Unsubscribe};
pub use change_feed::{ChangeFeed, ListenerId};
pub use event::ChangeEvent;
pub use replica::{ErrorCallback, ReactiveReplica, SnapshotCallback};
pub use snapshot::{Snapshot, SnapshotState};
