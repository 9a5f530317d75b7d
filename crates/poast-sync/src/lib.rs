pub mod error;
pub mod types;

pub mod auth;
pub mod client;
pub mod identity;
pub mod mutate;
pub mod query;
pub mod reactive;
pub mod schema;
pub mod storage;
pub mod sync;
pub mod upstream;

pub use client::{Client, ClientOptions};
pub use error::{Result, SyncClientError};
