//! Push/pull reconciliation with the authority.

pub mod background;
pub mod manager;
pub mod types;

pub use background::SyncHandle;
pub use manager::{SyncManager, SyncManagerOptions};
pub use types::*;
