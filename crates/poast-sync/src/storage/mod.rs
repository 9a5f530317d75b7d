//! Local replica storage.
//!
//! [`ReplicaBackend`] is the raw key-value layer; [`Replica`] adds the
//! pending-mutation overlay on top. [`KvStore`] selects a backend from a
//! configuration string.

pub mod memory;
pub mod replica;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use memory::MemoryBackend;
pub use replica::Replica;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;
pub use traits::{ReplicaBackend, RowWrite};

use crate::error::{Result, StorageError};

/// File used when a durable store is requested without a path.
pub const DEFAULT_DURABLE_PATH: &str = "poast-replica.db";

/// Which backend holds the local replica.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KvStore {
    /// Volatile, process-local.
    #[default]
    Mem,
    /// Durable SQLite file.
    Sqlite(PathBuf),
}

impl FromStr for KvStore {
    type Err = StorageError;

    /// Accepts `mem`, `idb` (durable store at [`DEFAULT_DURABLE_PATH`]) and
    /// `sqlite:<path>`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "mem" => Ok(KvStore::Mem),
            "idb" => Ok(KvStore::Sqlite(PathBuf::from(DEFAULT_DURABLE_PATH))),
            _ => match s.strip_prefix("sqlite:") {
                Some(path) if !path.is_empty() => Ok(KvStore::Sqlite(PathBuf::from(path))),
                _ => Err(StorageError::InvalidKvStore(s.to_string())),
            },
        }
    }
}

impl fmt::Display for KvStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KvStore::Mem => f.write_str("mem"),
            KvStore::Sqlite(path) => write!(f, "sqlite:{}", path.display()),
        }
    }
}

impl KvStore {
    /// Open the selected backend.
    pub fn open(&self) -> Result<Box<dyn ReplicaBackend>> {
        match self {
            KvStore::Mem => Ok(Box::new(MemoryBackend::new())),
            #[cfg(feature = "sqlite")]
            KvStore::Sqlite(path) => Ok(Box::new(SqliteBackend::open(path)?)),
            #[cfg(not(feature = "sqlite"))]
            KvStore::Sqlite(_) => Err(StorageError::Unsupported(self.to_string()).into()),
        }
    }
}
