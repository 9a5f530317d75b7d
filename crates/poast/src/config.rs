//! Runtime configuration from the environment (after `.env` is loaded).
//!
//! | Variable                 | Default                 |
//! |--------------------------|-------------------------|
//! | `POAST_SERVER`           | `http://localhost:5173` |
//! | `POAST_KV_STORE`         | `mem`                   |
//! | `POAST_JWT`              | token file contents     |
//! | `POAST_TOKEN_FILE`       | `.poast-jwt`            |
//! | `POAST_LOG_LEVEL`        | `info`                  |
//! | `POAST_LOG_FORMAT`       | `text`                  |
//! | `POAST_SYNC_INTERVAL_MS` | `1000`                  |

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use poast_sync::storage::KvStore;

use crate::error::{PoastError, Result};

pub const DEFAULT_SERVER: &str = "http://localhost:5173";
pub const DEFAULT_TOKEN_FILE: &str = ".poast-jwt";
const DEFAULT_SYNC_INTERVAL_MS: u64 = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format \"{other}\" (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PoastConfig {
    pub server: String,
    pub kv_store: KvStore,
    /// Explicit token; overrides the token file when set.
    pub jwt: Option<String>,
    pub token_file: PathBuf,
    pub log_level: String,
    pub log_format: LogFormat,
    pub sync_interval: Duration,
}

impl Default for PoastConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            kv_store: KvStore::Mem,
            jwt: None,
            token_file: PathBuf::from(DEFAULT_TOKEN_FILE),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            sync_interval: Duration::from_millis(DEFAULT_SYNC_INTERVAL_MS),
        }
    }
}

fn invalid(key: &str, message: impl ToString) -> PoastError {
    PoastError::Config {
        key: key.to_string(),
        message: message.to_string(),
    }
}

impl PoastConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(server) = get("POAST_SERVER") {
            config.server = server;
        }
        if let Some(raw) = get("POAST_KV_STORE") {
            config.kv_store = raw.parse().map_err(|e| invalid("POAST_KV_STORE", e))?;
        }
        config.jwt = get("POAST_JWT");
        if let Some(path) = get("POAST_TOKEN_FILE") {
            config.token_file = PathBuf::from(path);
        }
        if let Some(level) = get("POAST_LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(raw) = get("POAST_LOG_FORMAT") {
            config.log_format = raw.parse().map_err(|e| invalid("POAST_LOG_FORMAT", e))?;
        }
        if let Some(raw) = get("POAST_SYNC_INTERVAL_MS") {
            let ms: u64 = raw.trim().parse().map_err(|e| invalid("POAST_SYNC_INTERVAL_MS", e))?;
            if ms == 0 {
                return Err(invalid("POAST_SYNC_INTERVAL_MS", "must be positive"));
            }
            config.sync_interval = Duration::from_millis(ms);
        }
        Ok(config)
    }
}
