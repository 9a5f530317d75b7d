use thiserror::Error;

use poast_sync::error::SchemaError;
use poast_sync::SyncClientError;

#[derive(Debug, Error)]
pub enum PoastError {
    #[error(transparent)]
    Sync(#[from] SyncClientError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("Invalid value for {key}: {message}")]
    Config { key: String, message: String },

    #[error("Login failed: {0}")]
    Login(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("No message with id \"{0}\"")]
    UnknownMessage(String),

    #[error("Row decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PoastError> = std::result::Result<T, E>;
