//! Core error types for dailypick-core.
//!
//! Storage failures never leave the [`Store`](crate::storage::Store) boundary;
//! they exist here so backends can report them and the store can log them.
//! Selection and engine errors are the ones callers are expected to handle.

use std::path::PathBuf;
use thiserror::Error;

use crate::quota::QuotaStatus;

/// Core error type for dailypick-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Selection errors
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Catalog could not be loaded
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors reported by a key-value backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage is disabled or sandboxed
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Database is locked
    #[error("Store is locked")]
    Locked,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Data directory could not be resolved or created
    #[error("Data directory unavailable: {0}")]
    DataDir(String),
}

/// Errors from content selection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// The fallback cascade ran out of bands and the catalog has no default item.
    #[error("no content available for this context")]
    EmptyPool,

    /// A selector was asked to pick from a pool of size zero.
    #[error("invalid pool size: {0}")]
    InvalidPoolSize(usize),
}

impl SelectionError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> &'static str {
        match self {
            SelectionError::EmptyPool => {
                "Nothing matches these filters yet. Try a different age band or focus."
            }
            SelectionError::InvalidPoolSize(_) => "Something went wrong picking today's content.",
        }
    }
}

/// Errors surfaced by the [`Engine`](crate::engine::Engine) facade.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error(transparent)]
    Selection(#[from] SelectionError),

    /// Daily ceiling reached. This is an ordinary outcome, not a fault.
    #[error("daily limit reached for '{feature}' ({}/{})", .status.used, .status.limit)]
    QuotaExceeded { feature: String, status: QuotaStatus },
}

impl EngineError {
    /// Message suitable for showing to an end user.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::Selection(e) => e.user_message().to_string(),
            EngineError::QuotaExceeded { status, .. } => format!(
                "You've used all {} of today's ideas. Come back tomorrow for fresh ones.",
                status.limit
            ),
        }
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StorageError::Locked
                } else {
                    StorageError::QueryFailed(err.to_string())
                }
            }
            _ => StorageError::QueryFailed(err.to_string()),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
