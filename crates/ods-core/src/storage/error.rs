//! Persistence engine errors

use thiserror::Error;

use super::key::Key;

/// Result type for engine operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors raised by the persistence engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// The underlying engine cannot be reached at all
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Another connection holds a lock that prevents opening or upgrading
    #[error("Connection blocked: {0}")]
    ConnectionBlocked(String),

    /// Any other failure while opening
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Key {key} already exists in {collection}")]
    DuplicateKey { collection: &'static str, key: Key },

    #[error("No record with key {key} in {collection}")]
    NotFound { collection: &'static str, key: Key },

    /// Another connection prevents deleting the store
    #[error("Deletion blocked: {0}")]
    DeletionBlocked(String),

    #[error("Invalid key for {collection}: {reason}")]
    InvalidKey {
        collection: &'static str,
        reason: String,
    },

    #[error("Unknown index '{index}' on {collection}")]
    UnknownIndex {
        collection: &'static str,
        index: String,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),
}

impl StorageError {
    /// Get the error code for CLI/API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::ConnectionBlocked(_) => "CONNECTION_BLOCKED",
            Self::ConnectionError(_) => "CONNECTION_ERROR",
            Self::DuplicateKey { .. } => "DUPLICATE_KEY",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::DeletionBlocked(_) => "DELETION_BLOCKED",
            Self::InvalidKey { .. } | Self::UnknownIndex { .. } | Self::InvalidRecord(_) => {
                "VALIDATION_ERROR"
            }
            Self::Sqlite(_) => "SQLITE_ERROR",
            Self::Json(_) => "PARSE_ERROR",
            Self::Task(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error means the engine could not be reached
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::StorageUnavailable(_) | Self::ConnectionBlocked(_) | Self::ConnectionError(_)
        )
    }
}

/// Whether a SQLite error is a lock conflict with another connection
pub(crate) fn is_lock_conflict(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
    )
}
