//! Backup/restore errors

use std::error::Error as StdError;
use thiserror::Error;

use super::export::ExportStage;
use crate::storage::StorageError;

/// Errors raised by export, import and document validation
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Malformed backup document: {0}")]
    MalformedDocument(String),

    #[error("Not an ODS backup (magic: {})", .found.as_deref().unwrap_or("missing"))]
    InvalidMagic { found: Option<String> },

    #[error("Backup document has no version")]
    MissingVersion,

    #[error("Backup document has no timestamp")]
    MissingTimestamp,

    #[error("Backup document has no data section")]
    MissingData,

    #[error("Invalid data section: {0}")]
    InvalidDataShape(String),

    #[error("Backup version {found} is incompatible with current version {current}")]
    IncompatibleVersion { found: String, current: String },

    /// The pre-import export failed; nothing was changed
    #[error("Safety snapshot failed, import aborted: {0}")]
    SafetySnapshotFailed(#[source] Box<BackupError>),

    #[error("Import cancelled by user")]
    UserCancelled,

    #[error("Export failed while {stage}: {source}")]
    ExportFailed {
        stage: ExportStage,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// Collections may be partially replaced; `snapshot` holds the prior state
    #[error("Import failed, restore from safety snapshot {snapshot}: {source}")]
    ImportFailed {
        snapshot: String,
        #[source]
        source: StorageError,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl BackupError {
    /// Get the error code for CLI/API responses
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedDocument(_) => "MALFORMED_DOCUMENT",
            Self::InvalidMagic { .. } => "INVALID_MAGIC",
            Self::MissingVersion => "MISSING_VERSION",
            Self::MissingTimestamp => "MISSING_TIMESTAMP",
            Self::MissingData => "MISSING_DATA",
            Self::InvalidDataShape(_) => "INVALID_DATA_SHAPE",
            Self::IncompatibleVersion { .. } => "INCOMPATIBLE_VERSION",
            Self::SafetySnapshotFailed(_) => "SAFETY_SNAPSHOT_FAILED",
            Self::UserCancelled => "USER_CANCELLED",
            Self::ExportFailed { .. } => "EXPORT_FAILED",
            Self::ImportFailed { .. } => "IMPORT_FAILED",
            Self::Storage(e) => e.code(),
        }
    }

    /// Whether the document itself was rejected before anything ran
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(_)
                | Self::InvalidMagic { .. }
                | Self::MissingVersion
                | Self::MissingTimestamp
                | Self::MissingData
                | Self::InvalidDataShape(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_magic_message() {
        let missing = BackupError::InvalidMagic { found: None };
        assert!(missing.to_string().contains("missing"));

        let wrong = BackupError::InvalidMagic {
            found: Some("OTHER".to_string()),
        };
        assert!(wrong.to_string().contains("OTHER"));
        assert_eq!(wrong.code(), "INVALID_MAGIC");
    }

    #[test]
    fn test_export_failed_names_stage() {
        let err = BackupError::ExportFailed {
            stage: ExportStage::Writing,
            source: "disk full".into(),
        };
        assert_eq!(err.to_string(), "Export failed while writing: disk full");
        assert!(!err.is_validation());
    }

    #[test]
    fn test_storage_code_passthrough() {
        let err = BackupError::from(StorageError::StorageUnavailable("gone".to_string()));
        assert_eq!(err.code(), "STORAGE_UNAVAILABLE");
    }
}
