//! Backup/restore protocol
//!
//! Exports the `themes`, `operations` and `workspaces` collections to a
//! self-describing JSON document and restores from one. Every import is
//! preceded by a full export so the replaced data can be recovered.

pub mod error;
pub mod export;
pub mod history;
pub mod restore;
pub mod types;
pub mod validate;

use std::sync::Arc;

pub use error::BackupError;
pub use export::{backup_filename, BackupSink, DirectorySink, ExportReport, ExportStage, Written};
pub use restore::{
    inspect, ImportPreview, ImportReport, ImportRequest, VersionConfirm, VersionMismatch,
    PRE_IMPORT_REASON,
};
pub use types::{
    BackupData, BackupDocument, BackupLogEntry, BackupMetadata, CollectionCounts, BACKUP_MAGIC,
    BACKUP_VERSION,
};

use crate::storage::Database;

/// Export, import and backup history over one store
pub struct BackupService {
    db: Arc<Database>,
    sink: Arc<dyn BackupSink>,
}

impl BackupService {
    #[must_use]
    pub fn new(db: Arc<Database>, sink: Arc<dyn BackupSink>) -> Self {
        Self { db, sink }
    }

    /// Service writing backup files into `dir`
    #[must_use]
    pub fn with_directory(db: Arc<Database>, dir: impl Into<std::path::PathBuf>) -> Self {
        Self::new(db, Arc::new(DirectorySink::new(dir)))
    }

    /// Export every exported collection and log it in `backups`
    ///
    /// # Errors
    /// Returns `ExportFailed` naming the stage that failed; nothing is logged
    pub async fn export(&self) -> Result<ExportReport, BackupError> {
        export::run_export(&self.db, self.sink.as_ref(), None).await
    }

    /// Replace the exported collections with the contents of `text`
    ///
    /// # Errors
    /// Validation and version errors leave storage untouched, as does
    /// `SafetySnapshotFailed`. `ImportFailed` names the snapshot to restore.
    pub async fn import(
        &self,
        text: &str,
        request: ImportRequest,
    ) -> Result<ImportReport, BackupError> {
        restore::run_import(&self.db, self.sink.as_ref(), text, &request).await
    }

    /// Validate backup text without touching storage
    ///
    /// # Errors
    /// Returns the validation failure `import` would report
    pub fn inspect(&self, text: &str) -> Result<ImportPreview, BackupError> {
        restore::inspect(text)
    }

    /// Logged exports and imports, newest first
    ///
    /// # Errors
    /// Returns an error if the `backups` collection cannot be read
    pub async fn history(&self) -> Result<Vec<BackupLogEntry>, BackupError> {
        Ok(history::list(&self.db).await?)
    }
}
