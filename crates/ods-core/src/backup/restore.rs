//! Import: validate, gate on version, snapshot, replace, record

use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

use super::error::BackupError;
use super::export::{run_export, BackupSink, ExportReport};
use super::history;
use super::types::{BackupData, BackupDocument, BackupLogEntry, CollectionCounts, BACKUP_VERSION};
use super::validate::{major_version, parse_document};
use crate::storage::{record, Collection, Database, KeyPolicy, StorageResult};
use crate::theme::{ThemeRecord, DEFAULT_THEME_ID};

/// `reason` recorded on the export taken before an import
pub const PRE_IMPORT_REASON: &str = "pre-import";

/// Decides whether to go ahead with a major-version mismatch
pub type VersionConfirm = Box<dyn Fn(&VersionMismatch) -> bool + Send + Sync>;

/// A document whose major version differs from the current one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMismatch {
    pub found: String,
    pub current: String,
}

impl fmt::Display for VersionMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backup version {} differs from current version {}",
            self.found, self.current
        )
    }
}

/// Options for one import
pub struct ImportRequest {
    /// Name of the file the text came from, recorded in the log
    pub source_name: String,
    confirm: Option<VersionConfirm>,
}

impl ImportRequest {
    /// An import that refuses major-version mismatches
    #[must_use]
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            confirm: None,
        }
    }

    /// Ask `confirm` when the major version differs
    #[must_use]
    pub fn with_confirm(
        mut self,
        confirm: impl Fn(&VersionMismatch) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.confirm = Some(Box::new(confirm));
        self
    }

    /// Accept any major version without asking
    #[must_use]
    pub fn accept_any_version(self) -> Self {
        self.with_confirm(|_| true)
    }

    fn check_version(&self, version: &str) -> Result<(), BackupError> {
        if major_version(version) == major_version(BACKUP_VERSION) {
            return Ok(());
        }

        let mismatch = VersionMismatch {
            found: version.to_string(),
            current: BACKUP_VERSION.to_string(),
        };
        match &self.confirm {
            Some(confirm) if confirm(&mismatch) => {
                warn!(%mismatch, "importing across major versions");
                Ok(())
            }
            _ => Err(BackupError::IncompatibleVersion {
                found: mismatch.found,
                current: mismatch.current,
            }),
        }
    }
}

impl fmt::Debug for ImportRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportRequest")
            .field("source_name", &self.source_name)
            .field("confirm", &self.confirm.is_some())
            .finish()
    }
}

/// Outcome of a completed import
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub imported: CollectionCounts,
    /// The export taken before anything was replaced
    pub snapshot: ExportReport,
    pub source_version: String,
    /// The `default` theme as now stored, for the caller to reapply
    pub theme: Option<ThemeRecord>,
}

/// What an import of a document would do, without doing it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportPreview {
    pub version: String,
    pub timestamp: i64,
    pub date: String,
    pub counts: CollectionCounts,
    /// Sections absent from the document; their collections end up empty
    pub missing_sections: Vec<Collection>,
    /// Whether the major version matches the current one
    pub compatible: bool,
    pub exported_by: String,
}

/// Validate backup text without touching storage
///
/// # Errors
/// Returns the validation failure `import` would report
pub fn inspect(text: &str) -> Result<ImportPreview, BackupError> {
    let document = parse_document(text)?;
    Ok(preview(&document))
}

fn preview(document: &BackupDocument) -> ImportPreview {
    ImportPreview {
        version: document.version.clone(),
        timestamp: document.timestamp,
        date: document.date.clone(),
        counts: document.data.counts(),
        missing_sections: Collection::EXPORTED
            .into_iter()
            .filter(|c| document.data.section(*c).is_none())
            .collect(),
        compatible: major_version(&document.version) == major_version(BACKUP_VERSION),
        exported_by: document.metadata.exported_by.clone(),
    }
}

pub(crate) async fn run_import(
    db: &Database,
    sink: &dyn BackupSink,
    text: &str,
    request: &ImportRequest,
) -> Result<ImportReport, BackupError> {
    let document = parse_document(text)?;
    request.check_version(&document.version)?;

    let snapshot = run_export(db, sink, Some(PRE_IMPORT_REASON))
        .await
        .map_err(|e| BackupError::SafetySnapshotFailed(Box::new(e)))?;
    info!(snapshot = %snapshot.filename, "safety snapshot written");

    let failed = |source| BackupError::ImportFailed {
        snapshot: snapshot.filename.clone(),
        source,
    };

    let imported = replace_collections(db, &document.data)
        .await
        .map_err(failed)?;

    let entry = BackupLogEntry::Import {
        timestamp: record::now_millis(),
        version: document.version.clone(),
        original_timestamp: document.timestamp,
        imported,
        filename: request.source_name.clone(),
    };
    history::append_log(db, entry).await.map_err(failed)?;

    let theme = reload_theme(db).await;
    info!(
        source = %request.source_name,
        version = %document.version,
        %imported,
        "import complete"
    );

    Ok(ImportReport {
        imported,
        snapshot,
        source_version: document.version,
        theme,
    })
}

/// Clear every exported collection, then insert the document's records
async fn replace_collections(db: &Database, data: &BackupData) -> StorageResult<CollectionCounts> {
    for collection in Collection::EXPORTED {
        db.clear(collection).await?;
    }

    let mut imported = CollectionCounts::default();
    for collection in Collection::EXPORTED {
        let schema = collection.schema();
        let records = data.section(collection).unwrap_or_default();
        for doc in records {
            let mut doc = doc.clone();
            if schema.key_policy == KeyPolicy::Generated {
                doc.remove(schema.key_field);
            }
            db.add(collection, doc).await?;
        }
        imported.set(collection, records.len());
    }
    Ok(imported)
}

async fn reload_theme(db: &Database) -> Option<ThemeRecord> {
    let doc = match db.get(Collection::Themes, DEFAULT_THEME_ID).await {
        Ok(doc) => doc?,
        Err(e) => {
            warn!(error = %e, "could not reload theme after import");
            return None;
        }
    };
    record::from_document(doc)
        .map_err(|e| warn!(error = %e, "imported theme is unreadable"))
        .ok()
}
