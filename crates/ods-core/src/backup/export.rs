//! Export: gather, serialize, write, record

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::error::BackupError;
use super::history;
use super::types::{BackupData, BackupDocument, BackupLogEntry, CollectionCounts, BACKUP_VERSION};
use crate::storage::{Collection, Database};

/// Where a sink actually put a backup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    /// Name the backup was stored under; may differ from the requested one
    pub filename: String,
    pub location: String,
}

/// Where finished backup text goes
#[async_trait]
pub trait BackupSink: Send + Sync {
    /// Store `contents` under `filename`, or a variant of it if that name is
    /// taken. Never replaces an existing backup.
    async fn write(&self, filename: &str, contents: &str) -> io::Result<Written>;
}

/// How many numbered variants of a taken filename to try
const MAX_NAME_SUFFIX: u32 = 1000;

/// Writes backups as files in a directory, created on demand
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl BackupSink for DirectorySink {
    async fn write(&self, filename: &str, contents: &str) -> io::Result<Written> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for n in 0..=MAX_NAME_SUFFIX {
            let candidate = numbered_filename(filename, n);
            let path = self.dir.join(&candidate);
            let mut file = match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(filename = %candidate, "backup file exists, trying next name");
                    continue;
                }
                Err(e) => return Err(e),
            };
            file.write_all(contents.as_bytes()).await?;
            file.flush().await?;
            return Ok(Written {
                filename: candidate,
                location: path.display().to_string(),
            });
        }

        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free name for {filename} in {}", self.dir.display()),
        ))
    }
}

/// `name.json` for 0, `name-<n>.json` otherwise
fn numbered_filename(filename: &str, n: u32) -> String {
    if n == 0 {
        return filename.to_string();
    }
    match filename.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}-{n}.{ext}"),
        None => format!("{filename}-{n}"),
    }
}

/// Export progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStage {
    Gathering,
    Serializing,
    Writing,
    Recording,
    Done,
}

impl ExportStage {
    fn fail(self, source: impl Into<Box<dyn StdError + Send + Sync>>) -> BackupError {
        let source = source.into();
        warn!(stage = %self, error = %source, "export failed");
        BackupError::ExportFailed {
            stage: self,
            source,
        }
    }
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gathering => write!(f, "gathering"),
            Self::Serializing => write!(f, "serializing"),
            Self::Writing => write!(f, "writing"),
            Self::Recording => write!(f, "recording"),
            Self::Done => write!(f, "done"),
        }
    }
}

/// Outcome of a completed export
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub filename: String,
    /// Where the sink put the file
    pub location: String,
    /// Bytes written
    pub size: u64,
    pub counts: CollectionCounts,
    /// Timestamp of the log entry recording this export, epoch milliseconds.
    /// Normally the document timestamp; later if that millisecond was taken.
    pub timestamp: i64,
}

/// `ods-backup-<UTC date>T<time with dashes>.json`, whole seconds
#[must_use]
pub fn backup_filename(at: DateTime<Utc>) -> String {
    at.format("ods-backup-%Y-%m-%dT%H-%M-%S.json").to_string()
}

/// Run a full export; `reason` is recorded for exports the user did not ask for
pub(crate) async fn run_export(
    db: &Database,
    sink: &dyn BackupSink,
    reason: Option<&str>,
) -> Result<ExportReport, BackupError> {
    let now = Utc::now();

    debug!(stage = %ExportStage::Gathering, "export");
    let mut data = BackupData::default();
    for collection in Collection::EXPORTED {
        let records = db
            .get_all(collection)
            .await
            .map_err(|e| ExportStage::Gathering.fail(e))?;
        data.set_section(collection, records);
    }

    debug!(stage = %ExportStage::Serializing, "export");
    let document = BackupDocument::new(now, data);
    let counts = document.data.counts();
    let text =
        serde_json::to_string_pretty(&document).map_err(|e| ExportStage::Serializing.fail(e))?;

    debug!(stage = %ExportStage::Writing, "export");
    let Written { filename, location } = sink
        .write(&backup_filename(now), &text)
        .await
        .map_err(|e| ExportStage::Writing.fail(e))?;
    let size = text.len() as u64;

    debug!(stage = %ExportStage::Recording, "export");
    let entry = BackupLogEntry::Export {
        timestamp: document.timestamp,
        version: BACKUP_VERSION.to_string(),
        filename: filename.clone(),
        size,
        counts,
        reason: reason.map(str::to_string),
    };
    let entry = history::append_log(db, entry)
        .await
        .map_err(|e| ExportStage::Recording.fail(e))?;

    debug!(stage = %ExportStage::Done, "export");
    info!(%filename, size, %counts, "export complete");

    Ok(ExportReport {
        filename,
        location,
        size,
        counts,
        timestamp: entry.timestamp(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_backup_filename() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        assert_eq!(backup_filename(at), "ods-backup-2024-01-02T03-04-05.json");
    }

    #[test]
    fn test_backup_filename_drops_subseconds() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_999).unwrap();
        assert_eq!(backup_filename(at), "ods-backup-2023-11-14T22-13-20.json");
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(ExportStage::Gathering.to_string(), "gathering");
        assert_eq!(ExportStage::Recording.to_string(), "recording");
    }

    #[tokio::test]
    async fn test_directory_sink_creates_dir() {
        let temp = tempfile::TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path().join("nested/out"));

        let written = sink.write("a.json", "{}").await.unwrap();

        assert_eq!(written.filename, "a.json");
        assert!(written.location.ends_with("a.json"));
        let text = std::fs::read_to_string(temp.path().join("nested/out/a.json")).unwrap();
        assert_eq!(text, "{}");
    }

    #[tokio::test]
    async fn test_directory_sink_never_overwrites() {
        let temp = tempfile::TempDir::new().unwrap();
        let sink = DirectorySink::new(temp.path());

        let first = sink.write("b.json", "one").await.unwrap();
        let second = sink.write("b.json", "two").await.unwrap();
        let third = sink.write("b.json", "three").await.unwrap();

        assert_eq!(first.filename, "b.json");
        assert_eq!(second.filename, "b-1.json");
        assert_eq!(third.filename, "b-2.json");
        assert_eq!(std::fs::read_to_string(temp.path().join("b.json")).unwrap(), "one");
        assert_eq!(std::fs::read_to_string(temp.path().join("b-1.json")).unwrap(), "two");
    }

    #[test]
    fn test_numbered_filename() {
        assert_eq!(numbered_filename("x.json", 0), "x.json");
        assert_eq!(numbered_filename("x.json", 3), "x-3.json");
        assert_eq!(numbered_filename("noext", 1), "noext-1");
    }
}
