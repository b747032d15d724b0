//! Backup document and backup log types

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::{Collection, Document};

/// Identity marker every backup document carries
pub const BACKUP_MAGIC: &str = "ODS_BACKUP_v9";

/// Protocol version written into exports
pub const BACKUP_VERSION: &str = "9.1";

/// `exportedBy` value written into exports
pub const EXPORTED_BY: &str = "ODS v9.1";

/// A full logical snapshot of the exported collections
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupDocument {
    pub magic: String,
    pub version: String,
    /// Creation time, epoch milliseconds
    pub timestamp: i64,
    /// Creation time, ISO-8601
    pub date: String,
    pub data: BackupData,
    #[serde(default)]
    pub metadata: BackupMetadata,
}

impl BackupDocument {
    /// A current-version document created at `at`
    #[must_use]
    pub fn new(at: DateTime<Utc>, data: BackupData) -> Self {
        let counts = data.counts();
        Self {
            magic: BACKUP_MAGIC.to_string(),
            version: BACKUP_VERSION.to_string(),
            timestamp: at.timestamp_millis(),
            date: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            data,
            metadata: BackupMetadata {
                themes_count: counts.themes,
                operations_count: counts.operations,
                workspaces_count: counts.workspaces,
                exported_by: EXPORTED_BY.to_string(),
                user_agent: user_agent(),
            },
        }
    }
}

/// Records per collection; an absent section means zero records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operations: Option<Vec<Document>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workspaces: Option<Vec<Document>>,
}

impl BackupData {
    #[must_use]
    pub fn section(&self, collection: Collection) -> Option<&[Document]> {
        match collection {
            Collection::Themes => self.themes.as_deref(),
            Collection::Operations => self.operations.as_deref(),
            Collection::Workspaces => self.workspaces.as_deref(),
            Collection::Backups => None,
        }
    }

    pub fn set_section(&mut self, collection: Collection, records: Vec<Document>) {
        match collection {
            Collection::Themes => self.themes = Some(records),
            Collection::Operations => self.operations = Some(records),
            Collection::Workspaces => self.workspaces = Some(records),
            Collection::Backups => {}
        }
    }

    #[must_use]
    pub fn count(&self, collection: Collection) -> usize {
        self.section(collection).map_or(0, <[Document]>::len)
    }

    #[must_use]
    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            themes: self.count(Collection::Themes),
            operations: self.count(Collection::Operations),
            workspaces: self.count(Collection::Workspaces),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BackupMetadata {
    pub themes_count: usize,
    pub operations_count: usize,
    pub workspaces_count: usize,
    pub exported_by: String,
    pub user_agent: String,
}

/// Per-collection record counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionCounts {
    pub themes: usize,
    pub operations: usize,
    pub workspaces: usize,
}

impl CollectionCounts {
    #[must_use]
    pub fn get(&self, collection: Collection) -> usize {
        match collection {
            Collection::Themes => self.themes,
            Collection::Operations => self.operations,
            Collection::Workspaces => self.workspaces,
            Collection::Backups => 0,
        }
    }

    pub fn set(&mut self, collection: Collection, count: usize) {
        match collection {
            Collection::Themes => self.themes = count,
            Collection::Operations => self.operations = count,
            Collection::Workspaces => self.workspaces = count,
            Collection::Backups => {}
        }
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.themes + self.operations + self.workspaces
    }
}

impl fmt::Display for CollectionCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} themes, {} operations, {} workspaces",
            self.themes, self.operations, self.workspaces
        )
    }
}

/// Summary row in the `backups` collection, keyed by `timestamp`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackupLogEntry {
    Export {
        timestamp: i64,
        version: String,
        filename: String,
        size: u64,
        counts: CollectionCounts,
        /// Why the export ran when it was not user-requested
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Import {
        timestamp: i64,
        /// Version of the imported document
        version: String,
        #[serde(rename = "originalTimestamp")]
        original_timestamp: i64,
        imported: CollectionCounts,
        filename: String,
    },
}

impl BackupLogEntry {
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        match self {
            Self::Export { timestamp, .. } | Self::Import { timestamp, .. } => *timestamp,
        }
    }

    pub(crate) fn set_timestamp(&mut self, value: i64) {
        match self {
            Self::Export { timestamp, .. } | Self::Import { timestamp, .. } => *timestamp = value,
        }
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::Export { filename, .. } | Self::Import { filename, .. } => filename,
        }
    }

    #[must_use]
    pub fn is_export(&self) -> bool {
        matches!(self, Self::Export { .. })
    }
}

fn user_agent() -> String {
    format!(
        "ods-core/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        std::env::consts::ARCH
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_document_wire_format() {
        let at = Utc.with_ymd_and_hms(2024, 3, 5, 14, 7, 9).unwrap();
        let mut data = BackupData::default();
        data.set_section(Collection::Themes, vec![]);
        data.set_section(
            Collection::Operations,
            vec![json!({"id": 1, "type": "x"}).as_object().cloned().unwrap()],
        );
        data.set_section(Collection::Workspaces, vec![]);

        let value = serde_json::to_value(BackupDocument::new(at, data)).unwrap();

        assert_eq!(value["magic"], json!("ODS_BACKUP_v9"));
        assert_eq!(value["version"], json!("9.1"));
        assert_eq!(value["timestamp"], json!(at.timestamp_millis()));
        assert_eq!(value["date"], json!("2024-03-05T14:07:09.000Z"));
        assert_eq!(value["metadata"]["operationsCount"], json!(1));
        assert_eq!(value["metadata"]["themesCount"], json!(0));
        assert_eq!(value["metadata"]["exportedBy"], json!("ODS v9.1"));
        assert!(value["metadata"]["userAgent"]
            .as_str()
            .unwrap()
            .starts_with("ods-core/"));
        assert!(value["data"]["workspaces"].is_array());
    }

    #[test]
    fn test_log_entry_tagging() {
        let entry = BackupLogEntry::Import {
            timestamp: 10,
            version: "9.0".to_string(),
            original_timestamp: 5,
            imported: CollectionCounts {
                themes: 1,
                operations: 2,
                workspaces: 0,
            },
            filename: "a.json".to_string(),
        };
        let value = serde_json::to_value(&entry).unwrap();

        assert_eq!(value["kind"], json!("import"));
        assert_eq!(value["originalTimestamp"], json!(5));
        assert_eq!(value["imported"]["operations"], json!(2));

        let back: BackupLogEntry = serde_json::from_value(value).unwrap();
        assert_eq!(back, entry);
    }
}
