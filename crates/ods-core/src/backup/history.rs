//! The `backups` collection: one summary row per export or import

use tracing::{debug, warn};

use super::types::BackupLogEntry;
use crate::storage::{record, Collection, Database, StorageError, StorageResult};

/// How many later milliseconds to try when a timestamp key is taken
const MAX_TIMESTAMP_BUMPS: i64 = 1000;

/// Append `entry`, moving its timestamp forward past any existing row with
/// the same millisecond; returns the entry as stored
pub(crate) async fn append_log(
    db: &Database,
    mut entry: BackupLogEntry,
) -> StorageResult<BackupLogEntry> {
    let start = entry.timestamp();
    loop {
        match db.add(Collection::Backups, record::to_document(&entry)?).await {
            Ok(_) => return Ok(entry),
            Err(StorageError::DuplicateKey { .. })
                if entry.timestamp() - start < MAX_TIMESTAMP_BUMPS =>
            {
                debug!(timestamp = entry.timestamp(), "backup log key taken, bumping");
                entry.set_timestamp(entry.timestamp() + 1);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Every log entry, newest first; unreadable rows are skipped
pub(crate) async fn list(db: &Database) -> StorageResult<Vec<BackupLogEntry>> {
    let mut entries = Vec::new();
    for doc in db.get_all(Collection::Backups).await? {
        match record::from_document::<BackupLogEntry>(doc) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(error = %e, "skipping unreadable backup log entry"),
        }
    }
    entries.reverse();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::types::CollectionCounts;

    fn export_at(timestamp: i64) -> BackupLogEntry {
        BackupLogEntry::Export {
            timestamp,
            version: "9.1".to_string(),
            filename: format!("{timestamp}.json"),
            size: 10,
            counts: CollectionCounts::default(),
            reason: None,
        }
    }

    #[tokio::test]
    async fn test_append_bumps_taken_timestamp() {
        let db = Database::in_memory();

        let first = append_log(&db, export_at(100)).await.unwrap();
        let second = append_log(&db, export_at(100)).await.unwrap();
        let third = append_log(&db, export_at(100)).await.unwrap();

        assert_eq!(first.timestamp(), 100);
        assert_eq!(second.timestamp(), 101);
        assert_eq!(third.timestamp(), 102);
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let db = Database::in_memory();
        append_log(&db, export_at(5)).await.unwrap();
        append_log(&db, export_at(50)).await.unwrap();
        append_log(&db, export_at(20)).await.unwrap();

        let stamps: Vec<i64> = list(&db)
            .await
            .unwrap()
            .iter()
            .map(BackupLogEntry::timestamp)
            .collect();
        assert_eq!(stamps, vec![50, 20, 5]);
    }

    #[tokio::test]
    async fn test_list_skips_foreign_rows() {
        let db = Database::in_memory();
        append_log(&db, export_at(1)).await.unwrap();
        let stray = serde_json::json!({"timestamp": 2, "note": "hand-written"});
        db.add(Collection::Backups, stray.as_object().cloned().unwrap())
            .await
            .unwrap();

        assert_eq!(list(&db).await.unwrap().len(), 1);
    }
}
