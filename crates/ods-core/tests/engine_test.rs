//! Persistence engine integration tests
//!
//! Exercises CRUD, index lookups, schema upgrades and the store lifecycle
//! against file-backed stores in temp directories.

use ods_core::config::StoreConfig;
use ods_core::storage::{Collection, Database, Document, Key, StorageError};
use rusqlite::Connection;
use serde_json::{json, Value};
use std::time::Duration;
use tempfile::TempDir;

fn doc(value: Value) -> Document {
    value.as_object().cloned().expect("test document must be an object")
}

fn file_db(temp: &TempDir) -> Database {
    Database::new(StoreConfig::new(temp.path()).with_busy_timeout(Duration::from_millis(100)))
}

#[tokio::test]
async fn test_add_then_get_returns_record_with_timestamp() {
    let temp = TempDir::new().unwrap();
    let db = file_db(&temp);

    let key = db
        .add(Collection::Themes, doc(json!({"id": "default", "scale": {"current": 1.0}})))
        .await
        .unwrap();
    assert_eq!(key, Key::from("default"));

    let stored = db.get(Collection::Themes, "default").await.unwrap().unwrap();
    assert_eq!(stored["id"], json!("default"));
    assert_eq!(stored["scale"], json!({"current": 1.0}));
    assert!(stored["timestamp"].is_i64());
}

#[tokio::test]
async fn test_add_keeps_explicit_timestamp() {
    let db = Database::in_memory();
    db.add(Collection::Themes, doc(json!({"id": "a", "timestamp": 42})))
        .await
        .unwrap();

    let stored = db.get(Collection::Themes, "a").await.unwrap().unwrap();
    assert_eq!(stored["timestamp"], json!(42));
}

#[tokio::test]
async fn test_generated_keys_increase_and_are_written_back() {
    let db = Database::in_memory();

    let first = db
        .add(Collection::Operations, doc(json!({"type": "build", "title": "one"})))
        .await
        .unwrap();
    let second = db
        .add(Collection::Operations, doc(json!({"type": "build", "title": "two"})))
        .await
        .unwrap();
    assert!(second.as_int().unwrap() > first.as_int().unwrap());

    let stored = db.get(Collection::Operations, second.clone()).await.unwrap().unwrap();
    assert_eq!(stored["id"], second.to_json());

    // Deleted keys are never handed out again
    db.delete(Collection::Operations, second.clone()).await.unwrap();
    let third = db
        .add(Collection::Operations, doc(json!({"type": "build"})))
        .await
        .unwrap();
    assert!(third.as_int().unwrap() > second.as_int().unwrap());
}

#[tokio::test]
async fn test_duplicate_key_rejected() {
    let db = Database::in_memory();
    db.add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap();

    let err = db
        .add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::DuplicateKey { collection: "themes", .. }));
}

#[tokio::test]
async fn test_caller_supplied_key_required() {
    let db = Database::in_memory();
    let err = db
        .add(Collection::Themes, doc(json!({"colors": {}})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));

    let err = db
        .add(Collection::Themes, doc(json!({"id": [1, 2]})))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidKey { .. }));
}

#[tokio::test]
async fn test_integer_and_text_keys_are_distinct() {
    let db = Database::in_memory();
    db.add(Collection::Themes, doc(json!({"id": 5, "n": "int"})))
        .await
        .unwrap();
    db.add(Collection::Themes, doc(json!({"id": "5", "n": "text"})))
        .await
        .unwrap();

    let int = db.get(Collection::Themes, 5_i64).await.unwrap().unwrap();
    let text = db.get(Collection::Themes, "5").await.unwrap().unwrap();
    assert_eq!(int["n"], json!("int"));
    assert_eq!(text["n"], json!("text"));
}

#[tokio::test]
async fn test_get_missing_is_none() {
    let db = Database::in_memory();
    assert!(db.get(Collection::Themes, "nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_update_missing_key_is_not_found() {
    let db = Database::in_memory();
    let err = db
        .update(Collection::Themes, "ghost", doc(json!({"x": 1})))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::NotFound { collection: "themes", .. }));
    assert_eq!(db.count(Collection::Themes).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_merges_and_preserves_key() {
    let db = Database::in_memory();
    let key = db
        .add(
            Collection::Operations,
            doc(json!({"type": "deploy", "title": "old", "status": "pending"})),
        )
        .await
        .unwrap();

    let merged = db
        .update(
            Collection::Operations,
            key.clone(),
            doc(json!({"id": 999, "title": "new", "priority": 2})),
        )
        .await
        .unwrap();

    assert_eq!(merged["id"], key.to_json());
    assert_eq!(merged["title"], json!("new"));
    assert_eq!(merged["status"], json!("pending"));
    assert_eq!(merged["priority"], json!(2));
    assert!(merged["modified"].is_i64());

    let stored = db.get(Collection::Operations, key).await.unwrap().unwrap();
    assert_eq!(stored, merged);
    assert!(db.get(Collection::Operations, 999_i64).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let db = Database::in_memory();
    db.add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap();

    db.delete(Collection::Themes, "default").await.unwrap();
    db.delete(Collection::Themes, "default").await.unwrap();
    db.delete(Collection::Themes, "never-existed").await.unwrap();

    assert!(db.get(Collection::Themes, "default").await.unwrap().is_none());
}

#[tokio::test]
async fn test_get_all_and_clear() {
    let db = Database::in_memory();
    for name in ["alpha", "beta", "gamma"] {
        db.add(Collection::Workspaces, doc(json!({"name": name})))
            .await
            .unwrap();
    }

    let all = db.get_all(Collection::Workspaces).await.unwrap();
    let names: Vec<&str> = all.iter().map(|d| d["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["alpha", "beta", "gamma"]);

    db.clear(Collection::Workspaces).await.unwrap();
    assert_eq!(db.count(Collection::Workspaces).await.unwrap(), 0);
    assert!(db.get_all(Collection::Workspaces).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_get_all_by_index() {
    let db = Database::in_memory();
    db.add(Collection::Operations, doc(json!({"type": "bug", "title": "a"})))
        .await
        .unwrap();
    db.add(Collection::Operations, doc(json!({"type": "feature", "title": "b"})))
        .await
        .unwrap();
    db.add(Collection::Operations, doc(json!({"type": "bug", "title": "c"})))
        .await
        .unwrap();

    let bugs = db
        .get_all_by_index(Collection::Operations, "type", &json!("bug"))
        .await
        .unwrap();
    let titles: Vec<&str> = bugs.iter().map(|d| d["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["a", "c"]);

    let none = db
        .get_all_by_index(Collection::Operations, "type", &json!("chore"))
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_unknown_index_rejected() {
    let db = Database::in_memory();
    let err = db
        .get_all_by_index(Collection::Operations, "title", &json!("x"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::UnknownIndex { .. }));
}

#[tokio::test]
async fn test_data_survives_reopen() {
    let temp = TempDir::new().unwrap();
    {
        let db = file_db(&temp);
        db.add(Collection::Themes, doc(json!({"id": "default", "v": 1})))
            .await
            .unwrap();
        db.close();
    }

    let db = file_db(&temp);
    let stored = db.get(Collection::Themes, "default").await.unwrap().unwrap();
    assert_eq!(stored["v"], json!(1));
}

#[tokio::test]
async fn test_schema_upgrade_keeps_existing_data() {
    let temp = TempDir::new().unwrap();
    {
        let db = file_db(&temp);
        db.add(Collection::Themes, doc(json!({"id": "default"})))
            .await
            .unwrap();
        db.close();
    }

    let upgraded = Database::new(StoreConfig::new(temp.path()).with_schema_version(2));
    assert_eq!(upgraded.count(Collection::Themes).await.unwrap(), 1);

    let raw = Connection::open(temp.path().join("ODS_v9.db")).unwrap();
    let version: i64 = raw
        .pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap();
    assert_eq!(version, 2);
}

#[tokio::test]
async fn test_downgrade_is_connection_error() {
    let temp = TempDir::new().unwrap();
    let db = Database::new(StoreConfig::new(temp.path()).with_schema_version(3));
    db.open().await.unwrap();
    db.close();

    let older = file_db(&temp);
    let err = older.open().await.unwrap_err();
    assert!(matches!(err, StorageError::ConnectionError(_)));
}

#[tokio::test]
async fn test_concurrent_first_use_shares_one_open() {
    let temp = TempDir::new().unwrap();
    let db = std::sync::Arc::new(file_db(&temp));

    let mut tasks = Vec::new();
    for i in 0..8 {
        let db = std::sync::Arc::clone(&db);
        tasks.push(tokio::spawn(async move {
            db.add(Collection::Workspaces, doc(json!({"name": format!("w{i}")})))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(db.count(Collection::Workspaces).await.unwrap(), 8);
}

#[tokio::test]
async fn test_unavailable_storage() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, "file").unwrap();

    let db = Database::new(StoreConfig::new(blocker.join("data")));
    let err = db.open().await.unwrap_err();

    assert!(matches!(err, StorageError::StorageUnavailable(_)));
    assert!(err.is_unavailable());
    assert!(!db.is_open());
}

#[tokio::test]
async fn test_open_blocked_by_other_connection() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("ODS_v9.db");

    let holder = Connection::open(&path).unwrap();
    holder
        .execute_batch("CREATE TABLE other (x); BEGIN EXCLUSIVE;")
        .unwrap();

    let db = file_db(&temp);
    let err = db.open().await.unwrap_err();
    assert!(matches!(err, StorageError::ConnectionBlocked(_)), "{err:?}");

    holder.execute_batch("COMMIT;").unwrap();
    drop(holder);
    db.open().await.unwrap();
}

#[tokio::test]
async fn test_exists_and_destroy() {
    let temp = TempDir::new().unwrap();
    let db = file_db(&temp);
    assert!(!db.exists().await);

    db.add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap();
    assert!(db.exists().await);

    db.destroy().await.unwrap();
    assert!(!db.is_open());
    assert!(!db.exists().await);
    assert!(!temp.path().join("ODS_v9.db").exists());

    // The next operation recreates an empty store
    assert_eq!(db.count(Collection::Themes).await.unwrap(), 0);
}

#[tokio::test]
async fn test_destroy_blocked_by_other_connection() {
    let temp = TempDir::new().unwrap();
    let db = file_db(&temp);
    db.add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap();

    let holder = Connection::open(temp.path().join("ODS_v9.db")).unwrap();
    holder.busy_timeout(Duration::from_secs(2)).unwrap();
    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();

    let err = db.destroy().await.unwrap_err();
    assert!(matches!(err, StorageError::DeletionBlocked(_)), "{err:?}");
    assert!(temp.path().join("ODS_v9.db").exists());

    holder.execute_batch("ROLLBACK;").unwrap();
}

#[tokio::test]
async fn test_estimate_usage() {
    let temp = TempDir::new().unwrap();
    let db = Database::new(StoreConfig::new(temp.path()).with_quota(1 << 20));
    db.add(Collection::Themes, doc(json!({"id": "default"})))
        .await
        .unwrap();

    let estimate = db.estimate_usage().await.unwrap();
    assert!(estimate.usage > 0);
    assert_eq!(estimate.quota, Some(1 << 20));
}
