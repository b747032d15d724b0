//! Persistence engine
//!
//! [`Database`] owns a lazily opened SQLite connection. Each collection is a
//! table of JSON documents keyed by `pk`, with secondary indexes built on
//! `json_extract` expressions. Every operation is async, runs its SQLite work
//! on the blocking pool, and commits on its own before returning.

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use super::error::{is_lock_conflict, StorageError, StorageResult};
use super::key::Key;
use super::migrations;
use super::record::{self, Document, MODIFIED_FIELD};
use super::schema::{Collection, CollectionSchema, KeyPolicy};
use crate::config::{StoreConfig, StoreLocation};

type Handle = Arc<Mutex<Connection>>;

/// Best-effort storage usage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageEstimate {
    /// Bytes on disk
    pub usage: u64,
    /// Configured quota, if any
    pub quota: Option<u64>,
}

/// Database handle
pub struct Database {
    config: StoreConfig,
    // Swapped for a fresh cell on close/destroy so the next caller reopens.
    cell: Mutex<Arc<OnceCell<Handle>>>,
}

impl Database {
    /// Create a handle; nothing is opened until first use
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            cell: Mutex::new(Arc::new(OnceCell::new())),
        }
    }

    /// Create an in-memory database (for testing)
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::in_memory())
    }

    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open the store, upgrading its schema if needed
    ///
    /// Concurrent callers share a single in-flight open.
    ///
    /// # Errors
    /// Returns `StorageUnavailable`, `ConnectionBlocked` or `ConnectionError`
    pub async fn open(&self) -> StorageResult<()> {
        self.handle().await.map(|_| ())
    }

    /// Whether a connection is currently open
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.current_cell().initialized()
    }

    /// Close the connection; the next operation reopens it
    pub fn close(&self) {
        let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(OnceCell::new());
    }

    /// Insert a new record and return its key
    ///
    /// # Errors
    /// Returns `DuplicateKey` if the key is taken, `InvalidKey` if the record
    /// carries no usable key where one is required
    pub async fn add(&self, collection: Collection, mut record: Document) -> StorageResult<Key> {
        let schema = collection.schema();
        record::stamp_created(&mut record, record::now_millis());

        let key = self.run(move |conn| insert(conn, schema, record)).await?;
        debug!(collection = schema.name, %key, "record added");
        Ok(key)
    }

    /// Get a record by key
    ///
    /// # Errors
    /// Returns an error if the store cannot be read
    pub async fn get(
        &self,
        collection: Collection,
        key: impl Into<Key>,
    ) -> StorageResult<Option<Document>> {
        let key = key.into();
        let schema = collection.schema();
        self.run(move |conn| {
            let data: Option<String> = conn
                .query_row(
                    &format!(r#"SELECT data FROM "{}" WHERE pk = ?1"#, schema.name),
                    [&key],
                    |row| row.get(0),
                )
                .optional()?;
            data.map(|d| parse_document(&d)).transpose()
        })
        .await
    }

    /// Get every record in a collection, in key order
    ///
    /// # Errors
    /// Returns an error if the store cannot be read
    pub async fn get_all(&self, collection: Collection) -> StorageResult<Vec<Document>> {
        let schema = collection.schema();
        self.run(move |conn| {
            query_documents(
                conn,
                &format!(r#"SELECT data FROM "{}" ORDER BY pk"#, schema.name),
                &[],
            )
        })
        .await
    }

    /// Get every record whose indexed `field` equals `value`
    ///
    /// # Errors
    /// Returns `UnknownIndex` if the collection has no index on `field`
    pub async fn get_all_by_index(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> StorageResult<Vec<Document>> {
        let schema = collection.schema();
        let index = schema.index(field).ok_or_else(|| StorageError::UnknownIndex {
            collection: schema.name,
            index: field.to_string(),
        })?;
        let field = index.field;
        let param = index_param(value);

        self.run(move |conn| {
            query_documents(
                conn,
                &format!(
                    r#"SELECT data FROM "{}" WHERE json_extract(data, '$.{field}') IS ?1 ORDER BY pk"#,
                    schema.name
                ),
                &[param],
            )
        })
        .await
    }

    /// Count the records in a collection
    ///
    /// # Errors
    /// Returns an error if the store cannot be read
    pub async fn count(&self, collection: Collection) -> StorageResult<usize> {
        let schema = collection.schema();
        self.run(move |conn| {
            let n: i64 = conn.query_row(
                &format!(r#"SELECT COUNT(*) FROM "{}""#, schema.name),
                [],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(n).unwrap_or_default())
        })
        .await
    }

    /// Merge `patch` over an existing record and return the stored result
    ///
    /// The key field always keeps its original value and `modified` is
    /// stamped with the current time.
    ///
    /// # Errors
    /// Returns `NotFound` if no record has this key; nothing is created
    pub async fn update(
        &self,
        collection: Collection,
        key: impl Into<Key>,
        patch: Document,
    ) -> StorageResult<Document> {
        let key = key.into();
        let schema = collection.schema();
        let now = record::now_millis();

        let doc = self
            .run(move |conn| {
                let tx = conn.transaction()?;
                let existing: Option<String> = tx
                    .query_row(
                        &format!(r#"SELECT data FROM "{}" WHERE pk = ?1"#, schema.name),
                        [&key],
                        |row| row.get(0),
                    )
                    .optional()?;
                let Some(existing) = existing else {
                    return Err(StorageError::NotFound {
                        collection: schema.name,
                        key,
                    });
                };

                let mut doc = parse_document(&existing)?;
                record::merge(&mut doc, patch);
                doc.insert(MODIFIED_FIELD.to_string(), Value::from(now));
                doc.insert(schema.key_field.to_string(), key.to_json());

                tx.execute(
                    &format!(r#"UPDATE "{}" SET data = ?2 WHERE pk = ?1"#, schema.name),
                    params![key, serde_json::to_string(&doc)?],
                )?;
                tx.commit()?;
                Ok(doc)
            })
            .await?;

        debug!(collection = schema.name, "record updated");
        Ok(doc)
    }

    /// Delete a record; deleting a missing key is not an error
    ///
    /// # Errors
    /// Returns an error if the store cannot be written
    pub async fn delete(&self, collection: Collection, key: impl Into<Key>) -> StorageResult<()> {
        let key = key.into();
        let schema = collection.schema();
        let deleted = self
            .run(move |conn| {
                Ok(conn.execute(
                    &format!(r#"DELETE FROM "{}" WHERE pk = ?1"#, schema.name),
                    [&key],
                )?)
            })
            .await?;
        debug!(collection = schema.name, deleted, "record delete");
        Ok(())
    }

    /// Remove every record from a collection
    ///
    /// Generated key sequences are not reset.
    ///
    /// # Errors
    /// Returns an error if the store cannot be written
    pub async fn clear(&self, collection: Collection) -> StorageResult<()> {
        let schema = collection.schema();
        let removed = self
            .run(move |conn| Ok(conn.execute(&format!(r#"DELETE FROM "{}""#, schema.name), [])?))
            .await?;
        debug!(collection = schema.name, removed, "collection cleared");
        Ok(())
    }

    /// Close the connection and delete the whole store
    ///
    /// # Errors
    /// Returns `DeletionBlocked` if another connection still holds the store
    pub async fn destroy(&self) -> StorageResult<()> {
        {
            let mut guard = self.cell.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(handle) = guard.get() {
                if Arc::strong_count(handle) > 1 {
                    return Err(StorageError::DeletionBlocked(
                        "an operation is still using the connection".to_string(),
                    ));
                }
            }
            *guard = Arc::new(OnceCell::new());
        }

        let StoreLocation::File { .. } = self.config.location else {
            info!(store = %self.config.name, "in-memory store discarded");
            return Ok(());
        };

        let config = self.config.clone();
        tokio::task::spawn_blocking(move || delete_store_files(&config))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))??;

        info!(store = %self.config.name, "store deleted");
        Ok(())
    }

    /// Best-effort byte usage and quota
    ///
    /// Returns `None` when estimation is unsupported (in-memory stores) or
    /// the files cannot be inspected.
    pub async fn estimate_usage(&self) -> Option<StorageEstimate> {
        let path = self.config.database_path()?;
        let quota = self.config.quota_bytes;

        tokio::task::spawn_blocking(move || {
            let mut usage = 0u64;
            for file in store_files(&path) {
                match fs::metadata(&file) {
                    Ok(meta) => usage += meta.len(),
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => {
                        warn!(path = %file.display(), error = %e, "cannot estimate usage");
                        return None;
                    }
                }
            }
            Some(StorageEstimate { usage, quota })
        })
        .await
        .ok()
        .flatten()
    }

    /// Whether the store has ever been created
    pub async fn exists(&self) -> bool {
        let Some(path) = self.config.database_path() else {
            return self.is_open();
        };

        match path.try_exists() {
            Ok(found) => found,
            Err(e) => {
                debug!(error = %e, "cannot enumerate store, probing");
                tokio::task::spawn_blocking(move || probe_store(&path))
                    .await
                    .unwrap_or(false)
            }
        }
    }

    fn current_cell(&self) -> Arc<OnceCell<Handle>> {
        Arc::clone(&self.cell.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn handle(&self) -> StorageResult<Handle> {
        let cell = self.current_cell();
        let handle = cell
            .get_or_try_init(|| open_connection(self.config.clone()))
            .await?;
        Ok(Arc::clone(handle))
    }

    async fn run<T, F>(&self, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.handle().await?;
        tokio::task::spawn_blocking(move || {
            let mut conn = handle.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

async fn open_connection(config: StoreConfig) -> StorageResult<Handle> {
    let conn = tokio::task::spawn_blocking(move || open_blocking(&config))
        .await
        .map_err(|e| StorageError::Task(e.to_string()))??;
    Ok(Arc::new(Mutex::new(conn)))
}

fn open_blocking(config: &StoreConfig) -> StorageResult<Connection> {
    let mut conn = match &config.location {
        StoreLocation::File { data_dir } => {
            fs::create_dir_all(data_dir).map_err(|e| {
                StorageError::StorageUnavailable(format!(
                    "cannot create data directory {}: {e}",
                    data_dir.display()
                ))
            })?;
            let path = data_dir.join(format!("{}.db", config.name));
            let conn = Connection::open(&path).map_err(classify_open_error)?;
            conn.busy_timeout(config.busy_timeout)
                .map_err(classify_open_error)?;
            // WAL lets readers proceed during writes; NORMAL sync is safe with WAL
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(classify_open_error)?;
            conn.pragma_update(None, "synchronous", "NORMAL")
                .map_err(classify_open_error)?;
            conn
        }
        StoreLocation::Memory => Connection::open_in_memory().map_err(classify_open_error)?,
    };

    migrations::run_migrations(&mut conn, config.schema_version).map_err(|e| match e {
        StorageError::Sqlite(err) => classify_open_error(err),
        other => other,
    })?;

    info!(
        store = %config.name,
        version = config.schema_version,
        "store opened"
    );
    Ok(conn)
}

fn classify_open_error(err: rusqlite::Error) -> StorageError {
    if is_lock_conflict(&err) {
        StorageError::ConnectionBlocked(err.to_string())
    } else {
        StorageError::ConnectionError(err.to_string())
    }
}

fn insert(
    conn: &mut Connection,
    schema: &'static CollectionSchema,
    mut record: Document,
) -> StorageResult<Key> {
    let explicit = match record.get(schema.key_field) {
        None | Some(Value::Null) => None,
        Some(value) => Some(Key::from_json(value).ok_or_else(|| StorageError::InvalidKey {
            collection: schema.name,
            reason: format!(
                "'{}' must be a string or an integer, got {}",
                schema.key_field,
                record::json_kind(value)
            ),
        })?),
    };

    let insert_sql = format!(r#"INSERT INTO "{}" (pk, data) VALUES (?1, ?2)"#, schema.name);
    let duplicate = |key: &Key| StorageError::DuplicateKey {
        collection: schema.name,
        key: key.clone(),
    };

    match (schema.key_policy, explicit) {
        (KeyPolicy::CallerSupplied, None) => Err(StorageError::InvalidKey {
            collection: schema.name,
            reason: format!("missing key field '{}'", schema.key_field),
        }),
        (KeyPolicy::Generated, Some(Key::Text(_))) => Err(StorageError::InvalidKey {
            collection: schema.name,
            reason: format!("'{}' must be an integer", schema.key_field),
        }),
        (_, Some(key)) => {
            conn.execute(&insert_sql, params![key, serde_json::to_string(&record)?])
                .map_err(|e| map_constraint(e, || duplicate(&key)))?;
            Ok(key)
        }
        (KeyPolicy::Generated, None) => {
            // Allocate the key first so it can be written back into the record.
            let tx = conn.transaction()?;
            tx.execute(
                &format!(r#"INSERT INTO "{}" (pk, data) VALUES (NULL, '{{}}')"#, schema.name),
                [],
            )?;
            let key = Key::Int(tx.last_insert_rowid());
            record.insert(schema.key_field.to_string(), key.to_json());
            tx.execute(
                &format!(r#"UPDATE "{}" SET data = ?2 WHERE pk = ?1"#, schema.name),
                params![key, serde_json::to_string(&record)?],
            )?;
            tx.commit()?;
            Ok(key)
        }
    }
}

fn map_constraint(err: rusqlite::Error, duplicate: impl FnOnce() -> StorageError) -> StorageError {
    if err.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
        duplicate()
    } else {
        err.into()
    }
}

fn query_documents(
    conn: &Connection,
    sql: &str,
    params: &[SqlValue],
) -> StorageResult<Vec<Document>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(params), |row| {
        row.get::<_, String>(0)
    })?;

    let mut docs = Vec::new();
    for row in rows {
        docs.push(parse_document(&row?)?);
    }
    Ok(docs)
}

fn parse_document(data: &str) -> StorageResult<Document> {
    Ok(serde_json::from_str(data)?)
}

/// SQL value comparable with `json_extract` output for `value`
fn index_param(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn store_files(path: &Path) -> [PathBuf; 4] {
    let with_suffix = |suffix: &str| {
        let mut name = path.as_os_str().to_owned();
        name.push(suffix);
        PathBuf::from(name)
    };
    [
        path.to_path_buf(),
        with_suffix("-wal"),
        with_suffix("-shm"),
        with_suffix("-journal"),
    ]
}

fn delete_store_files(config: &StoreConfig) -> StorageResult<()> {
    let Some(path) = config.database_path() else {
        return Ok(());
    };
    if !path.exists() {
        return Ok(());
    }

    // Any other connection holding a lock keeps us from taking an exclusive one.
    {
        let probe = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(classify_open_error)?;
        probe.busy_timeout(config.busy_timeout)?;
        probe
            .execute_batch("BEGIN EXCLUSIVE; COMMIT;")
            .map_err(|e| {
                if is_lock_conflict(&e) {
                    StorageError::DeletionBlocked(format!(
                        "another connection is using {}",
                        path.display()
                    ))
                } else {
                    e.into()
                }
            })?;
    }

    for file in store_files(&path) {
        match fs::remove_file(&file) {
            Ok(()) => debug!(path = %file.display(), "removed store file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(StorageError::ConnectionError(format!(
                    "cannot remove {}: {e}",
                    file.display()
                )))
            }
        }
    }
    Ok(())
}

fn probe_store(path: &Path) -> bool {
    Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .and_then(|conn| conn.pragma_query_value(None, "user_version", |row| row.get::<_, i64>(0)))
        .map(|version| version > 0)
        .unwrap_or(false)
}
