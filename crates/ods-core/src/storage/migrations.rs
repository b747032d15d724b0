//! Schema upgrades

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use tracing::info;

use super::error::{StorageError, StorageResult};
use super::schema::{CollectionSchema, KeyPolicy, SCHEMA};

/// Bring the store up to `target` schema version
///
/// Creates every collection (and its indexes) missing from the store.
/// Collections that already exist are left untouched, data included.
///
/// # Errors
/// Returns an error if the stored version is newer than `target` or the
/// upgrade transaction fails
pub fn run_migrations(conn: &mut Connection, target: u32) -> StorageResult<()> {
    let stored: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if target < stored {
        return Err(StorageError::ConnectionError(format!(
            "Requested version {target} is less than stored version {stored}"
        )));
    }
    if target == stored {
        return Ok(());
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    for schema in &SCHEMA {
        if !table_exists(&tx, schema.name)? {
            create_collection(&tx, schema)?;
            info!(collection = schema.name, "created collection");
        }
    }
    tx.pragma_update(None, "user_version", target)?;
    tx.commit()?;

    info!(from = stored, to = target, "store upgraded");
    Ok(())
}

fn table_exists(tx: &Transaction<'_>, name: &str) -> StorageResult<bool> {
    let found = tx
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

fn create_collection(tx: &Transaction<'_>, schema: &CollectionSchema) -> StorageResult<()> {
    // Keys live in `pk`; the record itself (key field included) lives in `data`.
    let key_column = match schema.key_policy {
        KeyPolicy::CallerSupplied => "pk PRIMARY KEY NOT NULL",
        KeyPolicy::Generated => "pk INTEGER PRIMARY KEY AUTOINCREMENT",
    };
    tx.execute_batch(&format!(
        r#"CREATE TABLE "{name}" ({key_column}, data TEXT NOT NULL);"#,
        name = schema.name,
    ))?;

    for index in schema.indexes {
        let unique = if index.unique { "UNIQUE " } else { "" };
        tx.execute_batch(&format!(
            r#"CREATE {unique}INDEX IF NOT EXISTS "{index_name}" ON "{table}"(json_extract(data, '$.{field}'));"#,
            index_name = schema.index_name(index.field),
            table = schema.name,
            field = index.field,
        ))?;
    }

    Ok(())
}
