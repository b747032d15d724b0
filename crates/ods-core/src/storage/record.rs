//! Record documents and their merge rules

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use super::error::{StorageError, StorageResult};

/// A stored record: a JSON object
pub type Document = Map<String, Value>;

/// Attribute stamped on every record at creation if absent
pub const TIMESTAMP_FIELD: &str = "timestamp";

/// Attribute stamped on every update
pub const MODIFIED_FIELD: &str = "modified";

/// Current time as epoch milliseconds
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Shallow merge: every top-level field of `patch` replaces the field of the
/// same name in `base`; fields absent from the patch are kept.
pub fn merge(base: &mut Document, patch: Document) {
    for (field, value) in patch {
        base.insert(field, value);
    }
}

/// Set `timestamp` to `now` unless the record already carries one
pub fn stamp_created(doc: &mut Document, now: i64) {
    doc.entry(TIMESTAMP_FIELD).or_insert_with(|| Value::from(now));
}

/// Serialize a typed value into a document
///
/// # Errors
/// Returns an error if the value does not serialize to a JSON object
pub fn to_document<T: Serialize>(value: &T) -> StorageResult<Document> {
    match serde_json::to_value(value)? {
        Value::Object(doc) => Ok(doc),
        other => Err(StorageError::InvalidRecord(format!(
            "expected an object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Deserialize a document into a typed value
///
/// # Errors
/// Returns an error if the document does not fit `T`
pub fn from_document<T: DeserializeOwned>(doc: Document) -> StorageResult<T> {
    Ok(serde_json::from_value(Value::Object(doc))?)
}

/// Short name of a JSON value's type, for messages
#[must_use]
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
