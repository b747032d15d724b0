//! Structural validation of backup documents

use chrono::{SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use super::error::BackupError;
use super::types::{BackupData, BackupDocument, BackupMetadata, BACKUP_MAGIC};
use crate::storage::{record::json_kind, Collection, Document, Key, KeyPolicy};

/// Parse and validate backup text
///
/// Checks run in a fixed order: JSON syntax, magic, version, timestamp,
/// data, then the shape of every record of every known section. Records are
/// free-form objects; only a caller-supplied key must be present and valid.
/// Unknown sections are ignored.
///
/// # Errors
/// Returns the first validation failure found
pub fn parse_document(text: &str) -> Result<BackupDocument, BackupError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| BackupError::MalformedDocument(e.to_string()))?;
    let root = match value {
        Value::Object(root) => root,
        other => {
            return Err(BackupError::MalformedDocument(format!(
                "expected an object at the top level, got {}",
                json_kind(&other)
            )))
        }
    };

    let magic = match root.get("magic") {
        Some(Value::String(magic)) if magic == BACKUP_MAGIC => magic.clone(),
        Some(Value::String(other)) => {
            return Err(BackupError::InvalidMagic {
                found: Some(other.clone()),
            })
        }
        None | Some(Value::Null) => return Err(BackupError::InvalidMagic { found: None }),
        Some(other) => {
            return Err(BackupError::InvalidMagic {
                found: Some(other.to_string()),
            })
        }
    };

    let version = match root.get("version") {
        None | Some(Value::Null) => return Err(BackupError::MissingVersion),
        Some(Value::String(version)) => version.clone(),
        Some(other) => {
            return Err(BackupError::MalformedDocument(format!(
                "version must be a string, got {}",
                json_kind(other)
            )))
        }
    };

    let timestamp = match root.get("timestamp") {
        None | Some(Value::Null) => return Err(BackupError::MissingTimestamp),
        Some(value) => value.as_i64().ok_or_else(|| {
            BackupError::MalformedDocument(format!(
                "timestamp must be an integer, got {value}"
            ))
        })?,
    };

    let data = match root.get("data") {
        None | Some(Value::Null) => return Err(BackupError::MissingData),
        Some(Value::Object(data)) => parse_data(data)?,
        Some(other) => {
            return Err(BackupError::InvalidDataShape(format!(
                "data must be an object, got {}",
                json_kind(other)
            )))
        }
    };

    let date = root
        .get("date")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            Utc.timestamp_millis_opt(timestamp)
                .single()
                .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        })
        .unwrap_or_default();

    // Metadata is informational; a damaged block is not a reason to refuse.
    let metadata = root
        .get("metadata")
        .and_then(|m| serde_json::from_value::<BackupMetadata>(m.clone()).ok())
        .unwrap_or_default();

    Ok(BackupDocument {
        magic,
        version,
        timestamp,
        date,
        data,
        metadata,
    })
}

/// Major component of a version string: everything before the first `.`
#[must_use]
pub fn major_version(version: &str) -> &str {
    version.split_once('.').map_or(version, |(major, _)| major)
}

fn parse_data(data: &Map<String, Value>) -> Result<BackupData, BackupError> {
    let mut parsed = BackupData::default();

    for collection in Collection::EXPORTED {
        let name = collection.name();
        let records = match data.get(name) {
            None | Some(Value::Null) => continue,
            Some(Value::Array(records)) => records,
            Some(other) => {
                return Err(BackupError::InvalidDataShape(format!(
                    "data.{name} must be an array, got {}",
                    json_kind(other)
                )))
            }
        };

        let mut docs = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let Value::Object(doc) = record else {
                return Err(BackupError::InvalidDataShape(format!(
                    "data.{name}[{i}] must be an object, got {}",
                    json_kind(record)
                )));
            };
            check_key(collection, doc)
                .map_err(|e| BackupError::InvalidDataShape(format!("data.{name}[{i}]: {e}")))?;
            docs.push(doc.clone());
        }
        parsed.set_section(collection, docs);
    }

    Ok(parsed)
}

// Generated keys are dropped on import, so only caller-supplied ones matter.
fn check_key(collection: Collection, doc: &Document) -> Result<(), String> {
    let schema = collection.schema();
    if schema.key_policy != KeyPolicy::CallerSupplied {
        return Ok(());
    }
    match doc.get(schema.key_field) {
        None | Some(Value::Null) => Err(format!("missing key field `{}`", schema.key_field)),
        Some(value) if Key::from_json(value).is_none() => Err(format!(
            "key field `{}` must be an integer or string, got {}",
            schema.key_field,
            json_kind(value)
        )),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid() -> Value {
        json!({
            "magic": "ODS_BACKUP_v9",
            "version": "9.1",
            "timestamp": 1_700_000_000_000_i64,
            "date": "2023-11-14T22:13:20.000Z",
            "data": {
                "themes": [{"id": "default"}],
                "operations": [{"id": 4, "type": "deploy", "title": "Ship"}],
                "workspaces": []
            }
        })
    }

    fn without(field: &str) -> String {
        let mut doc = valid();
        doc.as_object_mut().unwrap().remove(field);
        doc.to_string()
    }

    #[test]
    fn test_valid_document() {
        let doc = parse_document(&valid().to_string()).unwrap();
        assert_eq!(doc.version, "9.1");
        assert_eq!(doc.data.count(Collection::Operations), 1);
        assert_eq!(doc.data.count(Collection::Workspaces), 0);
        assert_eq!(doc.metadata, BackupMetadata::default());
    }

    #[test]
    fn test_malformed_json() {
        let err = parse_document("{not json").unwrap_err();
        assert!(matches!(err, BackupError::MalformedDocument(_)));

        let err = parse_document("[1, 2]").unwrap_err();
        assert!(matches!(err, BackupError::MalformedDocument(_)));
    }

    #[test]
    fn test_magic() {
        let mut doc = valid();
        doc["magic"] = json!("ODS_BACKUP_v8");
        let err = parse_document(&doc.to_string()).unwrap_err();
        assert!(matches!(err, BackupError::InvalidMagic { found: Some(ref m) } if m == "ODS_BACKUP_v8"));

        let err = parse_document(&without("magic")).unwrap_err();
        assert!(matches!(err, BackupError::InvalidMagic { found: None }));
    }

    #[test]
    fn test_missing_fields() {
        assert!(matches!(
            parse_document(&without("version")).unwrap_err(),
            BackupError::MissingVersion
        ));
        assert!(matches!(
            parse_document(&without("timestamp")).unwrap_err(),
            BackupError::MissingTimestamp
        ));
        assert!(matches!(
            parse_document(&without("data")).unwrap_err(),
            BackupError::MissingData
        ));
    }

    #[test]
    fn test_data_shape() {
        let mut doc = valid();
        doc["data"] = json!([]);
        assert!(matches!(
            parse_document(&doc.to_string()).unwrap_err(),
            BackupError::InvalidDataShape(_)
        ));

        let mut doc = valid();
        doc["data"]["operations"] = json!({"0": {}});
        assert!(matches!(
            parse_document(&doc.to_string()).unwrap_err(),
            BackupError::InvalidDataShape(_)
        ));
    }

    #[test]
    fn test_records_are_free_form() {
        let mut doc = valid();
        doc["data"]["operations"] = json!([{"title": "no type"}, {"created": "yesterday"}]);
        doc["data"]["workspaces"] = json!([{"color": "red"}]);
        doc["data"]["themes"] = json!([{"id": 7, "colors": "dark"}]);

        let parsed = parse_document(&doc.to_string()).unwrap();
        assert_eq!(parsed.data.count(Collection::Operations), 2);
        assert_eq!(parsed.data.count(Collection::Workspaces), 1);
    }

    #[test]
    fn test_caller_supplied_key_required() {
        let mut doc = valid();
        doc["data"]["themes"] = json!([{"id": "default"}, {"colors": {}}]);
        let err = parse_document(&doc.to_string()).unwrap_err();
        let BackupError::InvalidDataShape(msg) = err else {
            panic!("expected InvalidDataShape, got {err:?}");
        };
        assert!(msg.starts_with("data.themes[1]"), "{msg}");

        doc["data"]["themes"] = json!([{"id": [1]}]);
        assert!(matches!(
            parse_document(&doc.to_string()).unwrap_err(),
            BackupError::InvalidDataShape(_)
        ));

        // generated keys are not checked
        doc["data"]["themes"] = json!([]);
        doc["data"]["operations"] = json!([{"id": "weird"}]);
        assert!(parse_document(&doc.to_string()).is_ok());
    }

    #[test]
    fn test_missing_section_and_unknown_section() {
        let mut doc = valid();
        doc["data"].as_object_mut().unwrap().remove("operations");
        doc["data"]["notes"] = json!("ignored");

        let parsed = parse_document(&doc.to_string()).unwrap();
        assert!(parsed.data.section(Collection::Operations).is_none());
        assert_eq!(parsed.data.count(Collection::Operations), 0);
    }

    #[test]
    fn test_date_derived_from_timestamp() {
        let parsed = parse_document(&without("date")).unwrap();
        assert_eq!(parsed.date, "2023-11-14T22:13:20.000Z");
    }

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("9.1"), "9");
        assert_eq!(major_version("10.0.2"), "10");
        assert_eq!(major_version("9"), "9");
        assert_eq!(major_version(""), "");
    }
}
