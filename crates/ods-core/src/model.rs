//! Record models for the `operations` and `workspaces` collections

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::storage::record::now_millis;

/// A recorded operation (task)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationRecord {
    /// Engine-assigned key; absent until stored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_status() -> String {
    OperationRecord::STATUS_PENDING.to_string()
}

impl OperationRecord {
    pub const STATUS_PENDING: &'static str = "pending";
    pub const STATUS_DONE: &'static str = "done";

    /// A new pending operation created now
    #[must_use]
    pub fn new(kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: kind.into(),
            title: title.into(),
            status: default_status(),
            created: Some(now_millis()),
            modified: None,
            timestamp: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.status == Self::STATUS_DONE
    }
}

/// A named workspace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkspaceRecord {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
            created: Some(now_millis()),
            modified: None,
            timestamp: None,
            extra: Map::new(),
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_type_field() {
        let op = OperationRecord::new("deploy", "Ship it");
        let value = serde_json::to_value(&op).unwrap();

        assert_eq!(value["type"], json!("deploy"));
        assert_eq!(value["status"], json!("pending"));
        assert!(value.get("id").is_none());
        assert!(value["created"].is_i64());
    }

    #[test]
    fn test_operation_type_defaults_to_empty() {
        let op: OperationRecord = serde_json::from_value(json!({"title": "x"})).unwrap();
        assert_eq!(op.kind, "");
        assert_eq!(op.status, "pending");
    }

    #[test]
    fn test_operation_rejects_wrong_field_types() {
        let result = serde_json::from_value::<OperationRecord>(json!({"type": "x", "created": "yesterday"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_workspace_keeps_unknown_fields() {
        let ws: WorkspaceRecord =
            serde_json::from_value(json!({"id": 3, "name": "main", "color": "red"})).unwrap();
        assert_eq!(ws.id, Some(3));
        assert_eq!(ws.extra["color"], json!("red"));
    }
}
