//! Store schema registry
//!
//! Static declaration of every collection the store holds, its primary key
//! policy and its secondary indexes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a collection's primary keys are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyPolicy {
    /// The record carries its own key in the key field
    CallerSupplied,
    /// The engine allocates increasing integer keys
    Generated,
}

/// A secondary index on a top-level record field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexSchema {
    pub field: &'static str,
    pub unique: bool,
}

impl IndexSchema {
    const fn on(field: &'static str) -> Self {
        Self {
            field,
            unique: false,
        }
    }
}

/// Declaration of one collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectionSchema {
    pub name: &'static str,
    pub key_field: &'static str,
    pub key_policy: KeyPolicy,
    pub indexes: &'static [IndexSchema],
}

impl CollectionSchema {
    /// Look up an index by field name
    #[must_use]
    pub fn index(&self, field: &str) -> Option<&IndexSchema> {
        self.indexes.iter().find(|i| i.field == field)
    }

    /// SQL name of the index on `field`
    #[must_use]
    pub fn index_name(&self, field: &str) -> String {
        format!("idx_{}_{}", self.name, field)
    }
}

/// Every collection in the store
pub const SCHEMA: [CollectionSchema; 4] = [
    CollectionSchema {
        name: "themes",
        key_field: "id",
        key_policy: KeyPolicy::CallerSupplied,
        indexes: &[],
    },
    CollectionSchema {
        name: "operations",
        key_field: "id",
        key_policy: KeyPolicy::Generated,
        indexes: &[
            IndexSchema::on("type"),
            IndexSchema::on("created"),
            IndexSchema::on("modified"),
        ],
    },
    CollectionSchema {
        name: "workspaces",
        key_field: "id",
        key_policy: KeyPolicy::Generated,
        indexes: &[IndexSchema::on("name"), IndexSchema::on("created")],
    },
    CollectionSchema {
        name: "backups",
        key_field: "timestamp",
        key_policy: KeyPolicy::CallerSupplied,
        indexes: &[IndexSchema::on("version")],
    },
];

/// A named collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Themes,
    Operations,
    Workspaces,
    Backups,
}

impl Collection {
    /// All collections, in schema order
    pub const ALL: [Collection; 4] = [
        Collection::Themes,
        Collection::Operations,
        Collection::Workspaces,
        Collection::Backups,
    ];

    /// Collections carried by backup documents (never `backups` itself)
    pub const EXPORTED: [Collection; 3] = [
        Collection::Themes,
        Collection::Operations,
        Collection::Workspaces,
    ];

    /// Schema declaration for this collection
    #[must_use]
    pub fn schema(self) -> &'static CollectionSchema {
        match self {
            Self::Themes => &SCHEMA[0],
            Self::Operations => &SCHEMA[1],
            Self::Workspaces => &SCHEMA[2],
            Self::Backups => &SCHEMA[3],
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        self.schema().name
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| format!("Unknown collection: {s}"))
    }
}
