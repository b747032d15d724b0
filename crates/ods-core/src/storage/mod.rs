//! Storage layer (`SQLite` document collections)

pub mod db;
pub mod error;
pub mod key;
pub mod migrations;
pub mod record;
pub mod schema;

pub use db::{Database, StorageEstimate};
pub use error::{StorageError, StorageResult};
pub use key::Key;
pub use record::Document;
pub use schema::{Collection, CollectionSchema, IndexSchema, KeyPolicy, SCHEMA};
