//! ODS Core - document store, backup protocol, and theme settings
//!
//! This crate provides the SQLite-backed document collections, the
//! JSON export/import protocol with pre-import safety snapshots, the
//! fallback cache, and the theme/settings facade built on top of them.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]

pub mod backup;
pub mod config;
pub mod fallback;
pub mod model;
pub mod storage;
pub mod theme;

pub use backup::{BackupError, BackupService, ImportRequest};
pub use config::StoreConfig;
pub use fallback::FallbackCache;
pub use model::{OperationRecord, WorkspaceRecord};
pub use storage::{Collection, Database, Key, StorageError};
pub use theme::{ThemeRecord, ThemeStore};
