//! Store configuration and data directory resolution

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the underlying store
pub const STORE_NAME: &str = "ODS_v9";

/// Schema version the engine upgrades stores to
pub const SCHEMA_VERSION: u32 = 1;

/// Slot key holding the serialized theme in the fallback cache
pub const FALLBACK_KEY: &str = "ODS_v9_theme";

const FALLBACK_FILE: &str = "local-storage.json";
const DATA_DIR_ENV: &str = "ODS_DATA_DIR";

/// Where the store lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// A database file inside a data directory
    File { data_dir: PathBuf },
    /// A private in-memory database (for testing)
    Memory,
}

/// Persistence engine configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Backing location
    pub location: StoreLocation,
    /// Store name; the database file is `<name>.db`
    pub name: String,
    /// Requested schema version
    pub schema_version: u32,
    /// How long open and destroy wait on another connection's lock
    pub busy_timeout: Duration,
    /// Quota reported by usage estimates, if known
    pub quota_bytes: Option<u64>,
}

impl StoreConfig {
    /// Configuration for a file-backed store in `data_dir`
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            location: StoreLocation::File {
                data_dir: data_dir.into(),
            },
            ..Self::in_memory()
        }
    }

    /// Configuration for an in-memory store
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            location: StoreLocation::Memory,
            name: STORE_NAME.to_string(),
            schema_version: SCHEMA_VERSION,
            busy_timeout: Duration::from_secs(2),
            quota_bytes: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_schema_version(mut self, version: u32) -> Self {
        self.schema_version = version;
        self
    }

    #[must_use]
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    /// Data directory, if file-backed
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        match &self.location {
            StoreLocation::File { data_dir } => Some(data_dir),
            StoreLocation::Memory => None,
        }
    }

    /// Path of the database file, if file-backed
    #[must_use]
    pub fn database_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join(format!("{}.db", self.name)))
    }

    /// Path of the flat key-value file used by the fallback cache
    #[must_use]
    pub fn fallback_path(&self) -> Option<PathBuf> {
        self.data_dir().map(|dir| dir.join(FALLBACK_FILE))
    }
}

/// Resolve the default data directory
///
/// Priority:
/// 1. `$ODS_DATA_DIR`
/// 2. `$HOME/.ods`
/// 3. Platform data directory
/// 4. A temp directory (data will not survive reboots)
#[must_use]
pub fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".ods");
    }

    if let Some(data) = dirs::data_dir() {
        return data.join("ods");
    }

    let temp = std::env::temp_dir().join("ods-data");
    tracing::warn!(
        path = %temp.display(),
        "could not determine home directory, using temporary location"
    );
    temp
}
