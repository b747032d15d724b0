//! CLI command handlers
//!
//! Each top-level subcommand has its own module; they share one [`Context`].

pub mod backup;
pub mod op;
pub mod store;
pub mod theme;
pub mod workspace;

use anyhow::{anyhow, Result};
use ods_core::config::default_data_dir;
use ods_core::{BackupService, Database, FallbackCache, StoreConfig, ThemeStore};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

/// Store handles for one CLI invocation
pub struct Context {
    pub data_dir: PathBuf,
    pub config: StoreConfig,
    pub db: Arc<Database>,
}

impl Context {
    pub fn new(data_dir: Option<PathBuf>) -> Self {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let config = StoreConfig::new(&data_dir);
        let db = Arc::new(Database::new(config.clone()));
        tracing::debug!(data_dir = %data_dir.display(), store = %config.name, "using store");
        Self {
            data_dir,
            config,
            db,
        }
    }

    /// Backup service writing into `output`, or `<data dir>/backups`
    pub fn backups(&self, output: Option<PathBuf>) -> BackupService {
        let dir = output.unwrap_or_else(|| self.data_dir.join("backups"));
        BackupService::with_directory(Arc::clone(&self.db), dir)
    }

    pub fn themes(&self) -> Result<ThemeStore> {
        let fallback = FallbackCache::for_config(&self.config)
            .ok_or_else(|| anyhow!("the fallback cache needs a data directory"))?;
        Ok(ThemeStore::new(Arc::clone(&self.db), fallback))
    }
}

/// Ask a yes/no question on stdin; anything but `y` is no
pub fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{prompt} [y/N] ");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().eq_ignore_ascii_case("y"))
}
