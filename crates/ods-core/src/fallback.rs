//! Fallback cache
//!
//! A flat, synchronous string-keyed side channel stored as one JSON file
//! (`{"<key>": "<serialized value>", ...}`). It is the last-resort path when
//! the persistence engine is unavailable, so nothing here ever returns an
//! error: failures are logged and reported as "not saved" / "no value".

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{StoreConfig, FALLBACK_KEY};

#[derive(Error, Debug)]
enum SlotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

type Slots = BTreeMap<String, String>;

/// Single-slot fallback store
#[derive(Debug, Clone)]
pub struct FallbackCache {
    path: PathBuf,
    key: String,
}

impl FallbackCache {
    /// Use slot `key` of the key-value file at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// The theme slot next to a file-backed store
    #[must_use]
    pub fn for_config(config: &StoreConfig) -> Option<Self> {
        config
            .fallback_path()
            .map(|path| Self::new(path, FALLBACK_KEY))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store `value` in the slot; returns whether it was saved
    pub fn save<T: Serialize>(&self, value: &T) -> bool {
        match self.try_save(value) {
            Ok(()) => {
                debug!(key = %self.key, "fallback slot saved");
                true
            }
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to save fallback slot");
                false
            }
        }
    }

    /// Read the slot, if present and readable
    #[must_use]
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        match self.try_load() {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to load fallback slot");
                None
            }
        }
    }

    /// Empty the slot; returns whether the slot is now empty
    pub fn clear(&self) -> bool {
        match self.try_clear() {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %self.key, error = %e, "failed to clear fallback slot");
                false
            }
        }
    }

    fn try_save<T: Serialize>(&self, value: &T) -> Result<(), SlotError> {
        let serialized = serde_json::to_string(value)?;
        let mut slots = slots_for_save(self.read_slots())?;
        slots.insert(self.key.clone(), serialized);
        self.write_slots(&slots)
    }

    fn try_load<T: DeserializeOwned>(&self) -> Result<Option<T>, SlotError> {
        let slots = self.read_slots()?;
        slots
            .get(&self.key)
            .map(|raw| serde_json::from_str(raw))
            .transpose()
            .map_err(SlotError::from)
    }

    fn try_clear(&self) -> Result<(), SlotError> {
        let mut slots = self.read_slots()?;
        if slots.remove(&self.key).is_some() {
            self.write_slots(&slots)?;
        }
        Ok(())
    }

    fn read_slots(&self) -> Result<Slots, SlotError> {
        match fs::read(&self.path) {
            Ok(content) if content.iter().all(u8::is_ascii_whitespace) => Ok(Slots::new()),
            Ok(content) => Ok(serde_json::from_slice(&content)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Slots::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_slots(&self, slots: &Slots) -> Result<(), SlotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(slots)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Starting slots for a save: a corrupt file is replaced, but a file that
/// could not be read at all is left alone so other slots survive
fn slots_for_save(read: Result<Slots, SlotError>) -> Result<Slots, SlotError> {
    match read {
        Ok(slots) => Ok(slots),
        Err(SlotError::Json(e)) => {
            warn!(error = %e, "fallback file is corrupt, replacing it");
            Ok(Slots::new())
        }
        Err(e) => Err(e),
    }
}
