//! Theme/settings facade over the engine and the fallback cache

use std::sync::Arc;
use tracing::{debug, warn};

use super::sources::{DefaultSource, EngineSource, FallbackSource, SourceChain, ThemeOrigin};
use super::types::{ThemeRecord, DEFAULT_THEME_ID};
use crate::fallback::FallbackCache;
use crate::storage::{record, Collection, Database, StorageResult};

/// A theme together with where it was loaded from
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTheme {
    pub theme: ThemeRecord,
    pub origin: ThemeOrigin,
}

/// Reads and writes the single `default` theme record
pub struct ThemeStore {
    db: Arc<Database>,
    fallback: FallbackCache,
    chain: SourceChain,
}

impl ThemeStore {
    #[must_use]
    pub fn new(db: Arc<Database>, fallback: FallbackCache) -> Self {
        let chain = SourceChain::new()
            .then(EngineSource::new(Arc::clone(&db)))
            .then(FallbackSource::new(Arc::clone(&db), fallback.clone()))
            .then(DefaultSource::new(Arc::clone(&db)));
        Self {
            db,
            fallback,
            chain,
        }
    }

    /// Load the theme: engine, then fallback cache, then defaults
    pub async fn load(&self) -> LoadedTheme {
        let (theme, origin) = self
            .chain
            .resolve()
            .await
            .unwrap_or_else(|| (ThemeRecord::default(), ThemeOrigin::Defaults));
        LoadedTheme { theme, origin }
    }

    /// Upsert the theme under `default` and mirror it into the fallback cache
    ///
    /// The fallback cache is written even when the engine fails.
    ///
    /// # Errors
    /// Returns the engine error if the theme could not be persisted
    pub async fn save(&self, theme: &ThemeRecord) -> StorageResult<ThemeRecord> {
        let mut theme = theme.clone();
        theme.id = DEFAULT_THEME_ID.to_string();

        match upsert_theme(&self.db, &theme).await {
            Ok(stored) => {
                self.fallback.save(&stored);
                Ok(stored)
            }
            Err(e) => {
                warn!(error = %e, "theme not persisted, kept in fallback cache only");
                self.fallback.save(&theme);
                Err(e)
            }
        }
    }

    /// Change the scale (clamped and snapped to its bounds) and save
    ///
    /// # Errors
    /// Returns the engine error if the theme could not be persisted
    pub async fn set_scale(&self, value: f64) -> StorageResult<ThemeRecord> {
        let mut theme = self.load().await.theme;
        theme.scale.current = theme.scale.clamp(value);
        debug!(scale = theme.scale.current, "scale changed");
        self.save(&theme).await
    }

    /// Overwrite the theme with the compiled-in defaults
    ///
    /// # Errors
    /// Returns the engine error if the theme could not be persisted
    pub async fn reset_to_defaults(&self) -> StorageResult<ThemeRecord> {
        self.save(&ThemeRecord::default()).await
    }

    /// Remove the theme from the engine and the fallback cache
    ///
    /// # Errors
    /// Returns the engine error; the fallback cache is cleared regardless
    pub async fn delete(&self) -> StorageResult<()> {
        let result = self.db.delete(Collection::Themes, DEFAULT_THEME_ID).await;
        self.fallback.clear();
        result
    }
}

/// Write `theme` under the `default` key: update if present, add otherwise
pub(crate) async fn upsert_theme(db: &Database, theme: &ThemeRecord) -> StorageResult<ThemeRecord> {
    let doc = record::to_document(theme)?;

    let stored = if db.get(Collection::Themes, DEFAULT_THEME_ID).await?.is_some() {
        db.update(Collection::Themes, DEFAULT_THEME_ID, doc).await?
    } else {
        db.add(Collection::Themes, doc.clone()).await?;
        db.get(Collection::Themes, DEFAULT_THEME_ID)
            .await?
            .unwrap_or(doc)
    };

    record::from_document(stored)
}
