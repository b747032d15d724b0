//! Ordered theme sources
//!
//! Loading walks a chain of sources (engine, fallback cache, compiled
//! defaults); the first one that has a theme wins.

use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::store::upsert_theme;
use super::types::{ThemeRecord, DEFAULT_THEME_ID};
use crate::fallback::FallbackCache;
use crate::storage::{record, Collection, Database};

/// Where a loaded theme came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeOrigin {
    Engine,
    Fallback,
    Defaults,
}

impl fmt::Display for ThemeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Engine => write!(f, "engine"),
            Self::Fallback => write!(f, "fallback cache"),
            Self::Defaults => write!(f, "defaults"),
        }
    }
}

/// One link of the chain
#[async_trait]
pub trait ThemeSource: Send + Sync {
    fn origin(&self) -> ThemeOrigin;

    /// The theme this source holds, if any
    async fn fetch(&self) -> Option<ThemeRecord>;
}

/// Sources tried in order
#[derive(Default)]
pub struct SourceChain {
    sources: Vec<Box<dyn ThemeSource>>,
}

impl SourceChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a source tried after the existing ones
    #[must_use]
    pub fn then(mut self, source: impl ThemeSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// First theme found, with the source that produced it
    pub async fn resolve(&self) -> Option<(ThemeRecord, ThemeOrigin)> {
        for source in &self.sources {
            if let Some(theme) = source.fetch().await {
                debug!(origin = %source.origin(), "theme resolved");
                return Some((theme, source.origin()));
            }
        }
        None
    }
}

/// The `default` record in the `themes` collection
pub struct EngineSource {
    db: Arc<Database>,
}

impl EngineSource {
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThemeSource for EngineSource {
    fn origin(&self) -> ThemeOrigin {
        ThemeOrigin::Engine
    }

    async fn fetch(&self) -> Option<ThemeRecord> {
        let doc = match self.db.get(Collection::Themes, DEFAULT_THEME_ID).await {
            Ok(doc) => doc?,
            Err(e) => {
                warn!(error = %e, "theme unavailable from engine");
                return None;
            }
        };
        match record::from_document(doc) {
            Ok(theme) => Some(theme),
            Err(e) => {
                warn!(error = %e, "stored theme is unreadable");
                None
            }
        }
    }
}

/// The fallback cache slot, migrated into the engine when found
pub struct FallbackSource {
    db: Arc<Database>,
    cache: FallbackCache,
}

impl FallbackSource {
    #[must_use]
    pub fn new(db: Arc<Database>, cache: FallbackCache) -> Self {
        Self { db, cache }
    }
}

#[async_trait]
impl ThemeSource for FallbackSource {
    fn origin(&self) -> ThemeOrigin {
        ThemeOrigin::Fallback
    }

    async fn fetch(&self) -> Option<ThemeRecord> {
        let mut theme: ThemeRecord = self.cache.load()?;
        theme.id = DEFAULT_THEME_ID.to_string();

        // The slot is only emptied once the engine holds the theme.
        match upsert_theme(&self.db, &theme).await {
            Ok(stored) => {
                self.cache.clear();
                info!("migrated theme from fallback cache into engine");
                Some(stored)
            }
            Err(e) => {
                warn!(error = %e, "engine unavailable, serving theme from fallback cache");
                Some(theme)
            }
        }
    }
}

/// Compiled-in defaults, persisted on first use
pub struct DefaultSource {
    db: Arc<Database>,
}

impl DefaultSource {
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ThemeSource for DefaultSource {
    fn origin(&self) -> ThemeOrigin {
        ThemeOrigin::Defaults
    }

    async fn fetch(&self) -> Option<ThemeRecord> {
        let defaults = ThemeRecord::default();
        match upsert_theme(&self.db, &defaults).await {
            Ok(stored) => Some(stored),
            Err(e) => {
                warn!(error = %e, "could not persist default theme");
                Some(defaults)
            }
        }
    }
}
