//! Theme/settings facade

pub mod sources;
pub mod store;
pub mod types;

pub use sources::{SourceChain, ThemeOrigin, ThemeSource};
pub use store::{LoadedTheme, ThemeStore};
pub use types::{ScaleSetting, ThemeColors, ThemeRecord, Typography, DEFAULT_THEME_ID};
