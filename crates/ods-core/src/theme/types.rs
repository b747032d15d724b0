//! Theme record types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Primary key of the one theme record the application keeps
pub const DEFAULT_THEME_ID: &str = "default";

/// The persisted theme/scale setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeRecord {
    pub id: String,
    #[serde(default)]
    pub colors: ThemeColors,
    #[serde(default)]
    pub typography: Typography,
    #[serde(default)]
    pub scale: ScaleSetting,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified: Option<i64>,
    /// Attributes this version does not know about, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ThemeRecord {
    fn default() -> Self {
        Self {
            id: DEFAULT_THEME_ID.to_string(),
            colors: ThemeColors::default(),
            typography: Typography::default(),
            scale: ScaleSetting::default(),
            timestamp: None,
            modified: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub surface: String,
    pub text: String,
    pub text_muted: String,
    pub border: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            primary: "#00d4ff".to_string(),
            secondary: "#7b61ff".to_string(),
            accent: "#ff6b35".to_string(),
            background: "#0a0e17".to_string(),
            surface: "#141a26".to_string(),
            text: "#e6edf3".to_string(),
            text_muted: "#8b949e".to_string(),
            border: "#30363d".to_string(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Typography {
    pub font_family: String,
    pub mono_family: String,
    /// Base font size in pixels
    pub base_size: f64,
    pub line_height: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Typography {
    fn default() -> Self {
        Self {
            font_family: "Inter, system-ui, sans-serif".to_string(),
            mono_family: "JetBrains Mono, monospace".to_string(),
            base_size: 14.0,
            line_height: 1.5,
            extra: Map::new(),
        }
    }
}

/// UI scale factor and its bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScaleSetting {
    pub current: f64,
    pub min: f64,
    pub max: f64,
    pub step: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for ScaleSetting {
    fn default() -> Self {
        Self {
            current: 1.0,
            min: 0.5,
            max: 2.0,
            step: 0.1,
            extra: Map::new(),
        }
    }
}

impl ScaleSetting {
    /// Usable `(min, max)`: swapped if stored inverted, the defaults if
    /// either bound is not a finite number
    #[must_use]
    pub fn bounds(&self) -> (f64, f64) {
        if !self.min.is_finite() || !self.max.is_finite() {
            let defaults = Self::default();
            return (defaults.min, defaults.max);
        }
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }

    /// Clamp `value` into the bounds and snap it to the step grid
    ///
    /// Non-finite values leave the current scale unchanged.
    #[must_use]
    pub fn clamp(&self, value: f64) -> f64 {
        if !value.is_finite() {
            return self.current;
        }

        let (min, max) = self.bounds();
        let bounded = value.clamp(min, max);
        if !(self.step.is_finite() && self.step > 0.0) {
            return bounded;
        }

        let snapped = min + ((bounded - min) / self.step).round() * self.step;
        // Round away float noise from the step arithmetic
        let snapped = (snapped * 1e6).round() / 1e6;
        snapped.clamp(min, max)
    }
}
