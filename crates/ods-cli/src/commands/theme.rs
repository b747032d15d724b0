//! Theme CLI commands
//!
//! Handles: ods theme show/scale/reset/delete

use anyhow::Result;
use clap::Subcommand;
use ods_core::ThemeRecord;
use serde_json::json;

use super::Context;

/// Theme commands
#[derive(Subcommand)]
pub enum ThemeCommands {
    /// Show the current theme
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the UI scale (clamped to the theme's bounds)
    Scale {
        /// New scale factor
        value: f64,
    },
    /// Restore the default theme
    Reset,
    /// Delete the stored theme
    Delete,
}

/// Execute theme command
pub async fn execute(ctx: &Context, cmd: ThemeCommands) -> Result<()> {
    let themes = ctx.themes()?;

    match cmd {
        ThemeCommands::Show { json } => {
            let loaded = themes.load().await;
            if json {
                let output = json!({ "origin": loaded.origin, "theme": loaded.theme });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Theme (from {}):", loaded.origin);
                print_theme(&loaded.theme);
            }
        }
        ThemeCommands::Scale { value } => {
            let theme = themes.set_scale(value).await?;
            println!("Scale set to {}", theme.scale.current);
        }
        ThemeCommands::Reset => {
            let theme = themes.reset_to_defaults().await?;
            println!("Theme reset to defaults (scale {})", theme.scale.current);
        }
        ThemeCommands::Delete => {
            themes.delete().await?;
            println!("Theme deleted.");
        }
    }
    Ok(())
}

fn print_theme(theme: &ThemeRecord) {
    let c = &theme.colors;
    println!("  Colors:");
    println!("    primary {}  secondary {}  accent {}", c.primary, c.secondary, c.accent);
    println!("    background {}  surface {}  border {}", c.background, c.surface, c.border);
    println!("    text {}  muted {}", c.text, c.text_muted);
    let t = &theme.typography;
    println!("  Typography: {} / {}", t.font_family, t.mono_family);
    println!("    base size {}px, line height {}", t.base_size, t.line_height);
    let s = &theme.scale;
    println!("  Scale: {} (min {}, max {}, step {})", s.current, s.min, s.max, s.step);
}
