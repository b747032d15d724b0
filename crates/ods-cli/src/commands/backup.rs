//! Backup CLI commands
//!
//! Handles: ods export/import/inspect/history

use anyhow::{Context as _, Result};
use chrono::{TimeZone, Utc};
use ods_core::backup::{inspect as inspect_text, BackupLogEntry, ImportRequest};
use serde_json::json;
use std::path::{Path, PathBuf};

use super::{confirm, Context};

pub async fn export(ctx: &Context, output: Option<PathBuf>) -> Result<()> {
    let report = ctx.backups(output).export().await?;

    println!("Exported {} to: {}", report.counts, report.location);
    println!("Size: {} bytes", report.size);
    Ok(())
}

pub async fn import(ctx: &Context, file: &Path, yes: bool, output: Option<PathBuf>) -> Result<()> {
    let text = read_backup(file).await?;
    let source_name = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().to_string());

    let request = if yes {
        ImportRequest::new(source_name).accept_any_version()
    } else {
        ImportRequest::new(source_name).with_confirm(|mismatch| {
            confirm(&format!("The {mismatch}. Import anyway?")).unwrap_or(false)
        })
    };

    let report = ctx.backups(output).import(&text, request).await?;

    println!("Imported {}", report.imported);
    println!("Safety snapshot: {}", report.snapshot.location);
    if let Some(theme) = report.theme {
        println!("Theme scale: {}", theme.scale.current);
    }
    Ok(())
}

pub async fn inspect(file: &Path, json_output: bool) -> Result<()> {
    let text = read_backup(file).await?;
    let preview = inspect_text(&text)?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!("Version: {}", preview.version);
    println!("Date: {}", preview.date);
    if !preview.exported_by.is_empty() {
        println!("Exported by: {}", preview.exported_by);
    }
    println!("Contents: {}", preview.counts);
    for missing in &preview.missing_sections {
        println!("  No {missing} section ({missing} would be emptied)");
    }
    if !preview.compatible {
        println!("Warning: different major version, import needs confirmation");
    }
    Ok(())
}

pub async fn history(ctx: &Context, json_output: bool) -> Result<()> {
    let entries = ctx.backups(None).history().await?;

    if json_output {
        let output = json!({ "entries": entries });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("No backups recorded.");
        return Ok(());
    }

    println!("Backups:");
    for entry in &entries {
        let when = format_timestamp(entry.timestamp());
        match entry {
            BackupLogEntry::Export {
                filename,
                counts,
                reason,
                ..
            } => {
                let reason = reason
                    .as_deref()
                    .map(|r| format!(" [{r}]"))
                    .unwrap_or_default();
                println!("  {when}  export  {filename} ({counts}){reason}");
            }
            BackupLogEntry::Import {
                filename,
                version,
                imported,
                ..
            } => {
                println!("  {when}  import  {filename} v{version} ({imported})");
            }
        }
    }
    Ok(())
}

async fn read_backup(file: &Path) -> Result<String> {
    tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("cannot read {}", file.display()))
}

fn format_timestamp(millis: i64) -> String {
    Utc.timestamp_millis_opt(millis).single().map_or_else(
        || millis.to_string(),
        |at| at.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}
