//! Store CLI commands
//!
//! Handles: ods store info/destroy

use anyhow::Result;
use clap::Subcommand;
use ods_core::storage::Collection;
use serde_json::{json, Map, Value};

use super::{confirm, Context};

/// Store commands
#[derive(Subcommand)]
pub enum StoreCommands {
    /// Show where the store lives and what it holds
    Info {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete the whole store
    Destroy {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Execute store command
pub async fn execute(ctx: &Context, cmd: StoreCommands) -> Result<()> {
    match cmd {
        StoreCommands::Info { json } => execute_info(ctx, json).await,
        StoreCommands::Destroy { force } => {
            if !ctx.db.exists().await {
                println!("No store at {}", ctx.data_dir.display());
                return Ok(());
            }
            if !force && !confirm(&format!("Delete store '{}'?", ctx.config.name))? {
                println!("Cancelled.");
                return Ok(());
            }
            ctx.db.destroy().await?;
            println!("Deleted store '{}'", ctx.config.name);
            Ok(())
        }
    }
}

async fn execute_info(ctx: &Context, json_output: bool) -> Result<()> {
    let exists = ctx.db.exists().await;

    let mut counts = Map::new();
    if exists {
        for collection in Collection::ALL {
            let n = ctx.db.count(collection).await?;
            counts.insert(collection.name().to_string(), Value::from(n));
        }
    }
    let usage = if exists {
        ctx.db.estimate_usage().await
    } else {
        None
    };

    if json_output {
        let output = json!({
            "name": ctx.config.name,
            "dataDir": ctx.data_dir.display().to_string(),
            "exists": exists,
            "schemaVersion": ctx.config.schema_version,
            "counts": counts,
            "usage": usage.map(|u| u.usage),
            "quota": usage.and_then(|u| u.quota),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("Store: {}", ctx.config.name);
    println!("Data directory: {}", ctx.data_dir.display());
    if !exists {
        println!("Not created yet.");
        return Ok(());
    }
    println!("Schema version: {}", ctx.config.schema_version);
    for (name, n) in &counts {
        println!("  {name}: {n}");
    }
    if let Some(usage) = usage {
        println!("Usage: {} bytes", usage.usage);
    }
    Ok(())
}
