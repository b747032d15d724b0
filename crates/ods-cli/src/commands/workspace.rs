//! Workspace CLI commands
//!
//! Handles: ods workspace add/list

use anyhow::Result;
use clap::Subcommand;
use ods_core::storage::{record, Collection};
use ods_core::WorkspaceRecord;
use serde_json::json;

use super::Context;

/// Workspace commands
#[derive(Subcommand)]
pub enum WorkspaceCommands {
    /// Create a workspace
    Add {
        /// Workspace name
        name: String,
        /// Optional description
        #[arg(short, long)]
        description: Option<String>,
    },
    /// List workspaces
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Execute workspace command
pub async fn execute(ctx: &Context, cmd: WorkspaceCommands) -> Result<()> {
    match cmd {
        WorkspaceCommands::Add { name, description } => {
            let mut workspace = WorkspaceRecord::new(name);
            if let Some(desc) = description {
                workspace = workspace.with_description(desc);
            }
            let key = ctx
                .db
                .add(Collection::Workspaces, record::to_document(&workspace)?)
                .await?;
            println!("Added workspace {key}: {}", workspace.name);
            Ok(())
        }
        WorkspaceCommands::List { json } => {
            let docs = ctx.db.get_all(Collection::Workspaces).await?;
            if json {
                let output = json!({ "workspaces": docs });
                println!("{}", serde_json::to_string_pretty(&output)?);
                return Ok(());
            }

            if docs.is_empty() {
                println!("No workspaces found.");
                return Ok(());
            }

            println!("Workspaces:");
            for doc in docs {
                let ws: WorkspaceRecord = match record::from_document(doc) {
                    Ok(ws) => ws,
                    Err(e) => {
                        tracing::warn!(error = %e, "skipping workspace that does not fit the model");
                        continue;
                    }
                };
                let desc = ws.description.as_deref().unwrap_or("No description");
                println!("  {} - {} ({desc})", ws.id.unwrap_or_default(), ws.name);
            }
            Ok(())
        }
    }
}
