//! Operation CLI commands
//!
//! Handles: ods op add/list/done/delete

use anyhow::Result;
use clap::Subcommand;
use ods_core::storage::{record, Collection, Document};
use ods_core::OperationRecord;
use serde_json::{json, Value};

use super::Context;

/// Operation commands
#[derive(Subcommand)]
pub enum OpCommands {
    /// Record a new operation
    Add {
        /// Operation type
        #[arg(long = "type", value_name = "TYPE")]
        kind: String,
        /// Short title
        #[arg(long)]
        title: String,
    },
    /// List operations
    List {
        /// Only operations of this type
        #[arg(long = "type", value_name = "TYPE")]
        kind: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark an operation done
    Done {
        /// Operation id
        id: i64,
    },
    /// Delete an operation
    Delete {
        /// Operation id
        id: i64,
    },
}

/// Execute operation command
pub async fn execute(ctx: &Context, cmd: OpCommands) -> Result<()> {
    match cmd {
        OpCommands::Add { kind, title } => execute_add(ctx, kind, title).await,
        OpCommands::List { kind, json } => execute_list(ctx, kind, json).await,
        OpCommands::Done { id } => execute_done(ctx, id).await,
        OpCommands::Delete { id } => {
            ctx.db.delete(Collection::Operations, id).await?;
            println!("Deleted operation {id}");
            Ok(())
        }
    }
}

async fn execute_add(ctx: &Context, kind: String, title: String) -> Result<()> {
    let op = OperationRecord::new(kind, title);
    let key = ctx
        .db
        .add(Collection::Operations, record::to_document(&op)?)
        .await?;
    println!("Added operation {key}");
    Ok(())
}

async fn execute_list(ctx: &Context, kind: Option<String>, json_output: bool) -> Result<()> {
    let docs = match kind {
        Some(kind) => {
            ctx.db
                .get_all_by_index(Collection::Operations, "type", &Value::String(kind))
                .await?
        }
        None => ctx.db.get_all(Collection::Operations).await?,
    };

    if json_output {
        let output = json!({ "operations": docs });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let ops: Vec<OperationRecord> = docs
        .into_iter()
        .filter_map(|doc| match record::from_document(doc) {
            Ok(op) => Some(op),
            Err(e) => {
                tracing::warn!(error = %e, "skipping operation that does not fit the model");
                None
            }
        })
        .collect();

    if ops.is_empty() {
        println!("No operations found.");
        return Ok(());
    }

    println!("Operations:");
    for op in ops {
        let mark = if op.is_done() { "x" } else { " " };
        let id = op.id.map_or_else(|| "-".to_string(), |id| id.to_string());
        println!("  [{mark}] {id:>4}  {:<12} {}", op.kind, op.title);
    }
    Ok(())
}

async fn execute_done(ctx: &Context, id: i64) -> Result<()> {
    let mut patch = Document::new();
    patch.insert(
        "status".to_string(),
        Value::from(OperationRecord::STATUS_DONE),
    );
    ctx.db.update(Collection::Operations, id, patch).await?;
    println!("Operation {id} marked done");
    Ok(())
}
