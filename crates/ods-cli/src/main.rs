//! ODS CLI - Command-line interface for ODS
//!
//! Provides `ods export`, `ods import`, `ods theme`, `ods op` and other commands.

mod commands;
mod logging;

use clap::{ArgAction, Parser, Subcommand};
use ods_core::{BackupError, StorageError};
use std::path::PathBuf;

use commands::op::OpCommands;
use commands::store::StoreCommands;
use commands::theme::ThemeCommands;
use commands::workspace::WorkspaceCommands;
use commands::Context;

#[derive(Parser)]
#[command(name = "ods")]
#[command(about = "ODS - operations store with theme settings and JSON backups")]
#[command(version)]
struct Cli {
    /// Data directory (defaults to $ODS_DATA_DIR, then ~/.ods)
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export all data to a backup file
    Export {
        /// Directory to write the backup into (defaults to <data dir>/backups)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Replace all data with the contents of a backup file
    Import {
        /// Backup file to import
        file: PathBuf,
        /// Import across major versions without asking
        #[arg(short, long)]
        yes: bool,
        /// Directory for the safety snapshot (defaults to <data dir>/backups)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },
    /// Validate a backup file without importing it
    Inspect {
        /// Backup file to inspect
        file: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List past exports and imports
    History {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change the theme
    Theme {
        #[command(subcommand)]
        action: ThemeCommands,
    },
    /// Manage operations
    Op {
        #[command(subcommand)]
        action: OpCommands,
    },
    /// Manage workspaces
    Workspace {
        #[command(subcommand)]
        action: WorkspaceCommands,
    },
    /// Inspect or delete the store
    Store {
        #[command(subcommand)]
        action: StoreCommands,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let ctx = Context::new(cli.data_dir);
    if let Err(e) = run(&ctx, cli.command).await {
        match error_code(&e) {
            Some(code) => eprintln!("Error: {e} ({code})"),
            None => eprintln!("Error: {e:#}"),
        }
        std::process::exit(1);
    }
}

async fn run(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Export { output } => commands::backup::export(ctx, output).await,
        Commands::Import { file, yes, output } => {
            commands::backup::import(ctx, &file, yes, output).await
        }
        Commands::Inspect { file, json } => commands::backup::inspect(&file, json).await,
        Commands::History { json } => commands::backup::history(ctx, json).await,
        Commands::Theme { action } => commands::theme::execute(ctx, action).await,
        Commands::Op { action } => commands::op::execute(ctx, action).await,
        Commands::Workspace { action } => commands::workspace::execute(ctx, action).await,
        Commands::Store { action } => commands::store::execute(ctx, action).await,
    }
}

/// Stable code of a library error, if that is what failed
fn error_code(err: &anyhow::Error) -> Option<&'static str> {
    if let Some(e) = err.downcast_ref::<BackupError>() {
        return Some(e.code());
    }
    err.downcast_ref::<StorageError>().map(StorageError::code)
}
