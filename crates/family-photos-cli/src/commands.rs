use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "family-photos")]
#[command(about = "Keeps the family photo catalog in sync with storage", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Reconcile the catalog of every owner with their storage folder
    Sync,
    /// Manage owners
    Owners {
        #[command(subcommand)]
        action: OwnerAction,
    },
    /// Show the creation time inferred for a file and where it came from
    Resolve { path: PathBuf },
    /// Print configuration values
    PrintConfig,
    /// Delete every owner and record from the catalog
    TruncateDb,
}

#[derive(Debug, Subcommand)]
pub enum OwnerAction {
    /// Register an owner and create their storage folder
    Add {
        login: String,
        #[arg(long)]
        display_name: Option<String>,
    },
    /// List registered owners
    List,
    /// Remove an owner and their records; files stay on disk
    Remove { login: String },
}
