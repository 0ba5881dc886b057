//! CLI module for the game catalog indexer.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Harvest a game catalog into a vector store and search it semantically.
#[derive(Debug, Parser)]
#[command(name = "gamedex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run a full catalog sweep: fetch, chunk, embed, and upsert
    Seed(commands::SeedArgs),

    /// Search indexed catalog content
    Query(commands::QueryArgs),

    /// Check infrastructure status (embedding server, vector store)
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
