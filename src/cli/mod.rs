//! Command-line interface for studyrag.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Ask questions answered from a small indexed curriculum corpus.
#[derive(Debug, Parser)]
#[command(name = "studyrag")]
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
    /// Chunk, embed and index documents from a JSON/JSONL file
    Ingest(commands::IngestArgs),

    /// Retrieve the closest chunks for a query
    Search(commands::SearchArgs),

    /// Answer a question from the indexed corpus
    Ask(commands::AskArgs),

    /// Check embedding server, Qdrant and model tier configuration
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
