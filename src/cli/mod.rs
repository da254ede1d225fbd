//! CLI command definitions and parsing
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "strata",
    version,
    about = "Document question answering with hybrid retrieval and layered memory",
    long_about = "Strata indexes documents into vector and keyword stores, answers questions \
                  through a hybrid retrieval pipeline with score fusion and deduplication, and \
                  carries conversations across turns with three memory tiers."
)]
pub struct Cli {
    /// Global config file path (defaults to ~/.config/strata/config.toml)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a text document into the index
    Ingest {
        /// Path of the document to ingest
        file: PathBuf,

        /// Document name (defaults to the file name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Search indexed documents through the full retrieval pipeline
    Search {
        /// Search query text
        query: String,

        /// Restrict the search to one document
        #[arg(short, long)]
        document: Option<u64>,

        /// Maximum number of passages to return
        #[arg(short, long, default_value = "5")]
        top_k: usize,

        /// Show results in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Ask a question, grounded in documents when relevant passages exist
    Ask {
        /// Question to ask
        question: String,

        /// Conversation owner id
        #[arg(short, long, default_value = "1")]
        user: u64,

        /// Scope the conversation and retrieval to one document
        #[arg(short, long)]
        document: Option<u64>,
    },

    /// List ingested documents
    Documents,

    /// Remove a document and everything indexed for it
    Remove {
        /// Document id to remove
        id: u64,
    },

    /// Clear the conversational memory for a user
    Forget {
        /// Conversation owner id
        #[arg(short, long, default_value = "1")]
        user: u64,

        /// Document-scoped conversation (defaults to the general one)
        #[arg(short, long)]
        document: Option<u64>,
    },

    /// Show storage statistics
    Status,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to config file (defaults to standard location)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Initialize default configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse CLI arguments from command line
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
