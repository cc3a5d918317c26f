//! CLI argument definitions

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "lgrep")]
#[command(author, version, about = "Local semantic code search")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to use instead of the standard search
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Index a directory for semantic search
    Index(IndexArgs),

    /// Search indexed code with a natural-language query
    Search(SearchArgs),

    /// Ask a question answered from search results
    Ask(AskArgs),

    /// Watch a directory and keep its index up to date
    Watch(WatchArgs),

    /// Start the JSON-RPC stdio tool server
    Mcp,

    /// Show indexed stores and their statistics
    Status,
}

#[derive(Args)]
pub struct IndexArgs {
    /// Directory to index
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Store name (defaults to the directory basename)
    #[arg(long)]
    pub name: Option<String>,

    /// Re-index files even when unchanged
    #[arg(short, long)]
    pub force: bool,

    /// Limit to specific file extensions
    #[arg(long = "ext")]
    pub extensions: Vec<String>,
}

#[derive(Args)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Store to search (defaults to the store covering the current directory)
    #[arg(long)]
    pub store: Option<String>,

    /// Search every store
    #[arg(long)]
    pub all: bool,

    /// Maximum number of results
    #[arg(short = 'k', long, default_value_t = 10)]
    pub limit: usize,

    /// Drop results scoring below this
    #[arg(long, default_value_t = 0.0)]
    pub min_score: f64,

    /// Lines of context around each hit
    #[arg(short = 'C', long, default_value_t = 0)]
    pub context: usize,

    /// Emit results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Store to search (defaults to the store covering the current directory)
    #[arg(long)]
    pub store: Option<String>,

    /// Search results fed to the model
    #[arg(short = 'k', long, default_value_t = 5)]
    pub limit: usize,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Directory to watch
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Store name (defaults to the directory basename)
    #[arg(long)]
    pub name: Option<String>,
}
