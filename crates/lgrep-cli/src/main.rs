//! lgrep CLI
//!
//! Thin driver over the core: index, search, ask, watch, mcp, status.

use clap::Parser;
use lgrep_core::config::Config;
use lgrep_core::store::SqliteStore;
use lgrep_core::LgrepError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

mod app;
mod commands;

use app::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Diagnostics go to stderr; stdout carries command output (and
    // JSON-RPC responses in mcp mode)
    let default_level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(default_level.into()),
        )
        .init();

    if let Err(err) = run(cli).await {
        if err.is_cancelled() {
            std::process::exit(err.exit_code());
        }
        eprintln!("Error: {}", err);
        std::process::exit(err.exit_code());
    }
}

async fn run(cli: Cli) -> lgrep_core::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let store = Arc::new(SqliteStore::open(&config.database.path)?);

    // A ctrl-c cancels the active operation; committed work stays
    let token = CancellationToken::new();
    {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                token.cancel();
            }
        });
    }

    match cli.command {
        Commands::Index(args) => commands::index::run(&token, store, &config, args).await,
        Commands::Search(args) => commands::search::run(&token, store, &config, args).await,
        Commands::Ask(args) => commands::ask::run(&token, store, &config, args).await,
        Commands::Watch(args) => commands::watch::run(&token, store, &config, args).await,
        Commands::Mcp => {
            let embedder = lgrep_core::embeddings::new_service(&config)?;
            lgrep_mcp::start_server(&token, store, embedder, config).await
        }
        Commands::Status => commands::status::run(store).await,
    }
}

/// Embedder matching an existing store's recorded provider and model,
/// or the configured default when the store is not yet created.
pub(crate) fn embedder_for_store(
    store: &SqliteStore,
    store_name: &str,
    config: &Config,
) -> lgrep_core::Result<Arc<dyn lgrep_core::Embedder>> {
    match store.get_store(store_name)? {
        Some(record) => lgrep_core::embeddings::new_service_for_store(
            &record.embedding_provider,
            Some(&record.embedding_model),
            config,
        ),
        None => lgrep_core::embeddings::new_service(config),
    }
}

pub(crate) fn store_basename(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

pub(crate) fn resolve_path(path: &std::path::Path) -> lgrep_core::Result<std::path::PathBuf> {
    std::fs::canonicalize(path)
        .map_err(|e| LgrepError::InvalidInput(format!("path does not exist: {}", e)))
}
