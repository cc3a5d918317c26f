//! `lgrep index`

use crate::app::IndexArgs;
use lgrep_core::config::Config;
use lgrep_core::indexer::{IndexOptions, Indexer};
use lgrep_core::store::SqliteStore;
use std::io::Write as _;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    token: &CancellationToken,
    store: Arc<SqliteStore>,
    config: &Config,
    args: IndexArgs,
) -> lgrep_core::Result<()> {
    let abs_path = crate::resolve_path(&args.path)?;
    let store_name = args
        .name
        .clone()
        .unwrap_or_else(|| crate::store_basename(&abs_path));

    let embedder = crate::embedder_for_store(&store, &store_name, config)?;
    let indexer = Indexer::new(store.clone(), embedder, config.clone());

    let progress = indexer
        .index(
            token,
            IndexOptions {
                store_name: Some(store_name.clone()),
                path: abs_path,
                extensions: args.extensions,
                force: args.force,
                on_progress: Some(Box::new(|p| {
                    eprint!(
                        "\rindexed {}/{} files ({} skipped, {} errors)",
                        p.processed_files, p.total_files, p.skipped_files, p.errors
                    );
                    let _ = std::io::stderr().flush();
                })),
                ..Default::default()
            },
        )
        .await?;
    eprintln!();

    let stats = indexer.stats(&store_name)?;
    println!(
        "Indexed store '{}': {} files, {} chunks ({} skipped, {} errors, {:.1}s)",
        store_name,
        stats.file_count,
        stats.chunk_count,
        progress.skipped_files,
        progress.errors,
        progress.start_time.elapsed().as_secs_f64()
    );

    Ok(())
}
