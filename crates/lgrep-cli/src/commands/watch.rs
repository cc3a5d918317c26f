//! `lgrep watch`

use crate::app::WatchArgs;
use lgrep_core::config::Config;
use lgrep_core::indexer::Indexer;
use lgrep_core::store::SqliteStore;
use lgrep_core::watcher::Watcher;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    token: &CancellationToken,
    store: Arc<SqliteStore>,
    config: &Config,
    args: WatchArgs,
) -> lgrep_core::Result<()> {
    let abs_path = crate::resolve_path(&args.path)?;
    let store_name = args
        .name
        .clone()
        .unwrap_or_else(|| crate::store_basename(&abs_path));

    let embedder = crate::embedder_for_store(&store, &store_name, config)?;
    let indexer = Arc::new(Indexer::new(store, embedder, config.clone()));

    let watcher = Watcher::new(&abs_path, &store_name, indexer, config)?
        .with_event_callback(|event, path| println!("{:>6}  {}", event, path));

    eprintln!("Watching {} (ctrl-c to stop)", abs_path.display());

    match watcher.start(token).await {
        Err(err) if err.is_cancelled() => Ok(()),
        other => other,
    }
}
