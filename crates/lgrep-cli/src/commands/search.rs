//! `lgrep search`

use crate::app::SearchArgs;
use lgrep_core::config::Config;
use lgrep_core::error::LgrepError;
use lgrep_core::search::{SearchHit, SearchOptions, Searcher};
use lgrep_core::store::SqliteStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    token: &CancellationToken,
    store: Arc<SqliteStore>,
    config: &Config,
    args: SearchArgs,
) -> lgrep_core::Result<()> {
    let store_name = resolve_store_name(&store, &args)?;

    let embedder = match &store_name {
        Some(name) => crate::embedder_for_store(&store, name, config)?,
        None => lgrep_core::embeddings::new_service(config)?,
    };
    let searcher = Searcher::new(store, embedder);

    let opts = SearchOptions {
        store_name: store_name.clone().unwrap_or_default(),
        top_k: args.limit,
        min_score: args.min_score,
        include_content: true,
        context_lines: args.context,
    };

    let hits = if args.all {
        searcher.search_all(token, &args.query, &opts).await?
    } else {
        searcher.search(token, &args.query, &opts).await?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&hits)?);
        return Ok(());
    }

    if hits.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    for (i, hit) in hits.iter().enumerate() {
        print_hit(i, hit);
    }

    Ok(())
}

fn resolve_store_name(
    store: &SqliteStore,
    args: &SearchArgs,
) -> lgrep_core::Result<Option<String>> {
    if args.all {
        return Ok(None);
    }
    if let Some(name) = &args.store {
        return Ok(Some(name.clone()));
    }

    // Auto-select the store covering the current directory
    let cwd = std::env::current_dir()?;
    let embedder_free_searcher = |records: Vec<lgrep_core::StoreRecord>| {
        for record in &records {
            if cwd.starts_with(&record.root_path) {
                return Some(record.name.clone());
            }
        }
        None
    };

    match embedder_free_searcher(store.list_stores()?) {
        Some(name) => Ok(Some(name)),
        None => Err(LgrepError::StoreNotFound(format!(
            "no store covers {}; pass --store or run lgrep index",
            cwd.display()
        ))),
    }
}

fn print_hit(i: usize, hit: &SearchHit) {
    println!(
        "[{}] {}:{}-{} ({:.1}% match)",
        i + 1,
        hit.relative_path,
        hit.start_line,
        hit.end_line,
        hit.score * 100.0
    );
    if !hit.context_before.is_empty() {
        println!("{}", hit.context_before);
    }
    if !hit.content.is_empty() {
        println!("{}", hit.content);
    }
    if !hit.context_after.is_empty() {
        println!("{}", hit.context_after);
    }
    println!();
}
