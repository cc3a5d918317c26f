//! `lgrep ask`

use crate::app::AskArgs;
use lgrep_core::config::Config;
use lgrep_core::llm::{QaOptions, QaService};
use lgrep_core::search::{SearchOptions, Searcher};
use lgrep_core::store::SqliteStore;
use std::io::Write as _;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub async fn run(
    token: &CancellationToken,
    store: Arc<SqliteStore>,
    config: &Config,
    args: AskArgs,
) -> lgrep_core::Result<()> {
    let store_name = match &args.store {
        Some(name) => name.clone(),
        None => {
            let cwd = std::env::current_dir()?;
            let embedder = lgrep_core::embeddings::new_service(config)?;
            let searcher = Searcher::new(store.clone(), embedder);
            searcher
                .get_store_for_path(&cwd)?
                .map(|record| record.name)
                .ok_or_else(|| {
                    lgrep_core::LgrepError::StoreNotFound(format!(
                        "no store covers {}; pass --store or run lgrep index",
                        cwd.display()
                    ))
                })?
        }
    };

    let embedder = crate::embedder_for_store(&store, &store_name, config)?;
    let searcher = Searcher::new(store, embedder);

    let hits = searcher
        .search(
            token,
            &args.question,
            &SearchOptions {
                store_name,
                top_k: args.limit,
                ..Default::default()
            },
        )
        .await?;

    let llm = lgrep_core::llm::new_service(config)?;
    let qa = QaService::new(llm);

    let (mut stream, sources) = qa
        .answer_stream(&args.question, &hits, QaOptions::default())
        .await?;

    while let Some(frame) = stream.recv().await {
        print!("{}", frame?);
        let _ = std::io::stdout().flush();
    }
    println!();

    if !sources.is_empty() {
        println!("\nSources:");
        for (i, hit) in sources.iter().enumerate() {
            println!(
                "  [{}] {}:{}-{} ({:.0}% match)",
                i + 1,
                hit.relative_path,
                hit.start_line,
                hit.end_line,
                hit.score * 100.0
            );
        }
    }

    Ok(())
}
