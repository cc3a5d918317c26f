//! `lgrep status`

use lgrep_core::store::SqliteStore;
use std::sync::Arc;

pub async fn run(store: Arc<SqliteStore>) -> lgrep_core::Result<()> {
    let stores = store.list_stores()?;

    if stores.is_empty() {
        println!("No indexed stores.");
        return Ok(());
    }

    for record in stores {
        let stats = store.get_stats(record.id)?;
        println!(
            "{}  {} files, {} chunks, {} bytes",
            record.name, stats.file_count, stats.chunk_count, stats.total_size
        );
        println!(
            "    root: {}  model: {}/{} ({} dims)  updated: {}",
            record.root_path,
            record.embedding_provider,
            record.embedding_model,
            record.embedding_dimensions,
            record.updated_at
        );
    }

    Ok(())
}
