//! Indexing pipeline: walk, hash-skip, chunk, embed, upsert

use crate::config::Config;
use crate::embeddings::Embedder;
use crate::error::{LgrepError, Result};
use crate::fs::{hash_content, detect_language, ChunkOptions, FileInfo, FileWalker, TextChunker, WalkOptions};
use crate::store::{ChunkInput, FileInput, SqliteStore, StoreRecord, StoreStats};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio_util::sync::CancellationToken;

const DEFAULT_BATCH_SIZE: usize = 50;

/// Progress of one indexing pass.
#[derive(Debug, Clone)]
pub struct Progress {
    /// Known after the walk completes
    pub total_files: usize,
    pub processed_files: usize,
    pub skipped_files: usize,
    pub total_chunks: usize,
    pub processed_chunks: usize,
    pub errors: usize,
    pub start_time: Instant,
    pub current_file: String,
}

impl Default for Progress {
    fn default() -> Self {
        Self {
            total_files: 0,
            processed_files: 0,
            skipped_files: 0,
            total_chunks: 0,
            processed_chunks: 0,
            errors: 0,
            start_time: Instant::now(),
            current_file: String::new(),
        }
    }
}

/// Callback invoked after each file and after each embedding batch.
pub type ProgressFn = Box<dyn Fn(Progress) + Send + Sync>;

/// Options for one indexing pass.
pub struct IndexOptions {
    /// Store to index into; defaults to the basename of `path`
    pub store_name: Option<String>,
    /// Directory to index
    pub path: PathBuf,
    /// Limit to specific file extensions
    pub extensions: Vec<String>,
    /// Additional ignore patterns, merged with the configured ones
    pub ignore_patterns: Vec<String>,
    /// Re-index files even when their hash is unchanged
    pub force: bool,
    /// Chunks per embedding request
    pub batch_size: usize,
    pub on_progress: Option<ProgressFn>,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            store_name: None,
            path: PathBuf::from("."),
            extensions: Vec::new(),
            ignore_patterns: Vec::new(),
            force: false,
            batch_size: DEFAULT_BATCH_SIZE,
            on_progress: None,
        }
    }
}

/// Orchestrates indexing of files into the store. The sole producer of
/// store mutations for a pass; per-file failures are counted and the
/// pass continues.
pub struct Indexer {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
    chunker: TextChunker,
    config: Config,
    progress: Mutex<Progress>,
}

impl Indexer {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>, config: Config) -> Self {
        let chunker = TextChunker::new(ChunkOptions {
            chunk_size: config.indexing.chunk_size,
            chunk_overlap: config.indexing.chunk_overlap,
            min_chunk_size: 100,
        });
        Self {
            store,
            embedder,
            chunker,
            config,
            progress: Mutex::new(Progress::default()),
        }
    }

    /// Run one full indexing pass over a directory.
    ///
    /// Returns the final progress snapshot. Cancellation leaves
    /// already-committed files intact.
    pub async fn index(&self, token: &CancellationToken, opts: IndexOptions) -> Result<Progress> {
        let abs_path = std::fs::canonicalize(&opts.path)
            .map_err(|e| LgrepError::InvalidInput(format!("path does not exist: {}", e)))?;
        if !abs_path.is_dir() {
            return Err(LgrepError::InvalidInput(format!(
                "path is not a directory: {}",
                abs_path.display()
            )));
        }

        let store_name = match &opts.store_name {
            Some(name) => name.clone(),
            None => basename(&abs_path),
        };

        let store_record = self.get_or_create_store(&store_name, &abs_path)?;

        if token.is_cancelled() {
            return Err(LgrepError::Cancelled);
        }

        self.set_progress(Progress::default());

        let mut ignore_patterns = self.config.ignore.clone();
        ignore_patterns.extend(opts.ignore_patterns.iter().cloned());

        let mut walker = FileWalker::new(WalkOptions {
            root: abs_path.clone(),
            max_file_size: self.config.indexing.max_file_size,
            max_file_count: self.config.indexing.max_file_count,
            ignore_patterns,
            include_hidden: false,
            use_gitignore: true,
            extensions: opts.extensions.clone(),
        })?;

        // Collect everything first so total_files is known up front
        let mut files = Vec::new();
        walker.walk(|info| {
            files.push(info);
            Ok(())
        })?;

        self.update_progress(&opts, |p| p.total_files = files.len());
        tracing::info!(count = files.len(), "found files to index");

        for info in &files {
            if token.is_cancelled() {
                return Err(LgrepError::Cancelled);
            }

            self.update_progress(&opts, |p| p.current_file = info.rel_path.clone());

            if let Err(err) = self.index_file(token, &store_record, info, &opts).await {
                if err.is_cancelled() {
                    return Err(err);
                }
                tracing::warn!(path = %info.rel_path, error = %err, "failed to index file");
                self.update_progress(&opts, |p| p.errors += 1);
                continue;
            }

            self.update_progress(&opts, |p| p.processed_files += 1);
        }

        if let Err(err) = self.store.update_store_timestamp(store_record.id) {
            tracing::warn!(error = %err, "failed to update store timestamp");
        }

        let progress = self.progress();
        if let Ok(stats) = self.store.get_stats(store_record.id) {
            tracing::info!(
                files = stats.file_count,
                chunks = stats.chunk_count,
                elapsed_ms = progress.start_time.elapsed().as_millis() as u64,
                "indexing complete"
            );
        }

        Ok(progress)
    }

    /// Index one file by absolute path, always forced. Fast path for
    /// the watcher.
    pub async fn index_single_file(
        &self,
        token: &CancellationToken,
        store_name: &str,
        root: &Path,
        file_path: &Path,
    ) -> Result<()> {
        let store_record = self.get_or_create_store(store_name, root)?;

        let meta = std::fs::metadata(file_path)?;
        let rel_path = file_path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().to_string())
            .map_err(|_| {
                LgrepError::InvalidInput(format!(
                    "{} is not under {}",
                    file_path.display(),
                    root.display()
                ))
            })?;

        let content = std::fs::read(file_path)?;
        let info = FileInfo {
            path: file_path.to_path_buf(),
            rel_path,
            size: meta.len(),
            mod_time: meta.modified().ok(),
            hash: hash_content(&content),
            language: detect_language(file_path),
        };

        let opts = IndexOptions {
            store_name: Some(store_name.to_string()),
            force: true,
            ..Default::default()
        };
        self.index_file(token, &store_record, &info, &opts).await
    }

    async fn index_file(
        &self,
        token: &CancellationToken,
        store_record: &StoreRecord,
        info: &FileInfo,
        opts: &IndexOptions,
    ) -> Result<()> {
        // Hash-skip: an unchanged file costs one lookup and nothing else
        if !opts.force {
            match self.store.get_file_by_external_id(store_record.id, &info.rel_path) {
                Ok(Some(existing)) if existing.hash == info.hash => {
                    tracing::debug!(path = %info.rel_path, "file unchanged, skipping");
                    self.update_progress(opts, |p| p.skipped_files += 1);
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::debug!(path = %info.rel_path, error = %err, "error checking existing file");
                }
            }
        }

        let bytes = std::fs::read(&info.path)?;
        let content = String::from_utf8_lossy(&bytes);

        let chunks = self.chunker.chunk(&content, &info.path);
        if chunks.is_empty() {
            tracing::debug!(path = %info.rel_path, "no chunks generated");
            return Ok(());
        }

        self.update_progress(opts, |p| p.total_chunks += chunks.len());

        let batch_size = if opts.batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            opts.batch_size
        };

        let mut store_chunks = Vec::with_capacity(chunks.len());
        let mut embeddings = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            if token.is_cancelled() {
                return Err(LgrepError::Cancelled);
            }

            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embedder.embed_batch(&texts).await?;

            for (chunk, vector) in batch.iter().zip(vectors) {
                store_chunks.push(ChunkInput {
                    content: chunk.content.clone(),
                    start_line: chunk.start_line,
                    end_line: chunk.end_line,
                    chunk_index: chunk.chunk_index,
                });
                embeddings.push(vector);
            }

            self.update_progress(opts, |p| p.processed_chunks += batch.len());
        }

        let file_input = FileInput {
            external_id: info.rel_path.clone(),
            path: info.path.to_string_lossy().to_string(),
            relative_path: info.rel_path.clone(),
            hash: info.hash.clone(),
            file_size: info.size,
        };

        self.store
            .upsert_file(store_record.id, &file_input, &store_chunks, &embeddings)?;

        tracing::debug!(path = %info.rel_path, chunks = store_chunks.len(), "indexed file");
        Ok(())
    }

    fn get_or_create_store(&self, name: &str, path: &Path) -> Result<StoreRecord> {
        if let Some(existing) = self.store.get_store(name)? {
            // Path mismatch is informational; the store keeps its root
            if Path::new(&existing.root_path) != path {
                tracing::warn!(
                    stored = %existing.root_path,
                    requested = %path.display(),
                    "store path mismatch"
                );
            }
            return Ok(existing);
        }

        tracing::info!(name, path = %path.display(), "creating new store");
        self.store.create_store(
            name,
            &path.to_string_lossy(),
            self.embedder.provider().as_str(),
            self.embedder.model_name(),
            self.embedder.dimensions(),
        )
    }

    /// Snapshot of the current progress.
    pub fn progress(&self) -> Progress {
        self.progress
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn set_progress(&self, progress: Progress) {
        if let Ok(mut guard) = self.progress.lock() {
            *guard = progress;
        }
    }

    fn update_progress(&self, opts: &IndexOptions, f: impl FnOnce(&mut Progress)) {
        let snapshot = match self.progress.lock() {
            Ok(mut guard) => {
                f(&mut guard);
                guard.clone()
            }
            Err(_) => return,
        };
        if let Some(cb) = &opts.on_progress {
            cb(snapshot);
        }
    }

    /// Remove a store and all its indexed data.
    pub fn delete(&self, store_name: &str) -> Result<()> {
        self.store.delete_store(store_name)
    }

    /// Remove one file from a store by relative path.
    pub fn delete_file(&self, store_name: &str, rel_path: &str) -> Result<()> {
        let record = self
            .store
            .get_store(store_name)?
            .ok_or_else(|| LgrepError::StoreNotFound(store_name.to_string()))?;
        self.store.delete_file(record.id, rel_path)
    }

    /// Remove all indexed data but keep the store.
    pub fn clear(&self, store_name: &str) -> Result<()> {
        let record = self
            .store
            .get_store(store_name)?
            .ok_or_else(|| LgrepError::StoreNotFound(store_name.to_string()))?;
        self.store.clear_store(record.id)
    }

    /// All stores.
    pub fn list(&self) -> Result<Vec<StoreRecord>> {
        self.store.list_stores()
    }

    /// Statistics for a store.
    pub fn stats(&self, store_name: &str) -> Result<StoreStats> {
        let record = self
            .store
            .get_store(store_name)?
            .ok_or_else(|| LgrepError::StoreNotFound(store_name.to_string()))?;
        self.store.get_stats(record.id)
    }

    /// The store record for a name, if present.
    pub fn store_record(&self, store_name: &str) -> Result<Option<StoreRecord>> {
        self.store.get_store(store_name)
    }
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}
