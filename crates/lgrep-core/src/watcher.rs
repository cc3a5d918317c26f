//! File system watching with debounced re-indexing

use crate::config::Config;
use crate::error::{LgrepError, Result};
use crate::fs::detect_language;
use crate::indexer::Indexer;
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Directories never watched.
const SKIP_DIRS: &[&str] = &[
    "node_modules",
    "vendor",
    "dist",
    "build",
    "out",
    "target",
    "bin",
    "obj",
    ".git",
    ".idea",
    ".vscode",
    "__pycache__",
    "coverage",
    ".nyc_output",
];

/// The most recent operation observed for a path within a debounce
/// window. Later operations replace earlier ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingOp {
    Create,
    Write,
    Remove,
    Rename,
}

type EventCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Watches one root and keeps its store coherent with on-disk content.
///
/// Two cooperating tasks: the event receiver feeds the pending map,
/// and a ticker drains it every `debounce_time`, applying only the
/// latest observed operation per path.
#[derive(Clone)]
pub struct Watcher {
    root: PathBuf,
    store_name: String,
    indexer: Arc<Indexer>,
    max_file_size: u64,
    pending: Arc<Mutex<HashMap<PathBuf, PendingOp>>>,
    debounce_time: Duration,
    on_event: EventCallback,
}

impl Watcher {
    pub fn new(
        root: impl AsRef<Path>,
        store_name: &str,
        indexer: Arc<Indexer>,
        config: &Config,
    ) -> Result<Self> {
        let root = std::fs::canonicalize(root.as_ref())
            .map_err(|e| LgrepError::InvalidInput(format!("root path does not exist: {}", e)))?;

        Ok(Self {
            root,
            store_name: store_name.to_string(),
            indexer,
            max_file_size: config.indexing.max_file_size,
            pending: Arc::new(Mutex::new(HashMap::new())),
            debounce_time: DEFAULT_DEBOUNCE,
            on_event: Arc::new(|_, _| {}),
        })
    }

    pub fn with_debounce_time(mut self, debounce: Duration) -> Self {
        self.debounce_time = debounce;
        self
    }

    pub fn with_event_callback(
        mut self,
        callback: impl Fn(&str, &str) + Send + Sync + 'static,
    ) -> Self {
        self.on_event = Arc::new(callback);
        self
    }

    /// The store this watcher maintains.
    pub fn store_name(&self) -> &str {
        &self.store_name
    }

    /// Watch for file changes until the token cancels.
    pub async fn start(&self, token: &CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<notify::Event>(256);

        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) => {
                    let _ = tx.blocking_send(event);
                }
                Err(err) => tracing::error!(error = %err, "watcher error"),
            },
        )?;

        self.add_directories(&mut watcher)?;
        tracing::info!(root = %self.root.display(), "watching for file changes");

        let ticker_token = token.child_token();
        let ticker = {
            let watcher = self.clone();
            let token = ticker_token.clone();
            tokio::spawn(async move { watcher.run_ticker(token).await })
        };

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                event = rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event, &mut watcher),
                        None => break,
                    }
                }
            }
        }

        drop(watcher);
        ticker_token.cancel();
        let _ = ticker.await;

        if token.is_cancelled() {
            return Err(LgrepError::Cancelled);
        }
        Ok(())
    }

    /// Register the root and every non-skipped subdirectory.
    fn add_directories(&self, watcher: &mut RecommendedWatcher) -> Result<()> {
        let mut it = WalkDir::new(&self.root).into_iter();
        while let Some(entry) = it.next() {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            if !entry.file_type().is_dir() {
                continue;
            }

            let name = entry.file_name().to_string_lossy();
            if entry.depth() > 0 && (name.starts_with('.') || should_skip_dir(&name)) {
                it.skip_current_dir();
                continue;
            }

            if let Err(err) = watcher.watch(entry.path(), RecursiveMode::NonRecursive) {
                tracing::debug!(path = %entry.path().display(), error = %err, "failed to watch directory");
            }
        }
        Ok(())
    }

    fn handle_event(&self, event: notify::Event, watcher: &mut RecommendedWatcher) {
        for (i, path) in event.paths.iter().enumerate() {
            let Some(op) = classify(&event.kind, i) else {
                continue;
            };

            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            if name.starts_with('.') {
                continue;
            }

            // New directories get added to the watch set
            if op == PendingOp::Create && path.is_dir() {
                if !should_skip_dir(&name) {
                    if watcher.watch(path, RecursiveMode::NonRecursive).is_ok() {
                        tracing::debug!(path = %path.display(), "added directory to watch");
                    }
                }
                continue;
            }
            if path.is_dir() {
                continue;
            }

            if !self.is_indexable(path, op) {
                continue;
            }

            self.record_pending(path.clone(), op);
        }
    }

    /// Merge an operation into the pending map; the later op wins.
    pub(crate) fn record_pending(&self, path: PathBuf, op: PendingOp) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(path, op);
        }
    }

    /// Language and size check. Size is only checked when the file
    /// still exists, so removals of previously-indexed files are kept.
    fn is_indexable(&self, path: &Path, op: PendingOp) -> bool {
        if path.extension().is_none() {
            return false;
        }
        if detect_language(path).is_empty() {
            return false;
        }

        if matches!(op, PendingOp::Remove | PendingOp::Rename) {
            return true;
        }

        match std::fs::metadata(path) {
            Ok(meta) => self.max_file_size == 0 || meta.len() <= self.max_file_size,
            Err(_) => false,
        }
    }

    async fn run_ticker(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.debounce_time);
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = interval.tick() => self.flush_pending(&token).await,
            }
        }
    }

    /// Atomically snapshot and clear the pending map, then apply each
    /// path's latest operation. Per-path failures are logged and do not
    /// poison the batch.
    pub(crate) async fn flush_pending(&self, token: &CancellationToken) {
        let events: HashMap<PathBuf, PendingOp> = {
            let Ok(mut pending) = self.pending.lock() else {
                return;
            };
            if pending.is_empty() {
                return;
            }
            std::mem::take(&mut *pending)
        };

        for (path, op) in events {
            if token.is_cancelled() {
                return;
            }

            let rel = path
                .strip_prefix(&self.root)
                .map(|p| p.to_string_lossy().to_string())
                .unwrap_or_else(|_| path.to_string_lossy().to_string());

            match op {
                PendingOp::Remove | PendingOp::Rename => {
                    match self.indexer.delete_file(&self.store_name, &rel) {
                        Ok(()) => {
                            (self.on_event)("delete", &rel);
                            tracing::info!(file = %rel, "removed from index");
                        }
                        Err(err) => {
                            tracing::error!(path = %rel, error = %err, "failed to handle delete");
                        }
                    }
                }
                PendingOp::Create | PendingOp::Write => {
                    // Drop stale chunks first; absence is fine
                    let _ = self.indexer.delete_file(&self.store_name, &rel);

                    match self
                        .indexer
                        .index_single_file(token, &self.store_name, &self.root, &path)
                        .await
                    {
                        Ok(()) => {
                            (self.on_event)("index", &rel);
                            tracing::info!(file = %rel, "indexed");
                        }
                        Err(err) => {
                            tracing::error!(path = %rel, error = %err, "failed to handle modify");
                        }
                    }
                }
            }
        }
    }
}

fn should_skip_dir(name: &str) -> bool {
    SKIP_DIRS.contains(&name)
}

/// Map a notify event kind to the pending operation for the path at
/// `index` within the event.
fn classify(kind: &EventKind, index: usize) -> Option<PendingOp> {
    match kind {
        EventKind::Create(_) => Some(PendingOp::Create),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Some(PendingOp::Rename),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Some(PendingOp::Create),
        // A Both rename carries [old, new]
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            if index == 0 {
                Some(PendingOp::Rename)
            } else {
                Some(PendingOp::Create)
            }
        }
        EventKind::Modify(ModifyKind::Name(_)) => Some(PendingOp::Rename),
        EventKind::Modify(_) => Some(PendingOp::Write),
        EventKind::Remove(_) => Some(PendingOp::Remove),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::MockEmbedder;
    use crate::store::SqliteStore;
    use std::fs;

    fn setup(root: &Path) -> (Arc<SqliteStore>, Arc<MockEmbedder>, Watcher) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let embedder = Arc::new(MockEmbedder::new(4));
        let indexer = Arc::new(Indexer::new(
            store.clone(),
            embedder.clone(),
            Config::default(),
        ));
        let watcher = Watcher::new(root, "proj", indexer, &Config::default()).unwrap();
        (store, embedder, watcher)
    }

    #[test]
    fn test_skip_dirs() {
        assert!(should_skip_dir("node_modules"));
        assert!(should_skip_dir("target"));
        assert!(should_skip_dir(".git"));
        assert!(!should_skip_dir("src"));
    }

    #[test]
    fn test_classify_event_kinds() {
        use notify::event::{CreateKind, DataChange, MetadataKind, RemoveKind};

        assert_eq!(
            classify(&EventKind::Create(CreateKind::File), 0),
            Some(PendingOp::Create)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Data(DataChange::Content)), 0),
            Some(PendingOp::Write)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Metadata(MetadataKind::Any)), 0),
            Some(PendingOp::Write)
        );
        assert_eq!(
            classify(&EventKind::Remove(RemoveKind::File), 0),
            Some(PendingOp::Remove)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::From)), 0),
            Some(PendingOp::Rename)
        );
        assert_eq!(
            classify(&EventKind::Modify(ModifyKind::Name(RenameMode::Both)), 1),
            Some(PendingOp::Create)
        );
        assert_eq!(classify(&EventKind::Access(notify::event::AccessKind::Any), 0), None);
    }

    #[test]
    fn test_is_indexable() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, _embedder, watcher) = setup(dir.path());

        let good = dir.path().join("a.go");
        fs::write(&good, "package a\n").unwrap();
        assert!(watcher.is_indexable(&good, PendingOp::Write));

        // Unknown language
        let unknown = dir.path().join("a.xyz");
        fs::write(&unknown, "data\n").unwrap();
        assert!(!watcher.is_indexable(&unknown, PendingOp::Write));

        // No extension
        let bare = dir.path().join("Makefile2");
        fs::write(&bare, "all:\n").unwrap();
        assert!(!watcher.is_indexable(&bare, PendingOp::Write));

        // Missing file: not indexable for writes, still removable
        let gone = dir.path().join("gone.go");
        assert!(!watcher.is_indexable(&gone, PendingOp::Write));
        assert!(watcher.is_indexable(&gone, PendingOp::Remove));
    }

    #[test]
    fn test_later_op_wins() {
        let dir = tempfile::tempdir().unwrap();
        let (_store, _embedder, watcher) = setup(dir.path());
        let path = dir.path().join("f.go");

        watcher.record_pending(path.clone(), PendingOp::Create);
        watcher.record_pending(path.clone(), PendingOp::Write);
        watcher.record_pending(path.clone(), PendingOp::Remove);

        let pending = watcher.pending.lock().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[&path], PendingOp::Remove);
    }

    #[tokio::test]
    async fn test_coalesced_create_write_remove_is_net_delete() {
        let dir = tempfile::tempdir().unwrap();
        let (store, embedder, watcher) = setup(dir.path());
        let token = CancellationToken::new();

        // Within one window the file came and went again
        let path = dir.path().join("flash.go");
        watcher.record_pending(path.clone(), PendingOp::Create);
        watcher.record_pending(path.clone(), PendingOp::Write);
        watcher.record_pending(path.clone(), PendingOp::Remove);

        watcher.flush_pending(&token).await;

        // Exactly one net mutation: a delete. No embedding calls.
        assert_eq!(embedder.call_count(), 0);
        if let Some(record) = store.get_store("proj").unwrap() {
            assert!(store.list_files(record.id, None, None).unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_flush_write_indexes_file() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _embedder, watcher) = setup(dir.path());
        let token = CancellationToken::new();

        let path = dir.path().join("new.go");
        fs::write(&path, "package new\n\nfunc f() {}\n").unwrap();

        let events: Arc<Mutex<Vec<(String, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let watcher = watcher.with_event_callback(move |kind, rel| {
            sink.lock().unwrap().push((kind.to_string(), rel.to_string()));
        });

        watcher.record_pending(path, PendingOp::Write);
        watcher.flush_pending(&token).await;

        let record = store.get_store("proj").unwrap().unwrap();
        let files = store.list_files(record.id, None, None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].external_id, "new.go");

        let seen = events.lock().unwrap();
        assert_eq!(seen.as_slice(), &[("index".to_string(), "new.go".to_string())]);
    }

    #[tokio::test]
    async fn test_flush_remove_deletes_from_index() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _embedder, watcher) = setup(dir.path());
        let token = CancellationToken::new();

        let path = dir.path().join("old.go");
        fs::write(&path, "package old\n\nfunc f() {}\n").unwrap();
        watcher.record_pending(path.clone(), PendingOp::Write);
        watcher.flush_pending(&token).await;

        fs::remove_file(&path).unwrap();
        watcher.record_pending(path, PendingOp::Remove);
        watcher.flush_pending(&token).await;

        let record = store.get_store("proj").unwrap().unwrap();
        assert!(store.list_files(record.id, None, None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_per_path_failures_do_not_poison_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _embedder, watcher) = setup(dir.path());
        let token = CancellationToken::new();

        // One path that cannot be read, one that can
        let missing = dir.path().join("missing.go");
        let good = dir.path().join("good.go");
        fs::write(&good, "package good\n\nfunc g() {}\n").unwrap();

        watcher.record_pending(missing, PendingOp::Write);
        watcher.record_pending(good, PendingOp::Write);
        watcher.flush_pending(&token).await;

        let record = store.get_store("proj").unwrap().unwrap();
        let files = store.list_files(record.id, None, None).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].external_id, "good.go");
    }
}
