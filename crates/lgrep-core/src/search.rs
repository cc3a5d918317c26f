//! Semantic search over indexed stores

use crate::embeddings::Embedder;
use crate::error::{LgrepError, Result};
use crate::store::{SqliteStore, StoreRecord};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A search hit with optional surrounding context.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub file_path: String,
    pub relative_path: String,

    pub content: String,
    pub start_line: usize,
    pub end_line: usize,

    /// 0-1, higher is better
    pub score: f64,
    /// Cosine distance
    pub distance: f64,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub context_before: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub context_after: String,
}

/// Options for one search.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub store_name: String,
    /// Maximum results to return
    pub top_k: usize,
    /// Results scoring below this are dropped
    pub min_score: f64,
    /// Inline the chunk content in results
    pub include_content: bool,
    /// Lines of context to read around each hit
    pub context_lines: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            store_name: String::new(),
            top_k: 10,
            min_score: 0.0,
            include_content: true,
            context_lines: 0,
        }
    }
}

/// Embeds queries and retrieves top-k chunks by cosine similarity.
pub struct Searcher {
    store: Arc<SqliteStore>,
    embedder: Arc<dyn Embedder>,
}

impl Searcher {
    pub fn new(store: Arc<SqliteStore>, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Search one store. Results come back in ascending-distance order.
    pub async fn search(
        &self,
        token: &CancellationToken,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            return Err(LgrepError::InvalidInput("query cannot be empty".to_string()));
        }

        let store_record = self
            .store
            .get_store(&opts.store_name)?
            .ok_or_else(|| LgrepError::StoreNotFound(opts.store_name.clone()))?;

        if token.is_cancelled() {
            return Err(LgrepError::Cancelled);
        }

        tracing::debug!(query = %truncate(query, 50), "generating query embedding");
        let query_embedding = self.embedder.embed_query(query).await?;

        let top_k = if opts.top_k == 0 { 10 } else { opts.top_k };

        tracing::debug!(store = %opts.store_name, top_k, "searching store");
        let results = self.store.search(store_record.id, &query_embedding, top_k)?;

        let mut hits = Vec::new();
        for result in results {
            if result.score < opts.min_score {
                continue;
            }
            hits.push(self.to_hit(result, opts));
        }

        tracing::debug!(results = hits.len(), "search complete");
        Ok(hits)
    }

    /// Search every store with a single query embedding, merge, sort by
    /// score descending, and truncate to `top_k`.
    pub async fn search_all(
        &self,
        token: &CancellationToken,
        query: &str,
        opts: &SearchOptions,
    ) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            return Err(LgrepError::InvalidInput("query cannot be empty".to_string()));
        }

        let stores = self.store.list_stores()?;
        if stores.is_empty() {
            return Err(LgrepError::StoreNotFound("no indexed stores found".to_string()));
        }

        if token.is_cancelled() {
            return Err(LgrepError::Cancelled);
        }

        let query_embedding = self.embedder.embed_query(query).await?;
        let top_k = if opts.top_k == 0 { 10 } else { opts.top_k };

        let mut hits = Vec::new();
        for store_record in stores {
            let results = match self.store.search(store_record.id, &query_embedding, top_k) {
                Ok(r) => r,
                Err(err) => {
                    tracing::warn!(store = %store_record.name, error = %err, "search failed for store");
                    continue;
                }
            };

            for result in results {
                if result.score < opts.min_score {
                    continue;
                }
                hits.push(self.to_hit(result, opts));
            }
        }

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    /// The store whose root contains `path` (prefix match), else the
    /// store rooted exactly at `path`, else none.
    pub fn get_store_for_path(&self, path: impl AsRef<Path>) -> Result<Option<StoreRecord>> {
        let abs = std::fs::canonicalize(path.as_ref())
            .unwrap_or_else(|_| path.as_ref().to_path_buf());

        let stores = self.store.list_stores()?;

        for record in &stores {
            if abs.starts_with(&record.root_path) {
                return Ok(Some(record.clone()));
            }
        }
        for record in &stores {
            if Path::new(&record.root_path) == abs {
                return Ok(Some(record.clone()));
            }
        }
        Ok(None)
    }

    fn to_hit(&self, result: crate::store::SearchResult, opts: &SearchOptions) -> SearchHit {
        let (context_before, context_after) = if opts.context_lines > 0 {
            read_context(
                &result.file.path,
                result.chunk.start_line,
                result.chunk.end_line,
                opts.context_lines,
            )
        } else {
            (String::new(), String::new())
        };

        SearchHit {
            file_path: result.file.path,
            relative_path: result.file.relative_path,
            content: if opts.include_content {
                result.chunk.content
            } else {
                String::new()
            },
            start_line: result.chunk.start_line,
            end_line: result.chunk.end_line,
            score: result.score,
            distance: result.distance,
            context_before,
            context_after,
        }
    }
}

/// Read `context_lines` of context around a 1-indexed inclusive line
/// span, clamped to the file.
fn read_context(
    file_path: &str,
    start_line: usize,
    end_line: usize,
    context_lines: usize,
) -> (String, String) {
    let Ok(content) = std::fs::read_to_string(file_path) else {
        return (String::new(), String::new());
    };

    let lines: Vec<&str> = content.split('\n').collect();

    let before = if start_line > 1 {
        let before_start = start_line.saturating_sub(context_lines + 1);
        let before_end = (start_line - 1).min(lines.len());
        lines[before_start..before_end].join("\n")
    } else {
        String::new()
    };

    let after = if end_line < lines.len() {
        let after_end = (end_line + context_lines).min(lines.len());
        lines[end_line..after_end].join("\n")
    } else {
        String::new()
    };

    (before, after)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::testing::MockEmbedder;
    use crate::store::{ChunkInput, FileInput};

    fn setup() -> (Arc<SqliteStore>, Arc<MockEmbedder>, Searcher) {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        let embedder = Arc::new(MockEmbedder::new(4));
        let searcher = Searcher::new(store.clone(), embedder.clone());
        (store, embedder, searcher)
    }

    fn seed(store: &SqliteStore, name: &str, root: &str, files: &[(&str, Vec<f32>)]) -> i64 {
        let record = store
            .create_store(name, root, "ollama", "nomic-embed-text", 4)
            .unwrap();
        for (file, vector) in files {
            store
                .upsert_file(
                    record.id,
                    &FileInput {
                        external_id: file.to_string(),
                        path: format!("{}/{}", root, file),
                        relative_path: file.to_string(),
                        hash: file.to_string(),
                        file_size: 10,
                    },
                    &[ChunkInput {
                        content: format!("content of {}", file),
                        start_line: 1,
                        end_line: 3,
                        chunk_index: 0,
                    }],
                    &[vector.clone()],
                )
                .unwrap();
        }
        record.id
    }

    #[tokio::test]
    async fn test_empty_query_rejected() {
        let (_store, _embedder, searcher) = setup();
        let token = CancellationToken::new();
        let err = searcher
            .search(&token, "", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LgrepError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_missing_store_is_error() {
        let (_store, _embedder, searcher) = setup();
        let token = CancellationToken::new();
        let err = searcher
            .search(
                &token,
                "anything",
                &SearchOptions {
                    store_name: "ghost".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LgrepError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let (store, embedder, searcher) = setup();
        let token = CancellationToken::new();

        // One chunk aligned with the query vector, one orthogonal
        let query_vec = embedder.vector_for("the query");
        let mut orthogonal = vec![0.0; 4];
        // Build a vector orthogonal to the query deterministically
        orthogonal[0] = -query_vec[1];
        orthogonal[1] = query_vec[0];
        seed(
            &store,
            "proj",
            "/tmp/proj",
            &[("near.go", query_vec), ("far.go", orthogonal)],
        );

        let hits = searcher
            .search(
                &token,
                "the query",
                &SearchOptions {
                    store_name: "proj".into(),
                    min_score: 0.9,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].relative_path, "near.go");
        assert!(hits[0].score >= 0.9);
    }

    #[tokio::test]
    async fn test_content_inlining_toggle() {
        let (store, embedder, searcher) = setup();
        let token = CancellationToken::new();
        let v = embedder.vector_for("q");
        seed(&store, "proj", "/tmp/proj", &[("a.go", v)]);

        let with = searcher
            .search(
                &token,
                "q",
                &SearchOptions {
                    store_name: "proj".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!with[0].content.is_empty());

        let without = searcher
            .search(
                &token,
                "q",
                &SearchOptions {
                    store_name: "proj".into(),
                    include_content: false,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(without[0].content.is_empty());
    }

    #[tokio::test]
    async fn test_context_lines_from_live_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("ctx.go");
        std::fs::write(&file_path, "l1\nl2\nl3\nl4\nl5\nl6\nl7\n").unwrap();

        let (store, embedder, searcher) = setup();
        let token = CancellationToken::new();
        let record = store
            .create_store("proj", &dir.path().to_string_lossy(), "ollama", "m", 4)
            .unwrap();
        store
            .upsert_file(
                record.id,
                &FileInput {
                    external_id: "ctx.go".into(),
                    path: file_path.to_string_lossy().to_string(),
                    relative_path: "ctx.go".into(),
                    hash: "h".into(),
                    file_size: 10,
                },
                &[ChunkInput {
                    content: "l3\nl4".into(),
                    start_line: 3,
                    end_line: 4,
                    chunk_index: 0,
                }],
                &[embedder.vector_for("q")],
            )
            .unwrap();

        let hits = searcher
            .search(
                &token,
                "q",
                &SearchOptions {
                    store_name: "proj".into(),
                    context_lines: 2,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(hits[0].context_before, "l1\nl2");
        assert_eq!(hits[0].context_after, "l5\nl6");
    }

    #[tokio::test]
    async fn test_search_all_merges_and_sorts() {
        let (store, embedder, searcher) = setup();
        let token = CancellationToken::new();

        let query_vec = embedder.vector_for("query text");
        let mut off = query_vec.clone();
        off[0] *= 0.5;
        off[1] += 0.5;

        seed(&store, "alpha", "/tmp/alpha", &[("exact.go", query_vec)]);
        seed(&store, "beta", "/tmp/beta", &[("close.go", off)]);

        let hits = searcher
            .search_all(
                &token,
                "query text",
                &SearchOptions {
                    top_k: 10,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].relative_path, "exact.go");
        assert!(hits[0].score >= hits[1].score);

        // top_k truncation applies to the union
        let truncated = searcher
            .search_all(
                &token,
                "query text",
                &SearchOptions {
                    top_k: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(truncated.len(), 1);
    }

    #[tokio::test]
    async fn test_search_all_without_stores_is_error() {
        let (_store, _embedder, searcher) = setup();
        let token = CancellationToken::new();
        let err = searcher
            .search_all(&token, "q", &SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LgrepError::StoreNotFound(_)));
    }

    #[tokio::test]
    async fn test_get_store_for_path() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        std::fs::create_dir(root.join("sub")).unwrap();

        let (store, _embedder, searcher) = setup();
        store
            .create_store("proj", &root.to_string_lossy(), "ollama", "m", 4)
            .unwrap();

        let found = searcher
            .get_store_for_path(root.join("sub"))
            .unwrap()
            .unwrap();
        assert_eq!(found.name, "proj");

        let exact = searcher.get_store_for_path(&root).unwrap().unwrap();
        assert_eq!(exact.name, "proj");

        let other = tempfile::tempdir().unwrap();
        assert!(searcher.get_store_for_path(other.path()).unwrap().is_none());
    }
}
