//! Tool definitions and handlers

use crate::protocol::{ToolDefinition, ToolResult};
use lgrep_core::indexer::{IndexOptions, Indexer};
use lgrep_core::search::{SearchOptions, Searcher};
use lgrep_core::store::SqliteStore;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

const CONTENT_TRUNCATE_CHARS: usize = 500;

pub fn search_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "lgrep_search".to_string(),
        description: "Semantic code search. Find relevant code using natural language queries."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query in natural language"
                },
                "path": {
                    "type": "string",
                    "description": "Directory path to search in (default: current directory)",
                    "default": "."
                },
                "limit": {
                    "type": "number",
                    "description": "Maximum number of results to return",
                    "default": 10
                }
            },
            "required": ["query"]
        }),
    }
}

pub fn index_tool_definition() -> ToolDefinition {
    ToolDefinition {
        name: "lgrep_index".to_string(),
        description: "Index a directory for semantic search. Run this before searching a new project."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path to index",
                    "default": "."
                }
            }
        }),
    }
}

/// Run a semantic search, auto-indexing when the store is missing.
pub async fn handle_search(
    token: &CancellationToken,
    store: &SqliteStore,
    indexer: &Indexer,
    searcher: &Searcher,
    args: &Value,
) -> ToolResult {
    let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
    if query.is_empty() {
        return ToolResult::text("Error: query is required".to_string(), true);
    }

    let path = args
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(".");

    let limit = match args.get("limit") {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as usize).unwrap_or(10),
        Some(Value::String(s)) => s.parse().unwrap_or(10),
        _ => 10,
    };

    let abs_path = match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(err) => {
            return ToolResult::text(format!("Error: failed to resolve path: {}", err), true)
        }
    };
    let store_name = basename(&abs_path);

    // Auto-index when the store does not exist yet
    match store.get_store(&store_name) {
        Ok(Some(_)) => {}
        Ok(None) => {
            let opts = IndexOptions {
                store_name: Some(store_name.clone()),
                path: abs_path.clone(),
                ..Default::default()
            };
            if let Err(err) = indexer.index(token, opts).await {
                return ToolResult::text(format!("Error: failed to index: {}", err), true);
            }
        }
        Err(err) => return ToolResult::text(format!("Error: {}", err), true),
    }

    let opts = SearchOptions {
        store_name,
        top_k: limit,
        min_score: 0.0,
        include_content: true,
        context_lines: 0,
    };

    let results = match searcher.search(token, query, &opts).await {
        Ok(results) => results,
        Err(err) => return ToolResult::text(format!("Error: search failed: {}", err), true),
    };

    if results.is_empty() {
        return ToolResult::text("No results found.".to_string(), false);
    }

    let mut out = format!("Found {} results:\n\n", results.len());
    for (i, hit) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "[{}] {} (lines {}-{}) - {:.1}% match",
            i + 1,
            hit.relative_path,
            hit.start_line,
            hit.end_line,
            hit.score * 100.0
        );
        if !hit.content.is_empty() {
            out.push_str(&truncate_chars(&hit.content, CONTENT_TRUNCATE_CHARS));
            out.push_str("\n\n");
        }
    }

    ToolResult::text(out, false)
}

/// Index a directory and report file/chunk counts.
pub async fn handle_index(
    token: &CancellationToken,
    store: &SqliteStore,
    indexer: &Indexer,
    args: &Value,
) -> ToolResult {
    let path = args
        .get("path")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(".");

    let abs_path = match std::fs::canonicalize(path) {
        Ok(p) => p,
        Err(err) => {
            return ToolResult::text(format!("Error: failed to resolve path: {}", err), true)
        }
    };
    let store_name = basename(&abs_path);

    let opts = IndexOptions {
        store_name: Some(store_name.clone()),
        path: abs_path.clone(),
        ..Default::default()
    };

    if let Err(err) = indexer.index(token, opts).await {
        return ToolResult::text(format!("Error: indexing failed: {}", err), true);
    }

    if let Ok(Some(record)) = store.get_store(&store_name) {
        if let Ok(stats) = store.get_stats(record.id) {
            return ToolResult::text(
                format!(
                    "Successfully indexed {}: {} files, {} chunks",
                    abs_path.display(),
                    stats.file_count,
                    stats.chunk_count
                ),
                false,
            );
        }
    }

    ToolResult::text(format!("Successfully indexed {}", abs_path.display()), false)
}

fn basename(path: &PathBuf) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}
