//! Durable storage for stores, files, chunks, and vectors
//!
//! Backed by SQLite with a vector side-table keyed by chunk id;
//! similarity is cosine distance computed over little-endian f32
//! blobs.

mod schema;
mod sqlite;
pub mod vectors;

pub use schema::SqliteStore;

use serde::Serialize;
use std::path::PathBuf;

/// A named, path-anchored index namespace.
#[derive(Debug, Clone, Serialize)]
pub struct StoreRecord {
    pub id: i64,
    pub name: String,
    pub root_path: String,
    pub embedding_provider: String,
    pub embedding_model: String,
    pub embedding_dimensions: usize,
    pub created_at: String,
    pub updated_at: String,
}

/// The indexed record of one file under a store.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub id: i64,
    pub store_id: i64,
    /// Relative path used as stable identity across re-indexes
    pub external_id: String,
    pub path: String,
    pub relative_path: String,
    pub hash: String,
    pub file_size: u64,
    pub indexed_at: String,
}

/// A stored chunk of a file.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkRecord {
    pub id: i64,
    pub file_id: i64,
    pub chunk_index: usize,
    pub content: String,
    /// 1-indexed, inclusive
    pub start_line: usize,
    pub end_line: usize,
}

/// Chunk data for upserting.
#[derive(Debug, Clone)]
pub struct ChunkInput {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub chunk_index: usize,
}

/// File data for upserting.
#[derive(Debug, Clone)]
pub struct FileInput {
    pub external_id: String,
    pub path: String,
    pub relative_path: String,
    pub hash: String,
    pub file_size: u64,
}

/// A k-NN hit: chunk, owning file, and cosine distance.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk: ChunkRecord,
    pub file: FileRecord,
    /// Cosine distance, lower is more similar
    pub distance: f64,
    /// `1 - distance`
    pub score: f64,
}

/// Statistics about a store.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub store_id: i64,
    pub store_name: String,
    pub file_count: usize,
    pub chunk_count: usize,
    pub total_size: u64,
}

impl SqliteStore {
    /// Default database path in the user data directory.
    pub fn default_path() -> PathBuf {
        crate::config::default_database_path()
    }
}
