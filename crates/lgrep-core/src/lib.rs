//! lgrep core library
//!
//! Local semantic code search: walks source trees, splits files into
//! declaration-aligned chunks, embeds them via a pluggable provider,
//! persists chunks and vectors to a SQLite index, and answers
//! natural-language queries by cosine similarity. A file watcher keeps
//! the index coherent with the working tree.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod fs;
pub mod indexer;
pub mod llm;
pub mod search;
pub mod store;
pub mod watcher;

pub use config::Config;
pub use embeddings::{Embedder, EmbeddingProvider};
pub use error::{LgrepError, Result};
pub use fs::{detect_language, supports_code_chunking, Chunk, ChunkOptions, FileInfo, FileWalker, TextChunker, WalkOptions};
pub use indexer::{IndexOptions, Indexer, Progress};
pub use llm::{LlmService, QaService};
pub use search::{SearchHit, SearchOptions, Searcher};
pub use store::{SearchResult, SqliteStore, StoreRecord, StoreStats};
pub use watcher::Watcher;
