//! File system layer: walking, hashing, language detection, chunking

mod chunker;
mod language;
mod walker;

pub use chunker::TextChunker;
pub use language::{detect_language, is_code_file, supports_code_chunking};
pub use walker::{hash_content, hash_file, FileWalker};

use std::path::PathBuf;
use std::time::SystemTime;

/// Metadata about a file yielded by the walker.
#[derive(Debug, Clone)]
pub struct FileInfo {
    /// Absolute path to the file
    pub path: PathBuf,
    /// Path relative to the walk root
    pub rel_path: String,
    /// File size in bytes
    pub size: u64,
    /// Last modification time (informational; hash drives re-indexing)
    pub mod_time: Option<SystemTime>,
    /// 64-bit content fingerprint, lowercase 16-hex
    pub hash: String,
    /// Detected language tag, empty if unknown
    pub language: &'static str,
}

/// A piece of a file prepared for embedding.
///
/// Line numbers are 1-indexed and inclusive. Char offsets count
/// codepoints and are informational; the line range is the canonical
/// span of the chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub chunk_index: usize,
}

/// Options for the file walker.
#[derive(Debug, Clone)]
pub struct WalkOptions {
    /// Directory to walk
    pub root: PathBuf,
    /// Files larger than this are skipped (0 disables the check)
    pub max_file_size: u64,
    /// Hard cap on yielded files (0 disables the cap)
    pub max_file_count: usize,
    /// Additional ignore patterns (gitignore syntax)
    pub ignore_patterns: Vec<String>,
    /// Include hidden files and directories
    pub include_hidden: bool,
    /// Combine `<root>/.gitignore` with the ignore patterns
    pub use_gitignore: bool,
    /// If non-empty, only these extensions are yielded (lowercased,
    /// leading dot optional)
    pub extensions: Vec<String>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            max_file_size: 1024 * 1024,
            max_file_count: 10_000,
            ignore_patterns: Vec::new(),
            include_hidden: false,
            use_gitignore: true,
            extensions: Vec::new(),
        }
    }
}

/// Statistics accumulated over one walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkStats {
    pub files_found: usize,
    pub files_skipped: usize,
    pub dirs_skipped: usize,
    pub total_bytes: u64,
    pub skipped_bytes: u64,
}

/// Options for the chunker.
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    /// Target chunk size in characters
    pub chunk_size: usize,
    /// Desired overlapping characters between consecutive chunks
    pub chunk_overlap: usize,
    /// Chunks below this are merged into the previous one
    pub min_chunk_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
            min_chunk_size: 100,
        }
    }
}
