//! Default configuration values

use std::path::PathBuf;

// Embedding defaults
pub const DEFAULT_EMBEDDING_PROVIDER: &str = "ollama";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_EMBED_MODEL: &str = "nomic-embed-text";
pub const DEFAULT_OPENAI_EMBED_MODEL: &str = "text-embedding-3-small";

// LLM defaults
pub const DEFAULT_LLM_PROVIDER: &str = "ollama";
pub const DEFAULT_OLLAMA_LLM_MODEL: &str = "llama3";
pub const DEFAULT_OPENAI_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-3-haiku-20240307";

// Indexing defaults
pub const DEFAULT_MAX_FILE_SIZE: u64 = 1 << 20; // 1 MiB
pub const DEFAULT_MAX_FILE_COUNT: usize = 10_000;
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

// Database
pub const DEFAULT_DB_FILE_NAME: &str = "index.db";

/// Default list of file patterns to ignore (gitignore syntax).
pub fn default_ignore_patterns() -> Vec<String> {
    [
        // Lock files
        "*.lock",
        "package-lock.json",
        "yarn.lock",
        "pnpm-lock.yaml",
        "Cargo.lock",
        "go.sum",
        "poetry.lock",
        "Gemfile.lock",
        // Build outputs
        "dist/",
        "build/",
        "out/",
        "target/",
        "__pycache__/",
        "*.pyc",
        ".next/",
        ".nuxt/",
        // Dependencies
        "node_modules/",
        "vendor/",
        ".venv/",
        "venv/",
        // IDE/editor
        ".idea/",
        ".vscode/",
        "*.swp",
        "*.swo",
        "*~",
        // Version control
        ".git/",
        ".svn/",
        ".hg/",
        // Binary/compiled
        "*.exe",
        "*.dll",
        "*.so",
        "*.dylib",
        "*.o",
        "*.a",
        "*.class",
        // Media
        "*.jpg",
        "*.jpeg",
        "*.png",
        "*.gif",
        "*.ico",
        "*.svg",
        "*.webp",
        "*.mp3",
        "*.mp4",
        "*.wav",
        "*.avi",
        "*.mov",
        "*.pdf",
        "*.doc",
        "*.docx",
        "*.xls",
        "*.xlsx",
        // Archives
        "*.zip",
        "*.tar",
        "*.tar.gz",
        "*.tgz",
        "*.rar",
        "*.7z",
        // Minified
        "*.min.js",
        "*.min.css",
        "*.map",
        // Misc
        ".DS_Store",
        "Thumbs.db",
        ".env",
        ".env.*",
        "*.log",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Default configuration directory (`~/.config/lgrep`).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("lgrep")
}

/// Default data directory (`~/.local/share/lgrep`).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("lgrep")
}

/// Default database file path.
pub fn default_database_path() -> PathBuf {
    default_data_dir().join(DEFAULT_DB_FILE_NAME)
}
