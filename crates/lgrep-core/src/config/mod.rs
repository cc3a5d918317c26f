//! Configuration loading for lgrep
//!
//! Configuration is layered: defaults, then the global config file,
//! then a `.lgreprc.yaml` found searching upward from the working
//! directory, then `LGREP_*` environment variables. CLI flags are
//! applied last by the driver.

pub mod defaults;

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use defaults::*;

/// Name of the per-project rc file searched upward from the cwd.
pub const RC_FILE_NAME: &str = ".lgreprc.yaml";

/// Complete lgrep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub embeddings: EmbeddingsConfig,
    pub llm: LlmConfig,
    pub database: DatabaseConfig,
    pub indexing: IndexingConfig,
    pub ignore: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embeddings: EmbeddingsConfig::default(),
            llm: LlmConfig::default(),
            database: DatabaseConfig::default(),
            indexing: IndexingConfig::default(),
            ignore: default_ignore_patterns(),
        }
    }
}

/// Embedding service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub ollama: OllamaEmbedConfig,
    pub openai: OpenAiEmbedConfig,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_EMBEDDING_PROVIDER.to_string(),
            ollama: OllamaEmbedConfig::default(),
            openai: OpenAiEmbedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaEmbedConfig {
    pub url: String,
    pub model: String,
}

impl Default for OllamaEmbedConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_EMBED_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiEmbedConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub dimensions: Option<usize>,
}

impl Default for OpenAiEmbedConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_EMBED_MODEL.to_string(),
            base_url: None,
            api_key: None,
            dimensions: None,
        }
    }
}

/// LLM service configuration for the Q&A layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub ollama: OllamaLlmConfig,
    pub openai: OpenAiLlmConfig,
    pub anthropic: AnthropicConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: DEFAULT_LLM_PROVIDER.to_string(),
            ollama: OllamaLlmConfig::default(),
            openai: OpenAiLlmConfig::default(),
            anthropic: AnthropicConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaLlmConfig {
    pub url: String,
    pub model: String,
}

impl Default for OllamaLlmConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_OLLAMA_URL.to_string(),
            model: DEFAULT_OLLAMA_LLM_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiLlmConfig {
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl Default for OpenAiLlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_OPENAI_LLM_MODEL.to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnthropicConfig {
    pub model: String,
    pub api_key: Option<String>,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_ANTHROPIC_MODEL.to_string(),
            api_key: None,
        }
    }
}

/// SQLite database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Indexing pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingConfig {
    pub max_file_size: u64,
    pub max_file_count: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_file_count: DEFAULT_MAX_FILE_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Config {
    /// Load configuration with the standard layering.
    ///
    /// `config_file` pins an explicit file and skips the search.
    pub fn load(config_file: Option<&Path>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => {
                // An rc file found upward from the cwd wins over the
                // global config file.
                if let Some(rc) = find_rc_file() {
                    tracing::debug!(path = %rc.display(), "loading rc config");
                    Self::from_file(&rc)?
                } else {
                    let global = Self::global_path();
                    if global.exists() {
                        tracing::debug!(path = %global.display(), "loading global config");
                        Self::from_file(&global)?
                    } else {
                        tracing::debug!("no config file found, using defaults");
                        Self::default()
                    }
                }
            }
        };

        config.apply_env();
        config.apply_vendor_keys();
        Ok(config)
    }

    /// Parse a config file, treating missing keys as defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save to the global config path, creating directories as needed.
    pub fn save(&self) -> Result<()> {
        let path = Self::global_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Path of the global config file.
    pub fn global_path() -> PathBuf {
        default_config_dir().join("config.yaml")
    }

    /// Apply `LGREP_*` environment overrides. Dots in config keys map
    /// to underscores: `embeddings.ollama.url` reads
    /// `LGREP_EMBEDDINGS_OLLAMA_URL`.
    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_PROVIDER") {
            self.embeddings.provider = v;
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OLLAMA_URL") {
            self.embeddings.ollama.url = v;
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OLLAMA_MODEL") {
            self.embeddings.ollama.model = v;
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OPENAI_MODEL") {
            self.embeddings.openai.model = v;
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OPENAI_BASE_URL") {
            self.embeddings.openai.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OPENAI_API_KEY") {
            self.embeddings.openai.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LGREP_EMBEDDINGS_OPENAI_DIMENSIONS") {
            if let Ok(dims) = v.parse() {
                self.embeddings.openai.dimensions = Some(dims);
            }
        }
        if let Ok(v) = std::env::var("LGREP_LLM_PROVIDER") {
            self.llm.provider = v;
        }
        if let Ok(v) = std::env::var("LGREP_LLM_OLLAMA_URL") {
            self.llm.ollama.url = v;
        }
        if let Ok(v) = std::env::var("LGREP_LLM_OLLAMA_MODEL") {
            self.llm.ollama.model = v;
        }
        if let Ok(v) = std::env::var("LGREP_LLM_OPENAI_MODEL") {
            self.llm.openai.model = v;
        }
        if let Ok(v) = std::env::var("LGREP_LLM_OPENAI_API_KEY") {
            self.llm.openai.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LGREP_LLM_ANTHROPIC_MODEL") {
            self.llm.anthropic.model = v;
        }
        if let Ok(v) = std::env::var("LGREP_LLM_ANTHROPIC_API_KEY") {
            self.llm.anthropic.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("LGREP_DATABASE_PATH") {
            self.database.path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("LGREP_INDEXING_MAX_FILE_SIZE") {
            if let Ok(n) = v.parse() {
                self.indexing.max_file_size = n;
            }
        }
        if let Ok(v) = std::env::var("LGREP_INDEXING_MAX_FILE_COUNT") {
            if let Ok(n) = v.parse() {
                self.indexing.max_file_count = n;
            }
        }
        if let Ok(v) = std::env::var("LGREP_INDEXING_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.indexing.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("LGREP_INDEXING_CHUNK_OVERLAP") {
            if let Ok(n) = v.parse() {
                self.indexing.chunk_overlap = n;
            }
        }
    }

    /// Fill unset API keys from vendor environment variables.
    fn apply_vendor_keys(&mut self) {
        if self.embeddings.openai.api_key.is_none() {
            self.embeddings.openai.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.llm.openai.api_key.is_none() {
            self.llm.openai.api_key = std::env::var("OPENAI_API_KEY").ok();
        }
        if self.llm.anthropic.api_key.is_none() {
            self.llm.anthropic.api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        }
    }
}

/// Search for `.lgreprc.yaml` from the cwd upward to the filesystem root.
fn find_rc_file() -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let rc = dir.join(RC_FILE_NAME);
        if rc.is_file() {
            return Some(rc);
        }
        if !dir.pop() {
            return None;
        }
    }
}
