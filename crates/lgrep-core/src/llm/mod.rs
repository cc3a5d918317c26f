//! LLM services for the optional Q&A layer

mod anthropic;
mod ollama;
mod openai;
mod qa;

pub use anthropic::AnthropicService;
pub use ollama::OllamaService;
pub use openai::OpenAiService;
pub use qa::{QaOptions, QaResult, QaService};

use crate::config::Config;
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;

/// LLM provider tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Ollama,
    OpenAi,
    Anthropic,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// A chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// "system", "user", or "assistant"
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Options for a completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionOptions {
    /// 0-1, higher is more random
    pub temperature: f64,
    pub max_tokens: u32,
    pub stream: bool,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2048,
            stream: false,
        }
    }
}

/// A streamed completion: a lazy finite sequence of content frames;
/// an `Err` frame terminates the stream.
pub type CompletionStream = mpsc::Receiver<Result<String>>;

/// Chat completion service.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generate a completion for the messages.
    async fn complete(&self, messages: &[Message], opts: CompletionOptions) -> Result<String>;

    /// Generate a streaming completion.
    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
    ) -> Result<CompletionStream>;

    fn provider(&self) -> LlmProvider;

    fn model_name(&self) -> &str;
}

/// Build an LLM service from the configured provider tag.
pub fn new_service(config: &Config) -> Result<Arc<dyn LlmService>> {
    match config.llm.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaService::new(
            &config.llm.ollama.url,
            &config.llm.ollama.model,
        )?)),
        "openai" => Ok(Arc::new(OpenAiService::new(
            config.llm.openai.api_key.as_deref().unwrap_or_default(),
            &config.llm.openai.model,
            config.llm.openai.base_url.as_deref(),
        )?)),
        "anthropic" => Ok(Arc::new(AnthropicService::new(
            config.llm.anthropic.api_key.as_deref().unwrap_or_default(),
            &config.llm.anthropic.model,
        )?)),
        other => Err(LgrepError::InvalidInput(format!(
            "unsupported LLM provider: {}",
            other
        ))),
    }
}
