//! Text embedding services for semantic search

mod ollama;
mod openai;

pub use ollama::OllamaEmbedder;
pub use openai::OpenAiEmbedder;

use crate::config::Config;
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Embedding provider tag, recorded per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingProvider {
    Ollama,
    OpenAi,
}

impl EmbeddingProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            other => Err(LgrepError::InvalidInput(format!(
                "unsupported embedding provider: {}",
                other
            ))),
        }
    }
}

impl std::fmt::Display for EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Batch embedding service.
///
/// `embed_batch` preserves input order and length. `dimensions` may be
/// corrected from the first actual response when the model is unknown.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed document text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed query text (may apply a model-specific query prefix).
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of document texts, order-preserving.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output width of this model.
    fn dimensions(&self) -> usize;

    /// Provider tag for record-keeping.
    fn provider(&self) -> EmbeddingProvider;

    /// Model name for record-keeping.
    fn model_name(&self) -> &str;
}

/// Known output widths for common models; 0 when unknown.
pub fn model_dimensions(model: &str) -> usize {
    match model {
        // Ollama models
        "nomic-embed-text" => 768,
        "mxbai-embed-large" => 1024,
        "all-minilm" => 384,
        "snowflake-arctic-embed" => 1024,
        // OpenAI models
        "text-embedding-3-small" => 1536,
        "text-embedding-3-large" => 3072,
        "text-embedding-ada-002" => 1536,
        _ => 0,
    }
}

/// Build an embedding service from the configured provider tag.
pub fn new_service(config: &Config) -> Result<Arc<dyn Embedder>> {
    new_service_for_store(&config.embeddings.provider, None, config)
}

/// Build an embedding service matching a store's recorded provider and
/// model (used by the searcher and watcher to reconstruct the client a
/// store was created with). `model` of `None` uses the configured one.
pub fn new_service_for_store(
    provider: &str,
    model: Option<&str>,
    config: &Config,
) -> Result<Arc<dyn Embedder>> {
    match EmbeddingProvider::parse(provider)? {
        EmbeddingProvider::Ollama => {
            let model = model.unwrap_or(&config.embeddings.ollama.model);
            Ok(Arc::new(OllamaEmbedder::new(
                &config.embeddings.ollama.url,
                model,
            )?))
        }
        EmbeddingProvider::OpenAi => {
            let model = model.unwrap_or(&config.embeddings.openai.model);
            let api_key = config
                .embeddings
                .openai
                .api_key
                .as_deref()
                .unwrap_or_default();
            Ok(Arc::new(OpenAiEmbedder::new(
                api_key,
                model,
                config.embeddings.openai.base_url.as_deref(),
                config.embeddings.openai.dimensions,
            )?))
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Deterministic in-process embedder for tests

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Produces stable pseudo-embeddings derived from the text bytes
    /// and counts every service call.
    pub struct MockEmbedder {
        pub dims: usize,
        pub calls: AtomicUsize,
    }

    impl MockEmbedder {
        pub fn new(dims: usize) -> Self {
            Self {
                dims,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub fn vector_for(&self, text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; self.dims];
            for (i, b) in text.bytes().enumerate() {
                v[i % self.dims] += b as f32;
            }
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut v {
                    *x /= norm;
                }
            }
            v
        }
    }

    #[async_trait]
    impl Embedder for MockEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector_for(text))
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.vector_for(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.vector_for(t)).collect())
        }

        fn dimensions(&self) -> usize {
            self.dims
        }

        fn provider(&self) -> EmbeddingProvider {
            EmbeddingProvider::Ollama
        }

        fn model_name(&self) -> &str {
            "mock-embed"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!(
            EmbeddingProvider::parse("ollama").unwrap(),
            EmbeddingProvider::Ollama
        );
        assert_eq!(
            EmbeddingProvider::parse("openai").unwrap(),
            EmbeddingProvider::OpenAi
        );
        assert!(EmbeddingProvider::parse("cohere").is_err());
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(model_dimensions("nomic-embed-text"), 768);
        assert_eq!(model_dimensions("text-embedding-3-large"), 3072);
        assert_eq!(model_dimensions("made-up-model"), 0);
    }

    #[tokio::test]
    async fn test_mock_embedder_deterministic() {
        let mock = testing::MockEmbedder::new(8);
        let a = mock.embed("hello").await.unwrap();
        let b = mock.embed("hello").await.unwrap();
        let c = mock.embed("world").await.unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
        assert_eq!(mock.call_count(), 3);
    }
}
