//! Ollama embedding client

use super::{model_dimensions, Embedder, EmbeddingProvider};
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

// Local models can be slow to load
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Task prefixes for models that expect them. Unknown models get none.
fn task_prefix(model: &str, is_query: bool) -> &'static str {
    match (model, is_query) {
        ("nomic-embed-text", false) => "search_document: ",
        ("nomic-embed-text", true) => "search_query: ",
        ("mxbai-embed-large", true) => {
            "Represent this sentence for searching relevant passages: "
        }
        _ => "",
    }
}

/// Embedding service backed by a local Ollama server.
pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimensions: AtomicUsize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    truncate: bool,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let base_url = if base_url.is_empty() {
            "http://localhost:11434"
        } else {
            base_url
        };

        let dimensions = match model_dimensions(model) {
            // Unknown model: default, corrected on the first response
            0 => {
                tracing::debug!(model, "unknown model dimensions, defaulting to 768");
                768
            }
            d => d,
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions: AtomicUsize::new(dimensions),
            client,
        })
    }

    fn apply_prefix(&self, text: &str, is_query: bool) -> String {
        let prefix = task_prefix(&self.model, is_query);
        if prefix.is_empty() {
            text.to_string()
        } else {
            format!("{}{}", prefix, text)
        }
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embed", self.base_url);

        tracing::debug!(model = %self.model, count = texts.len(), "requesting embeddings from ollama");

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
                truncate: true,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LgrepError::Embedding(format!(
                "ollama returned status {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response.json().await?;

        if let Some(first) = result.embeddings.first() {
            if !first.is_empty() {
                self.dimensions.store(first.len(), Ordering::Relaxed);
            }
        }

        Ok(result.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let prefixed = self.apply_prefix(text, false);
        self.embed_texts(&[prefixed])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LgrepError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        let prefixed = self.apply_prefix(text, true);
        self.embed_texts(&[prefixed])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LgrepError::Embedding("no embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let prefixed: Vec<String> = texts.iter().map(|t| self.apply_prefix(t, false)).collect();
        self.embed_texts(&prefixed).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }

    fn provider(&self) -> EmbeddingProvider {
        EmbeddingProvider::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
