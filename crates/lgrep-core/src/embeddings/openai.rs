//! OpenAI batch embedding client

use super::{model_dimensions, Embedder, EmbeddingProvider};
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Embedding service backed by the OpenAI embeddings API (or any
/// compatible endpoint via `base_url`).
pub struct OpenAiEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    dimensions: AtomicUsize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        api_key: &str,
        model: &str,
        base_url: Option<&str>,
        dimensions: Option<usize>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(LgrepError::InvalidInput(
                "OpenAI API key is required".to_string(),
            ));
        }

        let dimensions = dimensions.unwrap_or_else(|| match model_dimensions(model) {
            0 => {
                tracing::debug!(model, "unknown model dimensions, defaulting to 1536");
                1536
            }
            d => d,
        });

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            dimensions: AtomicUsize::new(dimensions),
            client,
        })
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/v1/embeddings", self.base_url);

        tracing::debug!(model = %self.model, count = texts.len(), "requesting embeddings from openai");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&EmbedRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LgrepError::Embedding(format!(
                "openai returned status {}: {}",
                status, body
            )));
        }

        let result: EmbedResponse = response.json().await?;

        // The response carries indices; reorder to match the input
        let mut embeddings = vec![Vec::new(); texts.len()];
        for data in result.data {
            if data.index < embeddings.len() {
                embeddings[data.index] = data.embedding;
            }
        }

        if let Some(first) = embeddings.first() {
            if !first.is_empty() {
                self.dimensions.store(first.len(), Ordering::Relaxed);
            }
        }

        Ok(embeddings)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_texts(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| LgrepError::Embedding("no embedding returned".to_string()))
    }

    // OpenAI models use no task prefixes; queries embed like documents
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_texts(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions.load(Ordering::Relaxed)
    }

    fn provider(&self) -> EmbeddingProvider {
        EmbeddingProvider::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_required() {
        let result = OpenAiEmbedder::new("", "text-embedding-3-small", None, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_dimension_resolution() {
        let known = OpenAiEmbedder::new("sk-test", "text-embedding-3-small", None, None).unwrap();
        assert_eq!(known.dimensions(), 1536);

        let overridden =
            OpenAiEmbedder::new("sk-test", "text-embedding-3-small", None, Some(256)).unwrap();
        assert_eq!(overridden.dimensions(), 256);

        let unknown = OpenAiEmbedder::new("sk-test", "custom", None, None).unwrap();
        assert_eq!(unknown.dimensions(), 1536);
    }

    #[test]
    fn test_base_url_default_and_trim() {
        let embedder = OpenAiEmbedder::new("sk-test", "text-embedding-3-small", None, None).unwrap();
        assert_eq!(embedder.base_url, "https://api.openai.com");

        let custom = OpenAiEmbedder::new(
            "sk-test",
            "text-embedding-3-small",
            Some("https://proxy.local/"),
            None,
        )
        .unwrap();
        assert_eq!(custom.base_url, "https://proxy.local");
    }
}
