//! Ollama chat client

use super::{CompletionOptions, CompletionStream, LlmProvider, LlmService, Message};
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

// LLM calls can be slow
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Chat service backed by a local Ollama server.
pub struct OllamaService {
    base_url: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatRequestOptions>,
}

#[derive(Serialize)]
struct ChatRequestOptions {
    temperature: f64,
    num_predict: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    #[serde(default)]
    done: bool,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl OllamaService {
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let base_url = if base_url.is_empty() {
            "http://localhost:11434"
        } else {
            base_url
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client,
        })
    }

    async fn send_chat(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/api/chat", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&ChatRequest {
                model: &self.model,
                messages,
                stream,
                options: Some(ChatRequestOptions {
                    temperature: opts.temperature,
                    num_predict: opts.max_tokens,
                }),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LgrepError::Llm(format!(
                "ollama returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmService for OllamaService {
    async fn complete(&self, messages: &[Message], opts: CompletionOptions) -> Result<String> {
        tracing::debug!(model = %self.model, "requesting completion from ollama");

        let response = self.send_chat(messages, opts, false).await?;
        let result: ChatResponse = response.json().await?;
        Ok(result.message.content)
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
    ) -> Result<CompletionStream> {
        tracing::debug!(model = %self.model, "requesting streaming completion from ollama");

        let mut response = self.send_chat(messages, opts, true).await?;
        let (tx, rx) = mpsc::channel(100);

        // The body is newline-delimited JSON frames; forward each
        // content fragment until the done marker.
        tokio::spawn(async move {
            let mut buffer = Vec::new();

            loop {
                let chunk = match response.chunk().await {
                    Ok(Some(chunk)) => chunk,
                    Ok(None) => break,
                    Err(err) => {
                        let _ = tx.send(Err(err.into())).await;
                        return;
                    }
                };

                buffer.extend_from_slice(&chunk);

                while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = String::from_utf8_lossy(&line);
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    let frame: ChatResponse = match serde_json::from_str(line) {
                        Ok(frame) => frame,
                        Err(err) => {
                            let _ = tx.send(Err(err.into())).await;
                            return;
                        }
                    };

                    if !frame.message.content.is_empty()
                        && tx.send(Ok(frame.message.content)).await.is_err()
                    {
                        return;
                    }
                    if frame.done {
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Ollama
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
