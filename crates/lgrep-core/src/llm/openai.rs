//! OpenAI chat client

use super::{CompletionOptions, CompletionStream, LlmProvider, LlmService, Message};
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Chat service backed by the OpenAI chat completions API.
pub struct OpenAiService {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    temperature: f64,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Message,
}

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiService {
    pub fn new(api_key: &str, model: &str, base_url: Option<&str>) -> Result<Self> {
        if api_key.is_empty() {
            return Err(LgrepError::InvalidInput(
                "OpenAI API key is required".to_string(),
            ));
        }

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
            client,
        })
    }

    async fn send_chat(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&ChatRequest {
                model: &self.model,
                messages,
                temperature: opts.temperature,
                max_tokens: opts.max_tokens,
                stream,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LgrepError::Llm(format!(
                "openai returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmService for OpenAiService {
    async fn complete(&self, messages: &[Message], opts: CompletionOptions) -> Result<String> {
        tracing::debug!(model = %self.model, "requesting completion from openai");

        let response = self.send_chat(messages, opts, false).await?;
        let result: ChatResponse = response.json().await?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LgrepError::Llm("no response from LLM".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
    ) -> Result<CompletionStream> {
        tracing::debug!(model = %self.model, "requesting streaming completion from openai");

        let mut response = self.send_chat(messages, opts, true).await?;
        let (tx, rx) = mpsc::channel(100);

        // SSE body: `data: {json}` lines terminated by `data: [DONE]`
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

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    if data == "[DONE]" {
                        return;
                    }

                    let Ok(chunk) = serde_json::from_str::<StreamChunk>(data) else {
                        continue;
                    };

                    for choice in chunk.choices {
                        if let Some(content) = choice.delta.content {
                            if !content.is_empty() && tx.send(Ok(content)).await.is_err() {
                                return;
                            }
                        }
                        if choice.finish_reason.is_some() {
                            return;
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
