//! Anthropic chat client

use super::{CompletionOptions, CompletionStream, LlmProvider, LlmService, Message};
use crate::error::{LgrepError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Chat service backed by the Anthropic messages API.
pub struct AnthropicService {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    messages: Vec<&'a Message>,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct StreamEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Deserialize)]
struct StreamDelta {
    #[serde(default)]
    text: String,
}

impl AnthropicService {
    pub fn new(api_key: &str, model: &str) -> Result<Self> {
        if api_key.is_empty() {
            return Err(LgrepError::InvalidInput(
                "Anthropic API key is required".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            api_key: api_key.to_string(),
            model: model.to_string(),
            client,
        })
    }

    /// The API takes the system prompt as a top-level field, not as a
    /// message.
    fn split_system<'a>(messages: &'a [Message]) -> (&'a str, Vec<&'a Message>) {
        let mut system = "";
        let mut rest = Vec::new();
        for message in messages {
            if message.role == "system" {
                system = &message.content;
            } else {
                rest.push(message);
            }
        }
        (system, rest)
    }

    async fn send_messages(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
        stream: bool,
    ) -> Result<reqwest::Response> {
        let (system, user_messages) = Self::split_system(messages);

        let response = self
            .client
            .post(API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&MessagesRequest {
                model: &self.model,
                messages: user_messages,
                system,
                max_tokens: opts.max_tokens,
                temperature: opts.temperature,
                stream,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LgrepError::Llm(format!(
                "anthropic returned status {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl LlmService for AnthropicService {
    async fn complete(&self, messages: &[Message], opts: CompletionOptions) -> Result<String> {
        tracing::debug!(model = %self.model, "requesting completion from anthropic");

        let response = self.send_messages(messages, opts, false).await?;
        let result: MessagesResponse = response.json().await?;

        result
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| LgrepError::Llm("no content in response".to_string()))
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        opts: CompletionOptions,
    ) -> Result<CompletionStream> {
        tracing::debug!(model = %self.model, "requesting streaming completion from anthropic");

        let mut response = self.send_messages(messages, opts, true).await?;
        let (tx, rx) = mpsc::channel(100);

        // SSE events; text arrives in content_block_delta frames and
        // message_stop terminates the stream.
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

                    let data = match line.strip_prefix("data: ") {
                        Some(data) => data,
                        None => continue,
                    };

                    let Ok(event) = serde_json::from_str::<StreamEvent>(data) else {
                        continue;
                    };

                    match event.event_type.as_str() {
                        "content_block_delta" => {
                            if let Some(delta) = event.delta {
                                if !delta.text.is_empty() && tx.send(Ok(delta.text)).await.is_err()
                                {
                                    return;
                                }
                            }
                        }
                        "message_stop" => return,
                        _ => {}
                    }
                }
            }
        });

        Ok(rx)
    }

    fn provider(&self) -> LlmProvider {
        LlmProvider::Anthropic
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
