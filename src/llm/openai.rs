//! OpenAI-compatible chat completions client
//!
//! Works with any endpoint speaking the `/chat/completions` protocol
//! (OpenAI, DeepSeek, local gateways).
//!
//! ```ignore
//! // From environment variables
//! let llm = OpenAiCompatibleProvider::from_env()?;
//!
//! // With explicit settings
//! let llm = OpenAiCompatibleProvider::new("sk-...", "https://api.deepseek.com", "deepseek-chat");
//! ```

use std::env;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncBufReadExt;
use tokio::sync::Semaphore;
use tokio_util::io::StreamReader;

use super::provider::LlmProvider;
use super::types::{ChatMessage, ChatRole, LlmRequest, TextStream};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Concurrent requests allowed per provider
const DEFAULT_MAX_CONCURRENCY: usize = 5;
/// Terminal SSE payload of the chat completions protocol
const SSE_DONE: &str = "[DONE]";

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Parse one SSE line into a content increment
///
/// Returns `Ok(None)` for lines that carry no content and `Err` for the
/// terminal `[DONE]` marker.
fn parse_sse_line(line: &str) -> std::result::Result<Option<String>, ()> {
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(None);
    };
    let data = data.trim();
    if data.is_empty() {
        return Ok(None);
    }
    if data == SSE_DONE {
        return Err(());
    }
    match serde_json::from_str::<ChatCompletionChunk>(data) {
        Ok(chunk) => Ok(chunk
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.delta.content)
            .filter(|c| !c.is_empty())),
        Err(e) => {
            tracing::warn!("[OpenAI] Failed to parse streaming chunk: {}", e);
            Ok(None)
        }
    }
}

// ============================================================================
// Provider
// ============================================================================

/// Provider for OpenAI-compatible chat completion APIs
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    permits: Arc<Semaphore>,
}

impl OpenAiCompatibleProvider {
    /// Create a provider from environment variables
    ///
    /// Reads from:
    /// - `OPENAI_API_KEY` (required)
    /// - `OPENAI_BASE_URL` (optional, defaults to the OpenAI endpoint)
    /// - `OPENAI_MODEL` (optional, defaults to `gpt-4o-mini`)
    pub fn from_env() -> Result<Self> {
        tracing::info!("Creating OpenAI-compatible provider from environment");

        let api_key =
            env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable not set")?;
        let base_url = env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        tracing::info!("Using model: {}", model);
        tracing::info!("Base URL: {}", base_url);

        Ok(Self::new(api_key, base_url, model))
    }

    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            permits: Arc::new(Semaphore::new(DEFAULT_MAX_CONCURRENCY)),
        }
    }

    /// Limit the number of in-flight requests
    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(max.max(1)));
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: LlmRequest, stream: bool) -> ChatCompletionRequest<'_> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = request.system {
            messages.push(ChatMessage {
                role: ChatRole::System,
                content: system,
            });
        }
        messages.extend(request.messages);
        ChatCompletionRequest {
            model: &self.model,
            messages,
            stream,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    async fn send(&self, body: &ChatCompletionRequest<'_>) -> Result<reqwest::Response> {
        let request_json =
            serde_json::to_string(body).context("Failed to serialize chat completion request")?;
        tracing::debug!("[OpenAI] Request JSON: {}", request_json);

        let response = self
            .client
            .post(self.endpoint())
            .header("Content-Type", "application/json")
            .bearer_auth(&self.api_key)
            .body(request_json)
            .send()
            .await
            .context("Failed to send request to chat completions API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            tracing::error!("[OpenAI] API error: {} - {}", status, error_text);
            anyhow::bail!("Chat completions API error ({}): {}", status, error_text);
        }
        Ok(response)
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    async fn ask(&self, request: LlmRequest) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .context("Request limiter closed")?;
        let body = self.build_body(request, false);
        let response = self.send(&body).await?;
        let response_text = response
            .text()
            .await
            .context("Failed to read chat completions response body")?;
        tracing::debug!("[OpenAI] Response body: {}", response_text);

        let parsed: ChatCompletionResponse = serde_json::from_str(&response_text)
            .context("Failed to parse chat completions response")?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn ask_stream(&self, request: LlmRequest) -> Result<TextStream> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .context("Request limiter closed")?;
        let body = self.build_body(request, true);
        let response = self.send(&body).await?;

        tracing::info!("[OpenAI] Streaming response started");

        let byte_stream = response.bytes_stream();
        let stream_reader = StreamReader::new(
            byte_stream.map(|result| result.map_err(|e| std::io::Error::other(e.to_string()))),
        );
        let buf_reader = tokio::io::BufReader::new(stream_reader);

        let stream = async_stream::try_stream! {
            // Held until the stream is dropped or finished
            let _permit = permit;
            let mut lines = buf_reader.lines();
            while let Some(line) = lines.next_line().await? {
                match parse_sse_line(&line) {
                    Ok(Some(delta)) => yield delta,
                    Ok(None) => continue,
                    Err(()) => break,
                }
            }
            tracing::debug!("[OpenAI] Stream finished");
        };

        Ok(Box::pin(stream))
    }

    fn model(&self) -> String {
        self.model.clone()
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}
