//! LLM Provider trait
//!
//! Abstracts the model interface so that different backends (an
//! OpenAI-compatible HTTP API, a scripted test double) can be used
//! interchangeably by planners and actions.

use anyhow::Result;
use futures::StreamExt;

use super::types::{LlmRequest, TextStream};

/// Trait for LLM providers
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a request and wait for the full response text
    async fn ask(&self, request: LlmRequest) -> Result<String>;

    /// Send a request and receive the response as text increments
    async fn ask_stream(&self, request: LlmRequest) -> Result<TextStream>;

    /// Get the current model name.
    fn model(&self) -> String;

    /// Get the provider name (e.g., "openai", "scripted").
    fn provider_name(&self) -> &str;
}

/// Drive a streaming request to completion, calling `on_delta` per increment
///
/// Returns the concatenated response.
pub async fn collect_stream<F>(mut stream: TextStream, mut on_delta: F) -> Result<String>
where
    F: FnMut(&str),
{
    let mut response = String::new();
    while let Some(delta) = stream.next().await {
        let delta = delta?;
        on_delta(&delta);
        response.push_str(&delta);
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_stream() {
        let stream: TextStream = Box::pin(futures::stream::iter(vec![
            Ok("Hel".to_string()),
            Ok("lo".to_string()),
        ]));
        let mut seen = 0;
        let text = collect_stream(stream, |_| seen += 1).await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(seen, 2);
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_errors() {
        let stream: TextStream = Box::pin(futures::stream::iter(vec![
            Ok("partial".to_string()),
            Err(anyhow::anyhow!("connection reset")),
        ]));
        let err = collect_stream(stream, |_| {}).await.unwrap_err();
        assert!(err.to_string().contains("connection reset"));
    }
}
