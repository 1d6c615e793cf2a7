//! Scripted provider
//!
//! Replays canned responses in order. Used by tests and offline demos so the
//! runtime can be exercised without network access.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use super::provider::LlmProvider;
use super::types::{LlmRequest, TextStream};

/// Default number of characters per streamed increment
const DEFAULT_CHUNK_SIZE: usize = 4;

/// Provider that answers from a fixed script
///
/// ```ignore
/// let llm = ScriptedProvider::new(["first answer", "second answer"])
///     .with_fallback("```json\n[]\n```")
///     .with_chunk_size(1);
/// ```
#[derive(Clone)]
pub struct ScriptedProvider {
    responses: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
    fallback: Option<String>,
    chunk_size: usize,
}

impl ScriptedProvider {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fallback: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    /// Answer with `fallback` once the script is exhausted instead of failing
    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }

    /// Characters per increment for `ask_stream`
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Queue another response
    pub fn push(&self, response: impl Into<String>) {
        self.responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(response.into());
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_response(&self, request: LlmRequest) -> Result<String> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        let next = self
            .responses
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next.or_else(|| self.fallback.clone()) {
            Some(response) => Ok(response),
            None => anyhow::bail!("Scripted provider has no responses left"),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for ScriptedProvider {
    async fn ask(&self, request: LlmRequest) -> Result<String> {
        self.next_response(request)
    }

    async fn ask_stream(&self, request: LlmRequest) -> Result<TextStream> {
        let response = self.next_response(request)?;
        let chars: Vec<char> = response.chars().collect();
        let chunks: Vec<Result<String>> = chars
            .chunks(self.chunk_size)
            .map(|c| Ok(c.iter().collect()))
            .collect();
        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    fn model(&self) -> String {
        "scripted".to_string()
    }

    fn provider_name(&self) -> &str {
        "scripted"
    }
}
