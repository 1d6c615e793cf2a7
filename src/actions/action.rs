//! Action trait and the context actions run in
//!
//! Actions are what an agent can do. Each declares its method set up front;
//! the registry only invokes methods that appear in that set.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::agent::Agent;
use crate::core::Message;
use crate::demux::{ArtifactStreamer, DemuxGrammar};
use crate::llm::{collect_stream, LlmProvider, LlmRequest};

use super::registry::ActionRegistry;

/// Keyword arguments of one command
pub type ActionArgs = Map<String, Value>;

/// One step of a plan: invoke `action_method` on `action_name`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCommand {
    pub action_name: String,
    pub action_method: String,
    #[serde(default)]
    pub args: ActionArgs,
}

impl ActionCommand {
    pub fn new(
        action_name: impl Into<String>,
        action_method: impl Into<String>,
        args: ActionArgs,
    ) -> Self {
        Self {
            action_name: action_name.into(),
            action_method: action_method.into(),
            args,
        }
    }
}

/// A declared method of an action, as shown to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionMethod {
    pub name: String,
    pub description: String,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub args: Map<String, Value>,
}

impl ActionMethod {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            args: Map::new(),
        }
    }

    /// Document one argument
    pub fn with_arg(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.args
            .insert(name.into(), Value::String(description.into()));
        self
    }
}

/// Trait for everything an agent can do
#[async_trait]
pub trait Action: Send + Sync {
    /// Registry key, as used in `ActionCommand::action_name`
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// The methods the planner may call
    fn methods(&self) -> Vec<ActionMethod>;

    /// Prepare per-agent data when an agent using this action is registered
    fn init_agent(&self, _agent: &Agent) {}

    /// Run one method
    ///
    /// `Ok(Some(text))` becomes an observation in the agent's memory;
    /// `Ok(None)` leaves no trace. Errors are turned into observations by
    /// the caller.
    async fn invoke(&self, method: &str, args: &ActionArgs, ctx: &ActionContext)
        -> Result<Option<String>>;

    fn has_method(&self, method: &str) -> bool {
        self.methods().iter().any(|m| m.name == method)
    }
}

/// Capabilities handed to actions and planners for one agent
#[derive(Clone)]
pub struct ActionContext {
    agent: Agent,
    llm: Arc<dyn LlmProvider>,
    registry: Arc<ActionRegistry>,
    memory_window: usize,
}

impl ActionContext {
    pub fn new(
        agent: Agent,
        llm: Arc<dyn LlmProvider>,
        registry: Arc<ActionRegistry>,
        memory_window: usize,
    ) -> Self {
        Self {
            agent,
            llm,
            registry,
            memory_window,
        }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    /// Publish a message on the Report Bus
    pub fn report(&self, message: Message) -> bool {
        self.agent.reporter().report(message)
    }

    /// Sleep at the end of the current cycle
    pub fn request_sleep(&self) {
        self.agent.request_sleep();
    }

    /// The agent's system prompt, listing its actions
    pub fn system_prompt(&self) -> String {
        let tools = self.registry.describe(self.agent.action_names());
        self.agent.system_prompt(&tools)
    }

    /// Request with system prompt, recent memory and `prompt` as last turn
    pub fn request(&self, prompt: impl Into<String>) -> LlmRequest {
        LlmRequest::new()
            .with_system(self.system_prompt())
            .with_history(
                &self.agent.latest_memory(self.memory_window),
                self.agent.name(),
            )
            .with_user(prompt)
    }

    /// One-shot completion in the agent's context
    pub async fn ask(&self, prompt: impl Into<String>) -> Result<String> {
        self.llm.ask(self.request(prompt)).await
    }

    /// Stream a completion, publishing each framed artifact as a live
    /// `file_upload` message addressed to the user
    ///
    /// Returns the full response text.
    pub async fn stream_artifacts(
        &self,
        prompt: impl Into<String>,
        grammar: DemuxGrammar,
        cause_by: &str,
    ) -> Result<String> {
        let stream = self.llm.ask_stream(self.request(prompt)).await?;
        let mut streamer = ArtifactStreamer::new(
            grammar,
            self.agent.reporter().clone(),
            self.agent.name(),
            crate::core::USER,
        )
        .with_cause_by(cause_by);

        let response = collect_stream(stream, |delta| streamer.feed(delta)).await;
        let artifacts = streamer.finish();
        tracing::debug!(
            "[Agent:{}] Streamed {} artifact(s)",
            self.agent.name(),
            artifacts.len()
        );
        response
    }
}

/// String argument; non-string values are rendered as JSON
pub fn str_arg(args: &ActionArgs, name: &str) -> Result<String> {
    match args.get(name) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => anyhow::bail!("missing argument '{}'", name),
        Some(other) => Ok(other.to_string()),
    }
}

/// Optional boolean argument
pub fn bool_arg(args: &ActionArgs, name: &str) -> bool {
    match args.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"),
        _ => false,
    }
}
