//! Agent Profile
//!
//! Static description of an agent: identity, prompt material and the actions
//! it may use.

use serde::{Deserialize, Serialize};

/// Default number of messages kept in an agent's memory log
pub const DEFAULT_MEMORY_CAPACITY: usize = 200;

/// Profile of an agent
///
/// Use the builder pattern to configure the agent:
///
/// ```ignore
/// let profile = AgentProfile::new("Alice")
///     .with_description("A python engineer")
///     .with_instructions("Write clean code")
///     .with_action("Chat")
///     .with_action("MethodPlanAction")
///     .with_memory_capacity(100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique name; matched case-insensitively
    pub name: String,

    /// One-line description shown to other agents
    #[serde(default)]
    pub description: String,

    /// Free-form instructions appended to the system prompt
    #[serde(default)]
    pub instructions: String,

    /// Worked example of a good response
    #[serde(default)]
    pub example: String,

    /// Description of the environment the agent lives in
    #[serde(default)]
    pub current_environment: String,

    /// Names of registered actions this agent may call
    #[serde(default)]
    pub action_list: Vec<String>,

    /// Maximum number of messages kept in memory
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: usize,
}

fn default_memory_capacity() -> usize {
    DEFAULT_MEMORY_CAPACITY
}

impl AgentProfile {
    /// Create a new profile with a name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            instructions: String::new(),
            example: String::new(),
            current_environment: String::new(),
            action_list: Vec::new(),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    pub fn with_example(mut self, example: impl Into<String>) -> Self {
        self.example = example.into();
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.current_environment = environment.into();
        self
    }

    /// Allow the agent to use a registered action (duplicates are ignored)
    pub fn with_action(mut self, action_name: impl Into<String>) -> Self {
        let action_name = action_name.into();
        if !self.action_list.contains(&action_name) {
            self.action_list.push(action_name);
        }
        self
    }

    pub fn with_actions<I, S>(mut self, action_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in action_names {
            self = self.with_action(name);
        }
        self
    }

    /// Set the memory capacity (at least one message is always kept)
    pub fn with_memory_capacity(mut self, capacity: usize) -> Self {
        self.memory_capacity = capacity.max(1);
        self
    }

    /// Lowercased name used as the routing key
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Render the profile as a system prompt
    ///
    /// `tools_description` is the registry's JSON description of the actions
    /// in `action_list`.
    pub fn system_prompt(&self, tools_description: &str) -> String {
        let mut prompt = format!("You are {}", self.name);
        if !self.description.is_empty() {
            prompt.push_str(&format!(", {}", self.description));
        }
        prompt.push_str(".\n");

        if !self.current_environment.is_empty() {
            prompt.push_str(&format!(
                "\n## Environment\n{}\n",
                self.current_environment
            ));
        }
        if !self.instructions.is_empty() {
            prompt.push_str(&format!("\n## Instructions\n{}\n", self.instructions));
        }
        if !tools_description.is_empty() {
            prompt.push_str(&format!(
                "\n## Available actions\n{}\n",
                tools_description
            ));
        }
        if !self.example.is_empty() {
            prompt.push_str(&format!("\n## Example\n{}\n", self.example));
        }
        prompt
    }
}

impl Default for AgentProfile {
    fn default() -> Self {
        Self::new("assistant")
    }
}
