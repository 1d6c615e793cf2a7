//! Request types shared by all LLM providers

use std::pin::Pin;

use futures::stream::Stream;
use serde::{Deserialize, Serialize};

use crate::core::{HandleType, LlmRole, Message};

/// Stream of text increments produced by a streaming generation
pub type TextStream = Pin<Box<dyn Stream<Item = anyhow::Result<String>> + Send>>;

/// Role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<LlmRole> for ChatRole {
    fn from(role: LlmRole) -> Self {
        match role {
            LlmRole::User => ChatRole::User,
            LlmRole::Assistant => ChatRole::Assistant,
        }
    }
}

/// One entry of the chat history sent to a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    /// Render a memory entry as chat history
    ///
    /// Messages from other parties are prefixed with their sender so the model
    /// can tell who said what.
    pub fn from_memory(message: &Message, own_name: &str) -> Self {
        let content = message.resolved_content();
        let content = match message.handle_type {
            HandleType::Communication if message.send_from != own_name => {
                format!("{}: {}", message.send_from, content)
            }
            HandleType::BaseActionMessage if !message.cause_by.is_empty() => {
                format!("[{}] {}", message.cause_by, content)
            }
            _ => content,
        };
        Self {
            role: message.role.into(),
            content,
        }
    }
}

/// A generation request
///
/// ```ignore
/// let request = LlmRequest::new()
///     .with_system("You are a helpful assistant")
///     .with_history(&agent.memory(), agent.name())
///     .with_user("What next?");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LlmRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl LlmRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_message(mut self, message: ChatMessage) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_user(self, content: impl Into<String>) -> Self {
        self.with_message(ChatMessage::user(content))
    }

    /// Append an agent's memory as chat history
    pub fn with_history(mut self, memory: &[Message], own_name: &str) -> Self {
        self.messages.extend(
            memory
                .iter()
                .filter(|m| !matches!(m.handle_type, HandleType::Sleep | HandleType::Wakeup))
                .map(|m| ChatMessage::from_memory(m, own_name)),
        );
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Content of the last user message, if any
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_rendering() {
        let memory = vec![
            Message::user_input("alice", "build a calculator"),
            Message::thought("alice", "I should plan first"),
            Message::observation("alice", "Chat", "message sent"),
            Message::sleep("alice"),
        ];
        let request = LlmRequest::new()
            .with_system("sys")
            .with_history(&memory, "alice")
            .with_user("next?");

        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[0], ChatMessage::user("user: build a calculator"));
        assert_eq!(request.messages[1].role, ChatRole::Assistant);
        assert_eq!(request.messages[2].content, "[Chat] message sent");
        assert_eq!(request.last_user_content(), Some("next?"));
    }

    #[test]
    fn test_request_serialization_skips_unset() {
        let json = serde_json::to_value(LlmRequest::new().with_user("hi")).unwrap();
        assert!(json.get("system").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
