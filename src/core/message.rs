//! Message model shared by both buses, agent memory and the sinks

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::error::FrameworkResult;
use super::stream::{stream_channel, StreamSender, StreamSource};

/// Broadcast destination: every registered agent except the sender
pub const BROADCAST: &str = "all";

/// Name used for the human on the other side of the environment
pub const USER: &str = "user";

/// What a message is for; decides how sinks and agents treat it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleType {
    Communication,
    Control,
    Thought,
    Command,
    BaseActionMessage,
    FileUpload,
    Sleep,
    Wakeup,
    CreateTask,
    FinishTask,
}

impl HandleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleType::Communication => "communication",
            HandleType::Control => "control",
            HandleType::Thought => "thought",
            HandleType::Command => "command",
            HandleType::BaseActionMessage => "base_action_message",
            HandleType::FileUpload => "file_upload",
            HandleType::Sleep => "sleep",
            HandleType::Wakeup => "wakeup",
            HandleType::CreateTask => "create_task",
            HandleType::FinishTask => "finish_task",
        }
    }
}

impl std::fmt::Display for HandleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chat role used when memory is rendered into LLM history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmRole {
    #[default]
    User,
    Assistant,
}

/// Typed body of a message beyond its text content
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MessagePayload {
    #[default]
    Text,
    FileUpload {
        file_name: String,
        file_content: Vec<u8>,
    },
}

/// A unit of communication between agents, the environment and sinks
///
/// `send_from` / `send_to` are stored lowercase so routing is
/// case-insensitive. For streaming messages `content` is only authoritative
/// once the stream's end marker has been read; use
/// [`resolved_content`](Self::resolved_content) to get the collected text.
#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub send_from: String,
    pub send_to: String,
    pub cause_by: String,
    pub role: LlmRole,
    pub handle_type: HandleType,
    pub content: String,
    pub time_stamp: DateTime<Utc>,
    pub appendix: Map<String, Value>,
    pub payload: MessagePayload,
    stream: Option<StreamSource>,
}

impl Message {
    /// Create a text message
    pub fn new(
        handle_type: HandleType,
        send_from: impl Into<String>,
        send_to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            send_from: normalize_name(send_from.into()),
            send_to: normalize_name(send_to.into()),
            cause_by: String::new(),
            role: LlmRole::Assistant,
            handle_type,
            content: content.into(),
            time_stamp: Utc::now(),
            appendix: Map::new(),
            payload: MessagePayload::Text,
            stream: None,
        }
    }

    /// Create a streaming message and the sender that feeds it
    pub fn streaming(
        handle_type: HandleType,
        send_from: impl Into<String>,
        send_to: impl Into<String>,
    ) -> (Self, StreamSender) {
        let (tx, rx) = stream_channel();
        let mut message = Self::new(handle_type, send_from, send_to, "");
        message.stream = Some(rx);
        (message, tx)
    }

    /// Agent-to-agent (or agent-to-user) chat
    pub fn communication(
        send_from: impl Into<String>,
        send_to: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(HandleType::Communication, send_from, send_to, content)
    }

    /// Input typed by the user, addressed to one agent (or `all`)
    pub fn user_input(send_to: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(HandleType::Communication, USER, send_to, content).with_role(LlmRole::User)
    }

    /// Reasoning text produced by a planner
    pub fn thought(send_from: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(HandleType::Thought, send_from, "", content)
    }

    /// Result of an action, fed back into the agent's memory
    pub fn observation(
        send_from: impl Into<String>,
        cause_by: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(HandleType::BaseActionMessage, send_from, "", content)
            .with_cause_by(cause_by)
            .with_role(LlmRole::User)
    }

    pub fn sleep(send_from: impl Into<String>) -> Self {
        let from = send_from.into();
        let content = format!("{} is going to sleep", from);
        Self::new(HandleType::Sleep, from, "", content)
    }

    pub fn wakeup(send_from: impl Into<String>) -> Self {
        let from = send_from.into();
        let content = format!("{} woke up", from);
        Self::new(HandleType::Wakeup, from, "", content)
    }

    /// A complete file attached to a message
    pub fn file_upload(
        send_from: impl Into<String>,
        send_to: impl Into<String>,
        file_name: impl Into<String>,
        file_content: Vec<u8>,
    ) -> Self {
        let file_name = file_name.into();
        let mut message = Self::new(HandleType::FileUpload, send_from, send_to, "");
        message.content = String::from_utf8_lossy(&file_content).into_owned();
        message.payload = MessagePayload::FileUpload {
            file_name,
            file_content,
        };
        message
    }

    /// A file whose content arrives incrementally through the returned sender
    pub fn file_upload_stream(
        send_from: impl Into<String>,
        send_to: impl Into<String>,
        file_name: impl Into<String>,
    ) -> (Self, StreamSender) {
        let (mut message, tx) = Self::streaming(HandleType::FileUpload, send_from, send_to);
        message.payload = MessagePayload::FileUpload {
            file_name: file_name.into(),
            file_content: Vec::new(),
        };
        (message, tx)
    }

    pub fn with_cause_by(mut self, cause_by: impl Into<String>) -> Self {
        self.cause_by = cause_by.into();
        self
    }

    pub fn with_role(mut self, role: LlmRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_appendix(mut self, key: impl Into<String>, value: Value) -> Self {
        self.appendix.insert(key.into(), value);
        self
    }

    pub fn is_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Stream source of a streaming message
    pub fn stream(&self) -> Option<&StreamSource> {
        self.stream.as_ref()
    }

    pub fn is_broadcast(&self) -> bool {
        self.send_to == BROADCAST
    }

    /// File name for file-upload payloads
    pub fn file_name(&self) -> Option<&str> {
        match &self.payload {
            MessagePayload::FileUpload { file_name, .. } => Some(file_name),
            MessagePayload::Text => None,
        }
    }

    /// Content, taking whatever a stream has produced so far into account
    pub fn resolved_content(&self) -> String {
        match &self.stream {
            Some(stream) if self.content.is_empty() => stream.collected(),
            _ => self.content.clone(),
        }
    }

    /// Copy collected stream content into `content` once the stream ended
    pub fn settle_stream(&mut self) {
        if let Some(stream) = &self.stream {
            if stream.is_ended() {
                self.content = stream.collected();
                if let MessagePayload::FileUpload { file_content, .. } = &mut self.payload {
                    *file_content = self.content.as_bytes().to_vec();
                }
            }
        }
    }

    /// Serialise into the wire shape
    pub fn to_wire(&self) -> WireMessage {
        let (file_name, file_content) = match &self.payload {
            MessagePayload::FileUpload {
                file_name,
                file_content,
            } => {
                let bytes = if file_content.is_empty() && self.is_stream() {
                    self.resolved_content().into_bytes()
                } else {
                    file_content.clone()
                };
                (
                    Some(file_name.clone()),
                    Some(base64::engine::general_purpose::STANDARD.encode(bytes)),
                )
            }
            MessagePayload::Text => (None, None),
        };

        WireMessage {
            id: self.id.clone(),
            send_from: self.send_from.clone(),
            send_to: self.send_to.clone(),
            content: self.resolved_content(),
            handle_type: self.handle_type,
            is_stream: self.is_stream(),
            appendix: self.appendix.clone(),
            cause_by: self.cause_by.clone(),
            time_stamp: self.time_stamp,
            role: self.role,
            file_name,
            file_content,
        }
    }

    /// Rebuild a message from its wire shape
    ///
    /// The result never carries a live stream; a streaming message arrives
    /// with whatever content it had when it was serialised.
    pub fn from_wire(wire: WireMessage) -> FrameworkResult<Self> {
        let payload = match wire.file_name {
            Some(file_name) => {
                let file_content = match wire.file_content {
                    Some(encoded) => base64::engine::general_purpose::STANDARD.decode(encoded)?,
                    None => Vec::new(),
                };
                MessagePayload::FileUpload {
                    file_name,
                    file_content,
                }
            }
            None => MessagePayload::Text,
        };

        Ok(Self {
            id: wire.id,
            send_from: normalize_name(wire.send_from),
            send_to: normalize_name(wire.send_to),
            cause_by: wire.cause_by,
            role: wire.role,
            handle_type: wire.handle_type,
            content: wire.content,
            time_stamp: wire.time_stamp,
            appendix: wire.appendix,
            payload,
            stream: None,
        })
    }
}

/// Serialisable form of [`Message`] used at the HTTP boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub id: String,
    pub send_from: String,
    pub send_to: String,
    pub content: String,
    pub handle_type: HandleType,
    #[serde(default)]
    pub is_stream: bool,
    #[serde(default)]
    pub appendix: Map<String, Value>,
    #[serde(default)]
    pub cause_by: String,
    #[serde(default = "Utc::now")]
    pub time_stamp: DateTime<Utc>,
    #[serde(default)]
    pub role: LlmRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    /// Base64 encoded file bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_content: Option<String>,
}

fn normalize_name(name: String) -> String {
    if name.chars().any(|c| c.is_uppercase()) {
        tracing::debug!("[Message] Lowercasing agent name '{}'", name);
        name.to_lowercase()
    } else {
        name
    }
}
