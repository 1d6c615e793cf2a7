//! LLM providers
//!
//! - `LlmProvider` - Trait implemented by every backend
//! - `OpenAiCompatibleProvider` - HTTP client for `/chat/completions` endpoints
//! - `ScriptedProvider` - Deterministic canned responses for tests and demos

pub mod openai;
pub mod provider;
pub mod scripted;
pub mod types;

pub use openai::OpenAiCompatibleProvider;
pub use provider::{collect_stream, LlmProvider};
pub use scripted::ScriptedProvider;
pub use types::{ChatMessage, ChatRole, LlmRequest, TextStream};
