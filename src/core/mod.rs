//! Core types for the agent runtime
//!
//! This module provides the fundamental types used throughout the crate:
//! - `Message` / `WireMessage` - The unit both buses carry
//! - `StreamSender` / `StreamSource` - Sub-stream channels of streaming messages
//! - `LifeState` - Lifecycle state of an agent
//! - `bind_current_agent` / `current_agent` - Task-local agent binding
//! - `FrameworkError` - Error types

pub mod context;
pub mod error;
pub mod message;
pub mod state;
pub mod stream;

pub use context::{bind_current_agent, current_agent, is_bound};
pub use error::{BindingViolation, FrameworkError, FrameworkResult};
pub use message::{
    HandleType, LlmRole, Message, MessagePayload, WireMessage, BROADCAST, USER,
};
pub use state::LifeState;
pub use stream::{stream_channel, StreamItem, StreamSender, StreamSource, STREAM_END_FLAG};
