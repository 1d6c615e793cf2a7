//! Report Bus sinks
//!
//! - `EnvironmentSink` - Feeds agent-to-agent chat back into the Router
//! - `MessageCache` - Long-poll cache for HTTP front ends
//!
//! The console sink lives in `cli::console`.

pub mod cache;
pub mod environment;

pub use cache::{CachedBatch, MessageCache};
pub use environment::EnvironmentSink;

use crate::core::{Message, StreamSource};

/// A consumer of outbound messages
///
/// Returning `true` means the message was handled and later sinks are not
/// consulted. A sink that claims a streaming message is expected to read the
/// stream to its end marker before returning.
#[async_trait::async_trait]
pub trait ReportSink: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    async fn handle_message(&self, message: &Message) -> bool;

    async fn handle_stream_message(&self, message: &Message, stream: StreamSource) -> bool;
}
