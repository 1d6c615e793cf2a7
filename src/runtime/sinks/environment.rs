//! Environment sink
//!
//! Agents talk to each other by reporting `communication` messages; this sink
//! picks those up and posts them back into the Router as environment input,
//! which wakes the receiving agent.

use crate::core::{HandleType, Message, StreamSource, USER};
use crate::runtime::router::RouterHandle;

use super::ReportSink;

pub struct EnvironmentSink {
    router: RouterHandle,
}

impl EnvironmentSink {
    pub fn new(router: RouterHandle) -> Self {
        Self { router }
    }

    fn is_for_agents(message: &Message) -> bool {
        message.handle_type == HandleType::Communication
            && !message.send_to.is_empty()
            && message.send_to != USER
            && message.send_to != message.send_from
    }
}

#[async_trait::async_trait]
impl ReportSink for EnvironmentSink {
    fn name(&self) -> &str {
        "environment"
    }

    async fn handle_message(&self, message: &Message) -> bool {
        if !Self::is_for_agents(message) {
            return false;
        }
        match self.router.post(message.clone()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("[Environment] Could not forward message {}: {}", message.id, e);
                false
            }
        }
    }

    async fn handle_stream_message(&self, _message: &Message, _stream: StreamSource) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentProfile};
    use crate::runtime::channels::create_agent_directory;
    use crate::runtime::{Reporter, Router};
    use std::time::Duration;

    #[tokio::test]
    async fn test_forwards_agent_chat_into_router() {
        let directory = create_agent_directory();
        let bob = Agent::new(AgentProfile::new("bob"), Reporter::disconnected());
        directory.write().await.insert("bob".into(), bob.clone());
        let router = Router::new(directory);
        router.start().await.unwrap();

        let sink = EnvironmentSink::new(router.handle());
        assert!(
            sink.handle_message(&Message::communication("alice", "Bob", "review please"))
                .await
        );

        tokio::time::timeout(Duration::from_secs(2), async {
            while bob.memory_len() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(bob.latest_memory(1)[0].send_from, "alice");
        assert!(bob.is_activated());
        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_ignores_user_and_non_chat_messages() {
        let router = Router::new(create_agent_directory());
        let sink = EnvironmentSink::new(router.handle());

        assert!(!sink.handle_message(&Message::communication("alice", "user", "done")).await);
        assert!(!sink.handle_message(&Message::thought("alice", "hmm")).await);
        assert!(!sink.handle_message(&Message::communication("alice", "alice", "self")).await);

        let (message, _tx) = Message::file_upload_stream("alice", "bob", "a.py");
        let stream = message.stream().cloned().unwrap();
        assert!(!sink.handle_stream_message(&message, stream).await);
    }
}
