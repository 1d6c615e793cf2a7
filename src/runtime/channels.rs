//! Channel type definitions for the message buses
//!
//! Both buses are single-consumer FIFO queues:
//! - **Router queue** (mpsc): inbound messages for agents
//! - **Report queue** (mpsc): outbound messages for sinks
//!
//! Queues are unbounded so producers never block; one dispatch task drains
//! each queue in order.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::agent::Agent;
use crate::core::Message;

// ============================================================================
// Channel Type Aliases
// ============================================================================

/// Producer half of the report queue
pub type BusSender = mpsc::UnboundedSender<Message>;

/// Consumer half of the report queue (owned by the dispatch task)
pub type BusReceiver = mpsc::UnboundedReceiver<Message>;

/// Producer half of the router queue
pub type RouterSender = mpsc::UnboundedSender<Delivery>;

/// Consumer half of the router queue (owned by the dispatch task)
pub type RouterReceiver = mpsc::UnboundedReceiver<Delivery>;

/// Registered agents keyed by lowercase name
pub type AgentDirectory = Arc<RwLock<HashMap<String, Agent>>>;

/// A message queued on the Router
#[derive(Debug, Clone)]
pub struct Delivery {
    pub message: Message,
    /// Environment input wakes the receiving agent
    pub from_env: bool,
}

// ============================================================================
// Channel Creation
// ============================================================================

/// Create a new bus queue
pub fn create_bus_channel() -> (BusSender, BusReceiver) {
    mpsc::unbounded_channel()
}

/// Create a new router queue
pub fn create_router_channel() -> (RouterSender, RouterReceiver) {
    mpsc::unbounded_channel()
}

/// Create an empty agent directory
pub fn create_agent_directory() -> AgentDirectory {
    Arc::new(RwLock::new(HashMap::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bus_channel_is_fifo() {
        let (tx, mut rx) = create_bus_channel();

        tx.send(Message::communication("a", "b", "one")).unwrap();
        tx.send(Message::communication("a", "b", "two")).unwrap();
        tx.send(Message::communication("a", "b", "three")).unwrap();

        assert_eq!(rx.recv().await.unwrap().content, "one");
        assert_eq!(rx.recv().await.unwrap().content, "two");
        assert_eq!(rx.recv().await.unwrap().content, "three");
    }

    #[tokio::test]
    async fn test_bus_channel_close() {
        let (tx, mut rx) = create_bus_channel();

        // Drop sender
        drop(tx);

        // Receiver should get None
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_producers_on_many_tasks() {
        let (tx, mut rx) = create_bus_channel();
        let mut handles = Vec::new();
        for i in 0..4 {
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                tx.send(Message::communication("a", "b", i.to_string()))
                    .unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        drop(tx);

        let mut received = 0;
        while rx.recv().await.is_some() {
            received += 1;
        }
        assert_eq!(received, 4);
    }

    #[tokio::test]
    async fn test_directory_starts_empty() {
        let directory = create_agent_directory();
        assert!(directory.read().await.is_empty());
    }
}
