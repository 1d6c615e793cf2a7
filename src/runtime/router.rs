//! Router - inbound message bus
//!
//! Producers on any task enqueue messages; a single dispatch task delivers
//! them in FIFO order into the addressed agent's memory, waking it when the
//! message comes from the environment. Messages for unknown agents are logged
//! and dropped so one bad address never stalls the bus.

use crate::core::{FrameworkError, FrameworkResult, Message};

use super::bus::BusWorker;
use super::channels::{create_router_channel, AgentDirectory, Delivery, RouterSender};

/// Cloneable producer handle for the Router
#[derive(Clone, Debug)]
pub struct RouterHandle {
    tx: RouterSender,
}

impl RouterHandle {
    /// Enqueue environment input (wakes the receiver)
    pub fn post(&self, message: Message) -> FrameworkResult<()> {
        self.enqueue(message, true)
    }

    /// Enqueue a message that is recorded without waking the receiver
    pub fn post_quiet(&self, message: Message) -> FrameworkResult<()> {
        self.enqueue(message, false)
    }

    fn enqueue(&self, message: Message, from_env: bool) -> FrameworkResult<()> {
        self.tx
            .send(Delivery { message, from_env })
            .map_err(|_| FrameworkError::BusClosed("router"))
    }
}

/// The inbound bus
pub struct Router {
    tx: RouterSender,
    worker: BusWorker<Delivery>,
    agents: AgentDirectory,
}

impl Router {
    pub fn new(agents: AgentDirectory) -> Self {
        let (tx, rx) = create_router_channel();
        Self {
            tx,
            worker: BusWorker::new("Router", rx),
            agents,
        }
    }

    pub fn handle(&self) -> RouterHandle {
        RouterHandle {
            tx: self.tx.clone(),
        }
    }

    /// Enqueue environment input
    pub fn post(&self, message: Message) -> FrameworkResult<()> {
        self.handle().post(message)
    }

    /// Start the dispatch task (no-op while running)
    pub async fn start(&self) -> FrameworkResult<()> {
        let agents = self.agents.clone();
        self.worker
            .start(move |delivery| {
                let agents = agents.clone();
                async move {
                    route(&agents, delivery).await;
                }
            })
            .await
    }

    /// Stop the dispatch task after its current message
    pub async fn shutdown(&self) {
        self.worker.shutdown().await;
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_running()
    }
}

/// Deliver one message
///
/// Returns the number of agents that received it.
pub(crate) async fn route(agents: &AgentDirectory, delivery: Delivery) -> usize {
    let Delivery { message, from_env } = delivery;
    let directory = agents.read().await;

    if message.is_broadcast() {
        let mut delivered = 0;
        for (name, agent) in directory.iter() {
            if *name == message.send_from {
                continue;
            }
            agent.add_memory(message.clone(), from_env);
            delivered += 1;
        }
        tracing::debug!(
            "[Router] Broadcast from '{}' delivered to {} agents",
            message.send_from,
            delivered
        );
        return delivered;
    }

    match directory.get(&message.send_to) {
        Some(agent) => {
            tracing::debug!(
                "[Router] {} '{}' -> '{}'",
                message.handle_type,
                message.send_from,
                message.send_to
            );
            agent.add_memory(message, from_env);
            1
        }
        None => {
            tracing::warn!(
                "[Router] No agent named '{}'; dropping message {} from '{}'",
                message.send_to,
                message.id,
                message.send_from
            );
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Agent, AgentProfile};
    use crate::runtime::channels::create_agent_directory;
    use crate::runtime::Reporter;
    use std::time::Duration;

    async fn directory_with(names: &[&str]) -> (AgentDirectory, Vec<Agent>) {
        let directory = create_agent_directory();
        let mut agents = Vec::new();
        for name in names {
            let agent = Agent::new(AgentProfile::new(*name), Reporter::disconnected());
            directory
                .write()
                .await
                .insert(agent.name().to_string(), agent.clone());
            agents.push(agent);
        }
        (directory, agents)
    }

    async fn wait_for_memory(agent: &Agent, len: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while agent.memory_len() < len {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("message was not delivered in time");
    }

    #[tokio::test]
    async fn test_case_insensitive_delivery() {
        let (directory, agents) = directory_with(&["Alice"]).await;
        let delivered = route(
            &directory,
            Delivery {
                message: Message::user_input("ALICE", "hello"),
                from_env: true,
            },
        )
        .await;
        assert_eq!(delivered, 1);
        assert_eq!(agents[0].latest_memory(1)[0].content, "hello");
        assert!(agents[0].is_activated());
    }

    #[tokio::test]
    async fn test_quiet_delivery_does_not_wake() {
        let (directory, agents) = directory_with(&["alice"]).await;
        route(
            &directory,
            Delivery {
                message: Message::communication("bob", "alice", "fyi"),
                from_env: false,
            },
        )
        .await;
        assert_eq!(agents[0].memory_len(), 1);
        assert!(!agents[0].is_activated());
        assert_eq!(agents[0].observe(false), 0);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let (directory, agents) = directory_with(&["alice", "bob", "carol"]).await;
        let delivered = route(
            &directory,
            Delivery {
                message: Message::communication("Bob", "all", "standup"),
                from_env: true,
            },
        )
        .await;

        assert_eq!(delivered, 2);
        assert_eq!(agents[0].memory_len(), 1);
        assert_eq!(agents[1].memory_len(), 0);
        assert_eq!(agents[2].memory_len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_destination_is_dropped_and_bus_continues() {
        let (directory, agents) = directory_with(&["alice"]).await;
        let router = Router::new(directory);
        router.start().await.unwrap();

        router.post(Message::user_input("Bob", "anyone?")).unwrap();
        router.post(Message::user_input("alice", "still here")).unwrap();

        wait_for_memory(&agents[0], 1).await;
        assert_eq!(agents[0].latest_memory(1)[0].content, "still here");
        router.shutdown().await;
    }

    #[tokio::test]
    async fn test_fifo_per_bus() {
        let (directory, agents) = directory_with(&["alice"]).await;
        let router = Router::new(directory);
        let handle = router.handle();
        for i in 0..20 {
            handle
                .post_quiet(Message::communication("bob", "alice", i.to_string()))
                .unwrap();
        }
        router.start().await.unwrap();
        router.start().await.unwrap();

        wait_for_memory(&agents[0], 20).await;
        let contents: Vec<String> = agents[0]
            .memory()
            .into_iter()
            .map(|m| m.content)
            .collect();
        let expected: Vec<String> = (0..20).map(|i| i.to_string()).collect();
        assert_eq!(contents, expected);
        router.shutdown().await;
    }
}
