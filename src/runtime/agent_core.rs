//! AgentCore - owns the agents, both buses and the shared dispatcher
//!
//! Constructed once by the embedding application and passed around by `Arc`.
//!
//! ```ignore
//! let core = AgentCore::new(dispatcher);
//! core.add_sink(Arc::new(ConsoleSink::new())).await;
//! core.add_environment_sink().await;
//! core.start().await?;
//! core.add_agent(AgentProfile::new("Alice").with_action("Chat")).await?;
//! core.post_message("alice", "hello")?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::actions::Dispatcher;
use crate::agent::{Agent, AgentProfile};
use crate::core::{FrameworkError, FrameworkResult, Message, BROADCAST, USER};

use super::channels::{create_agent_directory, AgentDirectory};
use super::report_bus::{ReportBus, Reporter};
use super::router::{Router, RouterHandle};
use super::sinks::{EnvironmentSink, ReportSink};

pub struct AgentCore {
    agents: AgentDirectory,
    router: Router,
    report_bus: ReportBus,
    dispatcher: Arc<Dispatcher>,
    running: AtomicBool,
}

impl AgentCore {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        let agents = create_agent_directory();
        Self {
            router: Router::new(agents.clone()),
            agents,
            report_bus: ReportBus::new(),
            dispatcher,
            running: AtomicBool::new(false),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Producer handle for the Report Bus
    pub fn reporter(&self) -> Reporter {
        self.report_bus.reporter()
    }

    /// Producer handle for the Router
    pub fn router(&self) -> RouterHandle {
        self.router.handle()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Append a Report Bus sink
    pub async fn add_sink(&self, sink: Arc<dyn ReportSink>) {
        self.report_bus.add_sink(sink).await;
    }

    /// Append the sink that routes agent-to-agent chat back into the Router
    pub async fn add_environment_sink(&self) {
        self.add_sink(Arc::new(EnvironmentSink::new(self.router.handle())))
            .await;
    }

    pub async fn sink_names(&self) -> Vec<String> {
        self.report_bus.sink_names().await
    }

    /// Create an agent and run each of its actions' per-agent setup
    ///
    /// The agent is registered but not started.
    pub async fn register_agent(&self, profile: AgentProfile) -> FrameworkResult<Agent> {
        let registry = self.dispatcher.registry();
        for action_name in &profile.action_list {
            if registry.get(action_name).is_none() {
                return Err(FrameworkError::ActionNotFound(action_name.clone()));
            }
        }

        let key = profile.key();
        if key.is_empty() || key == BROADCAST || key == USER {
            return Err(FrameworkError::InvalidConfig(format!(
                "'{}' cannot be used as an agent name",
                profile.name
            )));
        }

        let mut agents = self.agents.write().await;
        if agents.contains_key(&key) {
            return Err(FrameworkError::DuplicateAgent(key));
        }

        let agent = Agent::new(profile, self.report_bus.reporter());
        for action_name in agent.action_names() {
            if let Some(action) = registry.get(action_name) {
                action.init_agent(&agent);
            }
        }
        agents.insert(key, agent.clone());
        tracing::info!(
            "[AgentCore] Registered agent '{}' with actions {:?}",
            agent.name(),
            agent.action_names()
        );
        Ok(agent)
    }

    /// Start a registered agent's life task
    pub async fn start_agent(&self, name: &str) -> FrameworkResult<()> {
        let agent = self
            .agent(name)
            .await
            .ok_or_else(|| FrameworkError::AgentNotFound(name.to_string()))?;
        agent.life(self.dispatcher.clone())
    }

    /// Register an agent and start it
    pub async fn add_agent(&self, profile: AgentProfile) -> FrameworkResult<Agent> {
        let agent = self.register_agent(profile).await?;
        agent.life(self.dispatcher.clone())?;
        Ok(agent)
    }

    /// Close an agent and forget it
    pub async fn remove_agent(&self, name: &str) -> FrameworkResult<()> {
        let agent = self
            .agents
            .write()
            .await
            .remove(&name.to_lowercase())
            .ok_or_else(|| FrameworkError::AgentNotFound(name.to_string()))?;
        agent.close();
        agent.join().await;
        tracing::info!("[AgentCore] Removed agent '{}'", agent.name());
        Ok(())
    }

    pub async fn agent(&self, name: &str) -> Option<Agent> {
        self.agents.read().await.get(&name.to_lowercase()).cloned()
    }

    pub async fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// User input for an agent (or `all`), delivered through the Router
    pub fn post_message(
        &self,
        target_agent_name: &str,
        content: impl Into<String>,
    ) -> FrameworkResult<()> {
        if !self.is_running() {
            return Err(FrameworkError::NotRunning);
        }
        self.router
            .post(Message::user_input(target_agent_name, content))
    }

    /// Start both buses (no-op while running)
    pub async fn start(&self) -> FrameworkResult<()> {
        self.report_bus.start().await?;
        self.router.start().await?;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("[AgentCore] Started");
        Ok(())
    }

    /// Close every agent, wait for their life tasks, then stop the buses
    ///
    /// Agents stay registered; a closed agent cannot be started again.
    pub async fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        let agents: Vec<Agent> = self.agents.read().await.values().cloned().collect();
        for agent in &agents {
            agent.close();
        }
        for agent in &agents {
            agent.join().await;
        }
        self.router.shutdown().await;
        self.report_bus.shutdown().await;
        tracing::info!("[AgentCore] Shut down ({} agents closed)", agents.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionRegistry, Chat, MethodPlanner, METHOD_PLAN_ACTION};
    use crate::core::{HandleType, LifeState, StreamSource};
    use crate::llm::ScriptedProvider;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Claims every message addressed to the user
    struct UserInbox {
        received: Mutex<Vec<Message>>,
    }

    #[async_trait::async_trait]
    impl ReportSink for UserInbox {
        fn name(&self) -> &str {
            "user_inbox"
        }

        async fn handle_message(&self, message: &Message) -> bool {
            if message.send_to != crate::core::USER {
                return false;
            }
            self.received.lock().unwrap().push(message.clone());
            true
        }

        async fn handle_stream_message(&self, _message: &Message, _stream: StreamSource) -> bool {
            false
        }
    }

    fn plan(thought: &str, commands: &str) -> String {
        format!("{}\n```json\n{}\n```", thought, commands)
    }

    fn core_with(llm: ScriptedProvider) -> AgentCore {
        let planner = MethodPlanner::new().shared();
        let mut registry = ActionRegistry::new();
        registry.register(Chat);
        registry.register_arc(planner.clone());
        let dispatcher = Dispatcher::new(Arc::new(registry), planner, Arc::new(llm));
        AgentCore::new(Arc::new(dispatcher))
    }

    fn profile(name: &str) -> AgentProfile {
        AgentProfile::new(name).with_actions(["Chat", METHOD_PLAN_ACTION])
    }

    async fn wait_until<F: Fn() -> bool>(cond: F) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_registration_rules() {
        let core = core_with(ScriptedProvider::new(Vec::<String>::new()));
        let alice = core.register_agent(profile("Alice")).await.unwrap();
        assert!(alice.action_data::<crate::actions::TaskList>(METHOD_PLAN_ACTION).is_some());

        let err = core.register_agent(profile("ALICE")).await.unwrap_err();
        assert!(matches!(err, FrameworkError::DuplicateAgent(ref n) if n == "alice"));

        let err = core
            .register_agent(AgentProfile::new("bob").with_action("Teleport"))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameworkError::ActionNotFound(ref a) if a == "Teleport"));

        let err = core.start_agent("carol").await.unwrap_err();
        assert!(matches!(err, FrameworkError::AgentNotFound(_)));
        assert_eq!(core.agent_names().await, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn test_reserved_names_are_rejected() {
        let core = core_with(ScriptedProvider::new(Vec::<String>::new()));
        for name in ["All", "all", "USER", ""] {
            let err = core.register_agent(profile(name)).await.unwrap_err();
            assert!(
                matches!(err, FrameworkError::InvalidConfig(_)),
                "'{}' was accepted",
                name
            );
        }
        assert!(core.agent_names().await.is_empty());

        core.register_agent(profile("Allison")).await.unwrap();
        assert_eq!(core.agent_names().await, vec!["allison".to_string()]);
    }

    #[tokio::test]
    async fn test_post_requires_running_core() {
        let core = core_with(ScriptedProvider::new(Vec::<String>::new()));
        assert!(matches!(
            core.post_message("alice", "hi"),
            Err(FrameworkError::NotRunning)
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_agents_talk_through_the_environment() {
        let llm = ScriptedProvider::new([
            // alice, woken by the user
            plan(
                "I'll ask Bob.",
                r#"[{"action_name": "Chat", "action_method": "chat", "args": {"send_to": "Bob", "message": "What is 2+2?"}},
                    {"action_name": "MethodPlanAction", "action_method": "wait_for_task"}]"#,
            ),
            // bob, woken by alice
            plan(
                "Easy.",
                r#"[{"action_name": "Chat", "action_method": "chat", "args": {"send_to": "alice", "message": "4"}},
                    {"action_name": "MethodPlanAction", "action_method": "end"}]"#,
            ),
            // alice, woken by bob
            plan(
                "Tell the user.",
                r#"[{"action_name": "Chat", "action_method": "chat", "args": {"send_to": "user", "message": "The answer is 4"}},
                    {"action_name": "MethodPlanAction", "action_method": "end"}]"#,
            ),
        ]);
        let core = core_with(llm);
        let inbox = Arc::new(UserInbox {
            received: Mutex::new(Vec::new()),
        });
        core.add_sink(inbox.clone()).await;
        core.add_environment_sink().await;
        core.start().await.unwrap();

        let alice = core.add_agent(profile("Alice")).await.unwrap();
        let bob = core.add_agent(profile("Bob")).await.unwrap();
        core.post_message("alice", "Ask Bob what 2+2 is").unwrap();

        wait_until(|| !inbox.received.lock().unwrap().is_empty()).await;
        let answer = inbox.received.lock().unwrap()[0].clone();
        assert_eq!(answer.send_from, "alice");
        assert_eq!(answer.content, "The answer is 4");

        wait_until(|| !alice.is_activated() && !bob.is_activated()).await;
        assert!(bob
            .memory()
            .iter()
            .any(|m| m.handle_type == HandleType::Communication && m.content == "What is 2+2?"));

        core.shutdown().await;
        assert_eq!(alice.state(), LifeState::Dead);
        assert_eq!(bob.state(), LifeState::Dead);
        assert!(!core.is_running());
    }
}
