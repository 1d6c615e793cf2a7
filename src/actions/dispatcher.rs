//! Plan/act glue used by the agent life loop

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::agent::Agent;
use crate::config::RuntimeConfig;
use crate::llm::LlmProvider;

use super::action::{ActionCommand, ActionContext};
use super::planner::{Plan, Planner};
use super::registry::{panic_message, ActionRegistry};

/// Everything an agent needs to plan and act
///
/// One dispatcher is shared by all agents of a runtime.
pub struct Dispatcher {
    registry: Arc<ActionRegistry>,
    planner: Arc<dyn Planner>,
    llm: Arc<dyn LlmProvider>,
    config: RuntimeConfig,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<ActionRegistry>,
        planner: Arc<dyn Planner>,
        llm: Arc<dyn LlmProvider>,
    ) -> Self {
        Self {
            registry,
            planner,
            llm,
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Capability object for one agent
    pub fn context(&self, agent: &Agent) -> ActionContext {
        ActionContext::new(
            agent.clone(),
            self.llm.clone(),
            self.registry.clone(),
            self.config.memory_window,
        )
    }

    /// Plan phase; failures degrade to an empty plan
    pub async fn plan(&self, ctx: &ActionContext) -> Plan {
        let agent = ctx.agent().name();
        match AssertUnwindSafe(self.planner.plan(ctx)).catch_unwind().await {
            Ok(Ok(plan)) => plan,
            Ok(Err(e)) => {
                tracing::warn!("[Agent:{}] Planning failed: {:#}", agent, e);
                Plan::default()
            }
            Err(panic) => {
                tracing::error!(
                    "[Agent:{}] Planner panicked: {}",
                    agent,
                    panic_message(panic.as_ref())
                );
                Plan::default()
            }
        }
    }

    /// Act phase for one command; returns the observation, if any
    pub async fn act(&self, command: &ActionCommand, ctx: &ActionContext) -> Option<String> {
        self.registry.dispatch(command, ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::AgentProfile;
    use crate::llm::ScriptedProvider;
    use crate::runtime::Reporter;

    struct Broken;

    #[async_trait::async_trait]
    impl Planner for Broken {
        async fn plan(&self, ctx: &ActionContext) -> anyhow::Result<Plan> {
            if ctx.agent().name() == "panicky" {
                panic!("planner bug");
            }
            anyhow::bail!("llm unavailable")
        }
    }

    #[tokio::test]
    async fn test_planner_failures_yield_empty_plan() {
        let dispatcher = Dispatcher::new(
            Arc::new(ActionRegistry::new()),
            Arc::new(Broken),
            Arc::new(ScriptedProvider::new(Vec::<String>::new())),
        )
        .with_config(RuntimeConfig::default().with_memory_window(7));
        assert_eq!(dispatcher.config().memory_window, 7);

        for name in ["calm", "panicky"] {
            let agent = Agent::new(AgentProfile::new(name), Reporter::disconnected());
            let ctx = dispatcher.context(&agent);
            assert_eq!(dispatcher.plan(&ctx).await, Plan::default());
        }
    }
}
