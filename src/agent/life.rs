//! The agent life loop
//!
//! `Init → Inactive → Active → {Inactive | Dead}`. While inactive the task
//! waits on the agent's wake signal with no timeout; while active it runs
//! plan/act cycles until the plan asks for sleep (or yields nothing) and no
//! environment input arrived during the cycle.

use std::sync::Arc;

use crate::actions::Dispatcher;
use crate::core::{bind_current_agent, LifeState, Message};

use super::agent::Agent;

/// Entry point of the life task
pub(super) async fn run(agent: Agent, dispatcher: Arc<Dispatcher>) {
    let bound = bind_current_agent(agent.clone(), live(&agent, &dispatcher)).await;
    if let Err(e) = bound {
        tracing::error!("[Agent:{}] {}", agent.name(), e);
    }
    agent.finish_life();
    tracing::info!("[Agent:{}] Life task exited", agent.name());
}

async fn live(agent: &Agent, dispatcher: &Dispatcher) {
    while wait_for_wake(agent).await {
        agent.reporter().report(Message::wakeup(agent.name()));
        loop {
            if !agent.is_alive() {
                return;
            }
            if run_cycle(agent, dispatcher).await {
                agent.reporter().report(Message::sleep(agent.name()));
                tracing::debug!("[Agent:{}] Sleeping", agent.name());
                break;
            }
        }
    }
}

/// Block until woken; false once the agent is closed
async fn wait_for_wake(agent: &Agent) -> bool {
    loop {
        // Register interest before checking the flags so a wake between the
        // check and the await is not lost
        let notified = agent.wake_signal().notified();
        {
            let mut shared = agent.shared();
            if !shared.alive {
                return false;
            }
            if shared.activate {
                shared.transition(agent.name(), LifeState::Active);
                shared.activations += 1;
                return true;
            }
            shared.transition(agent.name(), LifeState::Inactive);
        }
        notified.await;
    }
}

/// One plan/act cycle; returns true when the agent went to sleep
async fn run_cycle(agent: &Agent, dispatcher: &Dispatcher) -> bool {
    agent.begin_cycle();
    let ctx = dispatcher.context(agent);

    let plan = dispatcher.plan(&ctx).await;
    let thought = plan.thought.trim();
    if !thought.is_empty() {
        let message = Message::thought(agent.name(), thought);
        agent.add_memory(message.clone(), false);
        agent.reporter().report(message);
    }

    for command in &plan.commands {
        if !agent.is_alive() {
            tracing::debug!(
                "[Agent:{}] Closed; skipping remaining commands",
                agent.name()
            );
            return false;
        }
        if let Some(observation) = dispatcher.act(command, &ctx).await {
            if !observation.is_empty() {
                agent.add_memory(
                    Message::observation(agent.name(), &command.action_name, observation),
                    false,
                );
            }
        }
    }

    let wants_sleep = plan.commands.is_empty() || agent.take_sleep_request();
    wants_sleep && agent.try_sleep()
}
