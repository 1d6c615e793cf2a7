//! Current-agent binding
//!
//! While an agent's life loop runs, the agent is bound as a task-local so
//! nested action code can resolve who it is running for. Bindings do not
//! leak into tasks spawned from inside the scope.

use std::future::Future;

use crate::agent::Agent;

use super::error::{BindingViolation, FrameworkError, FrameworkResult};

tokio::task_local! {
    static CURRENT_AGENT: Agent;
}

/// Run `fut` with `agent` bound as the current agent
///
/// Fails with [`BindingViolation::AlreadyBound`] if the calling task already
/// has an agent bound.
pub async fn bind_current_agent<F>(agent: Agent, fut: F) -> FrameworkResult<F::Output>
where
    F: Future,
{
    if CURRENT_AGENT.try_with(|_| ()).is_ok() {
        return Err(FrameworkError::ConcurrencyBindingViolation(
            BindingViolation::AlreadyBound,
        ));
    }
    Ok(CURRENT_AGENT.scope(agent, fut).await)
}

/// The agent bound to the calling task
pub fn current_agent() -> FrameworkResult<Agent> {
    CURRENT_AGENT
        .try_with(|agent| agent.clone())
        .map_err(|_| FrameworkError::ConcurrencyBindingViolation(BindingViolation::NotBound))
}

/// Check if the calling task has an agent bound
pub fn is_bound() -> bool {
    CURRENT_AGENT.try_with(|_| ()).is_ok()
}
