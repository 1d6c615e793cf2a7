//! Action registry
//!
//! Built once at startup and shared read-only afterwards. Dispatch never
//! fails: unknown actions, unknown methods, errors and panics all come back
//! as observation text for the agent to read.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};

use crate::core::{FrameworkError, FrameworkResult};

use super::action::{Action, ActionCommand, ActionContext};

/// Registry that holds all available actions
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register an action, replacing one with the same name
    pub fn register<A: Action + 'static>(&mut self, action: A) {
        self.register_arc(Arc::new(action));
    }

    /// Register a shared action
    pub fn register_arc(&mut self, action: Arc<dyn Action>) {
        let name = action.name().to_string();
        tracing::info!("[ActionRegistry] Registering action: {}", name);
        if self.actions.insert(name.clone(), action).is_some() {
            tracing::warn!("[ActionRegistry] Replaced existing action '{}'", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(name).cloned()
    }

    /// Look up an action and check that it declares `method`
    pub fn resolve(&self, action_name: &str, method: &str) -> FrameworkResult<Arc<dyn Action>> {
        let action = self
            .get(action_name)
            .ok_or_else(|| FrameworkError::ActionNotFound(action_name.to_string()))?;
        if !action.has_method(method) {
            return Err(FrameworkError::MethodNotFound {
                action: action_name.to_string(),
                method: method.to_string(),
            });
        }
        Ok(action)
    }

    /// JSON description of the named actions for a system prompt
    ///
    /// Unknown names are skipped.
    pub fn describe(&self, names: &[String]) -> String {
        let described: Vec<Value> = names
            .iter()
            .filter_map(|name| self.actions.get(name))
            .map(|action| {
                json!({
                    "action_name": action.name(),
                    "description": action.description(),
                    "methods": action.methods(),
                })
            })
            .collect();
        if described.is_empty() {
            return String::new();
        }
        serde_json::to_string_pretty(&described).unwrap_or_default()
    }

    /// Execute one command
    ///
    /// Returns the observation to record, if any.
    pub async fn dispatch(&self, command: &ActionCommand, ctx: &ActionContext) -> Option<String> {
        let action_name = command.action_name.as_str();
        let method = command.action_method.as_str();
        let agent = ctx.agent().name();

        let action = match self.resolve(action_name, method) {
            Ok(action) => action,
            Err(e) => {
                tracing::warn!("[Agent:{}] {}", agent, e);
                return Some(match e {
                    FrameworkError::ActionNotFound(_) => {
                        format!("{} not found (no action named {})", method, action_name)
                    }
                    _ => format!("{} not found", method),
                });
            }
        };

        tracing::info!("[Agent:{}] Executing {}.{}", agent, action_name, method);
        tracing::debug!("[Agent:{}] Args: {:?}", agent, command.args);

        let invocation = AssertUnwindSafe(action.invoke(method, &command.args, ctx)).catch_unwind();
        match invocation.await {
            Ok(Ok(observation)) => observation,
            Ok(Err(e)) => {
                tracing::warn!(
                    "[Agent:{}] {}.{} failed: {:#}",
                    agent,
                    action_name,
                    method,
                    e
                );
                Some(format!("{}.{} failed: {:#}", action_name, method, e))
            }
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(
                    "[Agent:{}] {}.{} panicked: {}",
                    agent,
                    action_name,
                    method,
                    reason
                );
                Some(format!("{}.{} panicked: {}", action_name, method, reason))
            }
        }
    }

    pub fn action_names(&self) -> Vec<&str> {
        self.actions.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
