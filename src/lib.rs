pub mod core;
pub mod runtime;

// Agents and what they can do
pub mod actions;
pub mod agent;

// Splitting one generation into live artifact streams
pub mod demux;

// Optional components
pub mod cli;
pub mod config;
pub mod llm;
pub mod logging;

pub use actions::{Action, ActionContext, ActionRegistry, Dispatcher, MethodPlanner};
pub use agent::{Agent, AgentProfile};
pub use config::RuntimeConfig;
pub use core::{FrameworkError, FrameworkResult, Message};
pub use runtime::AgentCore;
