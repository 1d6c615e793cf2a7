//! Agents
//!
//! - `Agent` - Handle to one agent's memory, flags and life task
//! - `AgentProfile` - Static description an agent is built from
//! - `life` - The wake/plan/act/sleep loop

pub mod agent;
pub mod config;
mod life;

pub use agent::Agent;
pub use config::{AgentProfile, DEFAULT_MEMORY_CAPACITY};
