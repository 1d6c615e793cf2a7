//! Agent runtime and communication
//!
//! This module provides the infrastructure that moves messages between
//! agents and the outside world:
//! - `Router` - Inbound bus delivering messages into agent memory
//! - `ReportBus` / `Reporter` - Outbound bus offering messages to sinks
//! - `sinks` - Environment, message cache (and the console in `cli`)
//! - `AgentCore` - Owns agents, buses and the shared dispatcher
//!
//! Each bus is a FIFO queue drained by exactly one tokio task.

pub mod agent_core;
mod bus;
pub mod channels;
pub mod report_bus;
pub mod router;
pub mod sinks;

pub use agent_core::AgentCore;
pub use channels::{AgentDirectory, Delivery};
pub use report_bus::{ReportBus, Reporter};
pub use router::{Router, RouterHandle};
pub use sinks::{CachedBatch, EnvironmentSink, MessageCache, ReportSink};
