//! Actions and plan/act dispatch
//!
//! - `Action` - Trait for everything an agent can do
//! - `ActionRegistry` - Name-keyed actions; dispatch never fails
//! - `Planner` / `MethodPlanner` - Produce the next plan from memory
//! - `Chat` - Built-in messaging action
//! - `Dispatcher` - Glue the life loop calls into

pub mod action;
pub mod chat;
pub mod dispatcher;
pub mod parser;
pub mod planner;
pub mod registry;

pub use action::{
    bool_arg, str_arg, Action, ActionArgs, ActionCommand, ActionContext, ActionMethod,
};
pub use chat::{Chat, CHAT_ACTION};
pub use dispatcher::Dispatcher;
pub use parser::{parse_json_plan, parse_plan, parse_xml_plan, ParsedPlan, PlanParseError};
pub use planner::{
    MethodPlanner, Plan, PlannedTask, Planner, TaskList, DEFAULT_PLAN_RETRIES, METHOD_PLAN_ACTION,
};
pub use registry::ActionRegistry;
