//! Planning
//!
//! A [`Planner`] turns an agent's memory into the next [`Plan`]. The default
//! [`MethodPlanner`] asks the LLM for a thought plus a command list, retrying
//! with the parser's complaint when the reply cannot be parsed. It is also an
//! action (`MethodPlanAction`) so the model can manage its task list and put
//! the agent to sleep.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::action::{str_arg, Action, ActionArgs, ActionCommand, ActionContext, ActionMethod};
use super::parser::{extract_thought, parse_plan};

/// Registry name of the planner action
pub const METHOD_PLAN_ACTION: &str = "MethodPlanAction";

/// Default number of corrective retries after an unparsable reply
pub const DEFAULT_PLAN_RETRIES: usize = 3;

const INSTRUCTION_PROMPT: &str = r#"## Task List
{task_list}
{current_task}
## Instruction
Decide what to do next. Reply with your thought followed by a json list of
action commands:
```json
[
    {
        "action_name": "action_name",
        "action_method": "action_method",
        "args": {"arg1": "value1"}
    }
]
```
If there is nothing left to do, call `MethodPlanAction.wait_for_task`.
"#;

/// Outcome of one plan phase
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub thought: String,
    pub commands: Vec<ActionCommand>,
}

/// Produces the next plan for an agent
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, ctx: &ActionContext) -> Result<Plan>;
}

/// One entry of an agent's task list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedTask {
    pub description: String,
    pub done: bool,
}

/// Per-agent data of [`MethodPlanner`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskList {
    pub tasks: Vec<PlannedTask>,
    pub current: usize,
}

impl TaskList {
    pub fn current_task(&self) -> Option<&PlannedTask> {
        self.tasks.get(self.current)
    }

    fn describe(&self) -> String {
        self.tasks
            .iter()
            .enumerate()
            .map(|(i, task)| {
                let status = if task.done { "done" } else { "todo" };
                format!("{}.({}) {}\n", i, status, task.description)
            })
            .collect()
    }
}

/// LLM planner with a per-agent task list
pub struct MethodPlanner {
    max_retries: usize,
}

impl MethodPlanner {
    pub fn new() -> Self {
        Self {
            max_retries: DEFAULT_PLAN_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Shared handle usable both as planner and as registered action
    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn instruction(&self, ctx: &ActionContext) -> String {
        let tasks = ctx
            .agent()
            .action_data::<TaskList>(METHOD_PLAN_ACTION)
            .unwrap_or_default();
        let current = tasks
            .current_task()
            .map(|t| format!("\n## Current Task\n{}\n", t.description))
            .unwrap_or_default();
        let task_list = if tasks.tasks.is_empty() {
            "(empty)\n".to_string()
        } else {
            tasks.describe()
        };
        INSTRUCTION_PROMPT
            .replace("{task_list}", &task_list)
            .replace("{current_task}", &current)
    }
}

impl Default for MethodPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Planner for MethodPlanner {
    async fn plan(&self, ctx: &ActionContext) -> Result<Plan> {
        let agent = ctx.agent().name();
        let instruction = self.instruction(ctx);

        let mut response = ctx.ask(instruction.clone()).await?;
        let mut attempt = 0;
        loop {
            match parse_plan(&response) {
                Ok(parsed) => {
                    tracing::debug!(
                        "[Agent:{}] Planned {} command(s)",
                        agent,
                        parsed.commands.len()
                    );
                    return Ok(Plan {
                        thought: parsed.thought,
                        commands: parsed.commands,
                    });
                }
                Err(e) if attempt < self.max_retries => {
                    attempt += 1;
                    tracing::warn!(
                        "[Agent:{}] Unparsable plan (attempt {}/{}): {}",
                        agent,
                        attempt,
                        self.max_retries,
                        e
                    );
                    let prompt = format!(
                        "{}\nYour previous reply was:\n{}\nIt could not be parsed.\nError: {}\nPlease try again.",
                        instruction, response, e
                    );
                    response = ctx.ask(prompt).await?;
                }
                Err(e) => {
                    tracing::warn!(
                        "[Agent:{}] Giving up on plan after {} retries: {}",
                        agent,
                        self.max_retries,
                        e
                    );
                    return Ok(Plan {
                        thought: extract_thought(&response),
                        commands: Vec::new(),
                    });
                }
            }
        }
    }
}

#[async_trait]
impl Action for MethodPlanner {
    fn name(&self) -> &str {
        METHOD_PLAN_ACTION
    }

    fn description(&self) -> &str {
        "Manage your task list and decide when to stop"
    }

    fn methods(&self) -> Vec<ActionMethod> {
        vec![
            ActionMethod::new(
                "wait_for_task",
                "If there is no task, take this action and wait for a new one",
            ),
            ActionMethod::new(
                "end",
                "Stop for now; use it after your final reply or when nothing useful was asked",
            ),
            ActionMethod::new("create_new_task", "Append a task to your task list")
                .with_arg("task_description", "description of the new task"),
            ActionMethod::new("finish_current_task", "Mark the current task as done"),
        ]
    }

    fn init_agent(&self, agent: &crate::agent::Agent) {
        agent.set_action_data(METHOD_PLAN_ACTION, TaskList::default());
    }

    async fn invoke(
        &self,
        method: &str,
        args: &ActionArgs,
        ctx: &ActionContext,
    ) -> Result<Option<String>> {
        match method {
            "wait_for_task" | "end" => {
                ctx.agent().observe(true);
                ctx.request_sleep();
                Ok(None)
            }
            "create_new_task" => {
                let description = str_arg(args, "task_description")?;
                ctx.agent()
                    .with_action_data::<TaskList, _, _>(METHOD_PLAN_ACTION, |tasks| {
                        tasks.tasks.push(PlannedTask {
                            description,
                            done: false,
                        })
                    });
                Ok(Some("create new task success.".to_string()))
            }
            "finish_current_task" => {
                let finished = ctx
                    .agent()
                    .with_action_data::<TaskList, _, _>(METHOD_PLAN_ACTION, |tasks| {
                        let current = tasks.current;
                        match tasks.tasks.get_mut(current) {
                            Some(task) => {
                                task.done = true;
                                tasks.current += 1;
                                true
                            }
                            None => false,
                        }
                    });
                if finished {
                    Ok(Some("finish current task success.".to_string()))
                } else {
                    Ok(Some("there is no current task to finish.".to_string()))
                }
            }
            other => anyhow::bail!("unsupported method '{}'", other),
        }
    }
}
