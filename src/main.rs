use std::sync::Arc;

use wiseagent::actions::{Chat, CHAT_ACTION, METHOD_PLAN_ACTION};
use wiseagent::cli::{Console, ConsoleSink};
use wiseagent::llm::{LlmProvider, OpenAiCompatibleProvider, ScriptedProvider};
use wiseagent::{
    logging, ActionRegistry, AgentCore, AgentProfile, Dispatcher, MethodPlanner, RuntimeConfig,
};

/// Plan used when no LLM endpoint is configured
const OFFLINE_PLAN: &str = r#"No LLM is configured, answering offline.
```json
[
  {"action_name": "Chat", "action_method": "chat",
   "args": {"send_to": "user", "message": "I am running without an LLM. Set OPENAI_API_KEY and restart to talk to me."}},
  {"action_name": "MethodPlanAction", "action_method": "wait_for_task"}
]
```"#;

fn demo_agents() -> Vec<AgentProfile> {
    vec![
        AgentProfile::new("Alice")
            .with_description("Product manager who turns user requests into tasks")
            .with_instructions(
                "Break the user's request into tasks. Ask Bob for anything technical.",
            )
            .with_actions([CHAT_ACTION, METHOD_PLAN_ACTION]),
        AgentProfile::new("Bob")
            .with_description("Software engineer who answers technical questions")
            .with_instructions("Answer precisely. Report back to whoever asked you.")
            .with_actions([CHAT_ACTION, METHOD_PLAN_ACTION]),
    ]
}

/// Split `name: message`; input without a known prefix goes to `default`
fn parse_target<'a>(input: &'a str, agents: &[String], default: &'a str) -> (String, &'a str) {
    if let Some((name, rest)) = input.split_once(':') {
        let name = name.trim().to_lowercase();
        if name == "all" || agents.contains(&name) {
            return (name, rest.trim());
        }
    }
    (default.to_string(), input)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env();
    let _log_guard = logging::init_logging(&config.log)?;

    tracing::info!("=== wiseagent starting ===");

    let llm: Arc<dyn LlmProvider> = match OpenAiCompatibleProvider::from_env() {
        Ok(provider) => Arc::new(provider),
        Err(e) => {
            tracing::warn!("{:#}; falling back to the offline provider", e);
            Arc::new(ScriptedProvider::new(Vec::<String>::new()).with_fallback(OFFLINE_PLAN))
        }
    };

    let planner = MethodPlanner::new()
        .with_max_retries(config.plan_max_retries)
        .shared();
    let mut registry = ActionRegistry::new();
    registry.register(Chat);
    registry.register_arc(planner.clone());
    tracing::info!("Registered {} actions", registry.len());

    let dispatcher = Dispatcher::new(Arc::new(registry), planner, llm).with_config(config);
    let core = AgentCore::new(Arc::new(dispatcher));
    core.add_sink(Arc::new(ConsoleSink::new())).await;
    core.add_environment_sink().await;
    core.start().await?;

    for profile in demo_agents() {
        core.add_agent(profile).await?;
    }

    let agents = core.agent_names().await;
    let default_target = agents.first().cloned().unwrap_or_else(|| "all".to_string());

    let console = Arc::new(Console::new());
    console.print_banner(&agents);

    loop {
        let reader = console.clone();
        let input = match tokio::task::spawn_blocking(move || reader.read_input()).await? {
            Ok(input) => input,
            Err(e) => {
                console.print_error(&e.to_string());
                break;
            }
        };

        if input.is_empty() {
            continue;
        }
        if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        let (target, content) = parse_target(&input, &agents, &default_target);
        if let Err(e) = core.post_message(&target, content) {
            console.print_error(&e.to_string());
        }
    }

    core.shutdown().await;
    tracing::info!("=== wiseagent shutting down ===");
    Ok(())
}
