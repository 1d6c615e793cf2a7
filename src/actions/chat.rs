//! Chat action - talk to the user or to other agents

use anyhow::Result;
use async_trait::async_trait;

use crate::core::Message;

use super::action::{bool_arg, str_arg, Action, ActionArgs, ActionContext, ActionMethod};

pub const CHAT_ACTION: &str = "Chat";

/// Publishes `communication` messages on the Report Bus
///
/// Messages to another agent reach it through the environment sink; messages
/// to `user` end up on the console and in the message cache.
pub struct Chat;

#[async_trait]
impl Action for Chat {
    fn name(&self) -> &str {
        CHAT_ACTION
    }

    fn description(&self) -> &str {
        "Chat with the user or with another agent"
    }

    fn methods(&self) -> Vec<ActionMethod> {
        vec![ActionMethod::new("chat", "Send a message")
            .with_arg("send_to", "name of the agent to talk to, `user`, or `all`")
            .with_arg("message", "the message to send")
            .with_arg(
                "wait_for_response",
                "optional; true to sleep until someone replies",
            )]
    }

    async fn invoke(
        &self,
        _method: &str,
        args: &ActionArgs,
        ctx: &ActionContext,
    ) -> Result<Option<String>> {
        let send_to = str_arg(args, "send_to").or_else(|_| str_arg(args, "name"))?;
        let send_to = send_to.trim();
        let content = str_arg(args, "message")?;
        let agent = ctx.agent();

        let message =
            Message::communication(agent.name(), send_to, content.trim()).with_cause_by(CHAT_ACTION);
        agent.add_memory(message.clone(), false);
        if !ctx.report(message) {
            anyhow::bail!("report bus is not available");
        }

        if bool_arg(args, "wait_for_response") {
            ctx.request_sleep();
        }
        Ok(Some(format!("Message sent to {}.", send_to)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionCommand, ActionRegistry};
    use crate::agent::{Agent, AgentProfile};
    use crate::core::HandleType;
    use crate::llm::ScriptedProvider;
    use crate::runtime::channels::create_bus_channel;
    use crate::runtime::Reporter;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_chat_reports_communication() {
        let (tx, mut rx) = create_bus_channel();
        let agent = Agent::new(AgentProfile::new("alice"), Reporter::new(tx));
        let mut registry = ActionRegistry::new();
        registry.register(Chat);
        let registry = Arc::new(registry);
        let ctx = ActionContext::new(
            agent.clone(),
            Arc::new(ScriptedProvider::new(Vec::<String>::new())),
            registry.clone(),
            10,
        );

        let args = json!({"send_to": " Bob ", "message": "review please"});
        let command = ActionCommand::new("Chat", "chat", args.as_object().cloned().unwrap());
        let observation = registry.dispatch(&command, &ctx).await;
        assert_eq!(observation.as_deref(), Some("Message sent to Bob."));

        let reported = rx.recv().await.unwrap();
        assert_eq!(reported.handle_type, HandleType::Communication);
        assert_eq!(reported.send_from, "alice");
        assert_eq!(reported.send_to, "bob");
        assert_eq!(reported.content, "review please");
        assert_eq!(reported.cause_by, "Chat");
        assert_eq!(agent.memory_len(), 1);
    }

    #[tokio::test]
    async fn test_chat_without_bus_is_an_error_observation() {
        let agent = Agent::new(AgentProfile::new("alice"), Reporter::disconnected());
        let mut registry = ActionRegistry::new();
        registry.register(Chat);
        let registry = Arc::new(registry);
        let ctx = ActionContext::new(
            agent,
            Arc::new(ScriptedProvider::new(Vec::<String>::new())),
            registry.clone(),
            10,
        );

        let args = json!({"send_to": "user", "message": "hi"});
        let command = ActionCommand::new("Chat", "chat", args.as_object().cloned().unwrap());
        let observation = registry.dispatch(&command, &ctx).await.unwrap();
        assert!(observation.starts_with("Chat.chat failed"));
    }
}
