//! Plan parsing
//!
//! Two response formats are understood: a fenced JSON array of commands and
//! an XML-like `<action_list>` block with typed `<args>`. Whatever precedes
//! the command block is the thought.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

use super::action::{ActionArgs, ActionCommand};

/// Why a response could not be turned into commands
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PlanParseError {
    #[error("no command block found; reply with a ```json fenced list of commands")]
    NoCommandBlock,

    #[error("invalid json command list: {0}")]
    InvalidJson(String),

    #[error("<action> block is missing <{0}>")]
    MissingTag(&'static str),

    #[error("<args> tag without a name attribute")]
    UnnamedArg,

    #[error("argument '{name}' is not a valid {kind}: {value}")]
    InvalidArg {
        name: String,
        kind: String,
        value: String,
    },
}

/// A parsed response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPlan {
    pub thought: String,
    pub commands: Vec<ActionCommand>,
}

static JSON_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json[^\n]*\n(.*?)```").expect("invalid regex"));
static XML_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```xml[^\n]*\n(.*?)```").expect("invalid regex"));
static ACTION_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<action_list>(.*?)(?:</action_list>|\z)").expect("invalid regex")
});
static ACTION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<action>(.*?)</action>").expect("invalid regex"));
static ARGS_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<args([^>]*)>(.*?)</args>").expect("invalid regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#).expect("invalid regex")
});

/// Parse whichever format the response uses
pub fn parse_plan(response: &str) -> Result<ParsedPlan, PlanParseError> {
    let commands = if response.contains("```json") {
        parse_json_plan(response)?
    } else if response.contains("<action_list>") {
        parse_xml_plan(response)?
    } else {
        return Err(PlanParseError::NoCommandBlock);
    };
    Ok(ParsedPlan {
        thought: extract_thought(response),
        commands,
    })
}

/// Text before the command block
pub fn extract_thought(response: &str) -> String {
    let cut = ["```json", "```xml", "<action_list>"]
        .iter()
        .filter_map(|marker| response.find(marker))
        .min()
        .unwrap_or(response.len());
    response[..cut].trim().to_string()
}

/// Parse a ```json fenced array (or single object) of commands
pub fn parse_json_plan(response: &str) -> Result<Vec<ActionCommand>, PlanParseError> {
    let block = JSON_BLOCK
        .captures(response)
        .and_then(|c| c.get(1))
        .ok_or(PlanParseError::NoCommandBlock)?;

    let value: Value = serde_json::from_str(block.as_str().trim())
        .map_err(|e| PlanParseError::InvalidJson(e.to_string()))?;
    let value = match value {
        Value::Array(_) => value,
        Value::Object(_) => Value::Array(vec![value]),
        other => {
            return Err(PlanParseError::InvalidJson(format!(
                "expected a list of commands, got {}",
                other
            )))
        }
    };
    serde_json::from_value(value).map_err(|e| PlanParseError::InvalidJson(e.to_string()))
}

/// Parse an `<action_list>` block
///
/// ```text
/// <action_list>
///   <action>
///     <action_name>Chat</action_name>
///     <action_method>chat</action_method>
///     <args name="send_to" type="str">bob</args>
///   </action>
/// </action_list>
/// ```
///
/// `type` is one of `str` (default), `int`, `float`, `bool` or `list`; a
/// value of `None` becomes null and `<![CDATA[...]]>` is unwrapped.
pub fn parse_xml_plan(response: &str) -> Result<Vec<ActionCommand>, PlanParseError> {
    let body = XML_FENCE
        .captures(response)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(response);
    let list = ACTION_LIST
        .captures(body)
        .and_then(|c| c.get(1))
        .ok_or(PlanParseError::NoCommandBlock)?;

    ACTION_BLOCK
        .captures_iter(list.as_str())
        .filter_map(|c| c.get(1))
        .map(|block| parse_xml_action(block.as_str()))
        .collect()
}

fn parse_xml_action(block: &str) -> Result<ActionCommand, PlanParseError> {
    let action_name =
        tag_text(block, "action_name").ok_or(PlanParseError::MissingTag("action_name"))?;
    let action_method =
        tag_text(block, "action_method").ok_or(PlanParseError::MissingTag("action_method"))?;

    let mut args = ActionArgs::new();
    for caps in ARGS_TAG.captures_iter(block) {
        let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let raw = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        let mut name = None;
        let mut kind = "str".to_string();
        for attr in ATTRIBUTE.captures_iter(attrs) {
            let value = attr
                .get(2)
                .or_else(|| attr.get(3))
                .or_else(|| attr.get(4))
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            match &attr[1] {
                "name" => name = Some(value),
                "type" => kind = value,
                _ => {}
            }
        }
        let name = name.ok_or(PlanParseError::UnnamedArg)?;
        let value = coerce(&name, &kind, unwrap_cdata(raw))?;
        args.insert(name, value);
    }

    Ok(ActionCommand::new(action_name, action_method, args))
}

fn tag_text(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{}", tag);
    let close = format!("</{}>", tag);
    let start = block.find(&open)?;
    let content_start = start + block[start..].find('>')? + 1;
    let end = content_start + block[content_start..].find(&close)?;
    Some(unwrap_cdata(&block[content_start..end]).trim().to_string())
}

fn unwrap_cdata(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|s| s.strip_suffix("]]>"))
        .unwrap_or(raw)
}

fn coerce(name: &str, kind: &str, raw: &str) -> Result<Value, PlanParseError> {
    if raw.trim() == "None" {
        return Ok(Value::Null);
    }
    let invalid = || PlanParseError::InvalidArg {
        name: name.to_string(),
        kind: kind.to_string(),
        value: raw.to_string(),
    };
    match kind {
        "int" => raw
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "float" => raw
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "bool" => Ok(Value::Bool(matches!(
            raw.trim().to_lowercase().as_str(),
            "true" | "1" | "yes"
        ))),
        "list" => {
            let value: Value =
                serde_json::from_str(&raw.trim().replace('\'', "\"")).map_err(|_| invalid())?;
            if value.is_array() {
                Ok(value)
            } else {
                Err(invalid())
            }
        }
        _ => Ok(Value::String(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_plan_with_thought() {
        let response = "I should greet Bob.\n```json\n[\n  {\"action_name\": \"Chat\", \"action_method\": \"chat\", \"args\": {\"send_to\": \"bob\", \"message\": \"hi\"}},\n  {\"action_name\": \"MethodPlanAction\", \"action_method\": \"end\"}\n]\n```";
        let plan = parse_plan(response).unwrap();
        assert_eq!(plan.thought, "I should greet Bob.");
        assert_eq!(plan.commands.len(), 2);
        assert_eq!(plan.commands[0].args["send_to"], "bob");
        assert!(plan.commands[1].args.is_empty());
    }

    #[test]
    fn test_json_single_object() {
        let commands =
            parse_json_plan("```json\n{\"action_name\": \"A\", \"action_method\": \"m\"}\n```")
                .unwrap();
        assert_eq!(commands.len(), 1);
    }

    #[test]
    fn test_json_errors() {
        assert_eq!(
            parse_plan("just chatting").unwrap_err(),
            PlanParseError::NoCommandBlock
        );
        assert!(matches!(
            parse_json_plan("```json\n[{\"action_name\": }]\n```"),
            Err(PlanParseError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_json_plan("```json\n42\n```"),
            Err(PlanParseError::InvalidJson(_))
        ));
    }

    #[test]
    fn test_xml_plan_typed_args() {
        let response = r#"Let me reply.
<action_list>
<action>
<action_name>Chat</action_name>
<action_method>chat</action_method>
<args name="send_to" type = str >Alice</args>
<args name="count" type="int">3</args>
<args name="ratio" type='float'>0.5</args>
<args name="urgent" type=bool>True</args>
<args name="items" type = list >['a', 'b']</args>
<args name="note" type = str >None</args>
<args name="raw"><![CDATA[<b>1 < 2</b>]]></args>
</action>
</action_list>"#;
        let plan = parse_plan(response).unwrap();
        assert_eq!(plan.thought, "Let me reply.");
        let args = &plan.commands[0].args;
        assert_eq!(plan.commands[0].action_name, "Chat");
        assert_eq!(args["send_to"], "Alice");
        assert_eq!(args["count"], 3);
        assert_eq!(args["ratio"], 0.5);
        assert_eq!(args["urgent"], true);
        assert_eq!(args["items"], json!(["a", "b"]));
        assert_eq!(args["note"], Value::Null);
        assert_eq!(args["raw"], "<b>1 < 2</b>");
    }

    #[test]
    fn test_xml_in_fence_without_closing_list() {
        let response = "```xml\n<action_list>\n<action><action_name>A</action_name><action_method>m</action_method></action>\n```";
        let commands = parse_xml_plan(response).unwrap();
        assert_eq!(commands, vec![ActionCommand::new("A", "m", ActionArgs::new())]);
    }

    #[test]
    fn test_xml_errors() {
        assert_eq!(
            parse_xml_plan("<action_list><action><action_method>m</action_method></action></action_list>")
                .unwrap_err(),
            PlanParseError::MissingTag("action_name")
        );
        assert!(matches!(
            parse_xml_plan("<action_list><action><action_name>A</action_name><action_method>m</action_method><args name=\"n\" type=\"int\">x</args></action></action_list>"),
            Err(PlanParseError::InvalidArg { .. })
        ));
        assert_eq!(
            parse_xml_plan("<action_list><action><action_name>A</action_name><action_method>m</action_method><args type=\"int\">1</args></action></action_list>")
                .unwrap_err(),
            PlanParseError::UnnamedArg
        );
    }
}
