//! OpenAI-compatible chat completion types and the mapping to and from the
//! agent's history.

use std::collections::HashMap;

use agent_core::{ToolCall, ToolOutcome, ToolSpec, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ApiMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ApiToolDefinition>,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ApiMessage {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ApiMessage {
    fn text(role: &str, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ApiToolCall {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default = "function_type")]
    pub r#type: String,
    pub function: ApiFunction,
}

/// `arguments` is a JSON-encoded string per the OpenAI format; some servers
/// send the object itself.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub(crate) struct ApiFunction {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

fn function_type() -> String {
    "function".into()
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiToolDefinition {
    pub r#type: &'static str,
    pub function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
pub(crate) struct ApiToolFunction {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub model: Option<String>,
    pub choices: Vec<ApiChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiChoice {
    pub message: ApiMessage,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ModelList {
    #[serde(default)]
    pub data: Vec<ApiModel>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiModel {
    pub id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

/// Build the message list: system prompt first, then the history.
///
/// Each tool call becomes an assistant message carrying `tool_calls`, and each
/// result a `tool` message answering it. Calls recorded without an ID get a
/// positional one so the pair still lines up.
pub(crate) fn to_messages(system_prompt: Option<&str>, history: &[Turn]) -> Vec<ApiMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    if let Some(prompt) = system_prompt {
        messages.push(ApiMessage::text("system", prompt));
    }

    let mut last_call_id: Option<String> = None;
    for (index, turn) in history.iter().enumerate() {
        match turn {
            Turn::User(message) => messages.push(ApiMessage::text("user", &message.content)),
            Turn::AssistantFinal(message) => messages.push(ApiMessage::text("assistant", &message.content)),
            Turn::ToolCall(call) => {
                let id = call.id.clone().unwrap_or_else(|| format!("call_{index}"));
                last_call_id = Some(id.clone());
                messages.push(ApiMessage {
                    role: "assistant".into(),
                    content: None,
                    tool_calls: Some(vec![ApiToolCall {
                        id: Some(id),
                        r#type: function_type(),
                        function: ApiFunction {
                            name: call.name.clone(),
                            arguments: Value::String(encode_arguments(&call.arguments)),
                        },
                    }]),
                    tool_call_id: None,
                });
            }
            Turn::ToolResult(result) => {
                let content = match &result.outcome {
                    ToolOutcome::Success(output) => output.clone(),
                    ToolOutcome::Failure(error) => format!("Error: {error}"),
                };
                messages.push(ApiMessage {
                    role: "tool".into(),
                    content: Some(content),
                    tool_calls: None,
                    tool_call_id: result.id.clone().or_else(|| last_call_id.take()),
                });
            }
        }
    }

    messages
}

fn encode_arguments(arguments: &HashMap<String, Value>) -> String {
    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".into())
}

pub(crate) fn to_tool_definitions(tools: &[ToolSpec]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|spec| ApiToolDefinition {
            r#type: "function",
            function: ApiToolFunction {
                name: spec.schema.name.clone(),
                description: spec.schema.description.clone(),
                parameters: spec.schema.to_json_schema(),
            },
        })
        .collect()
}

/// Convert a native tool call. Arguments that are not a JSON object become an
/// empty map and are left for schema validation to reject.
pub(crate) fn from_api_tool_call(call: ApiToolCall) -> ToolCall {
    let arguments = match call.function.arguments {
        Value::Object(map) => map.into_iter().collect(),
        Value::String(encoded) => match serde_json::from_str::<Value>(&encoded) {
            Ok(Value::Object(map)) => map.into_iter().collect(),
            _ => {
                tracing::warn!(tool = %call.function.name, "Tool call arguments are not a JSON object");
                HashMap::new()
            }
        },
        Value::Null => HashMap::new(),
        _ => {
            tracing::warn!(tool = %call.function.name, "Tool call arguments are not a JSON object");
            HashMap::new()
        }
    };

    ToolCall {
        name: call.function.name,
        arguments,
        id: Some(call.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{ParamType, ParameterSchema, ToolResult, ToolSchema};
    use serde_json::json;

    #[test]
    fn history_maps_to_openai_messages() {
        let call = ToolCall::new("get_weather").arg("city", "Madrid").with_id("c1");
        let history = vec![
            Turn::user("Weather in Madrid?"),
            Turn::ToolCall(call),
            Turn::ToolResult(ToolResult::success("get_weather", "22°C, sunny").with_id(Some("c1".into()))),
            Turn::assistant("It's 22°C and sunny."),
        ];

        let messages = to_messages(Some("Be helpful."), &history);
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "tool", "assistant"]);

        let calls = messages[2].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "get_weather");
        assert_eq!(calls[0].function.arguments, json!(r#"{"city":"Madrid"}"#));
        assert_eq!(messages[3].tool_call_id.as_deref(), Some("c1"));
        assert_eq!(messages[3].content.as_deref(), Some("22°C, sunny"));
    }

    #[test]
    fn results_without_ids_answer_the_preceding_call() {
        let history = vec![
            Turn::user("time?"),
            Turn::ToolCall(ToolCall::new("get_current_time")),
            Turn::ToolResult(ToolResult::failure("get_current_time", "clock unavailable")),
        ];

        let messages = to_messages(None, &history);
        let call_id = messages[1].tool_calls.as_ref().unwrap()[0].id.clone();
        assert_eq!(call_id.as_deref(), Some("call_1"));
        assert_eq!(messages[2].tool_call_id, call_id);
        assert_eq!(messages[2].content.as_deref(), Some("Error: clock unavailable"));
    }

    #[test]
    fn tool_definitions_carry_json_schema() {
        let schema = ToolSchema::new("get_weather", "Current weather")
            .param(ParameterSchema::required("city", ParamType::String, "City name"));
        let spec = agent_core::ToolSpec::from_fn(schema, |_| Ok(String::new()));

        let defs = to_tool_definitions(&[spec]);
        let encoded = serde_json::to_value(&defs).unwrap();
        assert_eq!(encoded[0]["type"], "function");
        assert_eq!(encoded[0]["function"]["name"], "get_weather");
        assert_eq!(encoded[0]["function"]["parameters"]["required"], json!(["city"]));
    }

    #[test]
    fn native_call_arguments_are_decoded() {
        let encoded: ApiToolCall = serde_json::from_value(json!({
            "id": "abc",
            "type": "function",
            "function": {"name": "get_weather", "arguments": "{\"city\": \"Tokyo\"}"}
        }))
        .unwrap();
        let call = from_api_tool_call(encoded);
        assert_eq!(call.arguments["city"], json!("Tokyo"));
        assert_eq!(call.id.as_deref(), Some("abc"));

        let object: ApiToolCall = serde_json::from_value(json!({
            "function": {"name": "get_weather", "arguments": {"city": "Paris"}}
        }))
        .unwrap();
        let call = from_api_tool_call(object);
        assert_eq!(call.arguments["city"], json!("Paris"));
        assert!(call.id.is_some());
    }

    #[test]
    fn non_object_arguments_become_empty() {
        let encoded: ApiToolCall = serde_json::from_value(json!({
            "function": {"name": "get_weather", "arguments": "[1, 2]"}
        }))
        .unwrap();
        assert!(from_api_tool_call(encoded).arguments.is_empty());
    }
}
