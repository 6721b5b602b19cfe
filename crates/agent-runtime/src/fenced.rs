//! Text-embedded tool calls.
//!
//! Models without native tool calling are told (see
//! `ToolRegistry::generate_prompt_section`) to answer with a fenced block:
//!
//! ````text
//! ```tool
//! {"tool": "get_weather", "arguments": {"city": "Madrid"}}
//! ```
//! ````
//!
//! These helpers recover such calls from plain reply text.

use agent_core::ToolCall;

const FENCE_OPEN: &str = "```tool";
const FENCE_CLOSE: &str = "```";

/// Extract every tool call from `content`, in order of appearance.
///
/// Looks for fenced ```tool blocks first and falls back to a single inline
/// JSON object carrying a `"tool"` key. Calls without an ID get a fresh one.
pub fn parse_tool_calls(content: &str) -> Vec<ToolCall> {
    let mut calls = fenced_calls(content);
    if calls.is_empty() {
        calls.extend(inline_call(content));
    }
    for call in &mut calls {
        if call.id.is_none() {
            call.id = Some(uuid::Uuid::new_v4().to_string());
        }
    }
    calls
}

fn fenced_calls(content: &str) -> Vec<ToolCall> {
    let mut calls = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find(FENCE_OPEN) {
        let after_marker = &rest[start + FENCE_OPEN.len()..];
        let Some(end) = after_marker.find(FENCE_CLOSE) else {
            break;
        };
        let json_str = after_marker[..end].trim();
        match serde_json::from_str::<ToolCall>(json_str) {
            Ok(call) => calls.push(call),
            Err(e) => tracing::debug!(error = %e, "Ignoring malformed tool block"),
        }
        rest = &after_marker[end + FENCE_CLOSE.len()..];
    }

    calls
}

/// The whole reply, or a ```json block that is the whole reply, must be the
/// object; prose that merely quotes one is an answer.
fn inline_call(content: &str) -> Option<ToolCall> {
    let mut body = content.trim();
    if let Some(inner) = body.strip_prefix("```json").or_else(|| body.strip_prefix("```")) {
        body = inner.strip_suffix(FENCE_CLOSE)?.trim();
    }
    if !(body.starts_with('{') && body.ends_with('}')) || !body.contains(r#""tool""#) {
        return None;
    }

    serde_json::from_str::<ToolCall>(body).ok()
}
