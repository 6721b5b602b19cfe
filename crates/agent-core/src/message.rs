//! Conversation Turns
//!
//! The history of one peer's exchanges with the agent. Append-only: the core
//! never truncates or rewrites it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tool::{ToolCall, ToolResult};

/// Role of a message sender, as providers see it
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool result (injected as context)
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A text message with its timestamp
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,

    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// One entry of a conversation history
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    User(Message),
    AssistantFinal(Message),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User(Message::new(content))
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::AssistantFinal(Message::new(content))
    }

    pub fn role(&self) -> Role {
        match self {
            Turn::User(_) => Role::User,
            Turn::AssistantFinal(_) | Turn::ToolCall(_) => Role::Assistant,
            Turn::ToolResult(_) => Role::Tool,
        }
    }

    /// Text content for user and assistant turns
    pub fn text(&self) -> Option<&str> {
        match self {
            Turn::User(m) | Turn::AssistantFinal(m) => Some(&m.content),
            Turn::ToolCall(_) | Turn::ToolResult(_) => None,
        }
    }
}

/// Ordered, append-only conversation history
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a turn
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Append a tool call together with its result. The pair goes in as one
    /// step so an interrupted exchange never leaves a call without a result.
    pub fn push_tool_exchange(&mut self, call: ToolCall, result: ToolResult) {
        self.turns.reserve(2);
        self.turns.push(Turn::ToolCall(call));
        self.turns.push(Turn::ToolResult(result));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_roles() {
        assert_eq!(Turn::user("hi").role(), Role::User);
        assert_eq!(Turn::ToolCall(ToolCall::new("x")).role(), Role::Assistant);
        assert_eq!(Turn::ToolResult(ToolResult::success("x", "ok")).role(), Role::Tool);
    }

    #[test]
    fn tool_exchange_is_pushed_as_a_pair() {
        let mut conv = Conversation::new();
        conv.push(Turn::user("Hi"));
        conv.push_tool_exchange(ToolCall::new("clock"), ToolResult::success("clock", "noon"));

        assert_eq!(conv.len(), 3);
        assert!(matches!(conv.turns()[1], Turn::ToolCall(_)));
        assert!(matches!(conv.last(), Some(Turn::ToolResult(_))));
    }
}
