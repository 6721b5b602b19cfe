//! # agent-core
//!
//! Tool-calling conversational agent: a registry of declared tools, an
//! executor that validates and runs them, and the dispatch loop that
//! alternates between a language model and those tools until it produces a
//! final answer.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────────────────────────────────────────────────┐
//! │  ChatClient  │   │                    AgentSession                     │
//! │  (human)     │──▶│  Transport ─▶ Agent::dispatch ─▶ Transport          │
//! └──────────────┘   │                 │          │                        │
//!                    │        ┌────────┘          └──────────┐             │
//!                    │  ┌─────────────┐             ┌──────────────┐       │
//!                    │  │ LlmProvider │             │ ToolExecutor │       │
//!                    │  │ (Strategy)  │             │  + Registry  │       │
//!                    │  └─────────────┘             └──────────────┘       │
//!                    └─────────────────────────────────────────────────────┘
//! ```
//!
//! The `LlmProvider` trait keeps the dispatch loop independent of the model
//! backend; the `Transport` trait does the same for the messaging channel.

pub mod chat;
pub mod error;
pub mod executor;
pub mod message;
pub mod provider;
pub mod reasoning;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod tool;
pub mod transport;

pub use chat::ChatClient;
pub use error::{AgentError, Result};
pub use executor::ToolExecutor;
pub use message::{Conversation, Message, Role, Turn};
pub use provider::{Completion, CompletionRequest, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, Reply};
pub use reasoning::{Agent, AgentBuilder, AgentConfig};
pub use session::{AgentSession, SessionState};
pub use tool::{
    Arguments, ParamType, ParameterSchema, Tool, ToolCall, ToolError, ToolOutcome, ToolRegistry, ToolResult,
    ToolSchema, ToolSpec,
};
pub use transport::{Credentials, InboundMessage, LocalTransport, OutboundMessage, Transport};
