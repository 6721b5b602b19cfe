//! Error Types

use thiserror::Error;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// LLM provider error
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider unavailable or not responding
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Provider did not answer within the configured bound
    #[error("Provider timed out after {0}s")]
    ProviderTimeout(u64),

    /// Rate limited
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// A tool with this name is already registered
    #[error("Duplicate tool: {0}")]
    DuplicateTool(String),

    /// Tool not found in registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Arguments did not match the tool's parameter schema
    #[error("invalid arguments: {field}: {reason}")]
    InvalidArguments { field: String, reason: String },

    /// Programming error inside a tool; aborts the current exchange
    #[error("Tool '{tool}' faulted: {message}")]
    ToolFault { tool: String, message: String },

    /// Maximum provider round-trips reached in the dispatch loop
    #[error("Maximum iterations ({0}) reached")]
    MaxIterations(usize),

    /// Authentication or transport handshake failed
    #[error("Connection error: {0}")]
    Connection(String),

    /// Transport failure after connecting
    #[error("Transport error: {0}")]
    Transport(String),

    /// The peer or transport closed the connection
    #[error("Connection closed")]
    ConnectionClosed,

    /// Session lifecycle misuse
    #[error("Session error: {0}")]
    Session(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The exchange was cancelled by a shutdown
    #[error("Cancelled")]
    Cancelled,

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other/unknown error
    #[error("{0}")]
    Other(String),
}

impl AgentError {
    /// Errors the dispatch loop turns into a degraded final answer.
    ///
    /// Tool faults, cancellation and session/transport errors escape instead.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::Provider(_)
                | AgentError::ProviderUnavailable(_)
                | AgentError::ProviderTimeout(_)
                | AgentError::RateLimited(_)
                | AgentError::MaxIterations(_)
                | AgentError::UnknownTool(_)
                | AgentError::InvalidArguments { .. }
        )
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            AgentError::Provider(msg) => {
                format!("Sorry, the language model returned an error: {msg}")
            }
            AgentError::ProviderUnavailable(_) => {
                "Sorry, the language model is currently unavailable. Please try again.".into()
            }
            AgentError::ProviderTimeout(secs) => {
                format!("Sorry, the language model did not answer within {secs} seconds.")
            }
            AgentError::RateLimited(_) => {
                "Sorry, too many requests were made. Please wait a moment.".into()
            }
            AgentError::UnknownTool(name) => format!("The tool '{name}' is not available."),
            AgentError::InvalidArguments { field, reason } => {
                format!("I couldn't use a tool: invalid argument '{field}': {reason}")
            }
            AgentError::ToolFault { tool, message } => {
                format!("I couldn't complete that: tool {tool} failed: {message}")
            }
            AgentError::MaxIterations(n) => {
                format!("I was unable to complete that after {n} tool calls.")
            }
            AgentError::Cancelled => "The request was cancelled.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Other(err.to_string())
    }
}
