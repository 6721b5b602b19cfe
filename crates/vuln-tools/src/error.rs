//! Error Types for the tool set

use agent_core::ToolError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ToolkitError>;

#[derive(Error, Debug)]
pub enum ToolkitError {
    #[error("Classifier error: {0}")]
    Classifier(String),

    #[error("Classifier unavailable: {0}")]
    ClassifierUnavailable(String),

    #[error("Invalid CWE identifier: {0}")]
    InvalidCweId(String),

    #[error("Invalid expression: {0}")]
    InvalidExpression(String),

    #[error("No weather data available for {0}")]
    UnknownCity(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Every toolkit error is a domain failure: the model sees it and may retry
/// with different arguments.
impl From<ToolkitError> for ToolError {
    fn from(err: ToolkitError) -> Self {
        ToolError::Execution(err.to_string())
    }
}
