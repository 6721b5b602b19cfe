//! LLM Provider Strategy Pattern
//!
//! Defines the boundary to the language model. The dispatch loop hands a
//! provider the full history plus the registered tools and gets back either a
//! final answer or an ordered list of tool calls.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::{CompletionRequest, LlmProvider};
//!
//! let request = CompletionRequest { history: conversation.turns(), tools: registry.list_specs() };
//! let completion = provider.complete(&request, &options).await?;
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::Turn;
use crate::tool::{ToolCall, ToolSpec};

/// Configuration for LLM generation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Model identifier (e.g., "qwen2.5:7b", "llama3.1:8b")
    pub model: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Top-p nucleus sampling
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// System prompt; sent ahead of the history, never stored in it
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: "qwen2.5:7b".into(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            top_p: default_top_p(),
            system_prompt: None,
        }
    }
}

/// What the provider is asked
#[derive(Clone, Copy, Debug)]
pub struct CompletionRequest<'a> {
    /// Full interleaved history, oldest first
    pub history: &'a [Turn],

    /// Tools in registration order
    pub tools: &'a [ToolSpec],
}

/// What the provider decided
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Final(String),
    /// Non-empty, in the order the model requested them
    ToolCalls(Vec<ToolCall>),
}

/// Response from an LLM completion
#[derive(Clone, Debug)]
pub struct Completion {
    pub reply: Reply,

    /// Model that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,
}

impl Completion {
    pub fn final_text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            reply: Reply::Final(text.into()),
            model: model.into(),
            usage: None,
        }
    }

    pub fn tool_calls(model: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            reply: Reply::ToolCalls(calls),
            model: model.into(),
            usage: None,
        }
    }
}

/// Token usage statistics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Provider metadata
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g., "Ollama")
    pub name: String,

    /// Endpoint the provider talks to
    pub endpoint: Option<String>,

    /// Available models
    pub models: Vec<ModelInfo>,

    /// Whether tool/function calling is supported natively
    pub supports_tools: bool,
}

/// Information about a model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    pub owned_by: Option<String>,
}

/// Strategy trait for LLM providers
///
/// Implement this trait to add support for new LLM backends.
/// The agent works exclusively through this interface.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider information and capabilities
    async fn info(&self) -> Result<ProviderInfo>;

    /// Check if the provider is available and configured correctly
    async fn health_check(&self) -> Result<bool>;

    /// Ask the model for its next step
    async fn complete(
        &self,
        request: &CompletionRequest<'_>,
        options: &GenerationOptions,
    ) -> Result<Completion>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<ModelInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_options_defaults() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(opts.max_tokens, 2048);
        assert_eq!(opts.model, "qwen2.5:7b");
        assert!(opts.system_prompt.is_none());
    }
}
