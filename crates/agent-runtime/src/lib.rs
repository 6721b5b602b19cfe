//! # agent-runtime
//!
//! Language model providers for the vlagentic agent.
//!
//! ## Providers
//!
//! - **Ollama**: local inference through Ollama's OpenAI-compatible
//!   `/v1/chat/completions` endpoint, with native tool calling
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_runtime::{OllamaConfig, OllamaProvider};
//!
//! let provider = OllamaProvider::from_config(OllamaConfig::from_env())?;
//! let agent = AgentBuilder::new()
//!     .provider(Arc::new(provider))
//!     .tools(Arc::new(registry))
//!     .build()?;
//! ```

pub mod fenced;
pub mod ollama;
mod wire;

pub use ollama::{OllamaConfig, OllamaProvider};

// Re-export core types for convenience
pub use agent_core::{AgentError, GenerationOptions, LlmProvider, Result};
