//! Ollama LLM Provider
//!
//! Implementation of `LlmProvider` for local Ollama inference over its
//! OpenAI-compatible API. Any server speaking `/chat/completions` with
//! `tools` works the same way.

use std::time::Duration;

use agent_core::{
    error::{AgentError, Result},
    provider::{
        Completion, CompletionRequest, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, Reply,
        TokenUsage,
    },
};
use async_trait::async_trait;
use reqwest::StatusCode;

use crate::fenced;
use crate::wire::{self, ChatRequest, ChatResponse, ModelList};

/// Ollama provider configuration
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    /// Base URL of the OpenAI-compatible API, including `/v1`
    pub base_url: String,

    /// Transport-level request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// `OLLAMA_BASE_URL` wins; otherwise the URL is assembled from
    /// `OLLAMA_HOST` and `OLLAMA_PORT`.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| {
            let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".into());
            let port = std::env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse::<u16>().ok())
                .unwrap_or(11434);
            format!("{host}:{port}/v1")
        });

        Self {
            base_url,
            ..Default::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Ollama LLM provider
pub struct OllamaProvider {
    client: reqwest::Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create from configuration
    pub fn from_config(config: OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AgentError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config: OllamaConfig {
                base_url: config.base_url.trim_end_matches('/').to_string(),
                ..config
            },
        })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_config(OllamaConfig::from_env())
    }

    /// Create with default localhost settings
    pub fn localhost() -> Result<Self> {
        Self::from_config(OllamaConfig::default())
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    fn map_send_error(&self, e: &reqwest::Error) -> AgentError {
        if e.is_timeout() {
            AgentError::ProviderTimeout(self.config.timeout_secs)
        } else if e.is_connect() {
            AgentError::ProviderUnavailable(format!("cannot reach {}: {e}", self.config.base_url))
        } else {
            AgentError::Provider(e.to_string())
        }
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "Provider returned error");

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => AgentError::RateLimited(body),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::BAD_GATEWAY => {
                AgentError::ProviderUnavailable(format!("HTTP {status}"))
            }
            _ => AgentError::Provider(format!("HTTP {status}: {body}")),
        })
    }

    /// Turn the first choice into a reply. Native tool calls win; otherwise
    /// the text is scanned for fenced tool blocks before being taken as final.
    fn convert_response(response: ChatResponse, requested_model: &str) -> Result<Completion> {
        let usage = response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        let model = response.model.unwrap_or_else(|| requested_model.to_string());

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| AgentError::Provider("no choices in response".into()))?;

        let native: Vec<_> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(wire::from_api_tool_call)
            .collect();

        let reply = if native.is_empty() {
            let content = message.content.unwrap_or_default();
            let embedded = fenced::parse_tool_calls(&content);
            if !embedded.is_empty() {
                Reply::ToolCalls(embedded)
            } else if content.trim().is_empty() {
                return Err(AgentError::Provider("empty response from model".into()));
            } else {
                Reply::Final(content)
            }
        } else {
            Reply::ToolCalls(native)
        };

        Ok(Completion { reply, model, usage })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        let models = self.list_models().await.unwrap_or_default();

        Ok(ProviderInfo {
            name: "Ollama".into(),
            endpoint: Some(self.config.base_url.clone()),
            models,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        match self.list_models().await {
            Ok(_) => Ok(true),
            Err(e) => {
                tracing::warn!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn complete(&self, request: &CompletionRequest<'_>, options: &GenerationOptions) -> Result<Completion> {
        let url = format!("{}/chat/completions", self.config.base_url);
        let body = ChatRequest {
            model: &options.model,
            messages: wire::to_messages(options.system_prompt.as_deref(), request.history),
            tools: wire::to_tool_definitions(request.tools),
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stream: false,
        };

        tracing::debug!(
            model = %options.model,
            messages = body.messages.len(),
            tools = body.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;
        let response = Self::check_status(response).await?;

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("failed to parse response: {e}")))?;

        Self::convert_response(parsed, &options.model)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;
        let response = Self::check_status(response).await?;

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| AgentError::Provider(format!("failed to parse model list: {e}")))?;

        Ok(list
            .data
            .into_iter()
            .map(|m| ModelInfo {
                id: m.id,
                owned_by: m.owned_by,
            })
            .collect())
    }
}
