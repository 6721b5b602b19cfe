//! Test helpers.
//!
//! [`ScriptedProvider`] replays a queue of replies and records what it was
//! asked, so dispatch behaviour can be checked without a model.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::message::Turn;
use crate::provider::{Completion, CompletionRequest, GenerationOptions, LlmProvider, ModelInfo, ProviderInfo, Reply};
use crate::tool::ToolCall;

type Responder = Box<dyn Fn(&[Turn]) -> Reply + Send>;

enum Step {
    Reply(Reply),
    Respond(Responder),
    Fail(AgentError),
}

/// A provider that returns scripted replies in order.
///
/// When the script runs out it repeats the `always_tool` call if one was set,
/// otherwise it fails with a provider error.
#[derive(Default)]
pub struct ScriptedProvider {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<ToolCall>,
    delay: Option<Duration>,
    seen: Mutex<Vec<Vec<Turn>>>,
    tool_names: Mutex<Vec<Vec<String>>>,
    system_prompts: Mutex<Vec<String>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(self, step: Step) -> Self {
        lock(&self.steps).push_back(step);
        self
    }

    /// Next reply is a final answer
    pub fn then_final(self, text: impl Into<String>) -> Self {
        self.push(Step::Reply(Reply::Final(text.into())))
    }

    /// Next reply requests these tool calls
    pub fn then_tools(self, calls: Vec<ToolCall>) -> Self {
        self.push(Step::Reply(Reply::ToolCalls(calls)))
    }

    /// Next reply is computed from the history the provider receives
    pub fn then_respond<F>(self, respond: F) -> Self
    where
        F: Fn(&[Turn]) -> Reply + Send + 'static,
    {
        self.push(Step::Respond(Box::new(respond)))
    }

    /// Next call fails
    pub fn then_error(self, error: AgentError) -> Self {
        self.push(Step::Fail(error))
    }

    /// Once the script is exhausted, keep requesting this call forever
    pub fn always_tool(mut self, call: ToolCall) -> Self {
        self.fallback = Some(call);
        self
    }

    /// Sleep before every reply
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `complete` calls so far
    pub fn calls(&self) -> usize {
        lock(&self.seen).len()
    }

    /// History length at each call
    pub fn history_lengths(&self) -> Vec<usize> {
        lock(&self.seen).iter().map(Vec::len).collect()
    }

    /// History received by each call
    pub fn requests(&self) -> Vec<Vec<Turn>> {
        lock(&self.seen).clone()
    }

    /// Tool names offered at each call
    pub fn offered_tools(&self) -> Vec<Vec<String>> {
        lock(&self.tool_names).clone()
    }

    /// System prompt sent with each call
    pub fn system_prompts(&self) -> Vec<String> {
        lock(&self.system_prompts).clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn info(&self) -> Result<ProviderInfo> {
        Ok(ProviderInfo {
            name: "scripted".into(),
            endpoint: None,
            models: self.list_models().await?,
            supports_tools: true,
        })
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    async fn complete(&self, request: &CompletionRequest<'_>, options: &GenerationOptions) -> Result<Completion> {
        lock(&self.seen).push(request.history.to_vec());
        lock(&self.tool_names)
            .push(request.tools.iter().map(|t| t.name().to_string()).collect());
        lock(&self.system_prompts).push(options.system_prompt.clone().unwrap_or_default());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let step = lock(&self.steps).pop_front();
        let reply = match step {
            Some(Step::Reply(reply)) => reply,
            Some(Step::Respond(respond)) => respond(request.history),
            Some(Step::Fail(error)) => return Err(error),
            None => match &self.fallback {
                Some(call) => Reply::ToolCalls(vec![call.clone()]),
                None => return Err(AgentError::Provider("script exhausted".into())),
            },
        };

        Ok(Completion {
            reply,
            model: options.model.clone(),
            usage: None,
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        Ok(vec![ModelInfo {
            id: "scripted".into(),
            owned_by: None,
        }])
    }
}
