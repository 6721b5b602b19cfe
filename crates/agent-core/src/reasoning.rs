//! Dispatch Loop
//!
//! Alternates between querying the provider and executing the tools it asks
//! for, until the provider produces a final answer or the round-trip bound is
//! hit.
//!
//! ```text
//! AwaitingUserInput ─▶ QueryingProvider ─▶ Done
//!                           ▲     │
//!                           │     ▼
//!                        ExecutingTools
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{AgentError, Result};
use crate::executor::{DEFAULT_TOOL_TIMEOUT, ToolExecutor};
use crate::message::{Conversation, Turn};
use crate::provider::{Completion, CompletionRequest, GenerationOptions, LlmProvider, Reply};
use crate::tool::{ToolCall, ToolRegistry};

/// Default bound on provider round-trips per user message
pub const DEFAULT_MAX_ITERATIONS: usize = 8;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub system_prompt: String,

    /// Maximum provider round-trips per user message
    pub max_iterations: usize,

    pub generation: GenerationOptions,

    /// Bound on a single provider call
    pub provider_timeout: Duration,

    /// Bound on a single tool invocation
    pub tool_timeout: Duration,

    /// Spell the tool list and the fenced call format out in the system
    /// prompt, for models without native tool calling
    pub inject_tool_descriptions: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.into(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            generation: GenerationOptions::default(),
            provider_timeout: Duration::from_secs(120),
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            inject_tool_descriptions: false,
        }
    }
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant with access to tools. \
Use them when appropriate to help users. If no tool is relevant, respond directly in plain text.";

/// Where the dispatch loop currently is
#[derive(Debug)]
enum Phase {
    QueryingProvider,
    ExecutingTools(Vec<ToolCall>),
    Done(String),
}

/// The main Agent struct
pub struct Agent {
    provider: Arc<dyn LlmProvider>,
    executor: ToolExecutor,
    config: AgentConfig,
}

impl Agent {
    /// Create a new agent
    pub fn new(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>, config: AgentConfig) -> Self {
        let executor = ToolExecutor::new(tools).with_timeout(config.tool_timeout);
        Self {
            provider,
            executor,
            config,
        }
    }

    /// Create with default configuration
    pub fn with_defaults(provider: Arc<dyn LlmProvider>, tools: Arc<ToolRegistry>) -> Self {
        Self::new(provider, tools, AgentConfig::default())
    }

    fn build_system_prompt(&self) -> String {
        let mut prompt = self.config.system_prompt.clone();
        let tools = self.executor.registry();

        if self.config.inject_tool_descriptions && !tools.is_empty() {
            prompt.push_str("\n\n");
            prompt.push_str(&tools.generate_prompt_section());
        }

        prompt
    }

    fn options(&self) -> GenerationOptions {
        let mut options = self.config.generation.clone();
        options.system_prompt = Some(self.build_system_prompt());
        options
    }

    /// Answer one user message, appending every turn to `history`.
    ///
    /// Provider failures and the iteration bound become a degraded answer,
    /// which is appended as the assistant's final turn. Tool faults and
    /// cancellation are returned as errors.
    pub async fn handle_message(&self, history: &mut Conversation, user_text: &str) -> Result<String> {
        self.handle_message_cancellable(history, user_text, &CancellationToken::new())
            .await
    }

    /// [`Agent::handle_message`] that gives up as soon as `cancel` fires.
    pub async fn handle_message_cancellable(
        &self,
        history: &mut Conversation,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        match self.dispatch(history, user_text, cancel).await {
            Ok(text) => Ok(text),
            Err(e) if e.is_recoverable() => {
                tracing::warn!(error = %e, "Exchange degraded");
                let text = e.user_message();
                history.push(Turn::assistant(&text));
                Ok(text)
            }
            Err(e) => Err(e),
        }
    }

    /// Run the dispatch loop and return its raw outcome.
    pub async fn dispatch(
        &self,
        history: &mut Conversation,
        user_text: &str,
        cancel: &CancellationToken,
    ) -> Result<String> {
        history.push(Turn::user(user_text));

        let options = self.options();
        let mut round_trips = 0;
        let mut phase = Phase::QueryingProvider;

        loop {
            phase = match phase {
                Phase::QueryingProvider => {
                    if round_trips == self.config.max_iterations {
                        return Err(AgentError::MaxIterations(self.config.max_iterations));
                    }
                    round_trips += 1;
                    tracing::debug!(iteration = round_trips, "Querying provider");

                    let completion = self.query(history, &options, cancel).await?;
                    match completion.reply {
                        Reply::Final(text) => Phase::Done(text),
                        Reply::ToolCalls(calls) if calls.is_empty() => {
                            return Err(AgentError::Provider("empty tool call list".into()));
                        }
                        Reply::ToolCalls(calls) => Phase::ExecutingTools(calls),
                    }
                }
                Phase::ExecutingTools(calls) => {
                    for call in calls {
                        let result = tokio::select! {
                            biased;
                            () = cancel.cancelled() => return Err(AgentError::Cancelled),
                            result = self.executor.execute(&call) => result?,
                        };
                        tracing::debug!(tool = %call.name, success = result.is_success(), "Tool finished");
                        history.push_tool_exchange(call, result);
                    }
                    Phase::QueryingProvider
                }
                Phase::Done(text) => {
                    history.push(Turn::assistant(&text));
                    return Ok(text);
                }
            };
        }
    }

    async fn query(
        &self,
        history: &Conversation,
        options: &GenerationOptions,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        let request = CompletionRequest {
            history: history.turns(),
            tools: self.executor.registry().list_specs(),
        };
        let timeout = self.config.provider_timeout;

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AgentError::Cancelled),
            completion = tokio::time::timeout(timeout, self.provider.complete(&request, options)) => {
                completion.map_err(|_| AgentError::ProviderTimeout(timeout.as_secs()))?
            }
        }
    }

    /// Run with a simple string input (creates temporary conversation)
    pub async fn ask(&self, question: &str) -> Result<String> {
        let mut conversation = Conversation::new();
        self.handle_message(&mut conversation, question).await
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Get configuration
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    provider: Option<Arc<dyn LlmProvider>>,
    tools: Arc<ToolRegistry>,
    config: AgentConfig,
}

impl Default for AgentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentBuilder {
    pub fn new() -> Self {
        Self {
            provider: None,
            tools: Arc::new(ToolRegistry::new()),
            config: AgentConfig::default(),
        }
    }

    pub fn provider(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = prompt.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.generation.temperature = temp;
        self
    }

    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub fn provider_timeout(mut self, timeout: Duration) -> Self {
        self.config.provider_timeout = timeout;
        self
    }

    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    pub fn inject_tool_descriptions(mut self, inject: bool) -> Self {
        self.config.inject_tool_descriptions = inject;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| AgentError::Config("Provider is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(AgentError::Config("max_iterations must be at least 1".into()));
        }

        Ok(Agent::new(provider, self.tools, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;
    use crate::tool::{ParamType, ParameterSchema, ToolError, ToolSchema, ToolSpec};

    fn registry() -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        for name in ["a", "b"] {
            let schema = ToolSchema::new(name, "Returns its own name");
            let output = format!("{name}-out");
            registry
                .register(ToolSpec::from_fn(schema, move |_| Ok(output.clone())))
                .unwrap();
        }
        let fault = ToolSchema::new("broken", "Always faults")
            .param(ParameterSchema::optional("x", ParamType::String, "unused"));
        registry
            .register(ToolSpec::from_fn(fault, |_| Err(ToolError::Fault("bug".into()))))
            .unwrap();
        Arc::new(registry)
    }

    fn agent(provider: Arc<ScriptedProvider>, max_iterations: usize) -> Agent {
        AgentBuilder::new()
            .provider(provider)
            .tools(registry())
            .max_iterations(max_iterations)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn final_answer_round_trip() {
        let provider = Arc::new(ScriptedProvider::new().then_final("X"));
        let agent = agent(provider.clone(), 8);
        let mut history = Conversation::new();

        let answer = agent.handle_message(&mut history, "hello").await.unwrap();

        assert_eq!(answer, "X");
        assert_eq!(history.len(), 2);
        assert!(matches!(history.turns()[0], Turn::User(_)));
        assert!(matches!(history.turns()[1], Turn::AssistantFinal(_)));
        assert_eq!(history.turns()[0].text(), Some("hello"));
        assert_eq!(history.turns()[1].text(), Some("X"));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn tool_calls_are_interleaved_with_results() {
        let provider = Arc::new(
            ScriptedProvider::new()
                .then_tools(vec![ToolCall::new("a"), ToolCall::new("b")])
                .then_final("done"),
        );
        let agent = agent(provider, 8);
        let mut history = Conversation::new();

        agent.handle_message(&mut history, "go").await.unwrap();

        let shape: Vec<String> = history
            .turns()
            .iter()
            .map(|t| match t {
                Turn::User(_) => "user".to_string(),
                Turn::ToolCall(c) => format!("call:{}", c.name),
                Turn::ToolResult(r) => format!("result:{}", r.output()),
                Turn::AssistantFinal(m) => format!("final:{}", m.content),
            })
            .collect();
        assert_eq!(shape, vec!["user", "call:a", "result:a-out", "call:b", "result:b-out", "final:done"]);
    }

    #[tokio::test]
    async fn iteration_bound_is_exact() {
        let provider = Arc::new(ScriptedProvider::new().always_tool(ToolCall::new("a")));
        let agent = agent(provider.clone(), 3);
        let mut history = Conversation::new();

        let err = agent
            .dispatch(&mut history, "loop", &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::MaxIterations(3)));
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn iteration_bound_degrades_to_text() {
        let provider = Arc::new(ScriptedProvider::new().always_tool(ToolCall::new("a")));
        let agent = agent(provider, 2);
        let mut history = Conversation::new();

        let answer = agent.handle_message(&mut history, "loop").await.unwrap();

        assert_eq!(answer, "I was unable to complete that after 2 tool calls.");
        assert_eq!(history.last().and_then(Turn::text), Some(answer.as_str()));
    }

    #[tokio::test]
    async fn tool_fault_aborts_the_exchange() {
        let provider = Arc::new(ScriptedProvider::new().then_tools(vec![ToolCall::new("broken")]));
        let agent = agent(provider, 8);
        let mut history = Conversation::new();

        let err = agent.handle_message(&mut history, "break it").await.unwrap_err();

        assert!(matches!(err, AgentError::ToolFault { .. }));
        // the faulted call is not left dangling
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn provider_error_degrades_to_text() {
        let provider = Arc::new(ScriptedProvider::new().then_error(AgentError::ProviderUnavailable("down".into())));
        let agent = agent(provider, 8);
        let mut history = Conversation::new();

        let answer = agent.handle_message(&mut history, "hi").await.unwrap();

        assert!(answer.starts_with("Sorry"));
        assert_eq!(history.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn provider_timeout_degrades_to_text() {
        let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_secs(600)).then_final("late"));
        let agent = AgentBuilder::new()
            .provider(provider)
            .provider_timeout(Duration::from_secs(10))
            .build()
            .unwrap();

        let answer = agent.ask("hi").await.unwrap();

        assert_eq!(answer, "Sorry, the language model did not answer within 10 seconds.");
    }

    #[tokio::test]
    async fn cancellation_leaves_no_partial_pairs() {
        let provider = Arc::new(ScriptedProvider::new().then_final("never"));
        let agent = agent(provider, 8);
        let mut history = Conversation::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent
            .handle_message_cancellable(&mut history, "hi", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Cancelled));
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn history_carries_over_between_messages() {
        let provider = Arc::new(ScriptedProvider::new().then_final("one").then_final("two"));
        let agent = agent(provider.clone(), 8);
        let mut history = Conversation::new();

        agent.handle_message(&mut history, "first").await.unwrap();
        agent.handle_message(&mut history, "second").await.unwrap();

        assert_eq!(history.len(), 4);
        assert_eq!(provider.history_lengths(), vec![1, 3]);
    }

    #[tokio::test]
    async fn tool_descriptions_are_injected_on_request() {
        let provider = Arc::new(ScriptedProvider::new().then_final("plain").then_final("fenced"));
        let plain = agent(provider.clone(), 8);
        let fenced = AgentBuilder::new()
            .provider(provider.clone())
            .tools(registry())
            .system_prompt("Be brief.")
            .inject_tool_descriptions(true)
            .build()
            .unwrap();

        plain.ask("hi").await.unwrap();
        fenced.ask("hi").await.unwrap();

        let prompts = provider.system_prompts();
        assert!(!prompts[0].contains("## Available Tools"));
        assert!(prompts[1].starts_with("Be brief.\n\n## Available Tools"));
        assert!(prompts[1].contains("```tool"));
        assert!(prompts[1].contains("### broken"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_a_batch_keeps_completed_pairs_only() {
        struct Stall;

        #[async_trait::async_trait]
        impl crate::tool::Tool for Stall {
            fn schema(&self) -> ToolSchema {
                ToolSchema::new("stall", "Never finishes in time")
            }

            async fn call(&self, _args: &crate::tool::Arguments) -> std::result::Result<String, ToolError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok("late".into())
            }
        }

        let mut tools = ToolRegistry::new();
        tools
            .register(ToolSpec::from_fn(ToolSchema::new("a", "Quick"), |_| Ok("a-out".into())))
            .unwrap();
        tools.register(ToolSpec::new(Stall)).unwrap();
        let provider = Arc::new(ScriptedProvider::new().then_tools(vec![ToolCall::new("a"), ToolCall::new("stall")]));
        let agent = AgentBuilder::new()
            .provider(provider)
            .tools(Arc::new(tools))
            .tool_timeout(Duration::from_secs(7200))
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let mut history = Conversation::new();
        let err = agent
            .handle_message_cancellable(&mut history, "go", &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AgentError::Cancelled));
        let shape: Vec<String> = history
            .turns()
            .iter()
            .map(|t| match t {
                Turn::User(_) => "user".to_string(),
                Turn::ToolCall(c) => format!("call:{}", c.name),
                Turn::ToolResult(r) => format!("result:{}", r.output()),
                Turn::AssistantFinal(_) => "final".to_string(),
            })
            .collect();
        assert_eq!(shape, vec!["user", "call:a", "result:a-out"]);
    }

    #[test]
    fn builder_requires_provider() {
        assert!(matches!(AgentBuilder::new().build(), Err(AgentError::Config(_))));
    }
}
