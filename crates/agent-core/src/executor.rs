//! Tool Executor
//!
//! Turns a [`ToolCall`] into a [`ToolResult`]. Unknown tools, bad arguments,
//! domain failures and timeouts all come back as `Failure` results so the
//! model can react to them. Only a faulting tool (an explicit
//! [`ToolError::Fault`] or a panic) escapes as an error.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::error::{AgentError, Result};
use crate::tool::{ToolCall, ToolError, ToolRegistry, ToolResult};

/// Default bound on a single tool invocation
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);

/// Validates and runs tool calls against a registry
#[derive(Clone, Debug)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute one tool call.
    ///
    /// Returns `Err` only for [`AgentError::ToolFault`].
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult> {
        let id = call.id.clone();

        let spec = match self.registry.lookup(&call.name) {
            Ok(spec) => spec,
            Err(_) => {
                tracing::warn!(tool = %call.name, "Model requested an unknown tool");
                return Ok(ToolResult::failure(&call.name, format!("unknown tool: {}", call.name)).with_id(id));
            }
        };

        let args = match spec.schema.validate(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                tracing::debug!(tool = %call.name, error = %e, "Rejected tool arguments");
                return Ok(ToolResult::failure(&call.name, e.to_string()).with_id(id));
            }
        };

        tracing::debug!(tool = %call.name, "Executing tool");
        let invocation = AssertUnwindSafe(spec.implementation.call(&args)).catch_unwind();

        match tokio::time::timeout(self.timeout, invocation).await {
            Err(_) => {
                tracing::warn!(tool = %call.name, timeout = ?self.timeout, "Tool timed out");
                Ok(ToolResult::failure(&call.name, format!("timed out after {:?}", self.timeout)).with_id(id))
            }
            Ok(Err(panic)) => {
                let message = panic_message(panic.as_ref());
                tracing::error!(tool = %call.name, %message, "Tool panicked");
                Err(AgentError::ToolFault {
                    tool: call.name.clone(),
                    message,
                })
            }
            Ok(Ok(Err(ToolError::Fault(message)))) => {
                tracing::error!(tool = %call.name, %message, "Tool faulted");
                Err(AgentError::ToolFault {
                    tool: call.name.clone(),
                    message,
                })
            }
            Ok(Ok(Err(ToolError::Execution(message)))) => {
                tracing::debug!(tool = %call.name, %message, "Tool reported a failure");
                Ok(ToolResult::failure(&call.name, message).with_id(id))
            }
            Ok(Ok(Ok(output))) => Ok(ToolResult::success(&call.name, output).with_id(id)),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".into()
    }
}
