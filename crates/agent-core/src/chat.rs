//! Chat Client
//!
//! The human side of a conversation: logs in as its own identity, forwards
//! each typed line to a target agent and hands the agent's reply to a display
//! callback.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

use crate::error::{AgentError, Result};
use crate::session::{SessionState, is_exit_command};
use crate::transport::{Credentials, InboundMessage, OutboundMessage, Transport};

/// Interactive client for talking to an [`AgentSession`](crate::session::AgentSession)
pub struct ChatClient {
    credentials: Credentials,
    target: String,
    transport: Arc<dyn Transport>,
    inbox: Option<mpsc::Receiver<InboundMessage>>,
    state: SessionState,
    reply_timeout: Duration,
}

impl ChatClient {
    pub fn new(credentials: Credentials, target: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            credentials,
            target: target.into(),
            transport,
            inbox: None,
            state: SessionState::Created,
            reply_timeout: Duration::from_secs(300),
        }
    }

    /// How long to wait for the agent's reply to one message
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.state != SessionState::Created {
            return Err(AgentError::Session(format!("chat client is {:?}", self.state)));
        }
        let inbox = self.transport.connect(&self.credentials).await.map_err(|e| match e {
            AgentError::Connection(_) => e,
            other => AgentError::Connection(other.to_string()),
        })?;
        self.inbox = Some(inbox);
        self.state = SessionState::Running;
        tracing::info!(address = %self.credentials.address, target = %self.target, "Chat client started");
        Ok(())
    }

    /// Idempotent; safe before or after a failed `start`.
    pub async fn stop(&mut self) {
        if self.state == SessionState::Stopped {
            return;
        }
        if self.inbox.take().is_some() {
            if let Err(e) = self.transport.disconnect(&self.credentials.address).await {
                tracing::warn!(error = %e, "Disconnect failed");
            }
        }
        self.state = SessionState::Stopped;
        tracing::info!(address = %self.credentials.address, "Chat client stopped");
    }

    /// Send one message to the target and wait for its reply.
    pub async fn send_and_wait(&mut self, text: &str) -> Result<String> {
        let inbox = self
            .inbox
            .as_mut()
            .ok_or_else(|| AgentError::Session("chat client is not running".into()))?;

        // A reply that arrived after an earlier request timed out answers that
        // request, not this one.
        while let Ok(stale) = inbox.try_recv() {
            tracing::warn!(sender = %stale.sender, "Discarding late reply to an earlier message");
        }

        self.transport
            .send(&OutboundMessage {
                from: self.credentials.address.clone(),
                to: self.target.clone(),
                text: text.to_string(),
            })
            .await?;

        let deadline = tokio::time::Instant::now() + self.reply_timeout;
        loop {
            let message = tokio::time::timeout_at(deadline, inbox.recv())
                .await
                .map_err(|_| AgentError::Transport(format!("no reply from {} within {:?}", self.target, self.reply_timeout)))?
                .ok_or(AgentError::ConnectionClosed)?;

            if message.sender == self.target {
                return Ok(message.text);
            }
            tracing::warn!(sender = %message.sender, "Ignoring message from unexpected sender");
        }
    }

    /// Read lines from `input`, send each to the target and pass every reply
    /// to `display(reply, sender)`. Returns on an exit command, end of input
    /// or when the transport closes.
    pub async fn run_interactive<R, F>(&mut self, input: R, mut display: F) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        F: FnMut(&str, &str),
    {
        let mut lines = input.lines();

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_command(line) {
                break;
            }

            match self.send_and_wait(line).await {
                Ok(reply) => display(&reply, &self.target),
                Err(AgentError::ConnectionClosed) => {
                    tracing::warn!("Transport closed; leaving interactive chat");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "No reply");
                    display(&e.user_message(), &self.target);
                }
            }
        }

        Ok(())
    }
}
