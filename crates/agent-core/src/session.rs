//! Session Management
//!
//! An [`AgentSession`] is a running agent identity bound to a transport
//! connection. One task pulls inbound messages off the transport into a
//! queue; a second task drains the queue and drives the dispatch loop, one
//! exchange at a time, keeping a conversation history per peer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{AgentError, Result};
use crate::message::Conversation;
use crate::reasoning::Agent;
use crate::transport::{Credentials, InboundMessage, OutboundMessage, Transport};

const QUEUE_CAPACITY: usize = 32;

/// Peer name used for histories fed from a local console
pub const CONSOLE_PEER: &str = "console";

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Running,
    Stopped,
}

/// Typed-in commands that end an interactive loop
pub fn is_exit_command(line: &str) -> bool {
    matches!(line, "exit" | "quit" | "/exit" | "/quit")
}

type Histories = Arc<Mutex<HashMap<String, Conversation>>>;

/// The tool-using agent bound to a transport identity
pub struct AgentSession {
    id: SessionId,
    credentials: Credentials,
    peer: Option<String>,
    agent: Arc<Agent>,
    transport: Arc<dyn Transport>,
    state: Arc<watch::Sender<SessionState>>,
    histories: Histories,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    connected: bool,
    stopped: bool,
    shutdown_grace: Duration,
}

impl AgentSession {
    pub fn new(credentials: Credentials, agent: Arc<Agent>, transport: Arc<dyn Transport>) -> Self {
        let (state, _) = watch::channel(SessionState::Created);
        Self {
            id: SessionId::new(),
            credentials,
            peer: None,
            agent,
            transport,
            state: Arc::new(state),
            histories: Arc::new(Mutex::new(HashMap::new())),
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
            connected: false,
            stopped: false,
            shutdown_grace: Duration::from_secs(5),
        }
    }

    /// Only accept messages from this address
    pub fn with_peer(mut self, peer: impl Into<String>) -> Self {
        self.peer = Some(peer.into());
        self
    }

    /// How long `stop` waits for in-flight work before aborting it
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn address(&self) -> &str {
        &self.credentials.address
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Watch lifecycle changes, including a transport closure
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Snapshot of the history kept for `peer`
    pub async fn history(&self, peer: &str) -> Option<Conversation> {
        self.histories.lock().await.get(peer).cloned()
    }

    /// Log in and start serving inbound messages.
    pub async fn start(&mut self) -> Result<()> {
        match self.state() {
            SessionState::Created => {}
            SessionState::Running => return Err(AgentError::Session("session is already running".into())),
            SessionState::Stopped => return Err(AgentError::Session("session was stopped".into())),
        }

        let inbound = self.transport.connect(&self.credentials).await.map_err(|e| match e {
            AgentError::Connection(_) => e,
            other => AgentError::Connection(other.to_string()),
        })?;
        self.connected = true;
        self.state.send_replace(SessionState::Running);

        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        self.tasks.push(tokio::spawn(receive(
            inbound,
            queue_tx,
            self.peer.clone(),
            self.cancel.clone(),
        )));
        self.tasks.push(tokio::spawn(drive(
            queue_rx,
            Driver {
                address: self.credentials.address.clone(),
                agent: self.agent.clone(),
                transport: self.transport.clone(),
                histories: self.histories.clone(),
                state: self.state.clone(),
                cancel: self.cancel.clone(),
            },
        )));

        tracing::info!(session = %self.id, address = %self.credentials.address, "Agent session started");
        Ok(())
    }

    /// Cancel in-flight work, log out and release the connection.
    ///
    /// Safe to call any number of times, whether or not `start` succeeded.
    pub async fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            let abort = task.abort_handle();
            if tokio::time::timeout(self.shutdown_grace, task).await.is_err() {
                tracing::warn!(session = %self.id, "Task did not stop within grace period; aborting");
                abort.abort();
            }
        }

        if self.connected {
            if let Err(e) = self.transport.disconnect(&self.credentials.address).await {
                tracing::warn!(session = %self.id, error = %e, "Disconnect failed");
            }
            self.connected = false;
        }

        self.state.send_replace(SessionState::Stopped);
        tracing::info!(session = %self.id, "Agent session stopped");
    }

    /// Read messages from `input` one line at a time, answer each on
    /// `output`, and return on an exit command, end of input or `stop`.
    pub async fn run_interactive<R, W>(&mut self, input: R, mut output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        if self.stopped {
            return Err(AgentError::Session("session was stopped".into()));
        }
        let peer = self.peer.clone().unwrap_or_else(|| CONSOLE_PEER.to_string());
        let mut lines = input.lines();

        loop {
            let line = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                line = lines.next_line() => line?,
            };
            let Some(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if is_exit_command(line) {
                break;
            }

            let Some(reply) = exchange(&self.agent, &self.histories, &peer, line, &self.cancel).await else {
                break;
            };
            output.write_all(reply.as_bytes()).await?;
            output.write_all(b"\n").await?;
            output.flush().await?;
        }

        Ok(())
    }
}

/// Run one exchange against the peer's history. `None` means cancelled.
async fn exchange(
    agent: &Agent,
    histories: &Mutex<HashMap<String, Conversation>>,
    peer: &str,
    text: &str,
    cancel: &CancellationToken,
) -> Option<String> {
    let mut histories = histories.lock().await;
    let history = histories.entry(peer.to_string()).or_default();

    match agent.handle_message_cancellable(history, text, cancel).await {
        Ok(reply) => Some(reply),
        Err(AgentError::Cancelled) => None,
        Err(e) => {
            tracing::error!(%peer, error = %e, "Exchange aborted");
            Some(e.user_message())
        }
    }
}

async fn receive(
    mut inbound: mpsc::Receiver<InboundMessage>,
    queue: mpsc::Sender<InboundMessage>,
    peer: Option<String>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = inbound.recv() => message,
        };
        let Some(message) = message else {
            tracing::info!("Transport closed the connection");
            break;
        };
        if peer.as_ref().is_some_and(|p| p != &message.sender) {
            tracing::warn!(sender = %message.sender, "Ignoring message from unexpected sender");
            continue;
        }
        if queue.send(message).await.is_err() {
            break;
        }
    }
}

struct Driver {
    address: String,
    agent: Arc<Agent>,
    transport: Arc<dyn Transport>,
    histories: Histories,
    state: Arc<watch::Sender<SessionState>>,
    cancel: CancellationToken,
}

async fn drive(mut queue: mpsc::Receiver<InboundMessage>, driver: Driver) {
    loop {
        let message = tokio::select! {
            biased;
            () = driver.cancel.cancelled() => return,
            message = queue.recv() => message,
        };
        let Some(message) = message else { break };

        tracing::debug!(peer = %message.sender, "Handling message");
        let Some(reply) = exchange(
            &driver.agent,
            &driver.histories,
            &message.sender,
            &message.text,
            &driver.cancel,
        )
        .await
        else {
            return;
        };

        let outbound = OutboundMessage {
            from: driver.address.clone(),
            to: message.sender,
            text: reply,
        };
        if let Err(e) = driver.transport.send(&outbound).await {
            tracing::warn!(peer = %outbound.to, error = %e, "Could not deliver reply");
        }
    }

    // queue closed without a cancel: the transport went away
    driver.state.send_replace(SessionState::Stopped);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reasoning::AgentBuilder;
    use crate::testing::ScriptedProvider;
    use crate::transport::LocalTransport;

    fn agent(provider: ScriptedProvider) -> Arc<Agent> {
        Arc::new(AgentBuilder::new().provider(Arc::new(provider)).build().unwrap())
    }

    fn transport() -> Arc<LocalTransport> {
        let transport = Arc::new(LocalTransport::new());
        transport.register_account(&Credentials::new("bot@localhost", "secret"));
        transport.register_account(&Credentials::new("user@localhost", "secret"));
        transport
    }

    #[tokio::test]
    async fn start_with_bad_credentials_fails() {
        let mut session = AgentSession::new(
            Credentials::new("bot@localhost", "wrong"),
            agent(ScriptedProvider::new()),
            transport(),
        );

        let err = session.start().await.unwrap_err();
        assert!(matches!(err, AgentError::Connection(_)));
        assert_eq!(session.state(), SessionState::Created);

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let transport = transport();
        let mut session = AgentSession::new(
            Credentials::new("bot@localhost", "secret"),
            agent(ScriptedProvider::new()),
            transport.clone(),
        );
        session.start().await.unwrap();
        assert_eq!(session.state(), SessionState::Running);

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!transport.is_connected("bot@localhost"));
    }

    #[tokio::test]
    async fn replies_go_back_to_the_sender() {
        let transport = transport();
        let mut session = AgentSession::new(
            Credentials::new("bot@localhost", "secret"),
            agent(ScriptedProvider::new().then_final("pong")),
            transport.clone(),
        );
        session.start().await.unwrap();
        let mut user_inbox = transport
            .connect(&Credentials::new("user@localhost", "secret"))
            .await
            .unwrap();

        transport
            .send(&OutboundMessage {
                from: "user@localhost".into(),
                to: "bot@localhost".into(),
                text: "ping".into(),
            })
            .await
            .unwrap();

        let reply = user_inbox.recv().await.unwrap();
        assert_eq!(reply.sender, "bot@localhost");
        assert_eq!(reply.text, "pong");
        assert_eq!(session.history("user@localhost").await.unwrap().len(), 2);

        session.stop().await;
    }

    #[tokio::test]
    async fn transport_closure_stops_the_session() {
        let transport = transport();
        let mut session = AgentSession::new(
            Credentials::new("bot@localhost", "secret"),
            agent(ScriptedProvider::new()),
            transport.clone(),
        );
        session.start().await.unwrap();
        let mut state = session.subscribe();

        transport.disconnect("bot@localhost").await.unwrap();
        state.wait_for(|s| *s == SessionState::Stopped).await.unwrap();

        session.stop().await;
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn interactive_loop_stops_at_exit() {
        let mut session = AgentSession::new(
            Credentials::new("bot@localhost", "secret"),
            agent(ScriptedProvider::new().then_final("first").then_final("second")),
            transport(),
        );
        let input: &[u8] = b"hello\n\nagain\nexit\nnever read\n";
        let mut output = Vec::new();

        session.run_interactive(input, &mut output).await.unwrap();

        assert_eq!(String::from_utf8(output).unwrap(), "first\nsecond\n");
        assert_eq!(session.history(CONSOLE_PEER).await.unwrap().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_a_pending_provider_call() {
        let transport = transport();
        let provider = Arc::new(ScriptedProvider::new().with_delay(Duration::from_secs(600)).then_final("late"));
        let agent = AgentBuilder::new()
            .provider(provider.clone())
            .provider_timeout(Duration::from_secs(900))
            .build()
            .unwrap();
        let mut session = AgentSession::new(Credentials::new("bot@localhost", "secret"), Arc::new(agent), transport.clone())
            .with_shutdown_grace(Duration::from_secs(5));
        session.start().await.unwrap();
        let _user_inbox = transport
            .connect(&Credentials::new("user@localhost", "secret"))
            .await
            .unwrap();

        transport
            .send(&OutboundMessage {
                from: "user@localhost".into(),
                to: "bot@localhost".into(),
                text: "slow question".into(),
            })
            .await
            .unwrap();
        while provider.calls() == 0 {
            tokio::task::yield_now().await;
        }

        let stopping = tokio::time::Instant::now();
        session.stop().await;

        assert!(stopping.elapsed() < Duration::from_secs(5));
        assert_eq!(session.state(), SessionState::Stopped);
        assert!(!transport.is_connected("bot@localhost"));
        // only the user turn; no half-finished exchange
        assert_eq!(session.history("user@localhost").await.unwrap().len(), 1);
    }
}
