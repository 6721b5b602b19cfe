//! Messaging Transport
//!
//! The channel sessions talk over. Identities are addresses such as
//! `tool_assistant@localhost`; a connection yields a receiver of inbound
//! messages and closes when the transport disconnects the address.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::{AgentError, Result};

const MAILBOX_CAPACITY: usize = 64;

/// Login identity: address plus secret
#[derive(Clone)]
pub struct Credentials {
    pub address: String,
    secret: SecretString,
}

impl Credentials {
    pub fn new(address: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            secret: SecretString::from(secret.into()),
        }
    }

    pub fn secret(&self) -> &SecretString {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("address", &self.address)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// A message delivered to a connected identity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub sender: String,
    pub text: String,
}

/// A message to deliver
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub from: String,
    pub to: String,
    pub text: String,
}

/// Send/receive channel with login
#[async_trait]
pub trait Transport: Send + Sync {
    /// Authenticate and open the inbound stream for `credentials.address`.
    ///
    /// Fails with [`AgentError::Connection`] on bad credentials or handshake failure.
    async fn connect(&self, credentials: &Credentials) -> Result<mpsc::Receiver<InboundMessage>>;

    /// Deliver a message to a connected recipient
    async fn send(&self, message: &OutboundMessage) -> Result<()>;

    /// Close the connection for `address`. Closing an address that is not
    /// connected is not an error.
    async fn disconnect(&self, address: &str) -> Result<()>;
}

/// In-process message server.
///
/// Accounts are provisioned up front; each connected address gets a bounded
/// mailbox. Several sessions can share one instance.
#[derive(Default)]
pub struct LocalTransport {
    accounts: Mutex<HashMap<String, SecretString>>,
    mailboxes: Mutex<HashMap<String, mpsc::Sender<InboundMessage>>>,
}

impl LocalTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace an account
    pub fn register_account(&self, credentials: &Credentials) {
        tracing::debug!(address = %credentials.address, "Provisioned account");
        self.accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(credentials.address.clone(), credentials.secret.clone());
    }

    pub fn is_connected(&self, address: &str) -> bool {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner).contains_key(address)
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn connect(&self, credentials: &Credentials) -> Result<mpsc::Receiver<InboundMessage>> {
        let authenticated = self
            .accounts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&credentials.address)
            .is_some_and(|secret| secret.expose_secret() == credentials.secret.expose_secret());
        if !authenticated {
            return Err(AgentError::Connection(format!(
                "authentication failed for {}",
                credentials.address
            )));
        }

        let mut mailboxes = self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner);
        if mailboxes.contains_key(&credentials.address) {
            return Err(AgentError::Connection(format!("{} is already connected", credentials.address)));
        }

        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        mailboxes.insert(credentials.address.clone(), tx);
        tracing::info!(address = %credentials.address, "Connected");
        Ok(rx)
    }

    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        let mailbox = self
            .mailboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.to)
            .cloned()
            .ok_or_else(|| AgentError::Transport(format!("{} is not connected", message.to)))?;

        mailbox
            .send(InboundMessage {
                sender: message.from.clone(),
                text: message.text.clone(),
            })
            .await
            .map_err(|_| AgentError::Transport(format!("{} closed its connection", message.to)))
    }

    async fn disconnect(&self, address: &str) -> Result<()> {
        if self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner).remove(address).is_some() {
            tracing::info!(%address, "Disconnected");
        }
        Ok(())
    }
}
