//! Messaging transport: outbound poll/reply delivery and inbound updates
//!
//! The core only depends on the two traits here; [`TelegramClient`] is the
//! Bot API implementation used by the binary.

mod telegram;

pub use telegram::TelegramClient;

use crate::models::{CommandInvocation, DestinationRef, InboundMessage, PollSpec};
use async_trait::async_trait;
use thiserror::Error;

/// Transport-level failures. Callers decide whether they are fatal.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Bot API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Rate limited, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Transport session is closed")]
    Closed,
}

/// The bot's own account, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: i64,
    pub username: Option<String>,
}

impl Identity {
    pub fn display_name(&self) -> String {
        match &self.username {
            Some(username) => format!("@{}", username),
            None => format!("#{}", self.id),
        }
    }
}

/// Outbound side of the transport.
#[async_trait]
pub trait PollTransport: Send + Sync {
    /// Send one poll. No retries; the caller owns that decision.
    async fn send_poll(
        &self,
        destination: &DestinationRef,
        poll: &PollSpec,
    ) -> Result<(), TransportError>;

    /// Identity check used at startup to prove the credentials work.
    async fn get_self(&self) -> Result<Identity, TransportError>;

    /// Reply to the message that carried `invocation`.
    async fn reply(&self, invocation: &CommandInvocation, text: &str)
        -> Result<(), TransportError>;

    /// Release session resources. Calls after this fail with [`TransportError::Closed`].
    async fn close(&self);
}

/// Inbound side of the transport.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Wait for the next batch of inbound messages. An empty batch means the wait timed out.
    async fn next_updates(&self) -> Result<Vec<InboundMessage>, TransportError>;
}
