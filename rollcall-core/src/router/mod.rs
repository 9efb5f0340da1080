//! Command router: answers `/getid` and `/poll` in the chat that sent them
//!
//! Handler failures, including panics, are turned into an error reply and the
//! router keeps serving.

use crate::dispatch::{panic_message, DispatchResult, DispatchSource, PollAction};
use crate::models::{Command, CommandInvocation, InboundMessage};
use crate::services::logging;
use crate::transport::{PollTransport, UpdateSource};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Reply sent after a successful `/poll`
pub const POLL_SENT_REPLY: &str = "Poll sent!";

const BACKOFF_MIN: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(5);
const BACKOFF_FACTOR: f64 = 1.3;

/// Routes inbound commands to their handlers and replies once per command.
#[derive(Clone)]
pub struct CommandRouter {
    action: PollAction,
    transport: Arc<dyn PollTransport>,
    bot_username: Option<String>,
}

impl CommandRouter {
    pub fn new(action: PollAction, transport: Arc<dyn PollTransport>) -> Self {
        Self {
            action,
            transport,
            bot_username: None,
        }
    }

    /// Only accept `/command@name` mentions addressed to this username
    pub fn with_bot_username(mut self, username: Option<String>) -> Self {
        self.bot_username = username;
        self
    }

    /// Produce the reply text for one invocation.
    pub async fn handle(&self, invocation: &CommandInvocation) -> String {
        match invocation.command {
            Command::GetId => getid_reply(invocation),
            Command::Poll => match self.action.dispatch(DispatchSource::Command).await {
                DispatchResult::Ok => POLL_SENT_REPLY.to_string(),
                DispatchResult::Failed(reason) => format!("Error: {}", reason),
            },
        }
    }

    /// Handle one inbound message. Returns false when it carried no command for us.
    pub async fn route(&self, message: &InboundMessage) -> bool {
        let Some(invocation) =
            CommandInvocation::from_message(message, self.bot_username.as_deref())
        else {
            return false;
        };

        let reply = match AssertUnwindSafe(self.handle(&invocation))
            .catch_unwind()
            .await
        {
            Ok(reply) => reply,
            Err(panic) => {
                let reason = panic_message(panic.as_ref());
                tracing::error!(
                    command = %invocation.command,
                    error = reason.as_str(),
                    "Command handler panicked"
                );
                format!("Error: {}", reason)
            }
        };

        match self.transport.reply(&invocation, &reply).await {
            Ok(()) => logging::log_command(&invocation, "replied"),
            Err(e) => {
                tracing::error!(
                    command = %invocation.command,
                    chat_id = invocation.chat_id,
                    error = %e,
                    "Failed to send command reply"
                );
                logging::log_command(&invocation, "reply_failed");
            }
        }
        true
    }

    /// Long-poll `source` and route every message until `shutdown` flips to true.
    ///
    /// Fetch errors are logged and retried with backoff; they never end the loop.
    pub async fn listen(&self, source: Arc<dyn UpdateSource>, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = BACKOFF_MIN;
        tracing::info!("Listening for commands");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let batch = tokio::select! {
                batch = source.next_updates() => batch,
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            };

            match batch {
                Ok(messages) => {
                    backoff = BACKOFF_MIN;
                    for message in &messages {
                        self.route(message).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        retry_in_ms = backoff.as_millis() as u64,
                        "Failed to fetch updates"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {}
                    }
                    backoff = backoff.mul_f64(BACKOFF_FACTOR).min(BACKOFF_MAX);
                }
            }
        }

        tracing::info!("Command listener stopped");
    }
}

fn getid_reply(invocation: &CommandInvocation) -> String {
    let topic = match invocation.thread_id {
        Some(thread_id) => thread_id.to_string(),
        None => "none (regular group)".to_string(),
    };
    format!("Chat ID: {}\nTopic ID: {}", invocation.chat_id, topic)
}
