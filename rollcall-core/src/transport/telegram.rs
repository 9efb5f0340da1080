//! Telegram transport: sendPoll/sendMessage via Bot API and inbound commands via getUpdates.

use crate::models::{CommandInvocation, DestinationRef, InboundMessage, PollSpec};
use crate::transport::{Identity, PollTransport, TransportError, UpdateSource};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org/bot";
const LONG_POLL_TIMEOUT_SECS: u64 = 30;
const REQUEST_TIMEOUT_SECS: u64 = 20;

/// Bot API client. Token comes from the environment and is never logged.
pub struct TelegramClient {
    token: String,
    api_base: String,
    client: Client,
    /// Next offset for getUpdates (last_update_id + 1).
    next_offset: AtomicI64,
    closed: AtomicBool,
}

impl TelegramClient {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: TELEGRAM_API_BASE.to_string(),
            client: Client::new(),
            next_offset: AtomicI64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Point at a different Bot API server (e.g. a self-hosted one).
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }

        let url = format!("{}{}/{}", self.api_base, self.token, method);
        // The URL embeds the token, so it is stripped from any error we surface.
        let res = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        let status = res.status().as_u16();
        let text = res
            .text()
            .await
            .map_err(|e| TransportError::Network(e.without_url().to_string()))?;
        decode_response(status, &text)
    }
}

#[async_trait]
impl PollTransport for TelegramClient {
    async fn send_poll(
        &self,
        destination: &DestinationRef,
        poll: &PollSpec,
    ) -> Result<(), TransportError> {
        let body = poll_body(destination, poll);
        let _: IgnoredAny = self
            .call("sendPoll", &body, Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .await?;
        Ok(())
    }

    async fn get_self(&self) -> Result<Identity, TransportError> {
        let me: TelegramUser = self
            .call("getMe", &json!({}), Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .await?;
        Ok(Identity {
            id: me.id,
            username: me.username,
        })
    }

    async fn reply(
        &self,
        invocation: &CommandInvocation,
        text: &str,
    ) -> Result<(), TransportError> {
        let body = reply_body(invocation, text);
        let _: IgnoredAny = self
            .call("sendMessage", &body, Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .await?;
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

#[async_trait]
impl UpdateSource for TelegramClient {
    async fn next_updates(&self) -> Result<Vec<InboundMessage>, TransportError> {
        let offset = self.next_offset.load(Ordering::Relaxed);
        let body = json!({
            "offset": offset,
            "timeout": LONG_POLL_TIMEOUT_SECS,
            "allowed_updates": ["message"],
        });
        let raw: Vec<Value> = self
            .call(
                "getUpdates",
                &body,
                Duration::from_secs(LONG_POLL_TIMEOUT_SECS + REQUEST_TIMEOUT_SECS),
            )
            .await?;

        let (last, messages) = decode_updates(raw);
        if let Some(last) = last {
            self.next_offset.store(last + 1, Ordering::Relaxed);
        }
        Ok(messages)
    }
}

// --- Bot API payloads ---

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error_code: Option<i64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Deserialize)]
struct TelegramUser {
    id: i64,
    #[serde(default)]
    username: Option<String>,
}

/// `update_id` is read from the raw value in [`decode_updates`].
#[derive(Deserialize)]
struct TelegramUpdate {
    #[serde(default)]
    message: Option<TelegramMessage>,
}

#[derive(Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
    #[serde(default)]
    message_thread_id: Option<i64>,
    #[serde(default)]
    is_topic_message: bool,
    #[serde(default)]
    from: Option<TelegramUser>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct TelegramChat {
    id: i64,
}

impl From<TelegramMessage> for InboundMessage {
    fn from(msg: TelegramMessage) -> Self {
        Self {
            chat_id: msg.chat.id,
            thread_id: msg.message_thread_id,
            in_topic: msg.is_topic_message,
            message_id: msg.message_id,
            sender_id: msg.from.map(|u| u.id),
            text: msg.text,
        }
    }
}

/// Decode a Bot API envelope. Non-JSON bodies fall back to the HTTP status.
fn decode_response<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, TransportError> {
    let envelope: ApiResponse<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if (200..300).contains(&status) => {
            return Err(TransportError::Malformed(e.to_string()));
        }
        Err(_) => {
            return Err(TransportError::Api {
                code: i64::from(status),
                description: body.trim().to_string(),
            });
        }
    };

    if envelope.ok {
        return envelope
            .result
            .ok_or_else(|| TransportError::Malformed("missing result".to_string()));
    }

    if let Some(retry_after) = envelope.parameters.and_then(|p| p.retry_after) {
        return Err(TransportError::RateLimited { retry_after });
    }
    Err(TransportError::Api {
        code: envelope.error_code.unwrap_or(i64::from(status)),
        description: envelope
            .description
            .unwrap_or_else(|| "no description".to_string()),
    })
}

/// Decode a getUpdates batch one update at a time.
///
/// Returns the highest `update_id` seen, including updates that failed to
/// decode, so the next offset moves past them instead of refetching them.
fn decode_updates(raw: Vec<Value>) -> (Option<i64>, Vec<InboundMessage>) {
    let mut last = None;
    let mut messages = Vec::new();

    for value in raw {
        let update_id = value.get("update_id").and_then(Value::as_i64);
        last = last.max(update_id);

        match serde_json::from_value::<TelegramUpdate>(value) {
            Ok(update) => messages.extend(update.message.map(InboundMessage::from)),
            Err(e) => tracing::warn!(
                update_id = ?update_id,
                error = %e,
                "Skipping update that could not be decoded"
            ),
        }
    }
    (last, messages)
}

fn poll_body(destination: &DestinationRef, poll: &PollSpec) -> Value {
    let options: Vec<Value> = poll
        .options()
        .iter()
        .map(|text| json!({ "text": text }))
        .collect();
    let mut body = json!({
        "chat_id": destination.chat_id(),
        "question": poll.question(),
        "options": options,
        "is_anonymous": poll.anonymous(),
        "allows_multiple_answers": poll.allows_multiple_answers(),
    });
    if let Some(thread_id) = destination.thread_id() {
        body["message_thread_id"] = json!(thread_id);
    }
    body
}

fn reply_body(invocation: &CommandInvocation, text: &str) -> Value {
    let mut body = json!({
        "chat_id": invocation.chat_id,
        "text": text,
        "reply_parameters": {
            "message_id": invocation.message_id,
            "allow_sending_without_reply": true,
        },
    });
    // Only forum topics accept message_thread_id; reply threads in plain groups reject it.
    if let (true, Some(thread_id)) = (invocation.in_topic, invocation.thread_id) {
        body["message_thread_id"] = json!(thread_id);
    }
    body
}
