//! Inbound bot commands

use std::fmt;

/// Commands the router answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Report the invoking chat and topic identifiers
    GetId,
    /// Send the poll now
    Poll,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetId => "getid",
            Command::Poll => "poll",
        }
    }

    /// Parse a message text using the `/command[@botname] [args]` convention.
    ///
    /// The command token is matched exactly. A `@mention` suffix must name this bot
    /// (case-insensitive); when `bot_username` is unknown any mention is accepted.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Option<Self> {
        let token = text.split_whitespace().next()?;
        let token = token.strip_prefix('/')?;
        let (name, mention) = match token.split_once('@') {
            Some((name, mention)) => (name, Some(mention)),
            None => (token, None),
        };

        if let (Some(mention), Some(username)) = (mention, bot_username) {
            if !mention.eq_ignore_ascii_case(username) {
                return None;
            }
        }

        match name {
            "getid" => Some(Command::GetId),
            "poll" => Some(Command::Poll),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// A text message received from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    /// Whether the message was posted inside a forum topic
    pub in_topic: bool,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub text: Option<String>,
}

/// One command addressed to the bot, alive for the duration of its handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub chat_id: i64,
    pub thread_id: Option<i64>,
    pub in_topic: bool,
    pub message_id: i64,
    pub sender_id: Option<i64>,
    pub command: Command,
}

impl CommandInvocation {
    /// Build an invocation if the message text is a recognized command.
    pub fn from_message(message: &InboundMessage, bot_username: Option<&str>) -> Option<Self> {
        let command = Command::parse(message.text.as_deref()?, bot_username)?;
        Some(Self {
            chat_id: message.chat_id,
            thread_id: message.thread_id,
            in_topic: message.in_topic,
            message_id: message.message_id,
            sender_id: message.sender_id,
            command,
        })
    }
}
