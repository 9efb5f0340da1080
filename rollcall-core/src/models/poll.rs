//! Poll content and delivery destination

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while building a [`PollSpec`] or [`DestinationRef`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollSpecError {
    #[error("Poll question is empty")]
    EmptyQuestion,

    #[error("Poll needs at least 2 options, got {0}")]
    TooFewOptions(usize),

    #[error("Poll option {0} is empty")]
    EmptyOption(usize),

    #[error("Destination chat id is empty")]
    EmptyChatId,
}

/// Immutable poll definition, sent verbatim on every dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollSpec {
    question: String,
    options: Vec<String>,
    anonymous: bool,
    allows_multiple_answers: bool,
}

impl PollSpec {
    /// Build a poll, rejecting blank questions, blank options and fewer than two options.
    pub fn new(
        question: impl Into<String>,
        options: Vec<String>,
        anonymous: bool,
        allows_multiple_answers: bool,
    ) -> Result<Self, PollSpecError> {
        let question = question.into();
        if question.trim().is_empty() {
            return Err(PollSpecError::EmptyQuestion);
        }
        if options.len() < 2 {
            return Err(PollSpecError::TooFewOptions(options.len()));
        }
        if let Some(index) = options.iter().position(|o| o.trim().is_empty()) {
            return Err(PollSpecError::EmptyOption(index));
        }

        Ok(Self {
            question,
            options,
            anonymous,
            allows_multiple_answers,
        })
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn allows_multiple_answers(&self) -> bool {
        self.allows_multiple_answers
    }
}

/// Where a poll is delivered: a chat and, for forum groups, a topic thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DestinationRef {
    chat_id: String,
    thread_id: Option<i64>,
}

impl DestinationRef {
    pub fn new(chat_id: impl Into<String>, thread_id: Option<i64>) -> Result<Self, PollSpecError> {
        let chat_id = chat_id.into().trim().to_string();
        if chat_id.is_empty() {
            return Err(PollSpecError::EmptyChatId);
        }
        Ok(Self { chat_id, thread_id })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn thread_id(&self) -> Option<i64> {
        self.thread_id
    }
}
