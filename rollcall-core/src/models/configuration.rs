//! Configuration data structures

use crate::models::{DestinationRef, PollSpec, PollSpecError, ScheduleError, ScheduleSpec};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Environment variable holding the Bot API token
pub const ENV_BOT_TOKEN: &str = "BOT_TOKEN";
/// Environment variable holding the destination chat id
pub const ENV_CHAT_ID: &str = "CHAT_ID";
/// Environment variable holding the destination topic (thread) id
pub const ENV_TOPIC_ID: &str = "TOPIC_ID";

/// Errors that make the configuration unusable. All of them are fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("BOT_TOKEN is not set")]
    MissingToken,

    #[error("CHAT_ID is not set and destination.chat_id is empty")]
    MissingChatId,

    #[error("TOPIC_ID is not a valid integer: {0}")]
    InvalidTopicId(String),

    #[error("Invalid poll: {0}")]
    Poll(#[from] PollSpecError),

    #[error("Invalid schedule: {0}")]
    Schedule(#[from] ScheduleError),

    #[error("Unknown log level: {0}")]
    InvalidLogLevel(String),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Logging level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LogLevel {
    #[serde(rename = "error")]
    Error,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "info")]
    #[default]
    Info,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "trace")]
    Trace,
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ConfigError::InvalidLogLevel(other.to_string())),
        }
    }
}

/// `[schedule]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    /// Offset of the schedule's timezone from UTC, in minutes (180 = UTC+3)
    pub utc_offset_minutes: i32,
    pub misfire_grace_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 5,
            minute: 0,
            utc_offset_minutes: 180,
            misfire_grace_secs: 300,
        }
    }
}

/// `[destination]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DestinationConfig {
    /// Overridden by `CHAT_ID`
    pub chat_id: Option<String>,
    /// Forum topic to post into; overridden by `TOPIC_ID`. `0` posts to the chat itself.
    pub topic_id: Option<i64>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            chat_id: None,
            topic_id: Some(865),
        }
    }
}

/// `[poll]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub question: String,
    pub options: Vec<String>,
    pub anonymous: bool,
    pub allows_multiple_answers: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            question: "Сегодня".to_string(),
            options: vec![
                "я есть".to_string(),
                "нет по уважу".to_string(),
                "нет по неуважу".to_string(),
                "опаздываю".to_string(),
            ],
            anonymous: false,
            allows_multiple_answers: false,
        }
    }
}

/// Main configuration structure
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Send one poll right after startup as an end-to-end health check
    pub startup_poll: bool,
    /// Logging verbosity level
    pub log_level: LogLevel,
    pub schedule: ScheduleConfig,
    pub destination: DestinationConfig,
    pub poll: PollConfig,
    /// Only ever read from the environment
    #[serde(skip)]
    pub bot_token: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            startup_poll: true,
            log_level: LogLevel::Info,
            schedule: ScheduleConfig::default(),
            destination: DestinationConfig::default(),
            poll: PollConfig::default(),
            bot_token: None,
        }
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("schedule", &self.schedule)
            .field("destination", &self.destination)
            .field("poll", &self.poll)
            .field("startup_poll", &self.startup_poll)
            .field("log_level", &self.log_level)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Configuration {
    /// Load configuration from file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            let config: Configuration = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Return default configuration if file doesn't exist
            Ok(Configuration::default())
        }
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        std::fs::write(path, content).map_err(write_err)?;
        Ok(())
    }

    /// Get the XDG config directory path
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("rollcall").join("config.toml"))
    }

    /// Apply `BOT_TOKEN`, `CHAT_ID` and `TOPIC_ID` from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply environment overrides from an arbitrary lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = non_empty(ENV_BOT_TOKEN) {
            self.bot_token = Some(token.trim().to_string());
        }
        if let Some(chat_id) = non_empty(ENV_CHAT_ID) {
            self.destination.chat_id = Some(chat_id);
        }
        if let Some(topic) = non_empty(ENV_TOPIC_ID) {
            let topic_id = topic
                .trim()
                .parse::<i64>()
                .map_err(|_| ConfigError::InvalidTopicId(topic.clone()))?;
            self.destination.topic_id = Some(topic_id);
        }
        Ok(())
    }

    /// Validate and freeze into [`Settings`]
    pub fn validate(&self) -> Result<Settings, ConfigError> {
        let bot_token = self
            .bot_token
            .clone()
            .filter(|t| !t.trim().is_empty())
            .ok_or(ConfigError::MissingToken)?;

        let chat_id = self
            .destination
            .chat_id
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or(ConfigError::MissingChatId)?;
        let thread_id = self.destination.topic_id.filter(|id| *id != 0);
        let destination = DestinationRef::new(chat_id, thread_id)?;

        let poll = PollSpec::new(
            self.poll.question.clone(),
            self.poll.options.clone(),
            self.poll.anonymous,
            self.poll.allows_multiple_answers,
        )?;

        let schedule = self.schedule_spec()?;

        Ok(Settings {
            bot_token,
            poll,
            destination,
            schedule,
            startup_poll: self.startup_poll,
        })
    }

    /// The schedule alone, without requiring credentials
    pub fn schedule_spec(&self) -> Result<ScheduleSpec, ScheduleError> {
        ScheduleSpec::new(
            self.schedule.hour,
            self.schedule.minute,
            self.schedule.utc_offset_minutes,
            std::time::Duration::from_secs(self.schedule.misfire_grace_secs),
        )
    }
}

/// Validated, process-lifetime settings
#[derive(Clone)]
pub struct Settings {
    pub bot_token: String,
    pub poll: PollSpec,
    pub destination: DestinationRef,
    pub schedule: ScheduleSpec,
    pub startup_poll: bool,
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("bot_token", &"<redacted>")
            .field("poll", &self.poll)
            .field("destination", &self.destination)
            .field("schedule", &self.schedule)
            .field("startup_poll", &self.startup_poll)
            .finish()
    }
}
