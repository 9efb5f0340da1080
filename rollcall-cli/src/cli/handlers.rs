//! Command handlers for the rollcall CLI

use anyhow::{Context, Result};
use chrono::Utc;
use rollcall_core::models::{Configuration, LogLevel};
use rollcall_core::services::logging;
use rollcall_core::supervisor::Supervisor;
use rollcall_core::transport::TelegramClient;
use std::path::PathBuf;
use std::sync::Arc;

/// Handle the 'serve' command
pub async fn handle_serve(
    config: Option<String>,
    log_level: Option<String>,
    skip_startup_poll: bool,
) -> Result<()> {
    let config_path = resolve_config_path(config)?;
    let mut config = Configuration::load_from_file(&config_path)
        .with_context(|| format!("Failed to load {}", config_path.display()))?;
    config.apply_env()?;

    if let Some(level) = log_level {
        config.log_level = level.parse::<LogLevel>()?;
    }
    if skip_startup_poll {
        config.startup_poll = false;
    }

    logging::init_logging(config.log_level)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;
    tracing::debug!(config = ?config, path = %config_path.display(), "Configuration loaded");

    let client = Arc::new(client_for(&config));
    let result = Supervisor::new(config, client).run(shutdown_signal()).await;

    match result {
        Ok(()) => {
            tracing::info!("Bot stopped");
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Bot stopped with an error");
            Err(e.into())
        }
    }
}

/// Handle the 'config --init' command
pub async fn handle_config_init(config_file: String) -> Result<()> {
    let config_path = if config_file == "~/.config/rollcall/config.toml" {
        Configuration::default_config_path()?
    } else {
        expand_home(&config_file, std::env::var("HOME").ok().as_deref())?
    };

    println!("Config file: {}", config_path.display());

    let config = if config_path.exists() {
        println!("Configuration file already exists, rewriting it with any missing defaults");
        Configuration::load_from_file(&config_path)?
    } else {
        Configuration::default()
    };

    config.save_to_file(&config_path)?;

    println!("Configuration saved.");
    println!("Set BOT_TOKEN in the environment, and CHAT_ID unless destination.chat_id is filled in.");
    Ok(())
}

/// Handle the 'schedule' command
pub async fn handle_schedule(config: Option<String>, count: usize) -> Result<()> {
    let config_path = resolve_config_path(config)?;
    let config = Configuration::load_from_file(&config_path)?;
    let schedule = config.schedule_spec()?;

    let now = Utc::now();
    println!("Schedule: {}", schedule);
    for fire in schedule.upcoming(now, count) {
        let until = fire.with_timezone(&Utc) - now;
        println!(
            "  {}  (in {}h {:02}m)",
            fire.format("%Y-%m-%d %H:%M %:z"),
            until.num_hours(),
            until.num_minutes() % 60
        );
    }
    Ok(())
}

/// The supervisor validates the configuration before the client is ever used,
/// so a missing token fails there and never reaches the network.
fn client_for(config: &Configuration) -> TelegramClient {
    TelegramClient::new(config.bot_token.clone().unwrap_or_default())
}

fn resolve_config_path(config: Option<String>) -> Result<PathBuf> {
    match config {
        Some(path) => expand_home(&path, std::env::var("HOME").ok().as_deref()),
        None => Ok(Configuration::default_config_path()?),
    }
}

fn expand_home(path: &str, home: Option<&str>) -> Result<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => {
            let home = home.ok_or_else(|| anyhow::anyhow!("HOME environment variable not set"))?;
            Ok(PathBuf::from(home).join(rest))
        }
        None => Ok(PathBuf::from(path)),
    }
}

/// Resolves on Ctrl+C, or on SIGTERM where the platform has it.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_token_is_reported_once_by_the_supervisor() {
        let mut config = Configuration::default();
        config.destination.chat_id = Some("-1001".to_string());

        let client = Arc::new(client_for(&config));
        let err = Supervisor::new(config, client)
            .run(std::future::pending())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Configuration error: BOT_TOKEN is not set");
    }

    #[test]
    fn test_expand_home_replaces_tilde() {
        let path = expand_home("~/bots/rollcall.toml", Some("/home/ops")).unwrap();
        assert_eq!(path, PathBuf::from("/home/ops/bots/rollcall.toml"));
    }

    #[test]
    fn test_expand_home_leaves_plain_paths() {
        let path = expand_home("./rollcall.toml", None).unwrap();
        assert_eq!(path, PathBuf::from("./rollcall.toml"));
    }

    #[test]
    fn test_expand_home_without_home_fails() {
        assert!(expand_home("~/rollcall.toml", None).is_err());
    }
}
