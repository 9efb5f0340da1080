//! Logging service

use crate::dispatch::{DispatchResult, DispatchSource};
use crate::models::{CommandInvocation, DestinationRef, LogLevel};
use tracing_subscriber::EnvFilter;

/// Filter directive for our own crates at the given level
fn filter_directive(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Error => "rollcall=error,rollcall_core=error",
        LogLevel::Warn => "rollcall=warn,rollcall_core=warn",
        LogLevel::Info => "rollcall=info,rollcall_core=info",
        LogLevel::Debug => "rollcall=debug,rollcall_core=debug",
        LogLevel::Trace => "rollcall=trace,rollcall_core=trace",
    }
}

/// Initialize logging with the specified level. `RUST_LOG` wins when set.
pub fn init_logging(level: LogLevel) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(level)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()?;

    Ok(())
}

/// Log the outcome of a poll dispatch
pub fn log_dispatch(source: DispatchSource, destination: &DestinationRef, result: &DispatchResult) {
    match result {
        DispatchResult::Ok => tracing::info!(
            source = %source,
            chat_id = destination.chat_id(),
            thread_id = ?destination.thread_id(),
            "Poll sent"
        ),
        DispatchResult::Failed(reason) => tracing::error!(
            source = %source,
            chat_id = destination.chat_id(),
            thread_id = ?destination.thread_id(),
            error = reason.as_str(),
            "Poll dispatch failed"
        ),
    }
}

/// Log a handled command
pub fn log_command(invocation: &CommandInvocation, outcome: &str) {
    tracing::info!(
        command = %invocation.command,
        chat_id = invocation.chat_id,
        thread_id = ?invocation.thread_id,
        sender_id = ?invocation.sender_id,
        outcome = outcome,
        "Command handled"
    );
}
