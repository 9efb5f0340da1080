//! Poll action: the single unit of work shared by the trigger, the router and startup.
//!
//! Every call to [`PollAction::dispatch`] sends a new poll. There is no
//! deduplication against earlier sends, so a manual `/poll` on a day that
//! already had its scheduled poll produces a second poll message.

use crate::models::{DestinationRef, PollSpec};
use crate::services::logging;
use crate::transport::PollTransport;
use futures_util::FutureExt;
use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Who asked for a dispatch. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSource {
    Startup,
    Schedule,
    Command,
}

impl fmt::Display for DispatchSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchSource::Startup => "startup",
            DispatchSource::Schedule => "schedule",
            DispatchSource::Command => "command",
        };
        f.write_str(name)
    }
}

/// Outcome of one dispatch, returned as data rather than raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Ok,
    Failed(String),
}

impl DispatchResult {
    pub fn is_ok(&self) -> bool {
        matches!(self, DispatchResult::Ok)
    }
}

/// Sends the configured poll to the configured destination.
#[derive(Clone)]
pub struct PollAction {
    poll: Arc<PollSpec>,
    destination: Arc<DestinationRef>,
    transport: Arc<dyn PollTransport>,
}

impl PollAction {
    pub fn new(
        poll: PollSpec,
        destination: DestinationRef,
        transport: Arc<dyn PollTransport>,
    ) -> Self {
        Self {
            poll: Arc::new(poll),
            destination: Arc::new(destination),
            transport,
        }
    }

    pub fn poll(&self) -> &PollSpec {
        &self.poll
    }

    pub fn destination(&self) -> &DestinationRef {
        &self.destination
    }

    /// Issue exactly one send. Transport failures, and a panicking transport,
    /// come back as [`DispatchResult::Failed`].
    pub async fn dispatch(&self, source: DispatchSource) -> DispatchResult {
        let send = self.transport.send_poll(&self.destination, &self.poll);
        let result = match AssertUnwindSafe(send).catch_unwind().await {
            Ok(Ok(())) => DispatchResult::Ok,
            Ok(Err(e)) => DispatchResult::Failed(e.to_string()),
            Err(panic) => DispatchResult::Failed(panic_message(panic.as_ref())),
        };
        logging::log_dispatch(source, &self.destination, &result);
        result
    }
}

/// Best-effort text of a caught panic payload
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
