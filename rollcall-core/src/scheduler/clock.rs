//! Wall-clock source for the trigger

use chrono::{DateTime, Utc};

/// Supplies the current wall-clock time. Waiting always goes through tokio timers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
