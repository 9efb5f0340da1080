//! Daily cron-style trigger

mod clock;
mod cron;

pub use clock::{Clock, SystemClock};
pub use cron::{CronTrigger, TriggerHandle, TriggerState};
