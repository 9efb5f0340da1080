//! Daily wall-clock schedule in a fixed UTC offset

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a [`ScheduleSpec`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid time of day {hour:02}:{minute:02}")]
    InvalidTime { hour: u32, minute: u32 },

    #[error("UTC offset of {0} minutes is out of range (max ±1080)")]
    InvalidOffset(i32),

    #[error("Misfire grace window is too large")]
    InvalidGrace,
}

/// What the trigger should do after waking up for a scheduled instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// Woke before the instant (clock adjusted or timer slack); keep waiting.
    Early,
    /// Within the misfire grace window; fire once.
    Fire { lateness: Duration },
    /// Past the grace window; this day's fire is lost.
    Skip { lateness: Duration },
}

/// Fire once a day at `time` local to `offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSpec {
    time: NaiveTime,
    offset: FixedOffset,
    misfire_grace: Duration,
}

impl ScheduleSpec {
    pub fn new(
        hour: u32,
        minute: u32,
        utc_offset_minutes: i32,
        misfire_grace: std::time::Duration,
    ) -> Result<Self, ScheduleError> {
        let time = NaiveTime::from_hms_opt(hour, minute, 0)
            .ok_or(ScheduleError::InvalidTime { hour, minute })?;
        let offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .filter(|_| utc_offset_minutes.abs() <= 18 * 60)
            .ok_or(ScheduleError::InvalidOffset(utc_offset_minutes))?;
        let misfire_grace =
            Duration::from_std(misfire_grace).map_err(|_| ScheduleError::InvalidGrace)?;

        Ok(Self {
            time,
            offset,
            misfire_grace,
        })
    }

    pub fn time(&self) -> NaiveTime {
        self.time
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn misfire_grace(&self) -> Duration {
        self.misfire_grace
    }

    /// First scheduled instant at or after `now`.
    ///
    /// Starting later than today's time of day yields tomorrow's instant.
    pub fn next_fire_from(&self, now: DateTime<Utc>) -> DateTime<FixedOffset> {
        let local_date = now.with_timezone(&self.offset).date_naive();
        let utc = local_date.and_time(self.time) - Duration::seconds(self.offset_secs());
        let today = DateTime::<FixedOffset>::from_naive_utc_and_offset(utc, self.offset);
        if today >= now {
            today
        } else {
            self.following(today)
        }
    }

    /// The scheduled instant one calendar day after `fire`.
    pub fn following(&self, fire: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        fire + Duration::days(1)
    }

    /// Next `count` scheduled instants starting from `now`.
    pub fn upcoming(&self, now: DateTime<Utc>, count: usize) -> Vec<DateTime<FixedOffset>> {
        let mut fires = Vec::with_capacity(count);
        let mut next = self.next_fire_from(now);
        for _ in 0..count {
            fires.push(next);
            next = self.following(next);
        }
        fires
    }

    /// Decide whether a wake-up at `now` honors the fire scheduled for `scheduled`.
    pub fn evaluate(&self, scheduled: DateTime<FixedOffset>, now: DateTime<Utc>) -> FireDecision {
        let lateness = now.signed_duration_since(scheduled);
        if lateness < Duration::zero() {
            FireDecision::Early
        } else if lateness <= self.misfire_grace {
            FireDecision::Fire { lateness }
        } else {
            FireDecision::Skip { lateness }
        }
    }

    fn offset_secs(&self) -> i64 {
        i64::from(self.offset.local_minus_utc())
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "daily at {} UTC{} (misfire grace {}s)",
            self.time.format("%H:%M"),
            self.offset,
            self.misfire_grace.num_seconds()
        )
    }
}
