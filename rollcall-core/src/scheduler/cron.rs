//! Daily trigger that runs the poll action at the scheduled wall-clock time

use crate::dispatch::{DispatchSource, PollAction};
use crate::models::{FireDecision, ScheduleSpec};
use crate::scheduler::clock::{Clock, SystemClock};
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Longest single timer wait. The wall clock is re-read at least this often so
/// clock adjustments and suspended processes are noticed.
const MAX_WAIT: Duration = Duration::from_secs(300);

/// Lifecycle of the trigger: `Idle -> Scheduled -> Firing -> Scheduled ... -> Stopped`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Scheduled { next: DateTime<FixedOffset> },
    Firing,
    Stopped,
}

/// Fires the poll action once per day.
///
/// The first fire instant is fixed at registration, not at [`spawn`](Self::spawn).
/// Work done in between (the startup poll) can make that first fire late, and
/// lateness goes through the misfire grace check like any other wake-up.
pub struct CronTrigger {
    schedule: ScheduleSpec,
    action: PollAction,
    clock: Arc<dyn Clock>,
    first_fire: DateTime<FixedOffset>,
}

impl CronTrigger {
    pub fn new(schedule: ScheduleSpec, action: PollAction) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let first_fire = schedule.next_fire_from(clock.now());
        Self {
            schedule,
            action,
            clock,
            first_fire,
        }
    }

    /// Replace the wall-clock source. The first fire is recomputed from it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.first_fire = self.schedule.next_fire_from(clock.now());
        self.clock = clock;
        self
    }

    pub fn schedule(&self) -> &ScheduleSpec {
        &self.schedule
    }

    /// The instant registered for the first fire
    pub fn first_fire(&self) -> DateTime<FixedOffset> {
        self.first_fire
    }

    /// Start the trigger loop on its own task.
    pub fn spawn(self) -> TriggerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(TriggerState::Idle);
        let task = tokio::spawn(self.run(shutdown_rx, state_tx));
        TriggerHandle {
            shutdown: shutdown_tx,
            state: state_rx,
            task,
        }
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>, state: watch::Sender<TriggerState>) {
        let mut next = self.first_fire;

        'days: loop {
            state.send_replace(TriggerState::Scheduled { next });
            tracing::info!(next_fire = %next, "Next scheduled poll");

            loop {
                if *shutdown.borrow() {
                    break 'days;
                }
                let now = self.clock.now();
                match self.schedule.evaluate(next, now) {
                    FireDecision::Early => {
                        let wait = next
                            .signed_duration_since(now)
                            .to_std()
                            .unwrap_or_default()
                            .min(MAX_WAIT);
                        tokio::select! {
                            _ = tokio::time::sleep(wait) => {}
                            changed = shutdown.changed() => {
                                if changed.is_err() || *shutdown.borrow() {
                                    break 'days;
                                }
                            }
                        }
                    }
                    FireDecision::Fire { lateness } => {
                        if lateness.num_seconds() > 0 {
                            tracing::warn!(
                                scheduled = %next,
                                late_secs = lateness.num_seconds(),
                                "Scheduled poll running late"
                            );
                        }
                        state.send_replace(TriggerState::Firing);
                        // Runs to completion even if shutdown is requested meanwhile.
                        self.action.dispatch(DispatchSource::Schedule).await;
                        break;
                    }
                    FireDecision::Skip { lateness } => {
                        tracing::warn!(
                            scheduled = %next,
                            late_secs = lateness.num_seconds(),
                            grace_secs = self.schedule.misfire_grace().num_seconds(),
                            "Scheduled poll missed its grace window, skipping"
                        );
                        break;
                    }
                }
            }

            next = self.schedule.following(next);
        }

        state.send_replace(TriggerState::Stopped);
        tracing::info!("Scheduler stopped");
    }
}

/// Control handle for a running [`CronTrigger`].
pub struct TriggerHandle {
    shutdown: watch::Sender<bool>,
    state: watch::Receiver<TriggerState>,
    task: JoinHandle<()>,
}

impl TriggerHandle {
    /// Current state snapshot
    pub fn state(&self) -> TriggerState {
        self.state.borrow().clone()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<TriggerState> {
        self.state.clone()
    }

    /// Cancel the pending timer and wait for the loop to exit.
    /// A dispatch already in flight is allowed to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!(error = %e, "Scheduler task ended abnormally");
        }
    }
}
