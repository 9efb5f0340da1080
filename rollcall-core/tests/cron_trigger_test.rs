//! Integration test: daily trigger timing, misfire grace window and shutdown.
//!
//! Runs on paused tokio time; `TestClock` maps it onto a wall-clock instant.

mod common;

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use common::{sample_destination, sample_poll, MockTransport, TestClock};
use rollcall_core::dispatch::PollAction;
use rollcall_core::models::ScheduleSpec;
use rollcall_core::scheduler::{CronTrigger, TriggerHandle, TriggerState};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);

fn utc3() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap()
}

fn local(day: u32, h: u32, m: u32, s: u32) -> DateTime<FixedOffset> {
    utc3().with_ymd_and_hms(2026, 10, day, h, m, s).unwrap()
}

fn schedule() -> ScheduleSpec {
    ScheduleSpec::new(5, 0, 180, Duration::from_secs(300)).unwrap()
}

fn start_trigger(
    start: DateTime<FixedOffset>,
) -> (Arc<MockTransport>, Arc<TestClock>, TriggerHandle) {
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(TestClock::starting_at(start.with_timezone(&Utc)));
    let action = PollAction::new(sample_poll(), sample_destination(), transport.clone());
    let handle = CronTrigger::new(schedule(), action)
        .with_clock(clock.clone())
        .spawn();
    (transport, clock, handle)
}

#[tokio::test(start_paused = true)]
async fn test_first_fire_at_scheduled_instant_not_before() {
    let started = tokio::time::Instant::now();
    let (transport, _clock, handle) = start_trigger(local(15, 4, 59, 59));

    tokio::time::sleep(Duration::from_millis(999)).await;
    assert_eq!(transport.poll_count(), 0, "must not fire before 05:00:00");

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert_eq!(transport.poll_count(), 1);

    let fired_after = transport.poll_calls.lock().unwrap()[0].at - started;
    assert!(fired_after >= Duration::from_secs(1));
    assert!(fired_after < Duration::from_secs(2));

    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_after_todays_time_waits_for_tomorrow() {
    let (transport, _clock, handle) = start_trigger(local(15, 5, 0, 1));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );

    tokio::time::sleep(DAY - Duration::from_secs(2)).await;
    assert_eq!(transport.poll_count(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.poll_count(), 1);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_wakeup_within_grace_fires_once() {
    let (transport, clock, handle) = start_trigger(local(15, 4, 0, 0));

    // Process stalls around 04:59 and resumes two minutes after the instant.
    tokio::time::sleep(Duration::from_secs(59 * 60)).await;
    clock.jump(Duration::from_secs(180));

    tokio::time::sleep(HOUR).await;
    assert_eq!(transport.poll_count(), 1, "exactly one late fire");
    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_late_wakeup_beyond_grace_skips_the_day() {
    let (transport, clock, handle) = start_trigger(local(15, 4, 0, 0));

    // Resumes ten minutes after the instant: outside the 300s window.
    tokio::time::sleep(Duration::from_secs(59 * 60)).await;
    clock.jump(Duration::from_secs(11 * 60));

    tokio::time::sleep(HOUR).await;
    assert_eq!(transport.poll_count(), 0, "missed fire is dropped, not queued");
    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );

    tokio::time::sleep(DAY).await;
    assert_eq!(transport.poll_count(), 1, "next day fires normally");
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_dispatch_keeps_trigger_running() {
    let (transport, _clock, handle) = start_trigger(local(15, 4, 59, 59));
    transport.fail_sends("Forbidden: bot was kicked");

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.poll_count(), 1);

    tokio::time::sleep(DAY).await;
    assert_eq!(transport.poll_count(), 2);
    assert!(matches!(handle.state(), TriggerState::Scheduled { .. }));
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_cancels_pending_fire() {
    let (transport, _clock, handle) = start_trigger(local(15, 4, 0, 0));
    let state = handle.subscribe();

    tokio::time::sleep(Duration::from_secs(10)).await;
    handle.stop().await;
    assert_eq!(*state.borrow(), TriggerState::Stopped);

    tokio::time::sleep(2 * HOUR).await;
    assert_eq!(transport.poll_count(), 0);
}

fn registered_trigger(
    start: DateTime<FixedOffset>,
) -> (Arc<MockTransport>, CronTrigger) {
    let transport = Arc::new(MockTransport::new());
    let clock = Arc::new(TestClock::starting_at(start.with_timezone(&Utc)));
    let action = PollAction::new(sample_poll(), sample_destination(), transport.clone());
    let trigger = CronTrigger::new(schedule(), action).with_clock(clock);
    (transport, trigger)
}

#[tokio::test(start_paused = true)]
async fn test_slow_startup_before_spawn_still_fires_today() {
    let (transport, trigger) = registered_trigger(local(15, 4, 59, 59));
    assert_eq!(trigger.first_fire(), local(15, 5, 0, 0));

    // Startup work runs past 05:00 before the loop is started.
    tokio::time::sleep(Duration::from_secs(3)).await;
    let handle = trigger.spawn();

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(transport.poll_count(), 1, "late fire within grace");
    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_startup_overrunning_grace_skips_registered_fire() {
    let (transport, trigger) = registered_trigger(local(15, 4, 59, 0));

    tokio::time::sleep(Duration::from_secs(7 * 60)).await;
    let handle = trigger.spawn();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.poll_count(), 0);
    assert_eq!(
        handle.state(),
        TriggerState::Scheduled {
            next: local(16, 5, 0, 0)
        }
    );
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_dispatch_finish() {
    let (transport, _clock, handle) = start_trigger(local(15, 4, 59, 59));
    transport.slow_sends(Duration::from_secs(30));
    let state = handle.subscribe();

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(handle.state(), TriggerState::Firing);
    assert_eq!(transport.completed_sends.load(Ordering::SeqCst), 0);

    handle.stop().await;
    assert_eq!(transport.completed_sends.load(Ordering::SeqCst), 1);
    assert_eq!(*state.borrow(), TriggerState::Stopped);
}
