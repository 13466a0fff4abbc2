//! Alarm Scheduling Tests
//!
//! Tests for next-wake arithmetic, calendar rollover and clock validity.
//! Run with: cargo test --no-default-features --features std --test scheduler_tests

mod common;

use alog_firmware::clock::{clock_is_plausible, next_wake, AlarmScheduler};
use alog_firmware::error::LoggerError;
use alog_firmware::types::{DateTime, Interval};
use common::{dt, MockClock};

// =============================================================================
// next_wake Tests
// =============================================================================

#[test]
fn fifteen_minutes_from_now() {
    let t = dt(2024, 6, 3, 10, 7, 21);
    let next = next_wake(Interval::from_minutes(15), t, t).unwrap();
    assert_eq!(next, dt(2024, 6, 3, 10, 22, 21));
    assert_eq!(next.to_unix() - t.to_unix(), 15 * 60);
}

#[test]
fn zero_interval_has_no_next_wake() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    assert_eq!(next_wake(Interval::new(0, 0, 0, 0), t, t), None);
}

#[test]
fn rolls_into_new_year() {
    let t = dt(2023, 12, 31, 23, 50, 0);
    let next = next_wake(Interval::from_minutes(15), t, t).unwrap();
    assert_eq!(next, dt(2024, 1, 1, 0, 5, 0));
}

#[test]
fn rolls_over_month_end() {
    let t = dt(2024, 4, 30, 22, 0, 0);
    let next = next_wake(Interval::new(0, 3, 0, 0), t, t).unwrap();
    assert_eq!(next, dt(2024, 5, 1, 1, 0, 0));
}

#[test]
fn rolls_over_leap_day() {
    let t = dt(2024, 2, 28, 12, 0, 0);
    let next = next_wake(Interval::new(1, 0, 0, 0), t, t).unwrap();
    assert_eq!(next, dt(2024, 2, 29, 12, 0, 0));

    let t = dt(2023, 2, 28, 12, 0, 0);
    let next = next_wake(Interval::new(1, 0, 0, 0), t, t).unwrap();
    assert_eq!(next, dt(2023, 3, 1, 12, 0, 0));
}

#[test]
fn mixed_fields_cross_year() {
    // 1 day 1 hour 1 minute 1 second
    let t = dt(2022, 12, 31, 23, 0, 0);
    let next = next_wake(Interval::new(1, 1, 1, 1), t, t).unwrap();
    assert_eq!(next, dt(2023, 1, 2, 0, 1, 1));
}

#[test]
fn catches_up_when_behind_keeping_phase() {
    // Alarm fired at 10:00 but the wake ran until 10:47
    let from = dt(2024, 6, 3, 10, 0, 0);
    let now = dt(2024, 6, 3, 10, 47, 0);
    let next = next_wake(Interval::from_minutes(15), from, now).unwrap();
    assert_eq!(next, dt(2024, 6, 3, 11, 0, 0));
}

#[test]
fn exactly_now_is_advanced() {
    let from = dt(2024, 6, 3, 10, 0, 0);
    let now = dt(2024, 6, 3, 10, 15, 0);
    let next = next_wake(Interval::from_minutes(15), from, now).unwrap();
    assert_eq!(next, dt(2024, 6, 3, 10, 30, 0));
}

#[test]
fn never_at_or_before_now() {
    let intervals = [
        Interval::from_seconds(1),
        Interval::from_seconds(59),
        Interval::from_minutes(1),
        Interval::from_minutes(15),
        Interval::new(0, 1, 0, 0),
        Interval::new(0, 6, 30, 0),
        Interval::new(1, 0, 0, 0),
        Interval::new(7, 0, 0, 0),
        Interval::new(3, 2, 1, 4),
    ];
    let base = dt(2023, 12, 31, 23, 59, 59).to_unix();
    for interval in intervals {
        for lag in [0_u64, 1, 59, 3_600, 86_399, 86_400 * 40 + 17] {
            let from = DateTime::from_unix(base).unwrap();
            let now = DateTime::from_unix(base + lag).unwrap();
            let next = next_wake(interval, from, now).unwrap();
            assert!(next > now, "{interval:?} lag {lag}: {next} <= {now}");
            // Still on the schedule grid
            assert_eq!((next.to_unix() - base) % interval.as_seconds(), 0);
            // And no more than one interval ahead
            assert!(next.to_unix() - now.to_unix() <= interval.as_seconds());
        }
    }
}

// =============================================================================
// AlarmScheduler Tests
// =============================================================================

#[test]
fn schedule_programs_clock() {
    let t = dt(2024, 6, 3, 10, 7, 21);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    let alarm = scheduler.schedule_next(&mut clock, t).unwrap();

    assert_eq!(alarm.wake_at, dt(2024, 6, 3, 10, 22, 21));
    assert_eq!(alarm.interval, Interval::from_minutes(15));
    assert_eq!(clock.alarm(), Some(alarm.wake_at));
    assert_eq!(scheduler.active(), Some(alarm));
    assert!(scheduler.has_future_alarm(t));
}

#[test]
fn schedule_refused_for_invalid_clock() {
    let mut clock = MockClock::invalid();
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    let from = clock.now_value();

    assert_eq!(scheduler.schedule_next(&mut clock, from), Err(LoggerError::ClockInvalid));
    assert_eq!(clock.alarm(), None);
    assert!(clock.alarms_set().is_empty());
    assert_eq!(scheduler.active(), None);
}

#[test]
fn schedule_refused_for_implausible_year() {
    // Oscillator flag fine but the date is the reset default
    let t = dt(2000, 1, 1, 0, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));

    assert!(!clock_is_plausible(&mut clock));
    assert_eq!(scheduler.schedule_next(&mut clock, t), Err(LoggerError::ClockInvalid));
    assert!(clock.alarms_set().is_empty());
}

#[test]
fn invalid_clock_forgets_previous_alarm() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    scheduler.schedule_next(&mut clock, t).unwrap();

    clock.0.borrow_mut().valid = false;
    assert!(scheduler.schedule_next(&mut clock, t).is_err());
    assert_eq!(scheduler.active(), None);
    assert_eq!(clock.alarm(), None);
}

#[test]
fn zero_interval_refused() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::new(0, 0, 0, 0));
    assert_eq!(scheduler.schedule_next(&mut clock, t), Err(LoggerError::ZeroInterval));
    assert_eq!(clock.alarm(), None);
}

#[test]
fn ensure_future_keeps_pending_alarm() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    let first = scheduler.schedule_next(&mut clock, t).unwrap();

    // A bucket tip at 10:05 does not move the 10:15 alarm
    clock.advance(5 * 60);
    let kept = scheduler.ensure_future(&mut clock).unwrap();
    assert_eq!(kept, first);
    assert_eq!(clock.alarms_set().len(), 1);
}

#[test]
fn ensure_future_replaces_missed_alarm_on_grid() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    scheduler.schedule_next(&mut clock, t).unwrap();

    // Slept through 10:15 and 10:30
    clock.advance(37 * 60);
    let alarm = scheduler.ensure_future(&mut clock).unwrap();
    assert_eq!(alarm.wake_at, dt(2024, 6, 3, 10, 45, 0));
}

#[test]
fn cancel_clears_clock_alarm() {
    let t = dt(2024, 6, 3, 10, 0, 0);
    let mut clock = MockClock::new(t);
    let mut scheduler = AlarmScheduler::new(Interval::from_minutes(15));
    scheduler.schedule_next(&mut clock, t).unwrap();
    scheduler.cancel(&mut clock);
    assert_eq!(clock.alarm(), None);
    assert_eq!(scheduler.active(), None);
}
