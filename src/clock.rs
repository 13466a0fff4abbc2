//! Real-time clock access and alarm scheduling
//!
//! The clock itself is an external part reached through [`RealTimeClock`].
//! [`AlarmScheduler`] turns the configured interval into the next alarm and
//! refuses to program anything while the clock is unset.

use crate::config::MIN_VALID_YEAR;
use crate::error::{LoggerError, LoggerResult};
use crate::types::{DateTime, Interval};

/// Battery-backed real-time clock with a single alarm
pub trait RealTimeClock {
    /// Current date and time
    fn now(&mut self) -> DateTime;

    /// Program the alarm; the clock raises its wake line when `at` matches
    fn set_alarm(&mut self, at: DateTime);

    /// Disarm the alarm
    fn clear_alarm(&mut self);

    /// Whether the oscillator ran continuously since the time was last set
    fn is_clock_valid(&mut self) -> bool;

    /// Set the current time (operator recovery path)
    fn set_time(&mut self, now: DateTime);
}

/// Programmed wake alarm
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmSpec {
    /// Time the clock will raise its alarm
    pub wake_at: DateTime,
    /// Interval that produced this alarm
    pub interval: Interval,
}

#[cfg(feature = "embedded")]
impl defmt::Format for AlarmSpec {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "Alarm({} every {})", self.wake_at, self.interval);
    }
}

/// Next wake strictly after `now`
///
/// Adds `interval` to `from`. A result at or before `now` (long wake cycle,
/// clock drift, a missed alarm) is advanced by whole intervals in one step so
/// the schedule keeps its phase without looping. Returns None for a zero
/// interval or past the representable range.
#[must_use]
pub fn next_wake(interval: Interval, from: DateTime, now: DateTime) -> Option<DateTime> {
    let step = interval.as_seconds();
    if step == 0 {
        return None;
    }
    let mut next = from.to_unix().checked_add(step)?;
    let now = now.to_unix();
    if next <= now {
        let behind = (now - next) / step + 1;
        next = next.checked_add(behind.checked_mul(step)?)?;
    }
    DateTime::from_unix(next)
}

/// Whether the clock holds a plausible time
pub fn clock_is_plausible<C: RealTimeClock>(clock: &mut C) -> bool {
    clock.is_clock_valid() && clock.now().year() >= MIN_VALID_YEAR
}

/// Computes and programs the periodic wake alarm
#[derive(Clone, Copy, Debug)]
pub struct AlarmScheduler {
    interval: Interval,
    active: Option<AlarmSpec>,
}

impl AlarmScheduler {
    /// Create a scheduler for an interval
    #[must_use]
    pub const fn new(interval: Interval) -> Self {
        Self {
            interval,
            active: None,
        }
    }

    /// Configured interval
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Alarm currently programmed into the clock
    #[must_use]
    pub const fn active(&self) -> Option<AlarmSpec> {
        self.active
    }

    /// Whether the programmed alarm is still ahead of `now`
    #[must_use]
    pub fn has_future_alarm(&self, now: DateTime) -> bool {
        self.active.is_some_and(|a| a.wake_at > now)
    }

    /// Schedule the wake after `from` and program the clock
    ///
    /// Refuses with [`LoggerError::ClockInvalid`] when the clock is unset or
    /// implausible; nothing is programmed and any previous alarm is dropped.
    pub fn schedule_next<C: RealTimeClock>(
        &mut self,
        clock: &mut C,
        from: DateTime,
    ) -> LoggerResult<AlarmSpec> {
        if self.interval.is_zero() {
            return Err(LoggerError::ZeroInterval);
        }
        if !clock_is_plausible(clock) {
            warn!("clock invalid, refusing to schedule");
            self.cancel(clock);
            return Err(LoggerError::ClockInvalid);
        }

        let now = clock.now();
        let wake_at = next_wake(self.interval, from, now).ok_or(LoggerError::ClockInvalid)?;
        let alarm = AlarmSpec {
            wake_at,
            interval: self.interval,
        };
        clock.set_alarm(wake_at);
        self.active = Some(alarm);
        info!("next wake {}", wake_at);
        Ok(alarm)
    }

    /// Keep the pending alarm if it is still ahead, otherwise schedule from now
    ///
    /// A fired alarm is stepped from its own wake time, so the schedule keeps
    /// its phase. A bucket tip never disturbs an alarm still ahead.
    pub fn ensure_future<C: RealTimeClock>(&mut self, clock: &mut C) -> LoggerResult<AlarmSpec> {
        if !clock_is_plausible(clock) {
            self.cancel(clock);
            return Err(LoggerError::ClockInvalid);
        }
        let now = clock.now();
        match self.active {
            Some(alarm) if alarm.wake_at > now => {
                debug!("keeping alarm {}", alarm.wake_at);
                Ok(alarm)
            }
            Some(alarm) => self.schedule_next(clock, alarm.wake_at),
            None => self.schedule_next(clock, now),
        }
    }

    /// Disarm the clock alarm and forget it
    pub fn cancel<C: RealTimeClock>(&mut self, clock: &mut C) {
        clock.clear_alarm();
        self.active = None;
    }
}
