//! Real-Time Clock
//!
//! [`RealTimeClock`] over the STM32 RTC peripheral (LSE, backup domain).
//! The RTC keeps calendar time; the wake alarm is a monotonic deadline
//! derived from it and awaited by [`crate::hal::wake`].

use core::cell::Cell;

use critical_section::Mutex;
use embassy_stm32::rtc::{DateTime as RtcDateTime, DayOfWeek, Rtc};
use embassy_time::{Duration, Instant};

use crate::clock::RealTimeClock;
use crate::types::DateTime;

static ALARM_DEADLINE: Mutex<Cell<Option<Instant>>> = Mutex::new(Cell::new(None));

/// Monotonic instant at which the programmed alarm fires
#[must_use]
pub fn alarm_deadline() -> Option<Instant> {
    critical_section::with(|cs| ALARM_DEADLINE.borrow(cs).get())
}

fn set_deadline(deadline: Option<Instant>) {
    critical_section::with(|cs| ALARM_DEADLINE.borrow(cs).set(deadline));
}

const fn day_of_week(iso_weekday: u8) -> DayOfWeek {
    match iso_weekday {
        1 => DayOfWeek::Monday,
        2 => DayOfWeek::Tuesday,
        3 => DayOfWeek::Wednesday,
        4 => DayOfWeek::Thursday,
        5 => DayOfWeek::Friday,
        6 => DayOfWeek::Saturday,
        _ => DayOfWeek::Sunday,
    }
}

/// Board real-time clock
pub struct BoardRtc {
    rtc: Rtc,
}

impl BoardRtc {
    /// Wrap the initialised RTC
    ///
    /// A clock that cannot be read counts as unset; validity is checked on
    /// every call, so a clock set later is picked up.
    #[must_use]
    pub fn new(rtc: Rtc) -> Self {
        if rtc.now().is_err() {
            warn!("RTC not running");
        }
        Self { rtc }
    }

    fn read(&self) -> Option<DateTime> {
        let t = self.rtc.now().ok()?;
        DateTime::new(t.year(), t.month(), t.day(), t.hour(), t.minute(), t.second())
    }
}

impl RealTimeClock for BoardRtc {
    fn now(&mut self) -> DateTime {
        self.read().unwrap_or(DateTime::EPOCH)
    }

    fn set_alarm(&mut self, at: DateTime) {
        let now = self.now();
        let secs = at.to_unix().saturating_sub(now.to_unix());
        set_deadline(Some(Instant::now() + Duration::from_secs(secs)));
        debug!("alarm in {} s", secs);
    }

    fn clear_alarm(&mut self) {
        set_deadline(None);
    }

    fn is_clock_valid(&mut self) -> bool {
        self.read().is_some()
    }

    fn set_time(&mut self, now: DateTime) {
        let t = RtcDateTime::from(
            now.year(),
            now.month(),
            now.day(),
            day_of_week(now.iso_weekday()),
            now.hour(),
            now.minute(),
            now.second(),
        );
        let accepted = match t {
            Ok(t) => self.rtc.set_datetime(t).is_ok(),
            Err(_) => false,
        };
        if !accepted {
            warn!("RTC rejected {}", now);
        }
    }
}
