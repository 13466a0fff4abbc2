//! Shared types used across the logger firmware
//!
//! Calendar time, wake intervals, wake reasons and the peripherals behind
//! each power rail. These types enforce their invariants at construction so
//! the scheduling and logging code can rely on them.

use core::fmt;

/// Seconds in one day
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Calendar date and time as kept by the real-time clock
///
/// Always a valid Gregorian date between 1970 and 9999. Ordering follows
/// chronological order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
}

impl DateTime {
    /// Earliest representable year (Unix epoch)
    pub const MIN_YEAR: u16 = 1970;

    /// Latest representable year
    pub const MAX_YEAR: u16 = 9999;

    /// 1970-01-01 00:00:00, what an unreadable clock reports
    pub const EPOCH: Self = Self {
        year: 1970,
        month: 1,
        day: 1,
        hour: 0,
        minute: 0,
        second: 0,
    };

    /// Create a new date/time, returns None if any field is out of range
    #[must_use]
    pub const fn new(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> Option<Self> {
        if year < Self::MIN_YEAR || year > Self::MAX_YEAR {
            return None;
        }
        if month < 1 || month > 12 {
            return None;
        }
        if day < 1 || day > days_in_month(year, month) {
            return None;
        }
        if hour > 23 || minute > 59 || second > 59 {
            return None;
        }
        Some(Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        })
    }

    /// Create from seconds since 1970-01-01 00:00:00
    ///
    /// Returns None past the end of year 9999.
    #[must_use]
    pub const fn from_unix(secs: u64) -> Option<Self> {
        let days = secs / SECONDS_PER_DAY;
        let rem = secs % SECONDS_PER_DAY;
        let (year, month, day) = civil_from_days(days);
        if year > Self::MAX_YEAR as u64 {
            return None;
        }
        Some(Self {
            year: year as u16,
            month,
            day,
            hour: (rem / 3600) as u8,
            minute: ((rem % 3600) / 60) as u8,
            second: (rem % 60) as u8,
        })
    }

    /// Seconds since 1970-01-01 00:00:00
    #[must_use]
    pub const fn to_unix(self) -> u64 {
        let days = days_from_civil(self.year, self.month, self.day);
        days * SECONDS_PER_DAY
            + self.hour as u64 * 3600
            + self.minute as u64 * 60
            + self.second as u64
    }

    /// Advance by a number of seconds, rolling every calendar field over
    #[must_use]
    pub const fn add_seconds(self, secs: u64) -> Option<Self> {
        match self.to_unix().checked_add(secs) {
            Some(total) => Self::from_unix(total),
            None => None,
        }
    }

    /// Advance by a wake interval
    #[must_use]
    pub const fn add_interval(self, interval: Interval) -> Option<Self> {
        self.add_seconds(interval.as_seconds())
    }

    /// ISO 8601 weekday (1 = Monday .. 7 = Sunday)
    #[must_use]
    pub const fn iso_weekday(self) -> u8 {
        // 1970-01-01 was a Thursday
        let days = days_from_civil(self.year, self.month, self.day);
        ((days + 3) % 7) as u8 + 1
    }

    /// Calendar year
    #[must_use]
    pub const fn year(&self) -> u16 {
        self.year
    }

    /// Month (1-12)
    #[must_use]
    pub const fn month(&self) -> u8 {
        self.month
    }

    /// Day of month (1-31)
    #[must_use]
    pub const fn day(&self) -> u8 {
        self.day
    }

    /// Hour (0-23)
    #[must_use]
    pub const fn hour(&self) -> u8 {
        self.hour
    }

    /// Minute (0-59)
    #[must_use]
    pub const fn minute(&self) -> u8 {
        self.minute
    }

    /// Second (0-59)
    #[must_use]
    pub const fn second(&self) -> u8 {
        self.second
    }
}

impl fmt::Debug for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateTime({self})")
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year, self.month, self.day, self.hour, self.minute, self.second
        )
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for DateTime {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{}-{:02}-{:02} {:02}:{:02}:{:02}",
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second
        );
    }
}

/// Check for a Gregorian leap year
#[must_use]
pub const fn is_leap_year(year: u16) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

/// Number of days in a month (month 1-12)
#[must_use]
pub const fn days_in_month(year: u16, month: u8) -> u8 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Days since the epoch for a civil date (year >= 1970)
const fn days_from_civil(year: u16, month: u8, day: u8) -> u64 {
    // Shift the year so it starts in March; the leap day is then the last day
    let y = if month <= 2 { year as u64 - 1 } else { year as u64 };
    let era = y / 400;
    let yoe = y - era * 400;
    let mp = (month as u64 + 9) % 12;
    let doy = (153 * mp + 2) / 5 + day as u64 - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    era * 146_097 + doe - 719_468
}

/// Civil date for a count of days since the epoch
const fn civil_from_days(days: u64) -> (u64, u8, u8) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u8;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u8;
    let year = yoe + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

/// Wake period between scheduled logging cycles
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Interval {
    /// Whole days
    pub days: u16,
    /// Hours
    pub hours: u16,
    /// Minutes
    pub minutes: u16,
    /// Seconds
    pub seconds: u16,
}

impl Interval {
    /// Create an interval from its four components
    ///
    /// Components are not required to be normalised; 90 minutes is fine.
    #[must_use]
    pub const fn new(days: u16, hours: u16, minutes: u16, seconds: u16) -> Self {
        Self {
            days,
            hours,
            minutes,
            seconds,
        }
    }

    /// Interval of whole minutes
    #[must_use]
    pub const fn from_minutes(minutes: u16) -> Self {
        Self::new(0, 0, minutes, 0)
    }

    /// Interval of whole seconds
    #[must_use]
    pub const fn from_seconds(seconds: u16) -> Self {
        Self::new(0, 0, 0, seconds)
    }

    /// Total length in seconds
    #[must_use]
    pub const fn as_seconds(self) -> u64 {
        self.days as u64 * SECONDS_PER_DAY
            + self.hours as u64 * 3600
            + self.minutes as u64 * 60
            + self.seconds as u64
    }

    /// A zero interval means the logger never sleeps
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.as_seconds() == 0
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Interval {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "{}d{}h{}m{}s",
            self.days,
            self.hours,
            self.minutes,
            self.seconds
        );
    }
}

/// Why the processor left sleep
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    /// The clock alarm for the configured interval matched
    ScheduledInterval,
    /// The external wake line was asserted
    ExternalInterrupt,
    /// The tipping-bucket rain gauge tipped
    BucketTip,
}

impl WakeReason {
    /// Whether this wake happened outside the schedule
    #[must_use]
    pub const fn is_triggered(self) -> bool {
        !matches!(self, Self::ScheduledInterval)
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for WakeReason {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ScheduledInterval => defmt::write!(f, "INTERVAL"),
            Self::ExternalInterrupt => defmt::write!(f, "EXT"),
            Self::BucketTip => defmt::write!(f, "TIP"),
        }
    }
}

/// Peripheral subsystem behind a switchable power rail
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Peripheral {
    /// Real-time clock supply (the clock keeps time on its backup cell)
    Clock,
    /// SD card supply
    Storage,
    /// Sensor excitation voltage for analog dividers and bridges
    SensorExcitation,
}

impl Peripheral {
    /// All rails, in power-up order
    pub const ALL: [Self; 3] = [Self::Clock, Self::Storage, Self::SensorExcitation];

    /// Index into per-rail tables
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Clock => 0,
            Self::Storage => 1,
            Self::SensorExcitation => 2,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for Peripheral {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Clock => defmt::write!(f, "RTC"),
            Self::Storage => defmt::write!(f, "SD"),
            Self::SensorExcitation => defmt::write!(f, "EXCITE"),
        }
    }
}
