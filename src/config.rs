//! System configuration and calibration constants
//!
//! Compile-time constants for the logger hardware and the runtime
//! [`LoggerConfig`] supplied once at initialisation. Debounce windows and
//! sample budgets were tuned on the bench; they live here so a deployment can
//! retune them without touching the core.

use heapless::String;

use crate::error::{LoggerError, LoggerResult};
use crate::types::Interval;

/// Earliest year the clock may report before it is treated as unset
///
/// A clock that lost its backup cell restarts at 2000-01-01.
pub const MIN_VALID_YEAR: u16 = 2015;

/// Settle time after powering the real-time clock rail
pub const CLOCK_SETTLE_MS: u32 = 10;

/// Settle time after powering the SD card rail
pub const STORAGE_SETTLE_MS: u32 = 50;

/// Settle time after enabling the sensor excitation rail
pub const EXCITATION_SETTLE_MS: u32 = 2;

/// Attempts to open the record file before the wake cycle is abandoned
pub const STORAGE_OPEN_ATTEMPTS: u8 = 3;

/// Default refractory window for the tipping-bucket switch
pub const DEFAULT_BUCKET_TIP_REFRACTORY_MS: u32 = 250;

/// Upper bound on ADC reads for one oversampled value
pub const MAX_OVERSAMPLE_READS: u32 = 4096;

/// Upper bound on extra resolution bits gained by oversampling
pub const MAX_EXTRA_BITS: u8 = 6;

/// Delay between consecutive ADC reads in an oversampling burst
pub const ANALOG_READ_SPACING_US: u32 = 20;

/// Maximum samples kept by a sample series
pub const MAX_SERIES_SAMPLES: usize = 32;

/// Default number of samples in a series (e.g. ultrasonic pings)
pub const DEFAULT_SERIES_SAMPLES: u8 = 10;

/// Default read budget multiplier for a series: attempts = samples * this
pub const DEFAULT_SERIES_ATTEMPT_FACTOR: u8 = 2;

/// File receiving triggered rain-gauge records
pub const BUCKET_TIP_FILE: &str = "b_tips.txt";

/// Extension appended to the site code for interval records
pub const DATA_FILE_EXTENSION: &str = ".txt";

/// Separator between record fields
pub const FIELD_SEPARATOR: char = ',';

/// Capacity of one formatted record field
///
/// Holds `-f32::MAX` (39 integer digits) at [`MAX_FIELD_PRECISION`].
pub const FIELD_CAPACITY: usize = 64;

/// Largest number of decimal places written for a float field
pub const MAX_FIELD_PRECISION: u8 = 8;

/// Last field of a line cut short by a failed measurement script
pub const ABANDONED_RECORD_MARKER: &str = "ERR";

/// Maximum logger name length in bytes
pub const MAX_NAME_LEN: usize = 16;

/// Maximum site code length (8.3 file names)
pub const MAX_SITE_CODE_LEN: usize = 8;

/// Capacity of a generated file name (8 + ".txt")
pub const FILE_NAME_CAPACITY: usize = 12;

/// Decimal places written for floating point fields
pub const DEFAULT_FIELD_PRECISION: u8 = 4;

/// Status LED timings
pub mod led {
    //! Status LED blink timings in milliseconds

    /// Length of the "all good" blink
    pub const GOOD_ON_MS: u32 = 1_000;

    /// On time of one warning flash
    pub const FLASH_ON_MS: u32 = 50;

    /// Off time between warning flashes
    pub const FLASH_OFF_MS: u32 = 200;

    /// Pause after a warning burst so bursts can be counted
    pub const BURST_PAUSE_MS: u32 = 1_000;

    /// On/off time of the clock-wrong double blink
    pub const TIME_WRONG_MS: u32 = 100;

    /// Pause between clock-wrong cycles
    pub const TIME_WRONG_PAUSE_MS: u32 = 600;

    /// Clock-wrong cycles shown each time the clock is found unset
    pub const TIME_WRONG_CYCLES: u8 = 3;
}

/// Pin assignments for the STM32G474 logger board
pub mod pins {
    //! GPIO pin assignments matching the schematic

    /// Status LED
    pub const LED_STATUS: &str = "PA5";

    /// Real-time clock power rail
    pub const RTC_POWER: &str = "PB0";

    /// SD card power rail (P-FET, active low)
    pub const SD_POWER: &str = "PB1";

    /// Sensor excitation rail
    pub const EXCITATION: &str = "PB2";

    /// SD card SPI clock
    pub const SD_SCK: &str = "PB13";

    /// SD card SPI MISO
    pub const SD_MISO: &str = "PB14";

    /// SD card SPI MOSI
    pub const SD_MOSI: &str = "PB15";

    /// SD card chip select
    pub const SD_CS: &str = "PB12";

    /// External wake input (active low)
    pub const EXT_WAKE: &str = "PA0";

    /// Tipping-bucket rain gauge reed switch (active low)
    pub const BUCKET_TIP: &str = "PA1";

    /// Anemometer reed switch (active low)
    pub const ANEMOMETER: &str = "PA2";

    /// First analog sensor input
    pub const ANALOG_0: &str = "PA3";

    /// Second analog sensor input
    pub const ANALOG_1: &str = "PC0";
}

/// What a triggered (non-scheduled) wake writes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TriggeredRecord {
    /// Timestamp only; the event itself is the datum
    #[default]
    TimestampOnly,
    /// Run the full sensor sequence as on a scheduled wake
    FullSequence,
}

#[cfg(feature = "embedded")]
impl defmt::Format for TriggeredRecord {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::TimestampOnly => defmt::write!(f, "TimestampOnly"),
            Self::FullSequence => defmt::write!(f, "FullSequence"),
        }
    }
}

/// Runtime logger configuration
///
/// Built once, handed to [`crate::logger::Logger::initialize`] and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggerConfig {
    name: String<MAX_NAME_LEN>,
    site_code: String<MAX_SITE_CODE_LEN>,
    interval: Interval,
    use_external_interrupt: bool,
    log_on_bucket_tip: bool,
    bucket_tip_refractory_ms: u32,
    external_record: TriggeredRecord,
    bucket_tip_record: TriggeredRecord,
    storage_open_attempts: u8,
}

impl LoggerConfig {
    /// Create a configuration
    ///
    /// The site code names the data file, so it must be 1-8 ASCII letters or
    /// digits. An all-zero interval selects continuous (no-sleep) mode.
    pub fn new(
        name: &str,
        site_code: &str,
        interval: Interval,
        use_external_interrupt: bool,
        log_on_bucket_tip: bool,
    ) -> LoggerResult<Self> {
        if site_code.is_empty() || !site_code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(LoggerError::InvalidConfig("site code must be ASCII letters or digits"));
        }
        let site_code = String::try_from(site_code)
            .map_err(|()| LoggerError::InvalidConfig("site code longer than 8 characters"))?;
        let name = String::try_from(name)
            .map_err(|()| LoggerError::InvalidConfig("logger name longer than 16 bytes"))?;

        Ok(Self {
            name,
            site_code,
            interval,
            use_external_interrupt,
            log_on_bucket_tip,
            bucket_tip_refractory_ms: DEFAULT_BUCKET_TIP_REFRACTORY_MS,
            external_record: TriggeredRecord::FullSequence,
            bucket_tip_record: TriggeredRecord::TimestampOnly,
            storage_open_attempts: STORAGE_OPEN_ATTEMPTS,
        })
    }

    /// Set the bucket-tip refractory window (returns new config)
    #[must_use]
    pub fn with_bucket_tip_refractory_ms(self, bucket_tip_refractory_ms: u32) -> Self {
        Self {
            bucket_tip_refractory_ms,
            ..self
        }
    }

    /// Set what an external-interrupt wake writes (returns new config)
    #[must_use]
    pub fn with_external_record(self, external_record: TriggeredRecord) -> Self {
        Self {
            external_record,
            ..self
        }
    }

    /// Set what a bucket-tip wake writes (returns new config)
    #[must_use]
    pub fn with_bucket_tip_record(self, bucket_tip_record: TriggeredRecord) -> Self {
        Self {
            bucket_tip_record,
            ..self
        }
    }

    /// Set the number of record open attempts, at least one (returns new config)
    #[must_use]
    pub fn with_storage_open_attempts(self, attempts: u8) -> Self {
        Self {
            storage_open_attempts: attempts.max(1),
            ..self
        }
    }

    /// Logger name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Site code
    #[must_use]
    pub fn site_code(&self) -> &str {
        &self.site_code
    }

    /// Wake interval
    #[must_use]
    pub const fn interval(&self) -> Interval {
        self.interval
    }

    /// Whether the external wake line is enabled
    #[must_use]
    pub const fn use_external_interrupt(&self) -> bool {
        self.use_external_interrupt
    }

    /// Whether bucket tips wake the logger and write triggered records
    #[must_use]
    pub const fn log_on_bucket_tip(&self) -> bool {
        self.log_on_bucket_tip
    }

    /// Refractory window applied to bucket tips
    #[must_use]
    pub const fn bucket_tip_refractory_ms(&self) -> u32 {
        self.bucket_tip_refractory_ms
    }

    /// Record policy for external-interrupt wakes
    #[must_use]
    pub const fn external_record(&self) -> TriggeredRecord {
        self.external_record
    }

    /// Record policy for bucket-tip wakes
    #[must_use]
    pub const fn bucket_tip_record(&self) -> TriggeredRecord {
        self.bucket_tip_record
    }

    /// Record open attempts per wake
    #[must_use]
    pub const fn storage_open_attempts(&self) -> u8 {
        self.storage_open_attempts
    }

    /// Whether the logger sleeps between records
    ///
    /// False for a zero interval: the logger then logs back to back.
    #[must_use]
    pub const fn use_sleep_mode(&self) -> bool {
        !self.interval.is_zero()
    }

    /// Name of the interval data file (`<site code>.txt`)
    #[must_use]
    pub fn data_file_name(&self) -> String<FILE_NAME_CAPACITY> {
        let mut file = String::new();
        // Site code is at most 8 bytes and the extension 4, always fits
        let _ = file.push_str(&self.site_code);
        let _ = file.push_str(DATA_FILE_EXTENSION);
        file
    }
}
