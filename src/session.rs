//! Per-wake logging session
//!
//! A [`LoggingSession`] borrows the storage, sensor and power handles for one
//! wake cycle. It opens the record, stamps it, runs the measurement script
//! (or not, for triggered wakes under [`TriggeredRecord::TimestampOnly`]) and
//! closes the record before returning on every path.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{LoggerConfig, TriggeredRecord, BUCKET_TIP_FILE};
use crate::error::{LoggerError, LoggerResult};
use crate::events::SharedEventState;
use crate::indicator::StatusLed;
use crate::power::PowerController;
use crate::sensors::{AnalogSampler, Measurements};
use crate::storage::{ActiveRecord, Destination, StorageVolume};
use crate::types::{DateTime, Peripheral, WakeReason};

/// Outcome of one written record
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordSummary {
    /// Why the record was written
    pub reason: WakeReason,
    /// File the record went to
    pub destination: Destination,
    /// Fields written, timestamp included
    pub fields: usize,
    /// Sensor loops that produced no valid reading
    pub sensor_timeouts: u8,
    /// Open attempts used
    pub open_attempts: u8,
}

#[cfg(feature = "embedded")]
impl defmt::Format for RecordSummary {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Record({} -> {}, {} fields, {} timeouts)",
            self.reason,
            self.destination,
            self.fields,
            self.sensor_timeouts
        );
    }
}

/// Result of [`LoggingSession::run`]
pub type RecordResult = LoggerResult<RecordSummary>;

/// File a wake reason is logged to
#[must_use]
pub const fn destination_for(reason: WakeReason) -> Destination {
    match reason {
        WakeReason::BucketTip => Destination::BucketTip,
        WakeReason::ScheduledInterval | WakeReason::ExternalInterrupt => Destination::Interval,
    }
}

/// Borrowed handles for one wake cycle
pub struct LoggingSession<'s, V, A, D, P, L> {
    config: &'s LoggerConfig,
    volume: &'s mut V,
    sampler: &'s mut A,
    delay: &'s mut D,
    power: &'s mut PowerController<P>,
    led: &'s mut StatusLed<L>,
    events: &'s SharedEventState,
}

impl<'s, V, A, D, P, L> LoggingSession<'s, V, A, D, P, L>
where
    V: StorageVolume,
    A: AnalogSampler,
    D: DelayNs,
    P: OutputPin,
    L: OutputPin,
{
    /// Borrow the handles for a session
    pub fn new(
        config: &'s LoggerConfig,
        volume: &'s mut V,
        sampler: &'s mut A,
        delay: &'s mut D,
        power: &'s mut PowerController<P>,
        led: &'s mut StatusLed<L>,
        events: &'s SharedEventState,
    ) -> Self {
        Self {
            config,
            volume,
            sampler,
            delay,
            power,
            led,
            events,
        }
    }

    /// Whether `reason` runs the measurement script
    #[must_use]
    pub fn runs_sensors(&self, reason: WakeReason) -> bool {
        let policy = match reason {
            WakeReason::ScheduledInterval => return true,
            WakeReason::ExternalInterrupt => self.config.external_record(),
            WakeReason::BucketTip => self.config.bucket_tip_record(),
        };
        policy == TriggeredRecord::FullSequence
    }

    /// Write one record for `reason`
    ///
    /// The storage rail must already be powered. Sensor timeouts are written
    /// as `NaN` and counted; any other script error abandons the line, which
    /// is ended with an `ERR` field, terminated and closed.
    pub fn run<S>(self, reason: WakeReason, now: DateTime, sensors: &mut S) -> RecordResult
    where
        S: FnMut(&mut Measurements<'_, '_, V, A, D, P>) -> LoggerResult<()> + ?Sized,
    {
        let destination = destination_for(reason);
        let full_sequence = self.runs_sensors(reason);
        let data_file = self.config.data_file_name();
        let name = match destination {
            Destination::Interval => data_file.as_str(),
            Destination::BucketTip => BUCKET_TIP_FILE,
        };

        self.volume.set_timestamp(now);
        let attempts = self.config.storage_open_attempts();
        let mut attempt = 1;
        let mut record = loop {
            match ActiveRecord::open(&mut *self.volume, name) {
                Ok(record) => break record,
                Err(e) if attempt < attempts => {
                    warn!("open {=str} failed ({}/{}): {}", name, attempt, attempts, e);
                    self.led.warn(e.flash_code(), &mut *self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    error!("open {=str} failed after {} attempts: {}", name, attempts, e);
                    return Err(LoggerError::StorageUnavailable);
                }
            }
        };

        let mut sensor_timeouts = 0;
        let mut body = record.timestamp(now);
        if body.is_ok() && full_sequence {
            let mut measurements = Measurements::new(
                &mut record,
                &mut *self.sampler,
                &mut *self.delay,
                &mut *self.power,
                self.events,
            );
            body = sensors(&mut measurements);
            sensor_timeouts = measurements.timeouts();
        }
        // A script may leave the excitation rail on
        self.power.power_off(Peripheral::SensorExcitation);

        match body {
            Ok(()) => {}
            Err(LoggerError::SensorTimeout) => {
                warn!("sensor script timed out");
                sensor_timeouts = sensor_timeouts.saturating_add(1);
            }
            Err(e) => {
                error!("record abandoned: {}", e);
                drop(record);
                return Err(e);
            }
        }

        let fields = record.finish()?;
        let summary = RecordSummary {
            reason,
            destination,
            fields,
            sensor_timeouts,
            open_attempts: attempt,
        };
        debug!("{}", summary);
        Ok(summary)
    }

    /// Write the boot line to the interval file
    ///
    /// `timestamp,unix,START,<name>,<site code>`
    pub fn announce(self, now: DateTime) -> LoggerResult<()> {
        self.volume.set_timestamp(now);
        let data_file = self.config.data_file_name();
        let mut record = ActiveRecord::open(&mut *self.volume, &data_file)
            .map_err(|_| LoggerError::StorageUnavailable)?;
        record.timestamp(now)?;
        record.text("START")?;
        record.text(self.config.name())?;
        record.text(self.config.site_code())?;
        record.finish()?;
        info!("logger {=str} started at {}", self.config.name(), now);
        Ok(())
    }
}
