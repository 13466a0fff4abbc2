//! Sensor acquisition
//!
//! The logger owns how samples are gathered (oversampling bursts, bounded
//! ping series, anemometer reading windows) and how results land in the open
//! record. Turning samples into physical units is left to a
//! [`SensorReading`] supplied by the measurement script.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use heapless::Vec;
#[cfg(feature = "embedded")]
use micromath::F32Ext;

use crate::config::{
    ANALOG_READ_SPACING_US, DEFAULT_SERIES_ATTEMPT_FACTOR, DEFAULT_SERIES_SAMPLES,
    MAX_EXTRA_BITS, MAX_OVERSAMPLE_READS, MAX_SERIES_SAMPLES,
};
use crate::error::{LoggerError, LoggerResult};
use crate::events::SharedEventState;
use crate::power::PowerController;
use crate::storage::{ActiveRecord, StorageVolume};
use crate::types::Peripheral;

/// Raw analog-to-digital converter access
pub trait AnalogSampler {
    /// One conversion on `channel`
    fn read(&mut self, channel: u8) -> u16;

    /// Native converter resolution in bits
    fn resolution_bits(&self) -> u8;
}

/// Stateless conversion from acquired samples to a physical value
pub trait SensorReading {
    /// Convert samples (layout defined by the acquisition routine)
    fn convert(&self, samples: &[f32]) -> f32;
}

impl<F> SensorReading for F
where
    F: Fn(&[f32]) -> f32,
{
    fn convert(&self, samples: &[f32]) -> f32 {
        self(samples)
    }
}

/// Rotations counted over a window to linear speed
///
/// Samples: `[rotations, window_seconds]`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RotationRate {
    /// Speed per rotation-per-second (m/s per Hz)
    pub meters_per_second_per_rotation: f32,
}

impl SensorReading for RotationRate {
    fn convert(&self, samples: &[f32]) -> f32 {
        match samples {
            [rotations, seconds, ..] if *seconds > 0.0 => {
                rotations / seconds * self.meters_per_second_per_rotation
            }
            _ => f32::NAN,
        }
    }
}

/// Analog channel acquisition settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalogConfig {
    /// Converter channel
    pub channel: u8,
    /// Target resolution; above the native resolution oversampling adds bits
    pub adc_bits: Option<u8>,
    /// Values averaged into the result
    pub samples: u16,
}

impl AnalogConfig {
    /// Single native-resolution read of `channel`
    #[must_use]
    pub const fn new(channel: u8) -> Self {
        Self {
            channel,
            adc_bits: None,
            samples: 1,
        }
    }

    /// Request a resolution in bits (returns new config)
    #[must_use]
    pub const fn with_bits(self, bits: u8) -> Self {
        Self {
            adc_bits: Some(bits),
            ..self
        }
    }

    /// Average several values (returns new config)
    #[must_use]
    pub const fn with_samples(self, samples: u16) -> Self {
        Self { samples, ..self }
    }
}

/// Result of an oversampled analog read
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalogValue {
    /// Average in counts at the effective resolution
    pub counts: f32,
    /// Effective resolution in bits
    pub bits: u8,
    /// Converter reads performed
    pub reads: u32,
}

impl AnalogValue {
    /// Largest count at the effective resolution
    #[must_use]
    pub fn full_scale(&self) -> f32 {
        ((1_u32 << self.bits) - 1) as f32
    }

    /// Fraction of full scale (0.0 - 1.0)
    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.counts / self.full_scale()
    }
}

/// Oversample and decimate an analog channel
///
/// Each extra bit above the native resolution costs four reads per value.
/// Extra bits are capped at [`MAX_EXTRA_BITS`] and the value count is
/// trimmed so one call never exceeds [`MAX_OVERSAMPLE_READS`] reads.
pub fn oversample<A, D>(sampler: &mut A, delay: &mut D, config: &AnalogConfig) -> AnalogValue
where
    A: AnalogSampler,
    D: DelayNs,
{
    let native = sampler.resolution_bits();
    let extra = config
        .adc_bits
        .map_or(0, |bits| bits.saturating_sub(native))
        .min(MAX_EXTRA_BITS);
    let reads_per_value = 1_u32 << (2 * u32::from(extra));
    let values = u32::from(config.samples.max(1)).min((MAX_OVERSAMPLE_READS / reads_per_value).max(1));

    let mut total = 0.0_f32;
    for _ in 0..values {
        let mut sum = 0_u32;
        for _ in 0..reads_per_value {
            sum += u32::from(sampler.read(config.channel));
            delay.delay_us(ANALOG_READ_SPACING_US);
        }
        total += (sum >> extra) as f32;
    }

    AnalogValue {
        counts: total / values as f32,
        bits: native + extra,
        reads: values * reads_per_value,
    }
}

/// Bounded sample series settings (e.g. ultrasonic pings)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeriesConfig {
    /// Valid samples wanted
    pub samples: u8,
    /// Total attempts allowed, valid or not
    pub max_attempts: u16,
    /// Pause between attempts
    pub spacing_ms: u32,
    /// Also write the standard deviation after the mean
    pub write_spread: bool,
}

impl SeriesConfig {
    /// `samples` valid readings with the default attempt budget
    #[must_use]
    pub const fn new(samples: u8) -> Self {
        Self {
            samples,
            max_attempts: samples as u16 * DEFAULT_SERIES_ATTEMPT_FACTOR as u16,
            spacing_ms: 0,
            write_spread: true,
        }
    }

    /// Set the attempt budget (returns new config)
    #[must_use]
    pub const fn with_max_attempts(self, max_attempts: u16) -> Self {
        Self {
            max_attempts,
            ..self
        }
    }

    /// Set the pause between attempts (returns new config)
    #[must_use]
    pub const fn with_spacing_ms(self, spacing_ms: u32) -> Self {
        Self { spacing_ms, ..self }
    }

    /// Write only the mean (returns new config)
    #[must_use]
    pub const fn mean_only(self) -> Self {
        Self {
            write_spread: false,
            ..self
        }
    }
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_SAMPLES)
    }
}

/// Summary of a sample series
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeriesStats {
    /// Mean of the valid samples
    pub mean: f32,
    /// Sample standard deviation (0 for a single sample)
    pub std_dev: f32,
    /// Valid samples collected
    pub valid: u8,
    /// Attempts used
    pub attempts: u16,
    /// The attempt budget ran out before `samples` valid readings
    pub exhausted: bool,
}

/// Mean of a slice; NaN when empty
#[must_use]
pub fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        return f32::NAN;
    }
    values.iter().sum::<f32>() / values.len() as f32
}

/// Sample standard deviation about `mean`
#[must_use]
pub fn standard_deviation(values: &[f32], mean: f32) -> f32 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f32 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / (values.len() - 1) as f32).sqrt()
}

/// Collect a bounded series
///
/// `sample` returns None for an invalid reading (no echo, out of range).
/// Stops after `samples` valid readings or `max_attempts` attempts, whichever
/// comes first. A partial series is still summarised; an empty one is a
/// [`LoggerError::SensorTimeout`].
pub fn collect_series<D, F>(config: &SeriesConfig, delay: &mut D, mut sample: F) -> LoggerResult<SeriesStats>
where
    D: DelayNs,
    F: FnMut() -> Option<f32>,
{
    let wanted = usize::from(config.samples).clamp(1, MAX_SERIES_SAMPLES);
    let mut values: Vec<f32, MAX_SERIES_SAMPLES> = Vec::new();
    let mut attempts = 0_u16;

    while values.len() < wanted && attempts < config.max_attempts {
        attempts += 1;
        if let Some(v) = sample() {
            if !v.is_nan() {
                // Capacity is MAX_SERIES_SAMPLES and wanted never exceeds it
                let _ = values.push(v);
            }
        }
        if config.spacing_ms > 0 {
            delay.delay_ms(config.spacing_ms);
        }
    }

    if values.is_empty() {
        return Err(LoggerError::SensorTimeout);
    }
    let m = mean(&values);
    Ok(SeriesStats {
        mean: m,
        std_dev: standard_deviation(&values, m),
        valid: values.len() as u8,
        attempts,
        exhausted: values.len() < wanted,
    })
}

/// Anemometer reading window settings
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnemometerConfig {
    /// Counting window
    pub reading_duration_ms: u32,
    /// Calibration: m/s per rotation per second
    pub meters_per_second_per_rotation: f32,
}

impl AnemometerConfig {
    /// Typical cup anemometer: 3 s window, 1 rotation/s = 0.667 m/s
    pub const DEFAULT: Self = Self {
        reading_duration_ms: 3_000,
        meters_per_second_per_rotation: 0.667,
    };
}

impl Default for AnemometerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Handle given to the measurement script during a wake cycle
///
/// Every method appends its result to the open record.
pub struct Measurements<'a, 'v, V, A, D, P>
where
    V: StorageVolume,
{
    record: &'a mut ActiveRecord<'v, V>,
    sampler: &'a mut A,
    delay: &'a mut D,
    power: &'a mut PowerController<P>,
    events: &'a SharedEventState,
    timeouts: u8,
}

impl<'a, 'v, V, A, D, P> Measurements<'a, 'v, V, A, D, P>
where
    V: StorageVolume,
    A: AnalogSampler,
    D: DelayNs,
    P: OutputPin,
{
    pub(crate) fn new(
        record: &'a mut ActiveRecord<'v, V>,
        sampler: &'a mut A,
        delay: &'a mut D,
        power: &'a mut PowerController<P>,
        events: &'a SharedEventState,
    ) -> Self {
        Self {
            record,
            sampler,
            delay,
            power,
            events,
            timeouts: 0,
        }
    }

    /// Sensor loops that ended without a valid reading this cycle
    #[must_use]
    pub const fn timeouts(&self) -> u8 {
        self.timeouts
    }

    /// Energise the sensor excitation rail
    pub fn start_analog(&mut self) {
        self.power.power_on(Peripheral::SensorExcitation, self.delay);
    }

    /// Cut the sensor excitation rail
    pub fn end_analog(&mut self) {
        self.power.power_off(Peripheral::SensorExcitation);
    }

    /// Oversampled analog value as a fraction of full scale, not recorded
    pub fn read_ratio(&mut self, config: &AnalogConfig) -> f32 {
        oversample(self.sampler, self.delay, config).ratio()
    }

    /// Read a channel, convert and record
    ///
    /// `reading` receives `[counts, full_scale]` at the effective resolution.
    pub fn analog<R: SensorReading>(&mut self, config: &AnalogConfig, reading: &R) -> LoggerResult<f32> {
        let value = oversample(self.sampler, self.delay, config);
        let converted = reading.convert(&[value.counts, value.full_scale()]);
        self.record.float(converted)?;
        Ok(converted)
    }

    /// Like [`Self::analog`] with the excitation rail on for the read only
    pub fn analog_excited<R: SensorReading>(
        &mut self,
        config: &AnalogConfig,
        reading: &R,
    ) -> LoggerResult<f32> {
        self.start_analog();
        let value = oversample(self.sampler, self.delay, config);
        self.end_analog();
        let converted = reading.convert(&[value.counts, value.full_scale()]);
        self.record.float(converted)?;
        Ok(converted)
    }

    /// Count reed-switch closures over a window and record wind speed
    pub fn anemometer(&mut self, config: &AnemometerConfig) -> LoggerResult<f32> {
        self.anemometer_with(config, &RotationRate {
            meters_per_second_per_rotation: config.meters_per_second_per_rotation,
        })
    }

    /// Anemometer window with a custom rotation conversion
    pub fn anemometer_with<R: SensorReading>(
        &mut self,
        config: &AnemometerConfig,
        reading: &R,
    ) -> LoggerResult<f32> {
        // Discard anything counted before the window opened
        self.events.read_and_reset_count();
        self.events.arm_anemometer(true);
        self.delay.delay_ms(config.reading_duration_ms);
        self.events.arm_anemometer(false);
        let rotations = self.events.read_and_reset_count();

        let seconds = config.reading_duration_ms as f32 / 1000.0;
        let speed = reading.convert(&[rotations as f32, seconds]);
        debug!("anemometer {} rotations in {} ms", rotations, config.reading_duration_ms);
        self.record.float(speed)?;
        Ok(speed)
    }

    /// Run a bounded series and record its mean (and spread)
    ///
    /// An empty series writes `NaN` in place of the values and counts a
    /// timeout instead of failing the cycle.
    pub fn series<F>(&mut self, config: &SeriesConfig, sample: F) -> LoggerResult<Option<SeriesStats>>
    where
        F: FnMut() -> Option<f32>,
    {
        match collect_series(config, self.delay, sample) {
            Ok(stats) => {
                if stats.exhausted {
                    warn!("series partial: {} of {} samples", stats.valid, config.samples);
                }
                self.record.float(stats.mean)?;
                if config.write_spread {
                    self.record.float(stats.std_dev)?;
                }
                Ok(Some(stats))
            }
            Err(LoggerError::SensorTimeout) => {
                warn!("series timed out after {} attempts", config.max_attempts);
                self.timeouts = self.timeouts.saturating_add(1);
                self.record.float(f32::NAN)?;
                if config.write_spread {
                    self.record.float(f32::NAN)?;
                }
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Record an already-computed value
    pub fn field(&mut self, value: f32) -> LoggerResult<()> {
        self.record.float(value)
    }

    /// Record an integer
    pub fn count(&mut self, value: u32) -> LoggerResult<()> {
        self.record.unsigned(value)
    }

    /// Record text
    pub fn text(&mut self, value: &str) -> LoggerResult<()> {
        self.record.text(value)
    }

    /// Busy-wait inside the script (sensor warm-up)
    pub fn delay_ms(&mut self, ms: u32) {
        self.delay.delay_ms(ms);
    }
}
