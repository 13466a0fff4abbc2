//! Host mocks shared by the integration tests
//!
//! Every mock hands out a cheap clonable handle (shared `Rc<RefCell<_>>`
//! state) so a test can inspect what the logger did after moving the mock
//! into it.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::rc::Rc;

use alog_firmware::clock::RealTimeClock;
use alog_firmware::config::LoggerConfig;
use alog_firmware::error::{LoggerError, LoggerResult};
use alog_firmware::events::SharedEventState;
use alog_firmware::logger::{Logger, Peripherals};
use alog_firmware::power::{ActiveLevel, Rails};
use alog_firmware::sensors::AnalogSampler;
use alog_firmware::sleep::Hibernate;
use alog_firmware::storage::StorageVolume;
use alog_firmware::types::DateTime;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType, OutputPin};

/// Build a date or panic
pub fn dt(year: u16, month: u8, day: u8, hour: u8, minute: u8, second: u8) -> DateTime {
    DateTime::new(year, month, day, hour, minute, second).expect("valid test date")
}

/// A fresh process-lifetime event state per test
pub fn leaked_events() -> &'static SharedEventState {
    Box::leak(Box::new(SharedEventState::new()))
}

// =============================================================================
// Clock
// =============================================================================

#[derive(Debug)]
pub struct ClockState {
    pub now: DateTime,
    pub valid: bool,
    pub alarm: Option<DateTime>,
    pub alarms_set: Vec<DateTime>,
    pub clears: usize,
    /// Seconds the clock advances on every `now()` read
    pub tick_per_read: u64,
}

#[derive(Clone, Debug)]
pub struct MockClock(pub Rc<RefCell<ClockState>>);

impl MockClock {
    pub fn new(now: DateTime) -> Self {
        Self(Rc::new(RefCell::new(ClockState {
            now,
            valid: true,
            alarm: None,
            alarms_set: Vec::new(),
            clears: 0,
            tick_per_read: 0,
        })))
    }

    pub fn invalid() -> Self {
        let clock = Self::new(dt(2000, 1, 1, 0, 0, 0));
        clock.0.borrow_mut().valid = false;
        clock
    }

    pub fn set_now(&self, now: DateTime) {
        self.0.borrow_mut().now = now;
    }

    pub fn advance(&self, secs: u64) {
        let mut s = self.0.borrow_mut();
        s.now = s.now.add_seconds(secs).expect("in range");
    }

    /// Jump to the programmed alarm, as if the processor slept until it
    pub fn jump_to_alarm(&self) {
        let mut s = self.0.borrow_mut();
        if let Some(at) = s.alarm {
            s.now = at;
        }
    }

    pub fn now_value(&self) -> DateTime {
        self.0.borrow().now
    }

    pub fn alarm(&self) -> Option<DateTime> {
        self.0.borrow().alarm
    }

    pub fn alarms_set(&self) -> Vec<DateTime> {
        self.0.borrow().alarms_set.clone()
    }
}

impl RealTimeClock for MockClock {
    fn now(&mut self) -> DateTime {
        let mut s = self.0.borrow_mut();
        let now = s.now;
        if s.tick_per_read > 0 {
            s.now = s.now.add_seconds(s.tick_per_read).expect("in range");
        }
        now
    }

    fn set_alarm(&mut self, at: DateTime) {
        let mut s = self.0.borrow_mut();
        s.alarm = Some(at);
        s.alarms_set.push(at);
    }

    fn clear_alarm(&mut self) {
        let mut s = self.0.borrow_mut();
        s.alarm = None;
        s.clears += 1;
    }

    fn is_clock_valid(&mut self) -> bool {
        self.0.borrow().valid
    }

    fn set_time(&mut self, now: DateTime) {
        let mut s = self.0.borrow_mut();
        s.now = now;
        s.valid = true;
    }
}

// =============================================================================
// Storage
// =============================================================================

#[derive(Debug, Default)]
pub struct VolumeState {
    pub files: BTreeMap<String, String>,
    pub open: Option<String>,
    /// Opens that fail before one succeeds
    pub failing_opens: usize,
    /// Fail every open
    pub unavailable: bool,
    /// Fail writes once this many fields were written
    pub fail_writes_after: Option<usize>,
    pub fields_written: usize,
    pub open_calls: usize,
    pub close_calls: usize,
    pub timestamps: Vec<DateTime>,
    /// Times the storage rail was cut
    pub power_losses: usize,
}

#[derive(Clone, Debug, Default)]
pub struct MockVolume(pub Rc<RefCell<VolumeState>>);

impl MockVolume {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unavailable() -> Self {
        let v = Self::new();
        v.0.borrow_mut().unavailable = true;
        v
    }

    pub fn file(&self, name: &str) -> Option<String> {
        self.0.borrow().files.get(name).cloned()
    }

    /// Lines of a file, without terminators
    pub fn lines(&self, name: &str) -> Vec<String> {
        self.file(name)
            .map(|f| f.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }

    pub fn is_open_now(&self) -> bool {
        self.0.borrow().open.is_some()
    }

    pub fn open_calls(&self) -> usize {
        self.0.borrow().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.0.borrow().close_calls
    }

    pub fn power_losses(&self) -> usize {
        self.0.borrow().power_losses
    }

    pub fn file_count(&self) -> usize {
        self.0.borrow().files.len()
    }

    fn append(&mut self, text: &str) -> LoggerResult<()> {
        let mut s = self.0.borrow_mut();
        let name = s.open.clone().ok_or(LoggerError::StorageWrite)?;
        s.files.entry(name).or_default().push_str(text);
        Ok(())
    }
}

impl StorageVolume for MockVolume {
    fn open_append(&mut self, name: &str) -> LoggerResult<()> {
        let mut s = self.0.borrow_mut();
        s.open_calls += 1;
        if s.unavailable {
            return Err(LoggerError::StorageUnavailable);
        }
        if s.failing_opens > 0 {
            s.failing_opens -= 1;
            return Err(LoggerError::StorageUnavailable);
        }
        s.open = Some(name.to_owned());
        Ok(())
    }

    fn write_field(&mut self, text: &str) -> LoggerResult<()> {
        {
            let mut s = self.0.borrow_mut();
            if s.fail_writes_after.is_some_and(|n| s.fields_written >= n) {
                return Err(LoggerError::StorageWrite);
            }
            s.fields_written += 1;
        }
        self.append(text)
    }

    fn write_newline(&mut self) -> LoggerResult<()> {
        self.append("\n")
    }

    fn close(&mut self) -> LoggerResult<()> {
        let mut s = self.0.borrow_mut();
        s.close_calls += 1;
        s.open = None;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.0.borrow().open.is_some()
    }

    fn set_timestamp(&mut self, now: DateTime) {
        self.0.borrow_mut().timestamps.push(now);
    }

    fn power_lost(&mut self) {
        let mut state = self.0.borrow_mut();
        state.open = None;
        state.power_losses += 1;
    }
}

// =============================================================================
// Pins and delay
// =============================================================================

/// Output pin recording every level it was driven to
#[derive(Clone, Debug, Default)]
pub struct MockPin(pub Rc<RefCell<Vec<bool>>>);

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_high(&self) -> bool {
        self.0.borrow().last().copied().unwrap_or(false)
    }

    pub fn writes(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn rising_edges(&self) -> usize {
        self.0.borrow().windows(2).filter(|w| !w[0] && w[1]).count()
    }
}

impl ErrorType for MockPin {
    type Error = Infallible;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.0.borrow_mut().push(true);
        Ok(())
    }
}

/// Delay that only accumulates the requested time
///
/// An optional hook runs on every millisecond delay, standing in for
/// interrupts that fire while the main context waits.
#[derive(Clone, Default)]
pub struct MockDelay {
    pub total_ns: Rc<Cell<u64>>,
    pub ms_calls: Rc<RefCell<Vec<u32>>>,
    hook: Option<Rc<dyn Fn(u32)>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(hook: impl Fn(u32) + 'static) -> Self {
        Self {
            hook: Some(Rc::new(hook)),
            ..Self::default()
        }
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }

    pub fn ms_calls(&self) -> Vec<u32> {
        self.ms_calls.borrow().clone()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ns));
    }

    fn delay_us(&mut self, us: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(us) * 1_000);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.total_ns.set(self.total_ns.get() + u64::from(ms) * 1_000_000);
        self.ms_calls.borrow_mut().push(ms);
        if let Some(hook) = &self.hook {
            hook(ms);
        }
    }
}

// =============================================================================
// Sampler and hibernate
// =============================================================================

/// ADC returning a fixed value per channel
#[derive(Clone, Debug)]
pub struct MockSampler {
    pub values: Rc<RefCell<BTreeMap<u8, u16>>>,
    pub reads: Rc<Cell<u32>>,
    pub bits: u8,
}

impl MockSampler {
    pub fn new(bits: u8) -> Self {
        Self {
            values: Rc::default(),
            reads: Rc::default(),
            bits,
        }
    }

    pub fn with_value(self, channel: u8, value: u16) -> Self {
        self.values.borrow_mut().insert(channel, value);
        self
    }

    pub fn reads(&self) -> u32 {
        self.reads.get()
    }
}

impl AnalogSampler for MockSampler {
    fn read(&mut self, channel: u8) -> u16 {
        self.reads.set(self.reads.get() + 1);
        self.values.borrow().get(&channel).copied().unwrap_or(0)
    }

    fn resolution_bits(&self) -> u8 {
        self.bits
    }
}

/// Hibernate that runs a closure in place of the low-power wait
pub struct FnHibernate<F: FnMut()>(pub F);

impl<F: FnMut()> Hibernate for FnHibernate<F> {
    fn hibernate(&mut self) {
        (self.0)();
    }
}

// =============================================================================
// Logger fixture
// =============================================================================

pub type TestLogger = Logger<MockClock, MockVolume, MockSampler, MockDelay, MockPin, MockPin>;

/// Shared handles into a logger built by [`logger`]
pub struct Fixture {
    pub clock: MockClock,
    pub volume: MockVolume,
    pub sampler: MockSampler,
    pub delay: MockDelay,
    pub clock_rail: MockPin,
    pub storage_rail: MockPin,
    pub excitation_rail: MockPin,
    pub led: MockPin,
    pub events: &'static SharedEventState,
}

pub fn logger_with(config: LoggerConfig, clock: MockClock, volume: MockVolume) -> (TestLogger, Fixture) {
    let fixture = Fixture {
        clock,
        volume,
        sampler: MockSampler::new(12).with_value(0, 2048),
        delay: MockDelay::new(),
        clock_rail: MockPin::new(),
        storage_rail: MockPin::new(),
        excitation_rail: MockPin::new(),
        led: MockPin::new(),
        events: leaked_events(),
    };
    let peripherals = Peripherals {
        clock: fixture.clock.clone(),
        volume: fixture.volume.clone(),
        sampler: fixture.sampler.clone(),
        delay: fixture.delay.clone(),
        rails: Rails::new(
            (fixture.clock_rail.clone(), ActiveLevel::High),
            (fixture.storage_rail.clone(), ActiveLevel::Low),
            (fixture.excitation_rail.clone(), ActiveLevel::High),
        ),
        led: fixture.led.clone(),
    };
    (Logger::initialize(config, peripherals, fixture.events), fixture)
}

pub fn logger(config: LoggerConfig, now: DateTime) -> (TestLogger, Fixture) {
    logger_with(config, MockClock::new(now), MockVolume::new())
}
