//! One-call logger facade
//!
//! [`Logger`] owns the board handles and ties the scheduler, sleep state
//! machine, event capture and logging session together. A measurement
//! script only ever sees [`Measurements`].
//!
//! # Example
//!
//! ```ignore
//! let config = LoggerConfig::new("Creek", "CRK01", Interval::from_minutes(15), false, true)?;
//! let mut logger = Logger::initialize(config, peripherals, &EVENTS);
//! logger.setup()?;
//! loop {
//!     let report = logger.run_once(&mut hibernate, &mut |m| {
//!         m.analog_excited(&AnalogConfig::new(0).with_bits(14), &thermistor)?;
//!         m.anemometer(&AnemometerConfig::default())?;
//!         Ok(())
//!     });
//! }
//! ```

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::clock::{clock_is_plausible, AlarmScheduler, AlarmSpec, RealTimeClock};
use crate::config::{led, LoggerConfig};
use crate::error::{LoggerError, LoggerResult};
use crate::events::{SharedEventState, WakeSources};
use crate::indicator::StatusLed;
use crate::interrupts;
use crate::power::{PowerController, Rails};
use crate::sensors::{AnalogSampler, Measurements};
use crate::session::{LoggingSession, RecordResult};
use crate::sleep::{Hibernate, SleepCycle, SleepState};
use crate::storage::StorageVolume;
use crate::types::{DateTime, Peripheral, WakeReason};

/// Board handles consumed by [`Logger::initialize`]
pub struct Peripherals<C, V, A, D, P, L> {
    /// Real-time clock
    pub clock: C,
    /// Record storage
    pub volume: V,
    /// Analog converter
    pub sampler: A,
    /// Blocking delay provider
    pub delay: D,
    /// Switchable supply rails
    pub rails: Rails<P>,
    /// Status LED pin
    pub led: L,
}

/// Outcome of one wake cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CycleReport {
    /// What woke the logger
    pub reason: WakeReason,
    /// Clock time at the start of the cycle
    pub started: DateTime,
    /// Alarm programmed for the next scheduled wake
    pub next_wake: Option<DateTime>,
    /// Record write result; failures are contained to this cycle
    pub record: RecordResult,
}

#[cfg(feature = "embedded")]
impl defmt::Format for CycleReport {
    fn format(&self, f: defmt::Formatter) {
        match self.record {
            Ok(summary) => defmt::write!(f, "Cycle({} at {}: {})", self.reason, self.started, summary),
            Err(e) => defmt::write!(f, "Cycle({} at {}: {})", self.reason, self.started, e),
        }
    }
}

/// The data logger
pub struct Logger<C, V, A, D, P, L> {
    config: LoggerConfig,
    clock: C,
    volume: V,
    sampler: A,
    delay: D,
    power: PowerController<P>,
    led: StatusLed<L>,
    events: &'static SharedEventState,
    scheduler: AlarmScheduler,
    sleep: SleepCycle,
}

impl<C, V, A, D, P, L> Logger<C, V, A, D, P, L>
where
    C: RealTimeClock,
    V: StorageVolume,
    A: AnalogSampler,
    D: DelayNs,
    P: OutputPin,
    L: OutputPin,
{
    /// Take ownership of the board and register the interrupt handlers
    ///
    /// Nothing is powered and no wake source is enabled until [`Self::setup`].
    pub fn initialize(
        config: LoggerConfig,
        peripherals: Peripherals<C, V, A, D, P, L>,
        events: &'static SharedEventState,
    ) -> Self {
        events.enable_sources(WakeSources::NONE);
        events.clear();
        events.set_refractory_ms(config.bucket_tip_refractory_ms());
        interrupts::register(events);

        info!(
            "logger {=str} site {=str} every {}",
            config.name(),
            config.site_code(),
            config.interval()
        );

        Self {
            scheduler: AlarmScheduler::new(config.interval()),
            config,
            clock: peripherals.clock,
            volume: peripherals.volume,
            sampler: peripherals.sampler,
            delay: peripherals.delay,
            power: PowerController::new(peripherals.rails),
            led: StatusLed::new(peripherals.led),
            events,
            sleep: SleepCycle::new(),
        }
    }

    /// Check the clock, announce the start and arm the first alarm
    ///
    /// An unset clock leaves the logger in [`SleepState::AwaitingClockSet`]
    /// until [`Self::set_clock`], or until a retried `setup` finds the clock
    /// running.
    pub fn setup(&mut self) -> LoggerResult<()> {
        self.power.power_on(Peripheral::Clock, &mut self.delay);
        if !clock_is_plausible(&mut self.clock) {
            return Err(self.enter_clock_recovery());
        }
        self.sleep.clock_set();
        let now = self.clock.now();

        self.power.power_on(Peripheral::Storage, &mut self.delay);
        let boot = self.session().announce(now);
        self.storage_off();
        if let Err(e) = boot {
            error!("boot record failed: {}", e);
            self.led.warn(e.flash_code(), &mut self.delay);
            return Err(e);
        }

        if self.config.use_sleep_mode() {
            self.scheduler.schedule_next(&mut self.clock, now)?;
        } else {
            info!("continuous mode");
        }
        self.events.enable_sources(self.wake_sources());
        self.led.good(&mut self.delay);
        Ok(())
    }

    /// Set the clock and leave clock recovery
    pub fn set_clock(&mut self, now: DateTime) -> LoggerResult<()> {
        self.power.power_on(Peripheral::Clock, &mut self.delay);
        self.clock.set_time(now);
        if !clock_is_plausible(&mut self.clock) {
            return Err(self.enter_clock_recovery());
        }
        info!("clock set to {}", now);

        self.events.clear();
        self.sleep.clock_set();
        if self.config.use_sleep_mode() {
            self.scheduler.schedule_next(&mut self.clock, now)?;
        }
        self.events.enable_sources(self.wake_sources());
        self.led.good(&mut self.delay);
        Ok(())
    }

    /// Handle one wake: reschedule, then write one record
    ///
    /// Storage and sensor faults are reported in [`CycleReport::record`] and
    /// leave the logger ready to sleep. Only an unset clock fails the cycle.
    pub fn wake_cycle<S>(&mut self, reason: WakeReason, sensors: &mut S) -> LoggerResult<CycleReport>
    where
        S: FnMut(&mut Measurements<'_, '_, V, A, D, P>) -> LoggerResult<()> + ?Sized,
    {
        if self.sleep.state() == SleepState::AwaitingClockSet {
            return Err(LoggerError::ClockInvalid);
        }
        self.power.power_on(Peripheral::Clock, &mut self.delay);
        if !clock_is_plausible(&mut self.clock) {
            return Err(self.enter_clock_recovery());
        }
        let started = self.clock.now();
        debug!("wake {} at {}", reason, started);

        let next_wake = if self.config.use_sleep_mode() {
            Some(self.reschedule(reason)?.wake_at)
        } else {
            None
        };

        self.power.power_on(Peripheral::Storage, &mut self.delay);
        let record = self.session().run(reason, started, sensors);
        self.storage_off();
        self.power.power_off(Peripheral::SensorExcitation);

        if let Err(e) = record {
            warn!("record failed: {}", e);
            self.led.warn(e.flash_code(), &mut self.delay);
        }

        Ok(CycleReport {
            reason,
            started,
            next_wake,
            record,
        })
    }

    /// Keep the alarm if it is still ahead, otherwise step from the one that
    /// fired so the schedule keeps its phase. A triggered wake handled in
    /// the same second as the alarm may already have advanced it.
    fn reschedule(&mut self, reason: WakeReason) -> LoggerResult<AlarmSpec> {
        trace!("reschedule after {}", reason);
        self.scheduler.ensure_future(&mut self.clock).map_err(|e| {
            if e == LoggerError::ClockInvalid {
                self.enter_clock_recovery()
            } else {
                e
            }
        })
    }

    /// Power down and arm the wake sources
    ///
    /// Returns false when a wake is already pending and the caller should
    /// skip the low-power wait.
    pub fn begin_sleep(&mut self) -> LoggerResult<bool> {
        if !self.config.use_sleep_mode() {
            return Err(LoggerError::ZeroInterval);
        }
        if self.sleep.state() == SleepState::AwaitingClockSet {
            return Err(LoggerError::ClockInvalid);
        }

        self.power.power_on(Peripheral::Clock, &mut self.delay);
        let alarm = match self.scheduler.ensure_future(&mut self.clock) {
            Ok(alarm) => alarm,
            Err(LoggerError::ClockInvalid) => return Err(self.enter_clock_recovery()),
            Err(e) => return Err(e),
        };
        let now = self.clock.now();
        self.sleep.prepare(alarm.wake_at > now)?;

        self.storage_off();
        self.power.power_off_all();
        self.events.enable_sources(self.wake_sources());
        self.sleep.enter();

        if self.events.has_pending() {
            debug!("wake pending, skipping sleep");
            return Ok(false);
        }
        debug!("sleeping until {}", alarm.wake_at);
        Ok(true)
    }

    /// Dispatch the wake that ended [`Self::begin_sleep`]
    ///
    /// Returns None for a wake with no pending reason; the logger is then
    /// asleep again and the caller should wait once more.
    pub fn finish_wake(&mut self) -> Option<WakeReason> {
        self.sleep.wake();
        self.events.enable_sources(self.wake_sources());
        match self.events.take_wake_reason() {
            Some(reason) => {
                self.sleep.resume();
                Some(reason)
            }
            None => {
                self.sleep.back_to_sleep();
                None
            }
        }
    }

    /// Sleep until the next wake reason
    pub fn sleep<H: Hibernate>(&mut self, hibernate: &mut H) -> LoggerResult<WakeReason> {
        let mut wait = self.begin_sleep()?;
        loop {
            if wait {
                hibernate.hibernate();
            }
            if let Some(reason) = self.finish_wake() {
                return Ok(reason);
            }
            wait = true;
        }
    }

    /// Sleep (unless in continuous mode), then run one wake cycle
    pub fn run_once<H, S>(&mut self, hibernate: &mut H, sensors: &mut S) -> LoggerResult<CycleReport>
    where
        H: Hibernate,
        S: FnMut(&mut Measurements<'_, '_, V, A, D, P>) -> LoggerResult<()> + ?Sized,
    {
        let reason = if self.config.use_sleep_mode() {
            self.sleep(hibernate)?
        } else {
            self.events
                .take_wake_reason()
                .unwrap_or(WakeReason::ScheduledInterval)
        };
        self.wake_cycle(reason, sensors)
    }

    /// Whether the logger sleeps between records
    #[must_use]
    pub const fn use_sleep_mode(&self) -> bool {
        self.config.use_sleep_mode()
    }

    /// Configuration
    #[must_use]
    pub const fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Sleep state machine position
    #[must_use]
    pub const fn state(&self) -> SleepState {
        self.sleep.state()
    }

    /// Alarm currently programmed
    #[must_use]
    pub const fn active_alarm(&self) -> Option<AlarmSpec> {
        self.scheduler.active()
    }

    /// Shared interrupt state
    #[must_use]
    pub const fn events(&self) -> &'static SharedEventState {
        self.events
    }

    /// Supply rails
    #[must_use]
    pub const fn power(&self) -> &PowerController<P> {
        &self.power
    }

    /// Record storage
    #[must_use]
    pub const fn volume(&self) -> &V {
        &self.volume
    }

    /// Real-time clock
    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Release the board handles
    pub fn release(self) -> (C, V, A, D) {
        (self.clock, self.volume, self.sampler, self.delay)
    }

    fn wake_sources(&self) -> WakeSources {
        WakeSources {
            alarm: self.config.use_sleep_mode(),
            external: self.config.use_external_interrupt(),
            bucket_tip: self.config.log_on_bucket_tip(),
        }
    }

    fn session(&mut self) -> LoggingSession<'_, V, A, D, P, L> {
        LoggingSession::new(
            &self.config,
            &mut self.volume,
            &mut self.sampler,
            &mut self.delay,
            &mut self.power,
            &mut self.led,
            self.events,
        )
    }

    /// Cut the storage rail; the volume must forget any card state
    fn storage_off(&mut self) {
        if self.power.is_powered(Peripheral::Storage) {
            self.power.power_off(Peripheral::Storage);
            self.volume.power_lost();
        }
    }

    fn enter_clock_recovery(&mut self) -> LoggerError {
        error!("clock invalid, waiting for it to be set");
        self.scheduler.cancel(&mut self.clock);
        self.sleep.await_clock_set();
        self.events.enable_sources(WakeSources::NONE);
        self.storage_off();
        self.power.power_off(Peripheral::SensorExcitation);
        self.led.time_wrong(led::TIME_WRONG_CYCLES, &mut self.delay);
        LoggerError::ClockInvalid
    }
}
