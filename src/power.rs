//! Power Management
//!
//! Switchable supply rails for the real-time clock, the SD card and the
//! sensor excitation circuit. Rails are idempotent: switching a rail to the
//! state it is already in touches nothing and costs no settle delay.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::{CLOCK_SETTLE_MS, EXCITATION_SETTLE_MS, STORAGE_SETTLE_MS};
use crate::types::Peripheral;

/// Pin level that energises a rail
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActiveLevel {
    /// Driving the control line high powers the rail
    #[default]
    High,
    /// Driving the control line low powers the rail (P-FET high-side switch)
    Low,
}

#[cfg(feature = "embedded")]
impl defmt::Format for ActiveLevel {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::High => defmt::write!(f, "HIGH"),
            Self::Low => defmt::write!(f, "LOW"),
        }
    }
}

/// One switchable supply rail
pub struct Rail<P> {
    pin: P,
    level: ActiveLevel,
    settle_ms: u32,
    powered: bool,
}

impl<P: OutputPin> Rail<P> {
    /// Create a rail and drive it to the unpowered level
    pub fn new(mut pin: P, level: ActiveLevel, settle_ms: u32) -> Self {
        drive(&mut pin, level, false);
        Self {
            pin,
            level,
            settle_ms,
            powered: false,
        }
    }

    /// Whether the rail is currently energised
    #[must_use]
    pub const fn is_powered(&self) -> bool {
        self.powered
    }

    /// Minimum delay after power-on before the peripheral is used
    #[must_use]
    pub const fn settle_ms(&self) -> u32 {
        self.settle_ms
    }

    /// Energise the rail; returns true if it was off
    fn on(&mut self) -> bool {
        if self.powered {
            return false;
        }
        drive(&mut self.pin, self.level, true);
        self.powered = true;
        true
    }

    /// De-energise the rail; returns true if it was on
    fn off(&mut self) -> bool {
        if !self.powered {
            return false;
        }
        drive(&mut self.pin, self.level, false);
        self.powered = false;
        true
    }
}

/// Drive a control line; rail switching has no failure path of its own
fn drive<P: OutputPin>(pin: &mut P, level: ActiveLevel, energise: bool) {
    let high = match level {
        ActiveLevel::High => energise,
        ActiveLevel::Low => !energise,
    };
    // A rail that fails to respond surfaces later as a peripheral fault
    if high {
        pin.set_high().ok();
    } else {
        pin.set_low().ok();
    }
}

/// The three logger rails
pub struct Rails<P> {
    /// Real-time clock supply
    pub clock: Rail<P>,
    /// SD card supply
    pub storage: Rail<P>,
    /// Sensor excitation supply
    pub excitation: Rail<P>,
}

impl<P: OutputPin> Rails<P> {
    /// Build the rails with the default settle delays
    pub fn new(
        clock: (P, ActiveLevel),
        storage: (P, ActiveLevel),
        excitation: (P, ActiveLevel),
    ) -> Self {
        Self {
            clock: Rail::new(clock.0, clock.1, CLOCK_SETTLE_MS),
            storage: Rail::new(storage.0, storage.1, STORAGE_SETTLE_MS),
            excitation: Rail::new(excitation.0, excitation.1, EXCITATION_SETTLE_MS),
        }
    }
}

/// Power controller
pub struct PowerController<P> {
    rails: Rails<P>,
}

impl<P: OutputPin> PowerController<P> {
    /// Create a power controller; every rail starts unpowered
    #[must_use]
    pub const fn new(rails: Rails<P>) -> Self {
        Self { rails }
    }

    fn rail(&self, peripheral: Peripheral) -> &Rail<P> {
        match peripheral {
            Peripheral::Clock => &self.rails.clock,
            Peripheral::Storage => &self.rails.storage,
            Peripheral::SensorExcitation => &self.rails.excitation,
        }
    }

    fn rail_mut(&mut self, peripheral: Peripheral) -> &mut Rail<P> {
        match peripheral {
            Peripheral::Clock => &mut self.rails.clock,
            Peripheral::Storage => &mut self.rails.storage,
            Peripheral::SensorExcitation => &mut self.rails.excitation,
        }
    }

    /// Power a peripheral and wait out its settle time
    ///
    /// No-op on a rail that is already powered.
    pub fn power_on<D: DelayNs>(&mut self, peripheral: Peripheral, delay: &mut D) {
        let rail = self.rail_mut(peripheral);
        if rail.on() {
            debug!("rail {} on", peripheral);
            delay.delay_ms(rail.settle_ms());
        } else {
            trace!("rail {} already on", peripheral);
        }
    }

    /// Cut power to a peripheral
    pub fn power_off(&mut self, peripheral: Peripheral) {
        if self.rail_mut(peripheral).off() {
            debug!("rail {} off", peripheral);
        }
    }

    /// Cut every rail before sleep
    pub fn power_off_all(&mut self) {
        for peripheral in Peripheral::ALL {
            self.power_off(peripheral);
        }
    }

    /// Whether a peripheral's rail is energised
    #[must_use]
    pub fn is_powered(&self, peripheral: Peripheral) -> bool {
        self.rail(peripheral).is_powered()
    }

    /// Whether any rail is still energised
    #[must_use]
    pub fn any_powered(&self) -> bool {
        Peripheral::ALL.iter().any(|&p| self.is_powered(p))
    }
}
