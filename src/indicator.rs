//! Status LED signalling
//!
//! The logger has no display, so the LED is the only way a field operator
//! learns that a card is missing or the clock needs setting. Each fault class
//! has its own pattern.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use crate::config::led;

/// Status LED state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum LedState {
    /// LED is off
    #[default]
    Off,
    /// LED is on
    On,
}

#[cfg(feature = "embedded")]
impl defmt::Format for LedState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Off => defmt::write!(f, "OFF"),
            Self::On => defmt::write!(f, "ON"),
        }
    }
}

/// Status LED driver
pub struct StatusLed<L> {
    pin: L,
    state: LedState,
}

impl<L: OutputPin> StatusLed<L> {
    /// Create a new status LED (initially off)
    pub fn new(mut pin: L) -> Self {
        pin.set_low().ok();
        Self {
            pin,
            state: LedState::Off,
        }
    }

    /// Turn LED on
    pub fn on(&mut self) {
        self.pin.set_high().ok();
        self.state = LedState::On;
    }

    /// Turn LED off
    pub fn off(&mut self) {
        self.pin.set_low().ok();
        self.state = LedState::Off;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> LedState {
        self.state
    }

    /// One long blink: setup finished or clock set
    pub fn good<D: DelayNs>(&mut self, delay: &mut D) {
        self.on();
        delay.delay_ms(led::GOOD_ON_MS);
        self.off();
    }

    /// `count` short flashes followed by a pause
    pub fn warn<D: DelayNs>(&mut self, count: u8, delay: &mut D) {
        for _ in 0..count {
            self.on();
            delay.delay_ms(led::FLASH_ON_MS);
            self.off();
            delay.delay_ms(led::FLASH_OFF_MS);
        }
        delay.delay_ms(led::BURST_PAUSE_MS);
    }

    /// Fast double blinks: the clock must be set before logging can resume
    pub fn time_wrong<D: DelayNs>(&mut self, cycles: u8, delay: &mut D) {
        for _ in 0..cycles {
            for _ in 0..2 {
                self.on();
                delay.delay_ms(led::TIME_WRONG_MS);
                self.off();
                delay.delay_ms(led::TIME_WRONG_MS);
            }
            delay.delay_ms(led::TIME_WRONG_PAUSE_MS);
        }
    }
}
