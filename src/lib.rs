//! Environmental Data Logger Firmware Library
//!
//! Core of a battery-powered field data logger built around an STM32G474:
//! a real-time clock wakes the processor on a fixed interval (or a rain gauge
//! tip / external line wakes it early), the logger powers the SD card and
//! sensor rails, writes one comma-separated record and powers everything down
//! again.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LOGGER FACADE                           │
//! │  setup  │  set_clock  │  wake_cycle  │  sleep  │  run_once   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                         CORE                                 │
//! │  AlarmScheduler │ SleepCycle │ LoggingSession │ Measurements │
//! │  SharedEventState (interrupt flags, tip latch, counter)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    COLLABORATOR TRAITS                       │
//! │  RealTimeClock │ StorageVolume │ AnalogSampler │ Hibernate   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  BOARD LAYER (embedded)                      │
//! │  STM32 RTC │ embedded-sdmmc │ ADC │ EXTI lines (embassy)     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Design Principles
//!
//! - **Synchronous core**: the only suspension point is the sleep wait
//! - **Interrupt handlers set flags**: no I/O outside the main context
//! - **Records always close**: the open record is released on every path
//! - **Explicit error handling**: faults are contained to one wake cycle

#![cfg_attr(feature = "embedded", no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Re-export dependencies needed by applications (only in embedded mode)
#[cfg(feature = "embedded")]
pub use embassy_executor;
#[cfg(feature = "embedded")]
pub use embassy_stm32;
#[cfg(feature = "embedded")]
pub use embassy_time;

#[macro_use]
mod log;

/// Hardware Abstraction Layer
///
/// Binds the collaborator traits to the STM32G474 board.
#[cfg(feature = "embedded")]
pub mod hal;

/// Shared types used across modules
pub mod types;

/// Error taxonomy
pub mod error;

/// System configuration and constants
pub mod config;

/// Supply rail switching
pub mod power;

/// Status LED patterns
pub mod indicator;

/// Real-time clock trait and alarm scheduling
pub mod clock;

/// Interrupt-shared event state
pub mod events;

/// Interrupt handler entry points
pub mod interrupts;

/// Record storage
pub mod storage;

/// Sensor acquisition
pub mod sensors;

/// Per-wake logging session
pub mod session;

/// Sleep state machine
pub mod sleep;

/// Logger facade
pub mod logger;

/// Prelude module for common imports
pub mod prelude {
    //! Convenient re-exports for measurement scripts and board setup.

    pub use crate::clock::{AlarmSpec, RealTimeClock};
    pub use crate::config::{LoggerConfig, TriggeredRecord};
    pub use crate::error::{LoggerError, LoggerResult};
    pub use crate::events::SharedEventState;
    pub use crate::logger::{CycleReport, Logger, Peripherals};
    pub use crate::power::{ActiveLevel, Rails};
    pub use crate::sensors::{
        AnalogConfig, AnalogSampler, AnemometerConfig, Measurements, RotationRate, SensorReading,
        SeriesConfig,
    };
    pub use crate::sleep::{Hibernate, SleepState};
    pub use crate::storage::StorageVolume;
    pub use crate::types::{DateTime, Interval, WakeReason};

    // Common traits
    pub use embedded_hal::delay::DelayNs;
    pub use embedded_hal::digital::OutputPin;

    // Embassy
    #[cfg(feature = "embedded")]
    pub use embassy_time::{Duration, Instant, Timer};

    // Logging
    #[cfg(feature = "embedded")]
    pub use defmt::{debug, error, info, trace, warn};
}
