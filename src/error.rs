//! Logger error taxonomy
//!
//! Every fallible operation in the core returns [`LoggerResult`]. Faults
//! raised during a wake cycle stay inside that cycle; only
//! [`LoggerError::ClockInvalid`] blocks the return to sleep.

use thiserror_no_std::Error;

/// Errors raised by the logger core
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum LoggerError {
    /// Clock never set or reporting an implausible date
    #[error("real-time clock is unset or reports an implausible date")]
    ClockInvalid,
    /// SD card missing or unmountable when the record was opened
    #[error("storage volume could not be opened")]
    StorageUnavailable,
    /// Write to an already-open record failed
    #[error("write to the open record failed")]
    StorageWrite,
    /// Bounded sample loop ended without a single valid reading
    #[error("sensor sample budget exhausted without a valid reading")]
    SensorTimeout,
    /// Scheduling requested with a zero wake interval
    #[error("wake interval is zero; scheduled sleep is disabled")]
    ZeroInterval,
    /// Configuration rejected at initialisation
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// Formatted field did not fit the field buffer
    #[error("record field exceeds buffer capacity")]
    FieldOverflow,
}

impl LoggerError {
    /// Number of warning flashes used to signal this fault on the status LED
    #[must_use]
    pub const fn flash_code(self) -> u8 {
        match self {
            Self::ClockInvalid => 1,
            Self::StorageUnavailable => 2,
            Self::StorageWrite => 3,
            Self::SensorTimeout => 4,
            Self::ZeroInterval | Self::InvalidConfig(_) => 5,
            Self::FieldOverflow => 6,
        }
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for LoggerError {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::ClockInvalid => defmt::write!(f, "ClockInvalid"),
            Self::StorageUnavailable => defmt::write!(f, "StorageUnavailable"),
            Self::StorageWrite => defmt::write!(f, "StorageWrite"),
            Self::SensorTimeout => defmt::write!(f, "SensorTimeout"),
            Self::ZeroInterval => defmt::write!(f, "ZeroInterval"),
            Self::InvalidConfig(why) => defmt::write!(f, "InvalidConfig({})", why),
            Self::FieldOverflow => defmt::write!(f, "FieldOverflow"),
        }
    }
}

/// Logger operation result
pub type LoggerResult<T> = Result<T, LoggerError>;
