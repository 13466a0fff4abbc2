//! Sleep/wake state machine
//!
//! ```text
//!          prepare            enter             wake            resume
//! Awake ───────────> Preparing ─────> Asleep ─────────> Waking ─────────> Awake
//!   │                  │  abort                                             ▲
//!   │                  └──────────────────────────────────────────────────> │
//!   │ clock invalid                              set_clock                  │
//!   └────────────> AwaitingClockSet ────────────────────────────────────────┘
//! ```
//!
//! The processor only suspends in `Asleep`; everything else is the main
//! context running to completion.

use crate::error::{LoggerError, LoggerResult};

/// Low-power wait
///
/// Blocks until any enabled interrupt fires (WFI/STOP on the board, a
/// scripted event source in tests).
pub trait Hibernate {
    /// Suspend until the next interrupt
    fn hibernate(&mut self);
}

/// Power state of the logger
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SleepState {
    /// Main context running a wake cycle
    #[default]
    Awake,
    /// Rails going down, wake sources being armed
    PreparingSleep,
    /// Processor suspended
    Asleep,
    /// Interrupt received, reason not yet dispatched
    Waking,
    /// Clock unset; nothing is scheduled until the time is set
    AwaitingClockSet,
}

#[cfg(feature = "embedded")]
impl defmt::Format for SleepState {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Awake => defmt::write!(f, "Awake"),
            Self::PreparingSleep => defmt::write!(f, "PreparingSleep"),
            Self::Asleep => defmt::write!(f, "Asleep"),
            Self::Waking => defmt::write!(f, "Waking"),
            Self::AwaitingClockSet => defmt::write!(f, "AwaitingClockSet"),
        }
    }
}

/// Sleep state machine
#[derive(Clone, Copy, Debug, Default)]
pub struct SleepCycle {
    state: SleepState,
}

impl SleepCycle {
    /// Start awake
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: SleepState::Awake,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> SleepState {
        self.state
    }

    fn transition(&mut self, to: SleepState) {
        trace!("sleep {} -> {}", self.state, to);
        self.state = to;
    }

    /// Begin preparing for sleep
    ///
    /// Requires the awake state and a programmed alarm still in the future.
    pub fn prepare(&mut self, alarm_ahead: bool) -> LoggerResult<()> {
        match self.state {
            SleepState::AwaitingClockSet => Err(LoggerError::ClockInvalid),
            SleepState::Awake if alarm_ahead => {
                self.transition(SleepState::PreparingSleep);
                Ok(())
            }
            SleepState::Awake => {
                warn!("no future alarm, staying awake");
                Err(LoggerError::ClockInvalid)
            }
            _ => Err(LoggerError::InvalidConfig("sleep requested outside the awake state")),
        }
    }

    /// Give up on sleeping before suspending
    pub fn abort(&mut self) {
        if self.state == SleepState::PreparingSleep {
            self.transition(SleepState::Awake);
        }
    }

    /// Processor about to suspend
    pub fn enter(&mut self) {
        if self.state == SleepState::PreparingSleep {
            self.transition(SleepState::Asleep);
        }
    }

    /// Interrupt brought the processor back
    pub fn wake(&mut self) {
        if self.state == SleepState::Asleep {
            self.transition(SleepState::Waking);
        }
    }

    /// Wake reason dispatched, back to work
    pub fn resume(&mut self) {
        if self.state == SleepState::Waking {
            self.transition(SleepState::Awake);
        }
    }

    /// Spurious wake with nothing pending: suspend again
    pub fn back_to_sleep(&mut self) {
        if self.state == SleepState::Waking {
            self.transition(SleepState::Asleep);
        }
    }

    /// Clock found unset; block scheduling until it is set
    pub fn await_clock_set(&mut self) {
        self.transition(SleepState::AwaitingClockSet);
    }

    /// Clock set by the operator
    pub fn clock_set(&mut self) {
        if self.state == SleepState::AwaitingClockSet {
            self.transition(SleepState::Awake);
        }
    }

    /// Whether a wake cycle may run
    #[must_use]
    pub const fn is_awake(&self) -> bool {
        matches!(self.state, SleepState::Awake)
    }
}

// =============================================================================
// Tests
// =============================================================================
