//! Interrupt-shared event state
//!
//! Everything an interrupt handler may touch lives in [`SharedEventState`]:
//! the wake flags, the bucket-tip latch and the anemometer counter. Handlers
//! only set a flag, disable their own source or bump a counter. The main
//! context reads, modifies and clears inside a critical section so an event
//! arriving between a read and its clear is never lost.

use core::cell::Cell;

use critical_section::Mutex;

use crate::config::DEFAULT_BUCKET_TIP_REFRACTORY_MS;
use crate::types::WakeReason;

/// Interrupt sources able to wake the processor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct WakeSources {
    /// Clock alarm line
    pub alarm: bool,
    /// External wake line
    pub external: bool,
    /// Rain gauge reed switch
    pub bucket_tip: bool,
}

impl WakeSources {
    /// No source enabled
    pub const NONE: Self = Self {
        alarm: false,
        external: false,
        bucket_tip: false,
    };

    /// Whether any source can wake the processor
    #[must_use]
    pub const fn any(self) -> bool {
        self.alarm || self.external || self.bucket_tip
    }
}

#[cfg(feature = "embedded")]
impl defmt::Format for WakeSources {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(
            f,
            "Sources(alarm={}, ext={}, tip={})",
            self.alarm,
            self.external,
            self.bucket_tip
        );
    }
}

/// Flags and counters shared with interrupt context
#[derive(Clone, Copy, Debug)]
struct EventFlags {
    enabled: WakeSources,
    alarm_pending: bool,
    external_pending: bool,
    tip_pending: bool,
    last_tip_ms: Option<u32>,
    tip_total: u32,
    refractory_ms: u32,
    anemometer_armed: bool,
    anemometer_count: u32,
}

impl EventFlags {
    const fn new() -> Self {
        Self {
            enabled: WakeSources::NONE,
            alarm_pending: false,
            external_pending: false,
            tip_pending: false,
            last_tip_ms: None,
            tip_total: 0,
            refractory_ms: DEFAULT_BUCKET_TIP_REFRACTORY_MS,
            anemometer_armed: false,
            anemometer_count: 0,
        }
    }
}

/// Process-wide state shared between interrupt handlers and the main loop
///
/// Intended to live in a `static`; register it with
/// [`crate::interrupts::register`] so the free-function handlers reach it.
pub struct SharedEventState {
    flags: Mutex<Cell<EventFlags>>,
}

impl SharedEventState {
    /// Create the state with no sources enabled
    #[must_use]
    pub const fn new() -> Self {
        Self {
            flags: Mutex::new(Cell::new(EventFlags::new())),
        }
    }

    fn update<R>(&self, f: impl FnOnce(&mut EventFlags) -> R) -> R {
        critical_section::with(|cs| {
            let cell = self.flags.borrow(cs);
            let mut flags = cell.get();
            let result = f(&mut flags);
            cell.set(flags);
            result
        })
    }

    fn read(&self) -> EventFlags {
        critical_section::with(|cs| self.flags.borrow(cs).get())
    }

    // ---------------------------------------------------------------------
    // Interrupt context
    // ---------------------------------------------------------------------

    /// Clock alarm matched: latch the wake and disable the source
    pub fn on_clock_alarm(&self) {
        self.update(|f| {
            if f.enabled.alarm {
                f.alarm_pending = true;
                f.enabled.alarm = false;
            }
        });
    }

    /// External wake line asserted: latch the wake and disable the source
    pub fn on_external_wake(&self) {
        self.update(|f| {
            if f.enabled.external {
                f.external_pending = true;
                f.enabled.external = false;
            }
        });
    }

    /// Bucket tipped at `now_ms` (monotonic milliseconds)
    ///
    /// Edges inside the refractory window after the last accepted tip are
    /// contact bounce and are dropped. Returns true if the tip was accepted.
    pub fn on_bucket_tip(&self, now_ms: u32) -> bool {
        self.update(|f| {
            if !f.enabled.bucket_tip {
                return false;
            }
            if let Some(last) = f.last_tip_ms {
                if now_ms.wrapping_sub(last) < f.refractory_ms {
                    return false;
                }
            }
            f.last_tip_ms = Some(now_ms);
            f.tip_total = f.tip_total.wrapping_add(1);
            f.tip_pending = true;
            true
        })
    }

    /// Anemometer reed switch closed
    pub fn on_anemometer_pulse(&self) {
        self.update(|f| {
            if f.anemometer_armed {
                f.anemometer_count = f.anemometer_count.wrapping_add(1);
            }
        });
    }

    // ---------------------------------------------------------------------
    // Main context
    // ---------------------------------------------------------------------

    /// Enable exactly the given wake sources
    pub fn enable_sources(&self, sources: WakeSources) {
        self.update(|f| f.enabled = sources);
    }

    /// Currently enabled wake sources
    #[must_use]
    pub fn enabled_sources(&self) -> WakeSources {
        self.read().enabled
    }

    /// Set the bucket-tip refractory window
    pub fn set_refractory_ms(&self, refractory_ms: u32) {
        self.update(|f| f.refractory_ms = refractory_ms);
    }

    /// Whether any wake flag is waiting to be dispatched
    #[must_use]
    pub fn has_pending(&self) -> bool {
        let f = self.read();
        f.alarm_pending || f.external_pending || f.tip_pending
    }

    /// Read and clear the highest-priority pending wake flag
    ///
    /// Bucket tips come first so the tip time stays close to the event, then
    /// the external line, then the scheduled alarm. Lower-priority flags stay
    /// pending for the next call.
    pub fn take_wake_reason(&self) -> Option<WakeReason> {
        self.update(|f| {
            if f.tip_pending {
                f.tip_pending = false;
                Some(WakeReason::BucketTip)
            } else if f.external_pending {
                f.external_pending = false;
                Some(WakeReason::ExternalInterrupt)
            } else if f.alarm_pending {
                f.alarm_pending = false;
                Some(WakeReason::ScheduledInterval)
            } else {
                None
            }
        })
    }

    /// Total bucket tips accepted since boot
    #[must_use]
    pub fn bucket_tip_total(&self) -> u32 {
        self.read().tip_total
    }

    /// Start or stop counting anemometer pulses
    pub fn arm_anemometer(&self, armed: bool) {
        self.update(|f| f.anemometer_armed = armed);
    }

    /// Atomically capture the anemometer count and zero it
    pub fn read_and_reset_count(&self) -> u32 {
        self.update(|f| core::mem::take(&mut f.anemometer_count))
    }

    /// Drop every pending flag and counter (boot / clock recovery)
    pub fn clear(&self) {
        self.update(|f| {
            let enabled = f.enabled;
            let refractory_ms = f.refractory_ms;
            let tip_total = f.tip_total;
            *f = EventFlags::new();
            f.enabled = enabled;
            f.refractory_ms = refractory_ms;
            f.tip_total = tip_total;
        });
    }
}

impl Default for SharedEventState {
    fn default() -> Self {
        Self::new()
    }
}
