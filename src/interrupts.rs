//! Interrupt handler entry points
//!
//! Free functions suitable for binding to interrupt vectors or edge-wait
//! tasks. They reach the [`SharedEventState`] installed by [`register`];
//! before registration they do nothing.

use core::cell::Cell;

use critical_section::Mutex;

use crate::events::SharedEventState;

static REGISTERED: Mutex<Cell<Option<&'static SharedEventState>>> = Mutex::new(Cell::new(None));

/// Install the state the handlers write to
///
/// Called once by [`crate::logger::Logger::initialize`]. A later call
/// replaces the previous registration.
pub fn register(state: &'static SharedEventState) {
    critical_section::with(|cs| REGISTERED.borrow(cs).set(Some(state)));
}

/// Currently registered state, if any
#[must_use]
pub fn registered() -> Option<&'static SharedEventState> {
    critical_section::with(|cs| REGISTERED.borrow(cs).get())
}

/// Clock alarm line asserted
pub fn on_clock_alarm() {
    if let Some(state) = registered() {
        state.on_clock_alarm();
    }
}

/// External wake line asserted
pub fn on_external_wake() {
    if let Some(state) = registered() {
        state.on_external_wake();
    }
}

/// Rain gauge reed switch closed at `now_ms`
pub fn on_bucket_tip(now_ms: u32) {
    if let Some(state) = registered() {
        state.on_bucket_tip(now_ms);
    }
}

/// Anemometer reed switch closed
pub fn on_anemometer_pulse() {
    if let Some(state) = registered() {
        state.on_anemometer_pulse();
    }
}
