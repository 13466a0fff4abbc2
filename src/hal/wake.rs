//! Wake lines
//!
//! On the board the "interrupt handlers" are edge-wait futures on EXTI
//! lines. They run on a higher-priority interrupt executor so they keep
//! counting while the main loop is busy in a blocking sensor read. Each
//! one calls the registered handler in [`crate::interrupts`] and, for wake
//! sources, signals the main loop out of its low-power wait.

use embassy_futures::select::{select, Either};
use embassy_stm32::exti::ExtiInput;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::{Instant, Timer};

use crate::hal::rtc::alarm_deadline;
use crate::interrupts;
use crate::sleep::Hibernate;

static WAKE: Signal<CriticalSectionRawMutex, ()> = Signal::new();

/// Milliseconds since boot, truncated for the debounce window arithmetic
#[must_use]
pub fn monotonic_ms() -> u32 {
    Instant::now().as_millis() as u32
}

/// Rain gauge reed switch (active low)
pub async fn watch_bucket_tip(mut pin: ExtiInput<'static>) -> ! {
    loop {
        pin.wait_for_falling_edge().await;
        interrupts::on_bucket_tip(monotonic_ms());
        WAKE.signal(());
    }
}

/// External wake input (active low)
pub async fn watch_external(mut pin: ExtiInput<'static>) -> ! {
    loop {
        pin.wait_for_falling_edge().await;
        interrupts::on_external_wake();
        WAKE.signal(());
    }
}

/// Anemometer reed switch (active low); counts only, never wakes
pub async fn count_anemometer(mut pin: ExtiInput<'static>) -> ! {
    loop {
        pin.wait_for_falling_edge().await;
        interrupts::on_anemometer_pulse();
    }
}

/// Low-power wait on the alarm deadline and the wake signal
///
/// The executor idles in WFI while both futures are pending.
#[derive(Debug, Default)]
pub struct WakeLines;

impl WakeLines {
    /// Wait until the alarm deadline passes or a wake line fires
    pub async fn wait(&mut self) {
        match alarm_deadline() {
            Some(deadline) => match select(Timer::at(deadline), WAKE.wait()).await {
                Either::First(()) => {
                    trace!("alarm deadline reached");
                    interrupts::on_clock_alarm();
                }
                Either::Second(()) => trace!("wake line"),
            },
            None => WAKE.wait().await,
        }
    }

    /// Block the current context until [`Self::wait`] completes
    ///
    /// For callers of [`Hibernate`] outside an async context.
    pub fn wait_blocking(&mut self) {
        embassy_futures::block_on(self.wait());
    }
}

impl Hibernate for WakeLines {
    fn hibernate(&mut self) {
        self.wait_blocking();
    }
}
