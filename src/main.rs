//! Data Logger Main Application
//!
//! Entry point for the STM32G474 field logger. Brings up the board, starts
//! the wake-line watchers on a high-priority executor and runs the
//! sleep / wake / log loop in thread mode.

#![no_std]
#![no_main]

use defmt::{error, info, warn};
use embassy_executor::{InterruptExecutor, Spawner};
use embassy_stm32::exti::ExtiInput;
use embassy_stm32::gpio::{Level, Output, Pull, Speed};
use embassy_stm32::interrupt;
use embassy_stm32::interrupt::{InterruptExt, Priority};
use embassy_stm32::rcc::LsConfig;
use embassy_stm32::rtc::{Rtc, RtcConfig};
use embassy_stm32::spi::{self, Spi};
use embassy_stm32::time::Hertz;
use embassy_time::{Delay, Timer};
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::SdCard;
use {defmt_rtt as _, panic_probe as _};

use alog_firmware::hal::adc::BoardAdc;
use alog_firmware::hal::rtc::BoardRtc;
use alog_firmware::hal::sd::SdVolume;
use alog_firmware::hal::wake::{self, WakeLines};
use alog_firmware::prelude::*;

/// Logger name written to the boot line
const LOGGER_NAME: &str = "ALog";

/// Site code, also the data file name
const SITE_CODE: &str = "SITE01";

/// Wake interval
const INTERVAL: Interval = Interval::from_minutes(15);

/// Battery sense divider ratio (R1 + R2) / R2
const BATTERY_DIVIDER: f32 = 2.0;

/// ADC reference voltage
const VREF: f32 = 3.3;

/// Retry period while the clock waits to be set
const CLOCK_RETRY_SECS: u64 = 60;

type SdSpi = ExclusiveDevice<Spi<'static, embassy_stm32::mode::Blocking>, Output<'static>, Delay>;
type BoardVolume = SdVolume<SdSpi, Delay>;
type BoardMeasurements<'a, 'v> = Measurements<'a, 'v, BoardVolume, BoardAdc<'static>, Delay, Output<'static>>;

static EVENTS: SharedEventState = SharedEventState::new();

static EXECUTOR_EDGES: InterruptExecutor = InterruptExecutor::new();

#[interrupt]
unsafe fn UART4() {
    EXECUTOR_EDGES.on_interrupt();
}

/// Measurement script run on every scheduled wake
fn measure(m: &mut BoardMeasurements<'_, '_>) -> LoggerResult<()> {
    // Channel 0: battery through the divider, channel 1: ratiometric sensor
    m.analog(&AnalogConfig::new(0).with_samples(4), &|s: &[f32]| {
        s[0] / s[1] * VREF * BATTERY_DIVIDER
    })?;
    m.analog_excited(&AnalogConfig::new(1).with_bits(14), &|s: &[f32]| s[0] / s[1])?;
    m.anemometer(&AnemometerConfig::default())?;
    m.count(EVENTS.bucket_tip_total())?;
    Ok(())
}

/// Main entry point
#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    info!("Data logger firmware v{}", env!("CARGO_PKG_VERSION"));

    // The RTC runs from the 32.768 kHz crystal so it keeps time through resets
    let mut config = embassy_stm32::Config::default();
    config.rcc.ls = LsConfig::default_lse();
    let p = embassy_stm32::init(config);

    info!("Peripherals initialized");

    // Wake-line watchers preempt the blocking logger loop
    interrupt::UART4.set_priority(Priority::P6);
    let edges = EXECUTOR_EDGES.start(interrupt::UART4);
    let tip = ExtiInput::new(p.PA1, p.EXTI1, Pull::Up);
    let ext = ExtiInput::new(p.PA0, p.EXTI0, Pull::Up);
    let anemometer = ExtiInput::new(p.PA2, p.EXTI2, Pull::Up);
    edges.spawn(bucket_tip_task(tip)).unwrap();
    edges.spawn(external_task(ext)).unwrap();
    edges.spawn(anemometer_task(anemometer)).unwrap();

    // SD card on SPI2, 400 kHz for card initialisation
    let mut spi_config = spi::Config::default();
    spi_config.frequency = Hertz(400_000);
    let spi_bus = Spi::new_blocking(p.SPI2, p.PB13, p.PB15, p.PB14, spi_config);
    let cs = Output::new(p.PB12, Level::High, Speed::VeryHigh);
    let sd_spi = match ExclusiveDevice::new(spi_bus, cs, Delay) {
        Ok(dev) => dev,
        Err(never) => match never {},
    };
    let volume = SdVolume::new(SdCard::new(sd_spi, Delay));

    let mut adc = BoardAdc::new(p.ADC1);
    adc.add_channel(p.PA3);
    adc.add_channel(p.PC0);

    let rails = Rails::new(
        (Output::new(p.PB0, Level::Low, Speed::Low), ActiveLevel::High),
        (Output::new(p.PB1, Level::High, Speed::Low), ActiveLevel::Low),
        (Output::new(p.PB2, Level::Low, Speed::Low), ActiveLevel::High),
    );

    let peripherals = Peripherals {
        clock: BoardRtc::new(Rtc::new(p.RTC, RtcConfig::default())),
        volume,
        sampler: adc,
        delay: Delay,
        rails,
        led: Output::new(p.PA5, Level::Low, Speed::Low),
    };

    let Ok(logger_config) = LoggerConfig::new(LOGGER_NAME, SITE_CODE, INTERVAL, false, true) else {
        defmt::panic!("invalid logger configuration");
    };
    let mut logger = Logger::initialize(logger_config, peripherals, &EVENTS);

    while let Err(e) = logger.setup() {
        error!("setup failed: {}", e);
        Timer::after_secs(CLOCK_RETRY_SECS).await;
    }

    info!("Setup complete, entering logging loop");

    let mut wake_lines = WakeLines;
    loop {
        let reason = if logger.use_sleep_mode() {
            let mut wait = match logger.begin_sleep() {
                Ok(wait) => wait,
                Err(e) => {
                    warn!("cannot sleep: {}", e);
                    Timer::after_secs(CLOCK_RETRY_SECS).await;
                    continue;
                }
            };
            // Spurious wakes leave the logger asleep; wait again
            loop {
                if wait {
                    wake_lines.wait().await;
                }
                if let Some(reason) = logger.finish_wake() {
                    break reason;
                }
                wait = true;
            }
        } else {
            EVENTS.take_wake_reason().unwrap_or(WakeReason::ScheduledInterval)
        };

        match logger.wake_cycle(reason, &mut measure) {
            Ok(report) => info!("{}", report),
            Err(e) => error!("wake cycle failed: {}", e),
        }
    }
}

/// Rain gauge watcher
#[embassy_executor::task]
async fn bucket_tip_task(pin: ExtiInput<'static>) {
    wake::watch_bucket_tip(pin).await
}

/// External wake watcher
#[embassy_executor::task]
async fn external_task(pin: ExtiInput<'static>) {
    wake::watch_external(pin).await
}

/// Anemometer pulse counter
#[embassy_executor::task]
async fn anemometer_task(pin: ExtiInput<'static>) {
    wake::count_anemometer(pin).await
}
