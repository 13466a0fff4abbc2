//! Hardware Abstraction Layer
//!
//! Binds the logger's collaborator traits to the STM32G474 board: the
//! internal RTC, an SD card on SPI2 through `embedded-sdmmc`, the ADC and the
//! EXTI wake lines.

pub mod adc;
pub mod rtc;
pub mod sd;
pub mod wake;
