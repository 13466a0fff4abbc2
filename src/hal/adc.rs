//! ADC Driver
//!
//! Blocking single conversions on ADC1 for the analog sensor inputs.
//! Oversampling is done by the core on top of [`AnalogSampler`].

use embassy_stm32::adc::{Adc, AdcChannel, AnyAdcChannel, SampleTime};
use embassy_stm32::peripherals::ADC1;
use heapless::Vec;

use crate::sensors::AnalogSampler;

/// Native ADC1 resolution
pub const ADC_BITS: u8 = 12;

/// Analog inputs wired to the sensor terminal block
pub const MAX_ANALOG_CHANNELS: usize = 4;

/// ADC reading result
#[derive(Clone, Copy, Debug)]
pub struct AdcReading {
    /// Raw 12-bit ADC value (0-4095)
    raw: u16,
}

impl AdcReading {
    /// Create a new ADC reading from raw value
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        Self { raw }
    }

    /// Get the raw 12-bit value
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.raw
    }
}

impl defmt::Format for AdcReading {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "ADC({})", self.raw);
    }
}

/// Sensor ADC with its channel table
///
/// Channel numbers passed to [`AnalogSampler::read`] index the table in the
/// order the channels were added.
pub struct BoardAdc<'d> {
    adc: Adc<'d, ADC1>,
    channels: Vec<AnyAdcChannel<ADC1>, MAX_ANALOG_CHANNELS>,
}

impl<'d> BoardAdc<'d> {
    /// Create the sensor ADC with a long sample time for high-impedance dividers
    #[must_use]
    pub fn new(adc: ADC1) -> Self {
        let mut adc = Adc::new(adc);
        adc.set_sample_time(SampleTime::CYCLES247_5);
        Self {
            adc,
            channels: Vec::new(),
        }
    }

    /// Append a channel; returns its index, or None if the table is full
    pub fn add_channel(&mut self, channel: impl AdcChannel<ADC1>) -> Option<u8> {
        let index = self.channels.len() as u8;
        self.channels.push(channel.degrade_adc()).ok()?;
        Some(index)
    }

    /// Read a single conversion
    pub fn read_reading(&mut self, channel: u8) -> Option<AdcReading> {
        let ch = self.channels.get_mut(usize::from(channel))?;
        Some(AdcReading::from_raw(self.adc.blocking_read(ch)))
    }
}

impl AnalogSampler for BoardAdc<'_> {
    fn read(&mut self, channel: u8) -> u16 {
        if let Some(reading) = self.read_reading(channel) {
            reading.raw()
        } else {
            warn!("no ADC channel {}", channel);
            0
        }
    }

    fn resolution_bits(&self) -> u8 {
        ADC_BITS
    }
}
