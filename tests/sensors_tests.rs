//! Sensor Acquisition Tests
//!
//! Tests for oversampling, bounded sample series and the rotation-rate
//! conversion.
//! Run with: cargo test --no-default-features --features std --test sensors_tests

mod common;

use alog_firmware::config::MAX_OVERSAMPLE_READS;
use alog_firmware::error::LoggerError;
use alog_firmware::sensors::{
    collect_series, mean, oversample, standard_deviation, AnalogConfig, AnemometerConfig,
    RotationRate, SensorReading, SeriesConfig,
};
use common::{MockDelay, MockSampler};

// =============================================================================
// Oversampling Tests
// =============================================================================

#[test]
fn native_read_averages_samples() {
    let mut sampler = MockSampler::new(12).with_value(0, 1000);
    let mut delay = MockDelay::new();
    let v = oversample(&mut sampler, &mut delay, &AnalogConfig::new(0).with_samples(4));
    assert_eq!(v.counts, 1000.0);
    assert_eq!(v.bits, 12);
    assert_eq!(v.reads, 4);
    assert_eq!(sampler.reads(), 4);
}

#[test]
fn extra_bits_cost_four_reads_each() {
    let mut sampler = MockSampler::new(12).with_value(0, 2048);
    let mut delay = MockDelay::new();
    let v = oversample(&mut sampler, &mut delay, &AnalogConfig::new(0).with_bits(14));
    assert_eq!(v.reads, 16);
    assert_eq!(v.bits, 14);
    // 16 * 2048 >> 2
    assert_eq!(v.counts, 8192.0);
    assert_eq!(v.full_scale(), 16383.0);
    assert!((v.ratio() - 0.5).abs() < 0.001);
}

#[test]
fn lower_requested_resolution_reads_natively() {
    let mut sampler = MockSampler::new(12).with_value(0, 100);
    let mut delay = MockDelay::new();
    let v = oversample(&mut sampler, &mut delay, &AnalogConfig::new(0).with_bits(10));
    assert_eq!(v.bits, 12);
    assert_eq!(v.reads, 1);
}

#[test]
fn read_budget_is_bounded() {
    let mut sampler = MockSampler::new(12).with_value(0, 4095);
    let mut delay = MockDelay::new();
    let config = AnalogConfig::new(0).with_bits(24).with_samples(50);
    let v = oversample(&mut sampler, &mut delay, &config);
    assert!(v.reads <= MAX_OVERSAMPLE_READS);
    assert_eq!(sampler.reads(), v.reads);
    assert_eq!(v.bits, 18);
}

#[test]
fn unknown_channel_reads_zero() {
    let mut sampler = MockSampler::new(12);
    let mut delay = MockDelay::new();
    let v = oversample(&mut sampler, &mut delay, &AnalogConfig::new(3));
    assert_eq!(v.counts, 0.0);
    assert_eq!(v.ratio(), 0.0);
}

// =============================================================================
// Sample Series Tests
// =============================================================================

#[test]
fn series_skips_invalid_samples() {
    let mut delay = MockDelay::new();
    let mut n = 0;
    let stats = collect_series(&SeriesConfig::new(3), &mut delay, || {
        n += 1;
        (n % 2 == 0).then_some(10.0)
    })
    .unwrap();
    assert_eq!(stats.valid, 3);
    assert_eq!(stats.attempts, 6);
    assert!(!stats.exhausted);
    assert_eq!(stats.mean, 10.0);
    assert_eq!(stats.std_dev, 0.0);
}

#[test]
fn series_stops_at_attempt_budget() {
    let mut delay = MockDelay::new();
    let mut values = [1.0_f32, 2.0, 3.0, 4.0, 5.0].into_iter();
    let config = SeriesConfig::new(5).with_max_attempts(3);
    let stats = collect_series(&config, &mut delay, || values.next()).unwrap();
    assert_eq!(stats.valid, 3);
    assert_eq!(stats.attempts, 3);
    assert!(stats.exhausted);
    assert_eq!(stats.mean, 2.0);
    assert!((stats.std_dev - 1.0).abs() < 1e-6);
}

#[test]
fn empty_series_times_out() {
    let mut delay = MockDelay::new();
    let mut calls = 0;
    let result = collect_series(&SeriesConfig::new(4), &mut delay, || {
        calls += 1;
        None
    });
    assert_eq!(result, Err(LoggerError::SensorTimeout));
    // Default budget is twice the wanted samples
    assert_eq!(calls, 8);
}

#[test]
fn nan_samples_are_invalid() {
    let mut delay = MockDelay::new();
    let config = SeriesConfig::new(2).with_max_attempts(2);
    let result = collect_series(&config, &mut delay, || Some(f32::NAN));
    assert_eq!(result, Err(LoggerError::SensorTimeout));
}

#[test]
fn series_spacing_uses_delay() {
    let mut delay = MockDelay::new();
    let config = SeriesConfig::new(3).with_spacing_ms(10);
    collect_series(&config, &mut delay, || Some(1.0)).unwrap();
    assert_eq!(delay.ms_calls(), vec![10, 10, 10]);
}

#[test]
fn sample_standard_deviation() {
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    let m = mean(&values);
    assert_eq!(m, 5.0);
    let sd = standard_deviation(&values, m);
    assert!((sd - (32.0_f32 / 7.0).sqrt()).abs() < 1e-5);
    assert!(mean(&[]).is_nan());
    assert_eq!(standard_deviation(&[3.0], 3.0), 0.0);
}

// =============================================================================
// Conversion Tests
// =============================================================================

#[test]
fn rotation_rate_to_speed() {
    let rate = RotationRate {
        meters_per_second_per_rotation: 0.667,
    };
    assert!((rate.convert(&[6.0, 3.0]) - 1.334).abs() < 1e-5);
    assert!(rate.convert(&[6.0, 0.0]).is_nan());
    assert!(rate.convert(&[]).is_nan());
}

#[test]
fn closures_are_sensor_readings() {
    let half = |s: &[f32]| s[0] / 2.0;
    assert_eq!(half.convert(&[8.0]), 4.0);
}

#[test]
fn anemometer_default_window() {
    let config = AnemometerConfig::default();
    assert_eq!(config.reading_duration_ms, 3_000);
    assert!(config.meters_per_second_per_rotation > 0.0);
}
