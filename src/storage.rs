//! Record storage
//!
//! [`StorageVolume`] is the append-only sink (an SD card on the board).
//! [`ActiveRecord`] is one open line of the log: it writes the timestamp
//! first, separates fields, and always closes the file, explicitly through
//! [`ActiveRecord::finish`] or on drop when an early return skips it.

use core::fmt::Write;

use heapless::String;

use crate::config::{
    ABANDONED_RECORD_MARKER, DEFAULT_FIELD_PRECISION, FIELD_CAPACITY, FIELD_SEPARATOR,
    MAX_FIELD_PRECISION,
};
use crate::error::{LoggerError, LoggerResult};
use crate::types::DateTime;

/// Append-only record sink with one open file at a time
pub trait StorageVolume {
    /// Open `name` for appending, creating it if missing
    fn open_append(&mut self, name: &str) -> LoggerResult<()>;

    /// Append raw field text to the open file
    fn write_field(&mut self, text: &str) -> LoggerResult<()>;

    /// Terminate the current line
    fn write_newline(&mut self) -> LoggerResult<()>;

    /// Flush and close the open file
    fn close(&mut self) -> LoggerResult<()>;

    /// Whether a file is currently open
    fn is_open(&self) -> bool;

    /// Date stamp for file creation and modification times
    fn set_timestamp(&mut self, _now: DateTime) {}

    /// The supply rail was cut
    ///
    /// Open handles and any cached card state are gone; the next open starts
    /// from a card in its power-on state.
    fn power_lost(&mut self) {}
}

/// Where a record is written
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Destination {
    /// Interval data file named after the site code
    Interval,
    /// Separate file for rain-gauge tips
    BucketTip,
}

#[cfg(feature = "embedded")]
impl defmt::Format for Destination {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Self::Interval => defmt::write!(f, "interval"),
            Self::BucketTip => defmt::write!(f, "bucket-tip"),
        }
    }
}

/// One open log line
pub struct ActiveRecord<'v, V: StorageVolume> {
    volume: &'v mut V,
    fields: usize,
    finished: bool,
}

impl<'v, V: StorageVolume> ActiveRecord<'v, V> {
    /// Open `name` for one record
    ///
    /// Nothing is written until the first field, so a failed open leaves no
    /// partial line behind.
    pub fn open(volume: &'v mut V, name: &str) -> LoggerResult<Self> {
        volume.open_append(name)?;
        trace!("record open {=str}", name);
        Ok(Self {
            volume,
            fields: 0,
            finished: false,
        })
    }

    /// Fields written so far
    #[must_use]
    pub const fn field_count(&self) -> usize {
        self.fields
    }

    /// Append one text field
    ///
    /// The separator and the value go out as separate writes, so text of
    /// any length fits.
    pub fn text(&mut self, value: &str) -> LoggerResult<()> {
        if self.fields > 0 {
            let mut separator = [0; 4];
            self.volume.write_field(FIELD_SEPARATOR.encode_utf8(&mut separator))?;
        }
        self.volume.write_field(value)?;
        self.fields += 1;
        Ok(())
    }

    /// Append a formatted field
    pub fn formatted(&mut self, args: core::fmt::Arguments<'_>) -> LoggerResult<()> {
        let mut field: String<FIELD_CAPACITY> = String::new();
        field.write_fmt(args).map_err(|_| LoggerError::FieldOverflow)?;
        self.text(&field)
    }

    /// Append a float with the default precision; NaN is written as `NaN`
    pub fn float(&mut self, value: f32) -> LoggerResult<()> {
        self.float_with_precision(value, DEFAULT_FIELD_PRECISION)
    }

    /// Append a float with `precision` decimal places
    ///
    /// Precision is capped at [`MAX_FIELD_PRECISION`] so any finite `f32`
    /// fits one field.
    pub fn float_with_precision(&mut self, value: f32, precision: u8) -> LoggerResult<()> {
        if value.is_nan() {
            return self.text("NaN");
        }
        let precision = usize::from(precision.min(MAX_FIELD_PRECISION));
        self.formatted(format_args!("{value:.precision$}"))
    }

    /// Append an unsigned integer
    pub fn unsigned(&mut self, value: u32) -> LoggerResult<()> {
        self.formatted(format_args!("{value}"))
    }

    /// Append a signed integer
    pub fn signed(&mut self, value: i32) -> LoggerResult<()> {
        self.formatted(format_args!("{value}"))
    }

    /// Append the record timestamp: calendar time then Unix seconds
    pub fn timestamp(&mut self, now: DateTime) -> LoggerResult<()> {
        self.formatted(format_args!("{now}"))?;
        self.formatted(format_args!("{}", now.to_unix()))
    }

    /// Terminate the line, flush and close
    pub fn finish(mut self) -> LoggerResult<usize> {
        self.finished = true;
        let line = self.volume.write_newline();
        let close = self.volume.close();
        line.and(close)?;
        Ok(self.fields)
    }
}

impl<V: StorageVolume> Drop for ActiveRecord<'_, V> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // Early exit: mark and terminate whatever was written so the next
        // record starts on its own line, then release the file
        if self.fields > 0 {
            if self.text(ABANDONED_RECORD_MARKER).is_err() {
                warn!("marker failed on abandoned record");
            }
            if self.volume.write_newline().is_err() {
                warn!("newline failed on abandoned record");
            }
        }
        if self.volume.close().is_err() {
            warn!("close failed on abandoned record");
        }
    }
}
