//! SD card storage
//!
//! [`StorageVolume`] over `embedded-sdmmc`: FAT volume 0, root directory,
//! one file open for append at a time. Handles are the raw ones so a record
//! can stay open across calls without borrowing the volume manager.
//!
//! The card sits on the switched storage rail. When the logger cuts it the
//! manager is rebuilt around a card marked uninitialised, so the next open
//! runs the full SPI init sequence again.

use core::cell::Cell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{Mode, RawDirectory, RawFile, RawVolume, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};

use crate::error::{LoggerError, LoggerResult};
use crate::storage::StorageVolume;
use crate::types::DateTime;

static FILE_TIME: Mutex<Cell<DateTime>> = Mutex::new(Cell::new(DateTime::EPOCH));

/// FAT timestamp source fed from the logger clock
///
/// The volume manager owns its time source, so the current time is handed
/// over through a static updated by [`StorageVolume::set_timestamp`].
#[derive(Clone, Copy, Debug, Default)]
pub struct FileClock;

impl TimeSource for FileClock {
    fn get_timestamp(&self) -> Timestamp {
        let t = critical_section::with(|cs| FILE_TIME.borrow(cs).get());
        Timestamp::from_calendar(t.year(), t.month(), t.day(), t.hour(), t.minute(), t.second())
            .unwrap_or(Timestamp {
                year_since_1970: 0,
                zero_indexed_month: 0,
                zero_indexed_day: 0,
                hours: 0,
                minutes: 0,
                seconds: 0,
            })
    }
}

/// Handles of the open record file
#[derive(Clone, Copy)]
struct OpenFile {
    volume: RawVolume,
    dir: RawDirectory,
    file: RawFile,
}

type Manager<S, D> = VolumeManager<SdCard<S, D>, FileClock>;

/// SD card record volume
pub struct SdVolume<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    /// Only None while being rebuilt after a power loss
    manager: Option<Manager<S, D>>,
    open: Option<OpenFile>,
}

impl<S, D> SdVolume<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    /// Wrap an SD card; nothing touches the card until the first open
    pub fn new(card: SdCard<S, D>) -> Self {
        Self {
            manager: Some(VolumeManager::new(card, FileClock)),
            open: None,
        }
    }

    fn manager(&self) -> LoggerResult<&Manager<S, D>> {
        self.manager.as_ref().ok_or(LoggerError::StorageUnavailable)
    }

    fn open_handles(&self, name: &str) -> LoggerResult<OpenFile> {
        let manager = self.manager()?;
        let volume = manager
            .open_raw_volume(VolumeIdx(0))
            .map_err(|_| LoggerError::StorageUnavailable)?;
        let dir = match manager.open_root_dir(volume) {
            Ok(dir) => dir,
            Err(_) => {
                let _ = manager.close_volume(volume);
                return Err(LoggerError::StorageUnavailable);
            }
        };
        match manager.open_file_in_dir(dir, name, Mode::ReadWriteCreateOrAppend) {
            Ok(file) => Ok(OpenFile { volume, dir, file }),
            Err(_) => {
                let _ = manager.close_dir(dir);
                let _ = manager.close_volume(volume);
                Err(LoggerError::StorageUnavailable)
            }
        }
    }

    fn write(&self, bytes: &[u8]) -> LoggerResult<()> {
        let open = self.open.ok_or(LoggerError::StorageWrite)?;
        self.manager()?
            .write(open.file, bytes)
            .map_err(|_| LoggerError::StorageWrite)
    }
}

impl<S, D> StorageVolume for SdVolume<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    fn open_append(&mut self, name: &str) -> LoggerResult<()> {
        if self.open.is_some() {
            warn!("closing stale file before opening {=str}", name);
            self.close()?;
        }
        self.open = Some(self.open_handles(name)?);
        trace!("sd open {=str}", name);
        Ok(())
    }

    fn write_field(&mut self, text: &str) -> LoggerResult<()> {
        self.write(text.as_bytes())
    }

    fn write_newline(&mut self) -> LoggerResult<()> {
        self.write(b"\r\n")
    }

    fn close(&mut self) -> LoggerResult<()> {
        let Some(open) = self.open.take() else {
            return Ok(());
        };
        // Release every handle even if the flush fails
        let manager = self.manager()?;
        let file = manager.close_file(open.file);
        let dir = manager.close_dir(open.dir);
        let volume = manager.close_volume(open.volume);
        file.and(dir).and(volume).map_err(|_| LoggerError::StorageWrite)
    }

    fn is_open(&self) -> bool {
        self.open.is_some()
    }

    fn set_timestamp(&mut self, now: DateTime) {
        critical_section::with(|cs| FILE_TIME.borrow(cs).set(now));
    }

    fn power_lost(&mut self) {
        if self.open.take().is_some() {
            warn!("card lost power with a file open");
        }
        // Rebuilding the manager drops every handle table entry; the card
        // redoes its init sequence on the next access
        if let Some(manager) = self.manager.take() {
            let (card, clock) = manager.free();
            card.mark_card_uninit();
            self.manager = Some(VolumeManager::new(card, clock));
            trace!("sd card marked uninitialised");
        }
    }
}
