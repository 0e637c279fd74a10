//! SD-card CSV session logger.
//!
//! Implements the core's `LogSink` and `CapacityProbe` seams over
//! `embedded-sdmmc` on blocking SPI. Every append opens the volume, root
//! directory, and file, writes one row, and closes them again; the handles
//! are RAII but closed explicitly so errors surface.
//!
//! Free space is approximated as the card size (probed once at
//! construction) minus the summed sizes of the root-directory files. Any
//! probe failure reports zero free space, which steers the acquisition loop
//! toward its safe terminal halt rather than toward writing on a broken
//! card.

use embedded_sdmmc::{Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use freq_core::acquisition::{CapacityProbe, LogSink};
use freq_core::record::{self, CSV_HEADER, Measurement};
use log::warn;
use thiserror_no_std::Error;

/// The board has no RTC; directory entries get a fixed timestamp.
pub struct NullTimeSource;

impl TimeSource for NullTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sd card: {0:?}")]
    Sd(#[from] embedded_sdmmc::Error<SdCardError>),
    #[error("no active session")]
    NoSession,
    #[error("record formatting failed")]
    Format,
}

pub struct SdCardLog<S, D>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
{
    volume_mgr: VolumeManager<SdCard<S, D>, NullTimeSource, 4, 4, 1>,
    /// Card size, probed once before the volume manager takes the card.
    total_bytes: Option<u64>,
    session_file: Option<heapless::String<12>>,
}

impl<S, D> SdCardLog<S, D>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
{
    pub fn new(sd_card: SdCard<S, D>) -> Self {
        let total_bytes = match sd_card.num_bytes() {
            Ok(n) => Some(n),
            Err(e) => {
                warn!("sd card size probe failed: {:?}", e);
                None
            }
        };
        Self {
            volume_mgr: VolumeManager::new(sd_card, NullTimeSource),
            total_bytes,
            session_file: None,
        }
    }

    fn write_file(&self, name: &str, bytes: &[u8], mode: Mode) -> Result<(), StorageError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let file = root_dir.open_file_in_dir(name, mode)?;
        file.write(bytes)?;
        // Close explicitly so errors are reported rather than swallowed by
        // the RAII drop.
        file.close()?;
        root_dir.close()?;
        volume0.close()?;
        Ok(())
    }

    fn used_bytes(&self) -> Result<u64, StorageError> {
        let volume0 = self.volume_mgr.open_volume(VolumeIdx(0))?;
        let root_dir = volume0.open_root_dir()?;
        let mut used: u64 = 0;
        root_dir.iterate_dir(|entry| used += entry.size as u64)?;
        root_dir.close()?;
        volume0.close()?;
        Ok(used)
    }
}

impl<S, D> LogSink for SdCardLog<S, D>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
{
    type Error = StorageError;

    fn start_session(&mut self, now_ms: u64) -> Result<(), Self::Error> {
        let name = record::session_file_name(now_ms);
        self.write_file(
            name.as_str(),
            CSV_HEADER.as_bytes(),
            Mode::ReadWriteCreateOrTruncate,
        )?;
        self.session_file = Some(name);
        Ok(())
    }

    fn append(&mut self, rec: &Measurement) -> Result<(), Self::Error> {
        let name = self.session_file.as_ref().ok_or(StorageError::NoSession)?;
        let mut row = heapless::String::<128>::new();
        rec.write_csv(&mut row).map_err(|_| StorageError::Format)?;
        self.write_file(name.as_str(), row.as_bytes(), Mode::ReadWriteCreateOrAppend)
    }
}

impl<S, D> CapacityProbe for SdCardLog<S, D>
where
    S: embedded_hal::spi::SpiDevice<u8>,
    D: embedded_hal::delay::DelayNs,
{
    fn free_fraction(&mut self) -> f32 {
        let Some(total) = self.total_bytes else {
            return 0.0;
        };
        if total == 0 {
            return 0.0;
        }
        match self.used_bytes() {
            Ok(used) => {
                let used = used.min(total);
                ((total - used) as f64 / total as f64) as f32
            }
            Err(e) => {
                warn!("free space probe failed: {}", e);
                0.0
            }
        }
    }
}
