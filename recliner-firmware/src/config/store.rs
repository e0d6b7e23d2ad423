//! Wear-levelled settings storage
//!
//! Key-value records in the last 64KB of flash, managed by
//! sequential-storage. Values are opaque byte blobs; the loaders above this
//! decide how to encode them.

use embassy_rp::dma::Channel;
use embassy_rp::flash::{Async, Flash};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{self, Key, SerializationError};

/// 2MB QSPI flash on the actuator board
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;
/// Settings partition at the end of flash (excluded from memory.x)
pub const SETTINGS_PARTITION_SIZE: usize = 64 * 1024;
pub const SETTINGS_PARTITION_START: usize = FLASH_SIZE - SETTINGS_PARTITION_SIZE;

const SETTINGS_RANGE: core::ops::Range<u32> =
    (SETTINGS_PARTITION_START as u32)..(FLASH_SIZE as u32);

/// Scratch buffer for sequential-storage item headers and values
const ITEM_BUFFER_SIZE: usize = 256;

/// Record identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
#[repr(u8)]
pub enum StorageKey {
    /// Postcard-encoded `ControlConfig`
    ControlConfig = 0,
    /// Postcard-encoded `CalibrationData`
    Calibration = 1,
}

impl StorageKey {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(StorageKey::ControlConfig),
            1 => Some(StorageKey::Calibration),
            _ => None,
        }
    }
}

impl Key for StorageKey {
    fn serialize_into(&self, buffer: &mut [u8]) -> Result<usize, SerializationError> {
        let Some(slot) = buffer.first_mut() else {
            return Err(SerializationError::BufferTooSmall);
        };
        *slot = *self as u8;
        Ok(1)
    }

    fn deserialize_from(buffer: &[u8]) -> Result<(Self, usize), SerializationError> {
        let byte = buffer.first().ok_or(SerializationError::BufferTooSmall)?;
        let key = StorageKey::from_u8(*byte).ok_or(SerializationError::InvalidFormat)?;
        Ok((key, 1))
    }
}

/// Errors from flash storage operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum StoreError {
    /// sequential-storage or the flash driver failed
    Storage,
    /// Key not present
    NotFound,
    /// Stored value larger than the caller's buffer
    BufferTooSmall,
}

/// Settings partition on the RP2040's flash
pub struct SettingsStore<'d> {
    flash: Flash<'d, FLASH, Async, FLASH_SIZE>,
}

impl<'d> SettingsStore<'d> {
    pub fn new(flash: Peri<'d, FLASH>, dma: Peri<'d, impl Channel>) -> Self {
        Self {
            flash: Flash::new(flash, dma),
        }
    }

    /// Copy the value stored under `key` into `buffer`
    pub async fn read(&mut self, key: StorageKey, buffer: &mut [u8]) -> Result<usize, StoreError> {
        let mut item_buffer = [0u8; ITEM_BUFFER_SIZE];

        let data = map::fetch_item::<StorageKey, &[u8], _>(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut item_buffer,
            &key,
        )
        .await
        .map_err(|_| StoreError::Storage)?
        .ok_or(StoreError::NotFound)?;

        let out = buffer
            .get_mut(..data.len())
            .ok_or(StoreError::BufferTooSmall)?;
        out.copy_from_slice(data);
        Ok(data.len())
    }

    /// Store `data` under `key`, replacing any previous value
    pub async fn write(&mut self, key: StorageKey, data: &[u8]) -> Result<(), StoreError> {
        let mut item_buffer = [0u8; ITEM_BUFFER_SIZE];

        map::store_item(
            &mut self.flash,
            SETTINGS_RANGE,
            &mut NoCache::new(),
            &mut item_buffer,
            &key,
            &data,
        )
        .await
        .map_err(|_| StoreError::Storage)
    }
}
