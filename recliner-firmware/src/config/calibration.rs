//! Calibration data persistence
//!
//! Loads and saves per-motor current calibration to flash storage.

use defmt::*;

use recliner_core::config::{CalibrationData, CalibrationError, MAX_CALIBRATION_SIZE};

use super::store::{SettingsStore, StorageKey, StoreError};

/// Calibration persistence errors
#[derive(Debug, Clone, Copy, defmt::Format)]
pub enum CalibrationLoadError {
    Store(StoreError),
    Data(CalibrationError),
}

impl From<StoreError> for CalibrationLoadError {
    fn from(e: StoreError) -> Self {
        CalibrationLoadError::Store(e)
    }
}

impl From<CalibrationError> for CalibrationLoadError {
    fn from(e: CalibrationError) -> Self {
        CalibrationLoadError::Data(e)
    }
}

/// Load calibration data from flash
///
/// Returns the stored data, or defaults if nothing is stored or the record
/// fails its magic/version/CRC checks.
pub async fn load_calibration(store: &mut SettingsStore<'_>) -> CalibrationData {
    match load_calibration_inner(store).await {
        Ok(data) => {
            info!("Loaded motor calibration from flash");
            log_calibration_summary(&data);
            data
        }
        Err(CalibrationLoadError::Store(StoreError::NotFound)) => {
            debug!("No calibration data in flash, storing defaults");
            let mut data = CalibrationData::new();
            if let Err(e) = save_calibration(store, &mut data).await {
                warn!("Failed to store default calibration: {:?}", e);
            }
            data
        }
        Err(e) => {
            warn!("Failed to load calibration: {:?}, using defaults", e);
            CalibrationData::new()
        }
    }
}

async fn load_calibration_inner(
    store: &mut SettingsStore<'_>,
) -> Result<CalibrationData, CalibrationLoadError> {
    let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
    let len = store.read(StorageKey::Calibration, &mut buffer).await?;
    debug!("Read {} bytes of calibration from flash", len);
    Ok(CalibrationData::from_bytes(&buffer[..len])?)
}

/// Save calibration data to flash
///
/// Updates the CRC before saving.
pub async fn save_calibration(
    store: &mut SettingsStore<'_>,
    data: &mut CalibrationData,
) -> Result<(), CalibrationLoadError> {
    data.update_crc();

    let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
    let bytes = data.to_bytes(&mut buffer)?;
    store.write(StorageKey::Calibration, bytes).await?;

    info!("Saved motor calibration to flash");
    log_calibration_summary(data);
    Ok(())
}

fn log_calibration_summary(data: &CalibrationData) {
    for (name, motor) in [("left", &data.left), ("right", &data.right)] {
        debug!(
            "  {} motor: zero={} scale={}uA/count snap={}mA max_duty={}%",
            name,
            motor.current.zero_offset,
            motor.current.scale_ua_per_count,
            motor.current.snap_threshold_ma,
            motor.max_duty,
        );
    }
}
