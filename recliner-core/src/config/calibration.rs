//! Motor calibration data types
//!
//! Current-sensor calibration and max-duty overrides, persisted to flash and
//! loaded on boot.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Magic number to identify valid calibration data
pub const CALIBRATION_MAGIC: u32 = 0x524D_4331; // "RMC1"

/// Current calibration data version
pub const CALIBRATION_VERSION: u8 = 1;

/// Serialized size bound for [`CalibrationData`]
pub const MAX_CALIBRATION_SIZE: usize = 64;

/// Conversion from raw current-sense ADC counts to milliamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CurrentCalibration {
    /// ADC counts read at zero current
    pub zero_offset: u16,
    /// Microamps per ADC count
    pub scale_ua_per_count: u32,
    /// Readings below this are reported as 0 mA (noise floor)
    pub snap_threshold_ma: u32,
}

impl Default for CurrentCalibration {
    /// Bidirectional hall sensor, 100 mV/A, mid-rail zero on a 12-bit ADC
    fn default() -> Self {
        Self {
            zero_offset: 2048,
            scale_ua_per_count: 8_057,
            snap_threshold_ma: 150,
        }
    }
}

impl CurrentCalibration {
    /// Convert raw counts to current magnitude in milliamps
    pub fn to_milliamps(&self, raw: u16) -> u32 {
        let counts = (raw as i32 - self.zero_offset as i32).unsigned_abs();
        let ma = (counts as u64 * self.scale_ua_per_count as u64 / 1000) as u32;
        if ma < self.snap_threshold_ma {
            0
        } else {
            ma
        }
    }
}

/// Calibration for one motor channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorCalibration {
    pub current: CurrentCalibration,
    /// Max duty override in percent
    pub max_duty: u8,
}

impl Default for MotorCalibration {
    fn default() -> Self {
        Self {
            current: CurrentCalibration::default(),
            max_duty: 100,
        }
    }
}

/// Complete calibration data stored in flash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CalibrationData {
    /// Magic number for validation
    pub magic: u32,
    /// Data format version
    pub version: u8,
    pub left: MotorCalibration,
    pub right: MotorCalibration,
    /// CRC32 over magic..right
    pub crc: u32,
}

impl Default for CalibrationData {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors decoding stored calibration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CalibrationError {
    /// Serialization failed
    Serialize,
    /// Deserialization failed
    Deserialize,
    /// Invalid magic or version
    InvalidFormat,
    /// CRC check failed
    CrcMismatch,
}

impl CalibrationData {
    /// Defaults for both motors, CRC filled in
    pub fn new() -> Self {
        let mut data = Self {
            magic: CALIBRATION_MAGIC,
            version: CALIBRATION_VERSION,
            left: MotorCalibration::default(),
            right: MotorCalibration::default(),
            crc: 0,
        };
        data.update_crc();
        data
    }

    /// Check if the data is valid (magic and version match)
    pub fn is_valid(&self) -> bool {
        self.magic == CALIBRATION_MAGIC && self.version == CALIBRATION_VERSION
    }

    /// Calculate CRC32 for the data (excluding the crc field itself)
    pub fn calculate_crc(&self) -> u32 {
        let mut crc: u32 = 0xFFFF_FFFF;

        crc = crc32_update(crc, &self.magic.to_le_bytes());
        crc = crc32_update(crc, &[self.version]);

        for motor in [&self.left, &self.right] {
            crc = crc32_update(crc, &motor.current.zero_offset.to_le_bytes());
            crc = crc32_update(crc, &motor.current.scale_ua_per_count.to_le_bytes());
            crc = crc32_update(crc, &motor.current.snap_threshold_ma.to_le_bytes());
            crc = crc32_update(crc, &[motor.max_duty]);
        }

        !crc
    }

    /// Update the CRC field
    pub fn update_crc(&mut self) {
        self.crc = self.calculate_crc();
    }

    /// Verify the CRC is correct
    pub fn verify_crc(&self) -> bool {
        self.crc == self.calculate_crc()
    }

    /// Serialize with postcard into `buffer`
    #[cfg(feature = "serde")]
    pub fn to_bytes<'a>(&self, buffer: &'a mut [u8]) -> Result<&'a mut [u8], CalibrationError> {
        postcard::to_slice(self, buffer).map_err(|_| CalibrationError::Serialize)
    }

    /// Deserialize and validate data read from storage
    #[cfg(feature = "serde")]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CalibrationError> {
        let data: CalibrationData =
            postcard::from_bytes(bytes).map_err(|_| CalibrationError::Deserialize)?;
        if !data.is_valid() {
            return Err(CalibrationError::InvalidFormat);
        }
        if !data.verify_crc() {
            return Err(CalibrationError::CrcMismatch);
        }
        Ok(data)
    }
}

/// Simple CRC32 update function (IEEE 802.3 polynomial)
fn crc32_update(crc: u32, data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc = crc;

    for &byte in data {
        crc ^= byte as u32;
        for _ in 0..8 {
            if crc & 1 != 0 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }

    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calibration_data_default() {
        let data = CalibrationData::default();
        assert!(data.is_valid());
        assert!(data.verify_crc());
        assert_eq!(data.left.max_duty, 100);
    }

    #[test]
    fn test_crc_detects_change() {
        let mut data = CalibrationData::new();
        data.right.max_duty = 60;
        assert!(!data.verify_crc());
        data.update_crc();
        assert!(data.verify_crc());
    }

    #[test]
    fn test_to_milliamps() {
        let cal = CurrentCalibration {
            zero_offset: 2000,
            scale_ua_per_count: 10_000,
            snap_threshold_ma: 100,
        };
        assert_eq!(cal.to_milliamps(2000), 0);
        // 5 counts = 50 mA, under the snap threshold
        assert_eq!(cal.to_milliamps(2005), 0);
        assert_eq!(cal.to_milliamps(2100), 1000);
        // Magnitude for negative current
        assert_eq!(cal.to_milliamps(1900), 1000);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_postcard_persistence() {
        let mut data = CalibrationData::new();
        data.left.current.zero_offset = 2031;
        data.update_crc();

        let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
        let len = data.to_bytes(&mut buffer).unwrap().len();
        assert_eq!(CalibrationData::from_bytes(&buffer[..len]), Ok(data));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_rejects_corrupted_bytes() {
        let mut data = CalibrationData::new();
        data.crc ^= 1;
        let mut buffer = [0u8; MAX_CALIBRATION_SIZE];
        let len = data.to_bytes(&mut buffer).unwrap().len();
        assert_eq!(
            CalibrationData::from_bytes(&buffer[..len]),
            Err(CalibrationError::CrcMismatch)
        );
    }
}
