//! Motor current sense channel
//!
//! Wraps a raw ADC channel (hall sensor or shunt amplifier output) and
//! averages a few conversions per read. Calibration to milliamps happens in
//! the governor, so this only hands back counts.

use recliner_core::traits::{CurrentAdc, SensorError};

/// ADC reading trait for platform abstraction
pub trait AdcReader {
    /// Read ADC value (12-bit, 0-4095)
    #[allow(clippy::result_unit_err)]
    fn read(&mut self) -> Result<u16, ()>;
}

/// Averaging current sense channel
pub struct CurrentSense<ADC> {
    adc: ADC,
    /// Conversions averaged per read
    samples: u8,
    /// Largest valid reading (4095 for 12-bit)
    adc_max: u16,
}

impl<ADC> CurrentSense<ADC> {
    /// Create a channel for a 12-bit ADC
    pub fn new(adc: ADC, samples: u8) -> Self {
        Self {
            adc,
            samples: samples.max(1),
            adc_max: 4095,
        }
    }

    /// Override the ADC full-scale value
    pub fn with_adc_max(mut self, adc_max: u16) -> Self {
        self.adc_max = adc_max;
        self
    }
}

impl<ADC: AdcReader> CurrentAdc for CurrentSense<ADC> {
    fn read_current_adc(&mut self) -> Result<u16, SensorError> {
        let mut sum: u32 = 0;
        for _ in 0..self.samples {
            let value = self.adc.read().map_err(|_| SensorError::ReadFailed)?;
            if value > self.adc_max {
                return Err(SensorError::OutOfRange);
            }
            sum += value as u32;
        }
        Ok((sum / self.samples as u32) as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Replays a fixed list of readings
    struct ScriptedAdc {
        values: &'static [Result<u16, ()>],
        pos: usize,
    }

    impl AdcReader for ScriptedAdc {
        fn read(&mut self) -> Result<u16, ()> {
            let value = self.values[self.pos % self.values.len()];
            self.pos += 1;
            value
        }
    }

    fn sense(values: &'static [Result<u16, ()>], samples: u8) -> CurrentSense<ScriptedAdc> {
        CurrentSense::new(ScriptedAdc { values, pos: 0 }, samples)
    }

    #[test]
    fn test_averages_samples() {
        let mut sense = sense(&[Ok(2000), Ok(2100), Ok(2200), Ok(2100)], 4);
        assert_eq!(sense.read_current_adc(), Ok(2100));
    }

    #[test]
    fn test_zero_samples_reads_once() {
        let mut sense = sense(&[Ok(1234)], 0);
        assert_eq!(sense.read_current_adc(), Ok(1234));
    }

    #[test]
    fn test_read_failure() {
        let mut sense = sense(&[Ok(2000), Err(())], 2);
        assert_eq!(sense.read_current_adc(), Err(SensorError::ReadFailed));
    }

    #[test]
    fn test_out_of_range() {
        let mut sense = sense(&[Ok(900)], 1).with_adc_max(800);
        assert_eq!(sense.read_current_adc(), Err(SensorError::OutOfRange));
    }
}
