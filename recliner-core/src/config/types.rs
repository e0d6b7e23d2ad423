//! Configuration type definitions
//!
//! These types hold the numeric parameters the control core consumes. They
//! are stored in flash as postcard-serialized binary data; the core itself
//! never touches storage.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::calibration::MotorCalibration;

/// Default control period (fast tick)
pub const DEFAULT_CONTROL_PERIOD_MS: u32 = 20;

/// Shortest accepted fade; a disabled fade behaves like this
pub const MIN_FADE_MS: u32 = 1;

/// What `set_target` does with a request to flip direction while moving
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReversalPolicy {
    /// Accept; wind down, rest for the relay-settle delay, then reverse
    #[default]
    Defer,
    /// Reject with `InvalidTarget::DirectReversal` while duty is nonzero
    Reject,
}

/// Governor behaviour while over the current limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OverCurrentAction {
    /// Freeze duty at its previous value
    #[default]
    Hold,
    /// Back duty off toward zero at the decel rate
    Retreat,
}

/// Per-motor ramp parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RampConfig {
    /// Time to ramp 0 → 100% (ms)
    pub fade_accel_ms: u32,
    /// Time to ramp 100 → 0% (ms)
    pub fade_decel_ms: u32,
    /// Minimum rest at zero duty before the relays may flip polarity (ms)
    pub relay_settle_ms: u32,
    /// Ceiling applied to every target duty (percent)
    pub max_duty: u8,
    pub reversal: ReversalPolicy,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            fade_accel_ms: 2000,
            fade_decel_ms: 1000,
            relay_settle_ms: 200,
            max_duty: 100,
            reversal: ReversalPolicy::Defer,
        }
    }
}

/// Current-limit parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GovernorConfig {
    /// Current budget per motor (mA)
    pub current_max_ma: u32,
    pub action: OverCurrentAction,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            current_max_ma: 10_000,
            action: OverCurrentAction::Hold,
        }
    }
}

/// Serial link timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Maximum silence before both motors fail to Idle (ms)
    pub liveness_timeout_ms: u32,
    /// Minimum gap between the starts of two sends (ms)
    pub min_send_spacing_ms: u32,
    /// Give up on a send after this long (ms)
    pub write_timeout_ms: u32,
    /// Longest a single receive poll waits for bytes (ms)
    pub read_timeout_ms: u32,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_ms: 500,
            min_send_spacing_ms: 50,
            write_timeout_ms: 2000,
            read_timeout_ms: 20,
        }
    }
}

/// Slow inactivity check parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ActivityConfig {
    /// Interval between checks (ms)
    pub check_period_ms: u32,
    /// Duty change below this counts as no activity (percent × 100)
    pub tolerance_x100: u16,
    /// Quiet time before the mode machine should fall back to Idle (ms)
    pub timeout_ms: u32,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            check_period_ms: 2000,
            tolerance_x100: 200,
            timeout_ms: 30_000,
        }
    }
}

/// Complete control configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ControlConfig {
    /// Fast tick period (ms)
    pub control_period_ms: u32,
    pub ramp: RampConfig,
    pub governor: GovernorConfig,
    pub link: LinkConfig,
    pub activity: ActivityConfig,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            control_period_ms: DEFAULT_CONTROL_PERIOD_MS,
            ramp: RampConfig::default(),
            governor: GovernorConfig::default(),
            link: LinkConfig::default(),
            activity: ActivityConfig::default(),
        }
    }
}

impl ControlConfig {
    /// Ramp parameters for one motor, with its max-duty override applied
    pub fn ramp_for(&self, calibration: &MotorCalibration) -> RampConfig {
        RampConfig {
            max_duty: self.ramp.max_duty.min(calibration.max_duty).min(100),
            ..self.ramp
        }
    }

    /// Clamp out-of-range values read from storage
    pub fn sanitized(mut self) -> Self {
        self.control_period_ms = self.control_period_ms.clamp(1, 1000);
        self.ramp.fade_accel_ms = self.ramp.fade_accel_ms.max(MIN_FADE_MS);
        self.ramp.fade_decel_ms = self.ramp.fade_decel_ms.max(MIN_FADE_MS);
        self.ramp.max_duty = self.ramp.max_duty.min(100);
        self.link.read_timeout_ms = self.link.read_timeout_ms.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_for_applies_override() {
        let config = ControlConfig::default();
        let calibration = MotorCalibration {
            max_duty: 70,
            ..Default::default()
        };
        let ramp = config.ramp_for(&calibration);
        assert_eq!(ramp.max_duty, 70);
        assert_eq!(ramp.fade_accel_ms, config.ramp.fade_accel_ms);
    }

    #[test]
    fn test_sanitized() {
        let mut config = ControlConfig::default();
        config.control_period_ms = 0;
        config.ramp.fade_decel_ms = 0;
        config.ramp.max_duty = 200;

        let config = config.sanitized();
        assert_eq!(config.control_period_ms, 1);
        assert_eq!(config.ramp.fade_decel_ms, MIN_FADE_MS);
        assert_eq!(config.ramp.max_duty, 100);
    }
}
