//! Current-limit governor
//!
//! Samples motor current each tick and, while the budget is exceeded, clamps
//! the ramp so duty cannot rise. A failed ADC read is treated as over budget.

use crate::config::{CurrentCalibration, GovernorConfig, OverCurrentAction};
use crate::motion::RampStep;
use crate::traits::SensorError;

/// One current sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CurrentReading {
    /// Current magnitude, `None` if the sensor failed
    pub milliamps: Option<u32>,
    pub timestamp_ms: u32,
}

/// Current-limit governor for one motor
#[derive(Debug, Clone)]
pub struct CurrentGovernor {
    config: GovernorConfig,
    calibration: CurrentCalibration,
    last: Option<CurrentReading>,
    limiting: bool,
    /// Ticks spent limiting since boot
    limit_ticks: u32,
}

impl CurrentGovernor {
    /// Create a governor that is not limiting
    pub fn new(config: GovernorConfig, calibration: CurrentCalibration) -> Self {
        Self {
            config,
            calibration,
            last: None,
            limiting: false,
            limit_ticks: 0,
        }
    }

    /// Record a raw ADC sample and update the limiting flag
    pub fn sample(&mut self, raw: Result<u16, SensorError>, now_ms: u32) -> CurrentReading {
        let milliamps = raw.ok().map(|counts| self.calibration.to_milliamps(counts));
        let reading = CurrentReading {
            milliamps,
            timestamp_ms: now_ms,
        };
        self.last = Some(reading);

        let over = match milliamps {
            Some(ma) => ma > self.config.current_max_ma,
            None => true,
        };

        if over && !self.limiting {
            match milliamps {
                Some(ma) => warn!(
                    "governor: {} mA over {} mA budget, limiting",
                    ma, self.config.current_max_ma
                ),
                None => warn!("governor: current sensor fault, limiting"),
            }
        } else if !over && self.limiting {
            info!("governor: current back under budget");
        }
        self.limiting = over;
        if over {
            self.limit_ticks = self.limit_ticks.wrapping_add(1);
        }

        reading
    }

    /// Duty allowed for this step
    ///
    /// Passes the candidate through unless limiting. The ramp takes the
    /// minimum of this and its own candidate.
    pub fn clamp(&self, step: &RampStep) -> u16 {
        if !self.limiting {
            return step.candidate_x100;
        }
        match self.config.action {
            OverCurrentAction::Hold => step.candidate_x100.min(step.prev_x100),
            OverCurrentAction::Retreat => step.prev_x100.saturating_sub(step.decel_step_x100),
        }
    }

    pub fn is_limiting(&self) -> bool {
        self.limiting
    }

    /// Most recent sample
    pub fn last_reading(&self) -> Option<CurrentReading> {
        self.last
    }

    pub fn limit_ticks(&self) -> u32 {
        self.limit_ticks
    }

    pub fn set_config(&mut self, config: GovernorConfig) {
        self.config = config;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RampConfig, ReversalPolicy};
    use crate::motion::RampController;
    use recliner_protocol::{MotorCommand, MotorState};

    /// 1 count = 1 mA, zero at 0
    fn calibration() -> CurrentCalibration {
        CurrentCalibration {
            zero_offset: 0,
            scale_ua_per_count: 1000,
            snap_threshold_ma: 0,
        }
    }

    fn governor(action: OverCurrentAction) -> CurrentGovernor {
        CurrentGovernor::new(
            GovernorConfig {
                current_max_ma: 10_000,
                action,
            },
            calibration(),
        )
    }

    fn ramp() -> RampController {
        RampController::new(
            RampConfig {
                fade_accel_ms: 2000,
                fade_decel_ms: 1000,
                relay_settle_ms: 200,
                max_duty: 100,
                reversal: ReversalPolicy::Defer,
            },
            0,
        )
    }

    fn step(prev: u16, candidate: u16) -> RampStep {
        RampStep {
            state: MotorState::Forward,
            prev_x100: prev,
            candidate_x100: candidate,
            decel_step_x100: 1000,
        }
    }

    #[test]
    fn test_under_budget_passes_through() {
        let mut gov = governor(OverCurrentAction::Hold);
        let reading = gov.sample(Ok(4000), 10);
        assert_eq!(reading.milliamps, Some(4000));
        assert!(!gov.is_limiting());
        assert_eq!(gov.clamp(&step(1000, 1500)), 1500);
    }

    #[test]
    fn test_spike_holds_duty() {
        let mut gov = governor(OverCurrentAction::Hold);
        let mut ramp = ramp();
        ramp.set_target(MotorCommand::new(MotorState::Forward, 80)).unwrap();

        let mut now = 0;
        for _ in 0..4 {
            now += 100;
            gov.sample(Ok(5000), now);
            ramp.tick_with(now, |s| gov.clamp(s));
        }
        assert_eq!(ramp.duty_x100(), 2000);

        // 14 A spike while ramping toward 80%
        now += 100;
        gov.sample(Ok(14_000), now);
        ramp.tick_with(now, |s| gov.clamp(s));
        assert!(gov.is_limiting());
        assert_eq!(ramp.duty_x100(), 2000);
        assert_eq!(ramp.target().duty, 80);

        // Recovers once current drops
        now += 100;
        gov.sample(Ok(6000), now);
        ramp.tick_with(now, |s| gov.clamp(s));
        assert!(!gov.is_limiting());
        assert_eq!(ramp.duty_x100(), 2500);
    }

    #[test]
    fn test_hold_allows_decrease() {
        let mut gov = governor(OverCurrentAction::Hold);
        gov.sample(Ok(12_000), 0);
        assert_eq!(gov.clamp(&step(3000, 2000)), 2000);
    }

    #[test]
    fn test_retreat_backs_off() {
        let mut gov = governor(OverCurrentAction::Retreat);
        gov.sample(Ok(12_000), 0);
        assert_eq!(gov.clamp(&step(3000, 3500)), 2000);
        assert_eq!(gov.clamp(&step(500, 1000)), 0);
    }

    #[test]
    fn test_sensor_fault_limits() {
        let mut gov = governor(OverCurrentAction::Hold);
        let reading = gov.sample(Err(SensorError::ReadFailed), 5);
        assert_eq!(reading.milliamps, None);
        assert!(gov.is_limiting());
        assert_eq!(gov.clamp(&step(1000, 1500)), 1000);
    }

    #[test]
    fn test_limit_ticks_count() {
        let mut gov = governor(OverCurrentAction::Hold);
        gov.sample(Ok(11_000), 0);
        gov.sample(Ok(11_000), 20);
        gov.sample(Ok(1_000), 40);
        assert_eq!(gov.limit_ticks(), 2);
        assert_eq!(gov.last_reading().map(|r| r.timestamp_ms), Some(40));
    }
}
