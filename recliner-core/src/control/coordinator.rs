//! Dual-motor coordinator
//!
//! Owns the ramp controller, governor and hardware of both motors and runs
//! them from a single `tick`. Per motor and tick:
//!
//! 1. Read the current ADC and feed the governor
//! 2. Advance the ramp with the governor's clamp applied
//! 3. Switch the direction relays, only with the PWM at zero
//! 4. Write the PWM duty
//! 5. Latch the speed pulse

use heapless::Vec;
use recliner_protocol::{MotorCommandPair, Telemetry, TelemetryId};

use super::source::{CommandSource, SourceCommand};
use crate::config::{CalibrationData, ControlConfig, GovernorConfig, MotorCalibration};
use crate::motion::{FadeKind, FadeSetting, InvalidTarget, RampController};
use crate::safety::CurrentGovernor;
use crate::traits::{MotorHardware, RelayState};

/// Per-motor readback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelReport {
    /// Last current sample, `None` on sensor fault or before the first tick
    pub current_ma: Option<u32>,
    /// Last speed pulse period
    pub pulse_us: Option<u32>,
    pub limiting: bool,
    pub limit_ticks: u32,
}

/// Readback of both motors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CoordinatorReport {
    pub left: ChannelReport,
    pub right: ChannelReport,
}

/// Telemetry records per report
pub const TELEMETRY_PER_REPORT: usize = 5;

impl CoordinatorReport {
    /// Telemetry records for the link, skipping values not yet known
    pub fn telemetry(&self, timestamp: u32) -> Vec<Telemetry, TELEMETRY_PER_REPORT> {
        let mut out = Vec::new();
        let amps = |ma: Option<u32>| ma.map(|ma| ma as f32 / 1000.0);
        let fields = [
            (TelemetryId::LeftCurrent, amps(self.left.current_ma)),
            (TelemetryId::RightCurrent, amps(self.right.current_ma)),
            (TelemetryId::LeftPulse, self.left.pulse_us.map(|us| us as f32)),
            (TelemetryId::RightPulse, self.right.pulse_us.map(|us| us as f32)),
            (
                TelemetryId::LimitTicks,
                Some(self.left.limit_ticks.wrapping_add(self.right.limit_ticks) as f32),
            ),
        ];
        for (id, value) in fields {
            if let Some(value) = value {
                // Capacity matches the field count
                let _ = out.push(Telemetry::new(timestamp, id, value));
            }
        }
        out
    }
}

/// One motor: ramp, governor and hardware
pub struct MotorChannel<H> {
    ramp: RampController,
    governor: CurrentGovernor,
    hw: H,
    relays: RelayState,
    pulse_us: Option<u32>,
}

impl<H: MotorHardware> MotorChannel<H> {
    pub fn new(config: &ControlConfig, calibration: &MotorCalibration, hw: H, now_ms: u32) -> Self {
        let mut hw = hw;
        hw.set_pwm_duty(0);
        hw.set_direction_relays(RelayState::Open);

        Self {
            ramp: RampController::new(config.ramp_for(calibration), now_ms),
            governor: CurrentGovernor::new(config.governor, calibration.current),
            hw,
            relays: RelayState::Open,
            pulse_us: None,
        }
    }

    fn tick(&mut self, now_ms: u32) {
        let raw = self.hw.read_current_adc();
        self.governor.sample(raw, now_ms);

        let duty = self.ramp.tick_with(now_ms, |step| self.governor.clamp(step));

        let relays = RelayState::from(self.ramp.ramp_state().state);
        if relays != self.relays {
            self.hw.set_pwm_duty(0);
            self.hw.set_direction_relays(relays);
            self.relays = relays;
        }
        self.hw.set_pwm_duty(duty);

        if let Some(period) = self.hw.read_speed_pulse() {
            self.pulse_us = Some(period);
        }
    }

    pub fn ramp(&self) -> &RampController {
        &self.ramp
    }

    pub fn ramp_mut(&mut self) -> &mut RampController {
        &mut self.ramp
    }

    pub fn governor(&self) -> &CurrentGovernor {
        &self.governor
    }

    pub fn hardware(&self) -> &H {
        &self.hw
    }

    pub fn hardware_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    /// Relay position last written
    pub fn relays(&self) -> RelayState {
        self.relays
    }

    pub fn report(&self) -> ChannelReport {
        ChannelReport {
            current_ma: self.governor.last_reading().and_then(|r| r.milliamps),
            pulse_us: self.pulse_us,
            limiting: self.governor.is_limiting(),
            limit_ticks: self.governor.limit_ticks(),
        }
    }
}

/// Both motors behind one tick entry point
pub struct Coordinator<H> {
    left: MotorChannel<H>,
    right: MotorChannel<H>,
}

impl<H: MotorHardware> Coordinator<H> {
    pub fn new(
        config: &ControlConfig,
        calibration: &CalibrationData,
        left: H,
        right: H,
        now_ms: u32,
    ) -> Self {
        Self {
            left: MotorChannel::new(config, &calibration.left, left, now_ms),
            right: MotorChannel::new(config, &calibration.right, right, now_ms),
        }
    }

    /// Replace both targets
    ///
    /// The pair is applied whole or not at all.
    pub fn set_target(&mut self, pair: MotorCommandPair) -> Result<(), InvalidTarget> {
        self.left.ramp.check_target(pair.left)?;
        self.right.ramp.check_target(pair.right)?;
        self.left.ramp.set_target(pair.left)?;
        self.right.ramp.set_target(pair.right)
    }

    /// Current targets
    pub fn target(&self) -> MotorCommandPair {
        MotorCommandPair::new(self.left.ramp.target(), self.right.ramp.target())
    }

    /// Applied state and duty of both motors
    pub fn status(&self) -> MotorCommandPair {
        MotorCommandPair::new(self.left.ramp.status(), self.right.ramp.status())
    }

    /// Stop both motors at once and open the relays on the next tick
    pub fn failsafe(&mut self, now_ms: u32) {
        if self.status() != MotorCommandPair::idle() || self.target() != MotorCommandPair::idle() {
            warn!("coordinator: failsafe stop");
        }
        self.left.ramp.emergency_stop(now_ms);
        self.right.ramp.emergency_stop(now_ms);
    }

    /// Poll `source`, then advance both motors
    pub fn tick(&mut self, now_ms: u32, mut source: impl CommandSource) -> MotorCommandPair {
        match source.poll(now_ms) {
            SourceCommand::Keep => {}
            SourceCommand::Target(pair) => {
                if let Err(e) = self.set_target(pair) {
                    warn!("coordinator: target rejected: {}", e);
                }
            }
            SourceCommand::Failsafe => self.failsafe(now_ms),
        }

        self.left.tick(now_ms);
        self.right.tick(now_ms);
        self.status()
    }

    /// Per-motor current, pulse and limiting readback
    pub fn report(&self) -> CoordinatorReport {
        CoordinatorReport {
            left: self.left.report(),
            right: self.right.report(),
        }
    }

    /// Change a fade on both motors
    pub fn set_fade(&mut self, kind: FadeKind, setting: FadeSetting) {
        self.left.ramp.set_fade(kind, setting);
        self.right.ramp.set_fade(kind, setting);
    }

    pub fn set_governor(&mut self, config: GovernorConfig) {
        self.left.governor.set_config(config);
        self.right.governor.set_config(config);
    }

    pub fn left(&self) -> &MotorChannel<H> {
        &self.left
    }

    pub fn right(&self) -> &MotorChannel<H> {
        &self.right
    }

    pub fn left_mut(&mut self) -> &mut MotorChannel<H> {
        &mut self.left
    }

    pub fn right_mut(&mut self) -> &mut MotorChannel<H> {
        &mut self.right
    }
}
