//! Motor hardware capability traits
//!
//! The coordinator never talks to concrete peripherals. Each motor channel is
//! driven through four narrow capabilities:
//! - PWM duty output
//! - Direction relays (reversing relay pair)
//! - Current sense ADC
//! - Speed pulse readback
//!
//! Concrete implementations live in `recliner-drivers` and the firmware.

use recliner_protocol::MotorState;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Full-scale duty in hundredths of a percent
pub const DUTY_FULL_X100: u16 = 10_000;

/// Errors from reading a sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SensorError {
    /// ADC conversion failed
    ReadFailed,
    /// Reading outside the physically possible range
    OutOfRange,
}

/// Position of the reversing relay pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RelayState {
    /// Both relays released, motor floating
    #[default]
    Open,
    /// Polarity for forward drive
    Forward,
    /// Polarity for reverse drive
    Reverse,
    /// Motor terminals shorted together
    Brake,
}

impl From<MotorState> for RelayState {
    fn from(state: MotorState) -> Self {
        match state {
            MotorState::Idle => RelayState::Open,
            MotorState::Forward => RelayState::Forward,
            MotorState::Reverse => RelayState::Reverse,
            MotorState::Brake => RelayState::Brake,
        }
    }
}

/// PWM output driving one motor
pub trait PwmOutput {
    /// Set duty in hundredths of a percent (0..=10000)
    fn set_pwm_duty(&mut self, duty_x100: u16);
}

/// Reversing relay pair of one motor
///
/// Callers only switch relays while the PWM output is at zero.
pub trait DirectionRelays {
    /// Drive the relays to `state`
    fn set_direction_relays(&mut self, state: RelayState);
}

/// Current sense channel of one motor
pub trait CurrentAdc {
    /// Raw ADC counts (uncalibrated)
    fn read_current_adc(&mut self) -> Result<u16, SensorError>;
}

/// Speed sensor of one motor
pub trait SpeedPulse {
    /// Latest pulse period in microseconds, if a new one arrived since the
    /// previous call
    fn read_speed_pulse(&mut self) -> Option<u32>;
}

/// Everything the coordinator needs from one motor channel
pub trait MotorHardware: PwmOutput + DirectionRelays + CurrentAdc + SpeedPulse {}

impl<T: PwmOutput + DirectionRelays + CurrentAdc + SpeedPulse> MotorHardware for T {}

/// Bundles separately-owned capabilities into one [`MotorHardware`]
///
/// Typical boards have the bridge, the ADC channel and the pulse input on
/// unrelated peripherals.
pub struct MotorIo<B, A, S> {
    pub bridge: B,
    pub adc: A,
    pub pulse: S,
}

impl<B, A, S> MotorIo<B, A, S> {
    /// Bundle the three parts
    pub fn new(bridge: B, adc: A, pulse: S) -> Self {
        Self { bridge, adc, pulse }
    }
}

impl<B: PwmOutput, A, S> PwmOutput for MotorIo<B, A, S> {
    fn set_pwm_duty(&mut self, duty_x100: u16) {
        self.bridge.set_pwm_duty(duty_x100);
    }
}

impl<B: DirectionRelays, A, S> DirectionRelays for MotorIo<B, A, S> {
    fn set_direction_relays(&mut self, state: RelayState) {
        self.bridge.set_direction_relays(state);
    }
}

impl<B, A: CurrentAdc, S> CurrentAdc for MotorIo<B, A, S> {
    fn read_current_adc(&mut self) -> Result<u16, SensorError> {
        self.adc.read_current_adc()
    }
}

impl<B, A, S: SpeedPulse> SpeedPulse for MotorIo<B, A, S> {
    fn read_speed_pulse(&mut self) -> Option<u32> {
        self.pulse.read_speed_pulse()
    }
}
