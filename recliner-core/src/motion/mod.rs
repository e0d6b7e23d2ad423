//! Motion control
//!
//! Bounded-rate duty ramping for the DC motors.

pub mod ramp;

pub use ramp::{
    duty_percent, FadeKind, FadeSetting, InvalidTarget, MotorRampState, RampController, RampStep,
};
