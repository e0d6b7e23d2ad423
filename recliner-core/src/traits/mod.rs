//! Hardware abstraction traits
//!
//! These traits define the interface between the control logic
//! and hardware-specific implementations.

pub mod clock;
pub mod motor;

pub use clock::{deadline_reached, Clock};
pub use motor::{
    CurrentAdc, DirectionRelays, MotorHardware, MotorIo, PwmOutput, RelayState, SensorError,
    SpeedPulse, DUTY_FULL_X100,
};
