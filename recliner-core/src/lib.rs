//! Board-agnostic core logic for the recliner actuator firmware
//!
//! This crate contains all motor-control logic that does not depend on
//! specific hardware implementations:
//!
//! - Hardware capability traits (PWM, direction relays, current ADC, speed
//!   pulse, clock)
//! - Per-motor duty ramp with relay-safe reversal
//! - Current-limit governor and link liveness monitor
//! - Dual-motor coordinator and its command sources
//! - Async serial link transport
//! - Configuration and calibration types

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

// Must come first so the logging macros are visible to the other modules
mod fmt;

pub mod config;
pub mod control;
pub mod input;
pub mod link;
pub mod motion;
pub mod safety;
pub mod sensor;
pub mod traits;
