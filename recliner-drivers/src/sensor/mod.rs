//! Sensor implementations

pub mod current;

pub use current::{AdcReader, CurrentSense};
