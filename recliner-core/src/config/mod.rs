//! Control parameters and per-motor calibration
//!
//! Both are plain `Copy` structs with defaults; the firmware persists them
//! with postcard when the `serde` feature is on.

pub mod calibration;
pub mod types;

pub use calibration::*;
pub use types::*;
