//! Sensor plumbing

pub mod pulse;

pub use pulse::PulseLatch;
