//! Motor driver implementations
//!
//! - Relay bridge: one PWM channel for speed, two relays for direction

pub mod relay_bridge;

pub use relay_bridge::{RelayBridge, RelayBridgeConfig};
