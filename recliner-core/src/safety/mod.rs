//! Safety interlocks
//!
//! Current limiting and serial link liveness.

pub mod governor;
pub mod link;

pub use governor::{CurrentGovernor, CurrentReading};
pub use link::{LinkHealth, LinkMonitor};
