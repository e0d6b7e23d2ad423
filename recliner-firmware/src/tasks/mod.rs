//! Embassy async tasks
//!
//! Each task runs independently and shares state through the statics in
//! `channels`.

pub mod activity;
pub mod control;
pub mod link_rx;
pub mod link_tx;
pub mod pulse;

pub use activity::activity_task;
pub use control::control_task;
pub use link_rx::link_rx_task;
pub use link_tx::link_tx_task;
pub use pulse::pulse_task;
