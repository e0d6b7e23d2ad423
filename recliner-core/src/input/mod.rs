//! Input helpers shared with the input board

pub mod joystick;

pub use joystick::direction_angle_deg;
