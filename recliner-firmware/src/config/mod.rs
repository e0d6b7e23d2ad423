//! Settings loaded from flash at boot

pub mod calibration;
pub mod loader;
pub mod store;

pub use calibration::load_calibration;
pub use loader::load_control_config;
pub use store::SettingsStore;
