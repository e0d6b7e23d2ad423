//! Control configuration persistence
//!
//! Loads the `ControlConfig` from flash, falling back to the compiled-in
//! defaults when nothing valid is stored.

use defmt::*;

use recliner_core::config::ControlConfig;

use super::store::{SettingsStore, StorageKey, StoreError};

/// Upper bound on the postcard encoding of `ControlConfig`
const MAX_CONFIG_SIZE: usize = 96;

/// Configuration persistence errors
#[derive(Debug, Clone, Copy, defmt::Format)]
pub enum ConfigError {
    Store(StoreError),
    Deserialize,
    Serialize,
}

impl From<StoreError> for ConfigError {
    fn from(e: StoreError) -> Self {
        ConfigError::Store(e)
    }
}

/// Load the control configuration, or defaults
///
/// A blank partition is seeded with the defaults so the record exists for
/// later tuning.
pub async fn load_control_config(store: &mut SettingsStore<'_>) -> ControlConfig {
    match read_control_config(store).await {
        Ok(config) => {
            info!("Loaded control configuration from flash");
            log_config_summary(&config);
            config
        }
        Err(ConfigError::Store(StoreError::NotFound)) => {
            info!("No control configuration in flash, storing defaults");
            let config = ControlConfig::default();
            if let Err(e) = save_control_config(store, &config).await {
                warn!("Failed to store default control configuration: {:?}", e);
            }
            config
        }
        Err(e) => {
            warn!("Failed to load control configuration: {:?}, using defaults", e);
            ControlConfig::default()
        }
    }
}

async fn read_control_config(store: &mut SettingsStore<'_>) -> Result<ControlConfig, ConfigError> {
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    let len = store.read(StorageKey::ControlConfig, &mut buffer).await?;
    debug!("Read {} bytes of control configuration", len);

    let config: ControlConfig =
        postcard::from_bytes(&buffer[..len]).map_err(|_| ConfigError::Deserialize)?;
    Ok(config.sanitized())
}

/// Persist a control configuration
pub async fn save_control_config(
    store: &mut SettingsStore<'_>,
    config: &ControlConfig,
) -> Result<(), ConfigError> {
    let mut buffer = [0u8; MAX_CONFIG_SIZE];
    let bytes = postcard::to_slice(config, &mut buffer).map_err(|_| ConfigError::Serialize)?;
    store.write(StorageKey::ControlConfig, bytes).await?;
    info!("Saved control configuration ({} bytes)", bytes.len());
    Ok(())
}

fn log_config_summary(config: &ControlConfig) {
    debug!(
        "Control: period={}ms accel={}ms decel={}ms settle={}ms max_duty={}%",
        config.control_period_ms,
        config.ramp.fade_accel_ms,
        config.ramp.fade_decel_ms,
        config.ramp.relay_settle_ms,
        config.ramp.max_duty,
    );
    debug!(
        "Limits: current_max={}mA liveness={}ms reversal={:?} over_current={:?}",
        config.governor.current_max_ma,
        config.link.liveness_timeout_ms,
        config.ramp.reversal,
        config.governor.action,
    );
}
