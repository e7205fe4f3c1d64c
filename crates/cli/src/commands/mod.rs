//! Command implementations.

mod devices;
mod run;
mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::PipelineConfig;
use device_session::{MockContext, MockDevice};
use tracing::info;

use crate::error::CliError;

pub use devices::run_devices;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Serial of the stereo camera simulated when the configuration has no devices
pub const BUILTIN_SERIAL: &str = "SIM-0001";

/// Load and validate a configuration file
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}

/// Simulated devices described by `config`
pub fn build_context(config: &PipelineConfig) -> Arc<MockContext> {
    if config.devices.is_empty() {
        info!(serial = BUILTIN_SERIAL, "no devices configured, simulating a stereo camera");
        Arc::new(MockContext::with_devices(vec![MockDevice::stereo_camera(
            BUILTIN_SERIAL,
        )]))
    } else {
        Arc::new(MockContext::from_config(&config.devices))
    }
}
