//! PipelineConfig - Config Loader output
//!
//! Describes a pipeline setup in a file: stream requests, device selection,
//! synchronization tolerance and the simulated devices used by the CLI.

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{DeviceSerial, StreamProfile, StreamRequest};

/// Configuration version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct PipelineConfig {
    /// Configuration version
    #[serde(default)]
    pub version: ConfigVersion,

    /// Device selection
    #[serde(default)]
    pub pipeline: PipelineSection,

    /// Frame synchronization settings
    #[serde(default)]
    #[validate(nested)]
    pub sync: SyncSettings,

    /// Explicit stream requests (empty = device default configuration)
    #[serde(default)]
    #[validate(nested)]
    pub streams: Vec<StreamRequest>,

    /// Simulated devices, in enumeration order
    #[serde(default)]
    #[validate(nested)]
    pub devices: Vec<DeviceConfig>,
}

/// Device selection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Restrict selection to this serial (None = first matching device)
    #[serde(default)]
    pub device_serial: Option<DeviceSerial>,
}

/// Frame synchronizer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct SyncSettings {
    /// Max timestamp spread inside one frame set (None = half the longest frame period)
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0, max = 10000.0))]
    pub tolerance_ms: Option<f64>,
}

/// Simulated device description
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DeviceConfig {
    /// Serial number reported by enumeration
    pub serial: DeviceSerial,

    /// Product name
    #[validate(length(min = 1))]
    pub name: String,

    /// Firmware version string
    #[serde(default)]
    pub firmware: Option<String>,

    /// Sensors, in device order
    #[validate(length(min = 1), nested)]
    pub sensors: Vec<SensorConfig>,

    /// Emit a capture fault after this many frames per sensor (testing aid)
    #[serde(default)]
    pub fault_after_frames: Option<u64>,
}

/// Simulated sensor description
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SensorConfig {
    /// Sensor name, unique per device
    #[validate(length(min = 1))]
    pub name: String,

    /// Offered profiles; the first one per (kind, index) is the default
    #[validate(length(min = 1), nested)]
    pub profiles: Vec<StreamProfile>,
}
