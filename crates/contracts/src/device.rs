//! Device collaborator contracts
//!
//! The pipeline never talks to hardware directly. Enumeration, sensor
//! activation and frame delivery go through these traits, which are
//! implemented by a real driver binding or by the simulated backend.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::{DeviceSerial, RawFrame, Result, StreamKey, StreamProfile};

/// Event emitted by a capture source
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A new frame of an active stream
    Frame(RawFrame),
    /// Capture-side fault (disconnect, transport error)
    Fault(String),
}

/// Capture callback type
///
/// Invoked from the capture thread; must not block.
pub type FrameCallback = Arc<dyn Fn(CaptureEvent) + Send + Sync>;

/// Identification of a connected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub serial: DeviceSerial,
    pub name: String,
    pub firmware: Option<String>,
}

/// One sensor of a device and the profiles it can stream
///
/// For each (kind, index), the first listed profile is the default one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorInfo {
    pub name: String,
    pub profiles: Vec<StreamProfile>,
}

impl SensorInfo {
    /// Whether this sensor produces the stream `key`
    pub fn serves(&self, key: StreamKey) -> bool {
        self.profiles.iter().any(|p| p.key() == key)
    }
}

/// Connected device
pub trait Device: Send + Sync {
    /// Serial, name, firmware
    fn info(&self) -> &DeviceInfo;

    /// Sensors in device order
    fn sensors(&self) -> &[SensorInfo];

    /// Configure `profiles` on `sensor` and return its capture source
    ///
    /// Does not start streaming; `CaptureSource::start` does.
    fn open(&self, sensor: &str, profiles: &[StreamProfile]) -> Result<Box<dyn CaptureSource>>;

    /// All offered profiles, in sensor then listing order
    fn stream_profiles(&self) -> Vec<StreamProfile> {
        self.sensors()
            .iter()
            .flat_map(|s| s.profiles.iter().copied())
            .collect()
    }

    /// Distinct (kind, index) pairs offered, sorted
    fn stream_keys(&self) -> Vec<StreamKey> {
        self.sensors()
            .iter()
            .flat_map(|s| s.profiles.iter().map(|p| p.key()))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Default profile of a stream: the first one listed for it
    fn default_profile(&self, key: StreamKey) -> Option<StreamProfile> {
        self.sensors()
            .iter()
            .flat_map(|s| s.profiles.iter())
            .find(|p| p.key() == key)
            .copied()
    }

    /// Name of the sensor producing `key`
    fn sensor_for(&self, key: StreamKey) -> Option<&str> {
        self.sensors()
            .iter()
            .find(|s| s.serves(key))
            .map(|s| s.name.as_str())
    }
}

impl fmt::Debug for dyn Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("serial", &self.info().serial)
            .field("name", &self.info().name)
            .finish()
    }
}

/// Running stream source of one sensor
///
/// Same listen/stop shape as a hardware sensor callback API.
pub trait CaptureSource: Send + Sync {
    /// Sensor this source belongs to
    fn sensor_name(&self) -> &str;

    /// Start delivering events to `callback`
    ///
    /// Idempotent: a second call while streaming registers nothing.
    fn start(&self, callback: FrameCallback);

    /// Stop delivering events
    fn stop(&self);

    fn is_streaming(&self) -> bool;
}

/// Device enumeration service
pub trait DeviceContext: Send + Sync {
    /// Connected devices, in enumeration order
    fn query_devices(&self) -> Vec<Arc<dyn Device>>;
}
