//! Device Session
//!
//! Owns an activated device: the sensor leases, the running capture sources
//! and the profiles they stream.

use std::fmt;
use std::sync::Arc;

use contracts::{CaptureSource, Device, FrameCallback, PipelineError, Result, StreamProfile};
use tracing::{debug, info, instrument};

use crate::registry::{SensorLease, SensorRegistry};

/// Active streaming session on one device
///
/// Dropping the session stops capture and releases the sensors.
pub struct DeviceSession {
    device: Arc<dyn Device>,
    profiles: Vec<StreamProfile>,
    sources: Vec<Box<dyn CaptureSource>>,
    leases: Vec<SensorLease>,
}

impl DeviceSession {
    /// Own, open and start every sensor serving `profiles`
    ///
    /// # Atomicity
    /// Leases are all taken before any sensor is opened. On failure every
    /// lease and source acquired so far is released; nothing is retried.
    ///
    /// # Errors
    /// - `DeviceBusy` if a required sensor is owned elsewhere
    /// - `Configuration` if a profile is not offered by the device
    /// - whatever `Device::open` reports
    #[instrument(
        name = "device_session_activate",
        skip(device, profiles, callback),
        fields(serial = %device.info().serial, streams = profiles.len())
    )]
    pub fn activate(
        device: Arc<dyn Device>,
        profiles: &[StreamProfile],
        callback: FrameCallback,
    ) -> Result<Self> {
        let groups = group_by_sensor(device.as_ref(), profiles)?;
        let serial = device.info().serial.clone();

        let mut leases = Vec::with_capacity(groups.len());
        for (sensor, _) in &groups {
            leases.push(SensorRegistry::acquire(&serial, sensor)?);
        }

        let mut sources = Vec::with_capacity(groups.len());
        for (sensor, sensor_profiles) in &groups {
            sources.push(device.open(sensor, sensor_profiles)?);
        }

        for source in &sources {
            source.start(callback.clone());
            debug!(sensor = source.sensor_name(), "capture started");
        }

        metrics::counter!("device_session_activations_total").increment(1);
        metrics::gauge!("device_session_active_sensors").increment(sources.len() as f64);
        info!(
            serial = %serial,
            sensors = sources.len(),
            streams = profiles.len(),
            "device session active"
        );

        Ok(Self {
            device,
            profiles: profiles.to_vec(),
            sources,
            leases,
        })
    }

    /// Stop capture and release the sensors; idempotent
    #[instrument(name = "device_session_deactivate", skip(self), fields(serial = %self.device.info().serial))]
    pub fn deactivate(&mut self) {
        if self.sources.is_empty() && self.leases.is_empty() {
            return;
        }

        for source in &self.sources {
            source.stop();
            debug!(sensor = source.sensor_name(), "capture stopped");
        }
        metrics::gauge!("device_session_active_sensors").decrement(self.sources.len() as f64);
        self.sources.clear();
        self.leases.clear();

        info!("device session released");
    }

    pub fn is_active(&self) -> bool {
        !self.leases.is_empty()
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    pub fn profiles(&self) -> &[StreamProfile] {
        &self.profiles
    }

    /// Sensors owned by this session, in device order
    pub fn sensors(&self) -> Vec<&str> {
        self.leases.iter().map(|l| l.sensor()).collect()
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.deactivate();
    }
}

impl fmt::Debug for DeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceSession")
            .field("serial", &self.device.info().serial)
            .field("profiles", &self.profiles)
            .field("sensors", &self.sensors())
            .finish()
    }
}

/// Split `profiles` per producing sensor, in device sensor order
fn group_by_sensor(
    device: &dyn Device,
    profiles: &[StreamProfile],
) -> Result<Vec<(String, Vec<StreamProfile>)>> {
    if let Some(orphan) = profiles.iter().find(|p| device.sensor_for(p.key()).is_none()) {
        return Err(PipelineError::configuration(format!(
            "device {} has no sensor producing {orphan}",
            device.info().serial
        )));
    }

    Ok(device
        .sensors()
        .iter()
        .filter_map(|sensor| {
            let owned: Vec<StreamProfile> = profiles
                .iter()
                .filter(|p| sensor.serves(p.key()))
                .copied()
                .collect();
            (!owned.is_empty()).then(|| (sensor.name.clone(), owned))
        })
        .collect())
}
