//! Process-wide sensor ownership
//!
//! A sensor can be streamed by one session at a time. Ownership is keyed by
//! (device serial, sensor name) and held through a `SensorLease`; dropping
//! the lease releases the sensor.

use std::collections::HashSet;
use std::fmt;

use contracts::{DeviceSerial, PipelineError, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, warn};

type SensorKey = (DeviceSerial, String);

static OWNED: Lazy<Mutex<HashSet<SensorKey>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Global sensor ownership registry
pub struct SensorRegistry;

impl SensorRegistry {
    /// Take exclusive ownership of `sensor` on device `serial`
    ///
    /// Fails with `DeviceBusy` if someone else holds it. Never waits.
    pub fn acquire(serial: &DeviceSerial, sensor: &str) -> Result<SensorLease> {
        let key = (serial.clone(), sensor.to_string());
        let mut owned = OWNED.lock();
        if owned.contains(&key) {
            warn!(serial = %serial, sensor, "sensor already owned");
            metrics::counter!("sensor_lease_conflicts_total").increment(1);
            return Err(PipelineError::device_busy(serial.as_str(), sensor));
        }
        owned.insert(key);
        debug!(serial = %serial, sensor, "sensor lease acquired");

        Ok(SensorLease {
            serial: serial.clone(),
            sensor: sensor.to_string(),
        })
    }

    pub fn is_owned(serial: &str, sensor: &str) -> bool {
        OWNED
            .lock()
            .iter()
            .any(|(s, n)| s.as_str() == serial && n == sensor)
    }

    /// Number of sensors of `serial` currently owned
    pub fn owned_on(serial: &str) -> usize {
        OWNED.lock().iter().filter(|(s, _)| s.as_str() == serial).count()
    }

    fn release(serial: &DeviceSerial, sensor: &str) {
        let removed = OWNED.lock().remove(&(serial.clone(), sensor.to_string()));
        if removed {
            debug!(serial = %serial, sensor, "sensor lease released");
        }
    }
}

/// Exclusive ownership of one sensor, released on drop
pub struct SensorLease {
    serial: DeviceSerial,
    sensor: String,
}

impl SensorLease {
    pub fn serial(&self) -> &DeviceSerial {
        &self.serial
    }

    pub fn sensor(&self) -> &str {
        &self.sensor
    }
}

impl fmt::Debug for SensorLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SensorLease")
            .field("serial", &self.serial.as_str())
            .field("sensor", &self.sensor)
            .finish()
    }
}

impl Drop for SensorLease {
    fn drop(&mut self) {
        SensorRegistry::release(&self.serial, &self.sensor);
    }
}
