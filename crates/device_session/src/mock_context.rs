//! Simulated device enumeration

use std::sync::Arc;

use contracts::{Device, DeviceConfig, DeviceContext};
use parking_lot::RwLock;
use tracing::info;

use crate::mock_device::MockDevice;

/// Device context over a mutable list of simulated devices
///
/// Enumeration order is insertion order.
#[derive(Default)]
pub struct MockContext {
    devices: RwLock<Vec<Arc<MockDevice>>>,
}

impl MockContext {
    /// Context with no device connected
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_devices(devices: Vec<MockDevice>) -> Self {
        Self {
            devices: RwLock::new(devices.into_iter().map(Arc::new).collect()),
        }
    }

    /// Build the devices described in a configuration file
    pub fn from_config(devices: &[DeviceConfig]) -> Self {
        Self::with_devices(devices.iter().map(MockDevice::from_config).collect())
    }

    /// Plug a device in
    pub fn add_device(&self, device: MockDevice) -> Arc<MockDevice> {
        let device = Arc::new(device);
        info!(serial = %device.serial(), "mock device connected");
        self.devices.write().push(device.clone());
        device
    }

    /// Unplug a device; running captures on it report a fault
    pub fn remove_device(&self, serial: &str) -> Option<Arc<MockDevice>> {
        let mut devices = self.devices.write();
        let pos = devices.iter().position(|d| d.serial().as_str() == serial)?;
        let device = devices.remove(pos);
        device.disconnect();
        Some(device)
    }

    pub fn device(&self, serial: &str) -> Option<Arc<MockDevice>> {
        self.devices
            .read()
            .iter()
            .find(|d| d.serial().as_str() == serial)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }
}

impl DeviceContext for MockContext {
    fn query_devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices
            .read()
            .iter()
            .map(|d| d.clone() as Arc<dyn Device>)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_order() {
        let ctx = MockContext::with_devices(vec![
            MockDevice::stereo_camera("CTX-B"),
            MockDevice::stereo_camera("CTX-A"),
        ]);
        let serials: Vec<String> = ctx
            .query_devices()
            .iter()
            .map(|d| d.info().serial.to_string())
            .collect();
        assert_eq!(serials, vec!["CTX-B", "CTX-A"]);
    }

    #[test]
    fn test_hot_plug() {
        let ctx = MockContext::new();
        assert!(ctx.query_devices().is_empty());

        ctx.add_device(MockDevice::stereo_camera("CTX-PLUG"));
        assert_eq!(ctx.len(), 1);

        let removed = ctx.remove_device("CTX-PLUG").unwrap();
        assert!(removed.is_disconnected());
        assert!(ctx.is_empty());
        assert!(ctx.remove_device("CTX-PLUG").is_none());
    }
}
