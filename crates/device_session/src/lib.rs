//! # Device Session
//!
//! Sensor activation for a resolved pipeline configuration.
//!
//! Responsibilities:
//! - Exclusive, process-wide sensor ownership (`registry`)
//! - Open and start the capture sources serving the resolved profiles
//! - Stop capture and release ownership on deactivate / drop
//! - Simulated device backend for tests and the CLI (`MockDevice`, `MockContext`)

pub mod mock_context;
pub mod mock_device;
pub mod registry;
pub mod session;

pub use mock_context::MockContext;
pub use mock_device::{MockCaptureSource, MockDevice};
pub use registry::{SensorLease, SensorRegistry};
pub use session::DeviceSession;
