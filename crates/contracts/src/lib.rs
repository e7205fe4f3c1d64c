//! # Contracts
//!
//! Shared interface contracts for the streaming pipeline: data model, error
//! type and the traits implemented by device collaborators.
//! Every other crate in the workspace depends on this one; reverse
//! dependencies are prohibited.
//!
//! ## Time Model
//! - Frame timestamps are device-clock milliseconds (`f64`)
//! - `sequence` is the per-stream frame counter, used for ordering/diagnostics

mod config;
mod device;
mod error;
mod frame;
mod module;
mod serial;
mod state;
mod stream;
mod sync;

pub use config::*;
pub use device::*;
pub use error::*;
pub use frame::*;
pub use module::ProcessingModule;
pub use serial::DeviceSerial;
pub use state::PipelineState;
pub use stream::*;
pub use sync::SyncStats;
