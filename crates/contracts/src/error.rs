//! Layered error definitions
//!
//! Categorized by source: lifecycle / resolution / device / frames / config

use thiserror::Error;

use crate::PipelineState;

/// Unified error type
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Lifecycle Errors =====
    /// Operation not valid in the current controller state
    #[error("invalid state: cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// Query issued before the lifecycle point that makes it meaningful
    #[error("not ready: {what}")]
    NotReady { what: String },

    // ===== Resolution Errors =====
    /// Combined requirements cannot be satisfied
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// No connected device (or none with the requested serial)
    #[error("no device connected{}", serial_suffix(.serial))]
    NoDevice { serial: Option<String> },

    // ===== Device Errors =====
    /// Sensor already owned by another session
    #[error("device busy: sensor '{sensor}' of device '{serial}' is owned elsewhere")]
    DeviceBusy { serial: String, sensor: String },

    /// Fault reported by the capture side (e.g. disconnect mid-stream)
    #[error("device fault: {message}")]
    DeviceFault { message: String },

    // ===== Frame Retrieval Errors =====
    /// Blocking wait exceeded its timeout
    #[error("timeout: no frame set within {waited_ms}ms")]
    Timeout { waited_ms: u64 },

    /// Wait interrupted by a concurrent stop
    #[error("pipeline stopped while waiting for frames")]
    Stopped,

    // ===== Configuration File Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl PipelineError {
    /// Create invalid state error
    pub fn invalid_state(operation: &'static str, state: PipelineState) -> Self {
        Self::InvalidState { operation, state }
    }

    /// Create not-ready error
    pub fn not_ready(what: impl Into<String>) -> Self {
        Self::NotReady { what: what.into() }
    }

    /// Create configuration (resolution) error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create device busy error
    pub fn device_busy(serial: impl Into<String>, sensor: impl Into<String>) -> Self {
        Self::DeviceBusy {
            serial: serial.into(),
            sensor: sensor.into(),
        }
    }

    /// Create device fault error
    pub fn device_fault(message: impl Into<String>) -> Self {
        Self::DeviceFault {
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }
}

fn serial_suffix(serial: &Option<String>) -> String {
    serial
        .as_ref()
        .map(|s| format!(" with serial '{s}'"))
        .unwrap_or_default()
}

/// Result alias
pub type Result<T> = std::result::Result<T, PipelineError>;
