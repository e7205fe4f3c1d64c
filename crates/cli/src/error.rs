//! Error types for CLI operations.

use contracts::PipelineError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be resolved against the devices
    #[error("Configuration cannot be resolved: {source}")]
    Resolution {
        #[source]
        source: PipelineError,
    },

    /// Streaming ended on an error
    #[error("Streaming failed after {frame_sets} frame sets: {source}")]
    Streaming {
        frame_sets: u64,
        #[source]
        source: PipelineError,
    },
}

impl CliError {
    pub fn config_not_found(path: &std::path::Path) -> Self {
        Self::ConfigNotFound {
            path: path.display().to_string(),
        }
    }

    pub fn resolution(source: PipelineError) -> Self {
        Self::Resolution { source }
    }

    pub fn streaming(frame_sets: u64, source: PipelineError) -> Self {
        Self::Streaming { frame_sets, source }
    }
}
