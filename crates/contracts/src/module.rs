//! ProcessingModule trait - attached processing block requirements

use crate::StreamRequest;

/// Processing module attached to a pipeline
///
/// Only its stream requirements are visible to the orchestrator; how the
/// module consumes frames is outside this crate.
pub trait ProcessingModule: Send + Sync {
    /// Module name (used for logging and error messages)
    fn name(&self) -> &str;

    /// Streams the module needs, with the fields it pins
    fn stream_requirements(&self) -> Vec<StreamRequest>;
}
