//! Streaming run orchestration.

mod orchestrator;
mod stats;

pub use orchestrator::{RunEnd, RunOptions, Runner};
pub use stats::RunStats;
