//! Pipeline lifecycle states.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline controller state
///
/// `Created` → `Configuring` → `Committed` → `Streaming` → `Stopped`,
/// and back to `Created` through `reset_config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Freshly created or reset, no requests recorded
    #[default]
    Created,
    /// At least one configuration call recorded, not yet committed
    Configuring,
    /// Device and profiles selected, sensors not owned
    Committed,
    /// Sensors owned, capture running
    Streaming,
    /// Capture halted, configuration retained
    Stopped,
}

impl PipelineState {
    /// Whether stream requests and modules may still be changed
    pub fn accepts_configuration(self) -> bool {
        matches!(self, Self::Created | Self::Configuring)
    }

    /// Whether a resolved configuration is in force
    pub fn is_committed(self) -> bool {
        matches!(self, Self::Committed | Self::Streaming | Self::Stopped)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::Configuring => "configuring",
            Self::Committed => "committed",
            Self::Streaming => "streaming",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
