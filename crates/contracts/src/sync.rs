//! SyncStats - Frame Synchronizer counters

use serde::{Deserialize, Serialize};

/// Counter snapshot of one synchronizer (one streaming session)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Frames accepted for an active stream
    pub frames_received: u64,

    /// Pending frames replaced by a newer one or discarded as unpairable
    pub frames_dropped: u64,

    /// Frames of streams that are not active
    pub frames_ignored: u64,

    /// Frame sets assembled
    pub sets_completed: u64,

    /// Frame sets handed to the consumer
    pub sets_delivered: u64,

    /// Frame sets replaced in the delivery slot, out of order, or discarded on shutdown
    pub sets_dropped: u64,
}

impl SyncStats {
    /// Share of assembled sets that never reached the consumer (percent)
    pub fn set_drop_rate(&self) -> f64 {
        if self.sets_completed == 0 {
            0.0
        } else {
            self.sets_dropped as f64 / self.sets_completed as f64 * 100.0
        }
    }
}
