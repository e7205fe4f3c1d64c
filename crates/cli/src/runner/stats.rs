//! Run statistics.

use std::time::Duration;

use observability::SyncStatsAggregator;

/// Statistics from a streaming run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    /// Serial of the device that streamed
    pub device: String,

    /// Active stream profiles, rendered
    pub streams: Vec<String>,

    /// Wall-clock duration of the run
    pub duration: Duration,

    /// Frame set aggregator
    pub sync_metrics: SyncStatsAggregator,
}

impl RunStats {
    pub fn frame_sets(&self) -> u64 {
        self.sync_metrics.total_sets
    }

    /// Frame sets per wall-clock second
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.frame_sets() as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");
        println!("Device: {}", self.device);
        println!("Streams ({}):", self.streams.len());
        for stream in &self.streams {
            println!("  - {}", stream);
        }
        println!("Duration: {:.2}s", self.duration.as_secs_f64());
        println!("Frame sets: {} ({:.2} fps)", self.frame_sets(), self.fps());
        println!();
        print!("{}", self.sync_metrics.summary());
        println!();
    }
}
