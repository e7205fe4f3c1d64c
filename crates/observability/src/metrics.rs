//! Pipeline metrics
//!
//! Recording helpers for the synchronizer and the pipeline controller, plus
//! an in-memory aggregator for end-of-run summaries.

use std::collections::BTreeMap;

use contracts::{FrameSet, PipelineState, StreamKey, SyncStats};
use metrics::{counter, gauge, histogram};

/// Record an assembled frame set
///
/// Called by the synchronizer each time every active stream has a frame
/// within tolerance.
pub fn record_frame_set_completed(set: &FrameSet) {
    counter!("rspipe_frame_sets_completed_total").increment(1);
    gauge!("rspipe_last_frame_set_number").set(set.number() as f64);
    histogram!("rspipe_frame_set_spread_ms").record(set.spread_ms());
}

/// Record a frame set handed to the consumer after `wait_ms` of blocking
pub fn record_frame_set_delivered(wait_ms: f64) {
    counter!("rspipe_frame_sets_delivered_total").increment(1);
    histogram!("rspipe_wait_latency_ms").record(wait_ms);
}

/// Record a frame set that never reached the consumer
pub fn record_frame_set_dropped(reason: &'static str) {
    counter!("rspipe_frame_sets_dropped_total", "reason" => reason).increment(1);
}

/// Record a pending frame that was replaced or discarded
pub fn record_frame_dropped(stream: StreamKey) {
    counter!(
        "rspipe_frames_dropped_total",
        "stream" => stream_label(stream)
    )
    .increment(1);
}

/// Record a frame of a stream that is not active
pub fn record_frame_ignored(stream: StreamKey) {
    counter!(
        "rspipe_frames_ignored_total",
        "stream" => stream_label(stream)
    )
    .increment(1);
}

pub fn record_capture_fault() {
    counter!("rspipe_capture_faults_total").increment(1);
}

/// Record a controller state transition
pub fn record_state_transition(to: PipelineState) {
    counter!("rspipe_state_transitions_total", "to" => to.to_string()).increment(1);
}

fn stream_label((kind, index): StreamKey) -> String {
    format!("{kind}{index}")
}

/// Frame set aggregator
///
/// Aggregates delivered frame sets in memory for a run summary.
#[derive(Debug, Clone, Default)]
pub struct SyncStatsAggregator {
    /// Frame sets seen by the consumer
    pub total_sets: u64,

    /// Frames per stream across all sets
    pub frames_per_stream: BTreeMap<String, u64>,

    /// Intra-set timestamp spread (ms)
    pub spread_stats: RunningStats,

    /// Device-clock interval between consecutive sets (ms)
    pub interval_stats: RunningStats,

    /// Consumer wait per set (ms)
    pub wait_stats: RunningStats,

    /// Last synchronizer counters absorbed
    pub sync: SyncStats,

    last_timestamp_ms: Option<f64>,
}

impl SyncStatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a delivered frame set
    pub fn update(&mut self, set: &FrameSet) {
        self.total_sets += 1;
        self.spread_stats.push(set.spread_ms());

        let ts = set.timestamp_ms();
        if let Some(prev) = self.last_timestamp_ms {
            self.interval_stats.push(ts - prev);
        }
        self.last_timestamp_ms = Some(ts);

        for frame in set.iter() {
            *self
                .frames_per_stream
                .entry(stream_label(frame.key()))
                .or_insert(0) += 1;
        }
    }

    /// Add the time the consumer blocked for one set
    pub fn record_wait(&mut self, wait_ms: f64) {
        self.wait_stats.push(wait_ms);
    }

    /// Replace the synchronizer counters (snapshots are cumulative)
    pub fn absorb(&mut self, stats: SyncStats) {
        self.sync = stats;
    }

    pub fn summary(&self) -> MetricsSummary {
        let mean_interval = self.interval_stats.mean();
        MetricsSummary {
            total_sets: self.total_sets,
            effective_fps: if mean_interval > 0.0 {
                1000.0 / mean_interval
            } else {
                0.0
            },
            spread_ms: StatsSummary::from(&self.spread_stats),
            interval_ms: StatsSummary::from(&self.interval_stats),
            wait_ms: StatsSummary::from(&self.wait_stats),
            frames_per_stream: self.frames_per_stream.clone(),
            sync: self.sync,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_sets: u64,
    pub effective_fps: f64,
    pub spread_ms: StatsSummary,
    pub interval_ms: StatsSummary,
    pub wait_ms: StatsSummary,
    pub frames_per_stream: BTreeMap<String, u64>,
    pub sync: SyncStats,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Frame Sync Summary ===")?;
        writeln!(
            f,
            "Frame sets: {} (~{:.1} fps)",
            self.total_sets, self.effective_fps
        )?;
        writeln!(
            f,
            "Sets completed/delivered/dropped: {}/{}/{} ({:.2}% dropped)",
            self.sync.sets_completed,
            self.sync.sets_delivered,
            self.sync.sets_dropped,
            self.sync.set_drop_rate()
        )?;
        writeln!(
            f,
            "Frames received/dropped/ignored: {}/{}/{}",
            self.sync.frames_received, self.sync.frames_dropped, self.sync.frames_ignored
        )?;
        writeln!(f, "Spread (ms): {}", self.spread_ms)?;
        writeln!(f, "Interval (ms): {}", self.interval_ms)?;
        writeln!(f, "Wait (ms): {}", self.wait_ms)?;

        if !self.frames_per_stream.is_empty() {
            writeln!(f, "Frames per stream:")?;
            for (stream, count) in &self.frames_per_stream {
                writeln!(f, "  {}: {}", stream, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use contracts::{Format, RawFrame, StreamKind, StreamProfile};

    fn set(number: u64, depth_ts: f64, color_ts: f64) -> FrameSet {
        let depth = StreamProfile::new(StreamKind::Depth, 0, 4, 4, Format::Z16, 30);
        let color = StreamProfile::new(StreamKind::Color, 0, 4, 4, Format::Rgb8, 30);
        FrameSet::new(
            number,
            vec![
                RawFrame::new(depth, depth_ts, number, Bytes::new()),
                RawFrame::new(color, color_ts, number, Bytes::new()),
            ],
        )
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();

        stats.push(1.0);
        stats.push(2.0);
        stats.push(3.0);
        stats.push(4.0);
        stats.push(5.0);

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = SyncStatsAggregator::new();

        aggregator.update(&set(1, 100.0, 102.0));
        aggregator.update(&set(2, 125.0, 125.0));
        aggregator.record_wait(3.0);

        assert_eq!(aggregator.total_sets, 2);
        assert_eq!(aggregator.frames_per_stream.get("depth0"), Some(&2));
        assert_eq!(aggregator.frames_per_stream.get("color0"), Some(&2));

        let summary = aggregator.summary();
        assert!((summary.spread_ms.max - 2.0).abs() < 1e-10);
        assert!((summary.interval_ms.mean - 25.0).abs() < 1e-10);
        assert!((summary.effective_fps - 40.0).abs() < 1e-10);
        assert_eq!(summary.wait_ms.count, 1);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = SyncStatsAggregator::new();
        aggregator.update(&set(1, 0.0, 0.0));
        aggregator.absorb(SyncStats {
            sets_completed: 20,
            sets_delivered: 19,
            sets_dropped: 1,
            ..Default::default()
        });

        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Frame sets: 1"));
        assert!(output.contains("20/19/1"));
        assert!(output.contains("5.00% dropped"));
        assert!(output.contains("depth0: 1"));
    }
}
