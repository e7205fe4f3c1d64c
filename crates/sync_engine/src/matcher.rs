//! Frame matching
//!
//! Single-threaded core of the synchronizer: one pending slot per active
//! stream profile, a set is emitted once every slot is filled and the
//! timestamps agree within the tolerance.

use contracts::{FrameSet, RawFrame, StreamProfile, SyncStats};
use tracing::{debug, instrument, trace};

/// Slack for timestamps that sit exactly on the tolerance boundary
const TIMESTAMP_EPSILON_MS: f64 = 1e-6;

/// Default tolerance: half of the longest frame period among `profiles`
pub fn default_tolerance_ms(profiles: &[StreamProfile]) -> f64 {
    profiles
        .iter()
        .map(|p| p.frame_period_ms())
        .fold(0.0, f64::max)
        / 2.0
}

#[derive(Debug)]
struct Slot {
    profile: StreamProfile,
    pending: Option<RawFrame>,
}

/// Groups frames of the active profiles into frame sets
#[derive(Debug)]
pub struct FrameMatcher {
    slots: Vec<Slot>,
    tolerance_ms: f64,
    next_number: u64,
    stats: SyncStats,
}

impl FrameMatcher {
    /// Matcher over `profiles`; `tolerance_ms = None` uses `default_tolerance_ms`
    pub fn new(profiles: &[StreamProfile], tolerance_ms: Option<f64>) -> Self {
        let mut slots: Vec<Slot> = profiles
            .iter()
            .map(|p| Slot {
                profile: *p,
                pending: None,
            })
            .collect();
        slots.sort_by_key(|s| s.profile.key());

        Self {
            slots,
            tolerance_ms: tolerance_ms.unwrap_or_else(|| default_tolerance_ms(profiles)),
            next_number: 1,
            stats: SyncStats::default(),
        }
    }

    pub fn tolerance_ms(&self) -> f64 {
        self.tolerance_ms
    }

    pub fn profiles(&self) -> impl Iterator<Item = &StreamProfile> {
        self.slots.iter().map(|s| &s.profile)
    }

    /// Number of streams with a pending frame
    pub fn pending(&self) -> usize {
        self.slots.iter().filter(|s| s.pending.is_some()).count()
    }

    /// Counters; the delivery fields stay zero at this level
    pub fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Offer a frame; returns a set if this frame completed one
    #[instrument(
        level = "trace",
        name = "frame_matcher_push",
        skip(self, frame),
        fields(stream = %frame.kind(), index = frame.index(), timestamp_ms = frame.timestamp_ms)
    )]
    pub fn push(&mut self, frame: RawFrame) -> Option<FrameSet> {
        let key = frame.key();
        let Some(slot) = self.slots.iter_mut().find(|s| s.profile == frame.profile) else {
            self.stats.frames_ignored += 1;
            observability::record_frame_ignored(key);
            trace!("frame of inactive stream ignored");
            return None;
        };
        self.stats.frames_received += 1;

        if let Some(pending) = &slot.pending {
            self.stats.frames_dropped += 1;
            observability::record_frame_dropped(key);

            if pending.timestamp_ms > frame.timestamp_ms {
                trace!(pending_ms = pending.timestamp_ms, "late frame dropped");
                return None;
            }
            trace!(replaced_ms = pending.timestamp_ms, "pending frame replaced");
        }
        slot.pending = Some(frame);

        self.try_complete()
    }

    /// Drop every pending frame
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.pending = None;
        }
    }

    fn try_complete(&mut self) -> Option<FrameSet> {
        if self.slots.is_empty() || self.slots.iter().any(|s| s.pending.is_none()) {
            return None;
        }

        let mut oldest = 0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (idx, frame) in self.slots.iter().filter_map(|s| s.pending.as_ref()).enumerate() {
            if frame.timestamp_ms < min {
                min = frame.timestamp_ms;
                oldest = idx;
            }
            max = max.max(frame.timestamp_ms);
        }

        if max - min > self.tolerance_ms + TIMESTAMP_EPSILON_MS {
            // The oldest frame can never pair with later arrivals.
            let slot = &mut self.slots[oldest];
            slot.pending = None;
            self.stats.frames_dropped += 1;
            observability::record_frame_dropped(slot.profile.key());
            trace!(
                spread_ms = max - min,
                tolerance_ms = self.tolerance_ms,
                dropped = %slot.profile,
                "spread above tolerance, oldest frame dropped"
            );
            return None;
        }

        let frames = self
            .slots
            .iter_mut()
            .filter_map(|s| s.pending.take())
            .collect();
        let set = FrameSet::new(self.next_number, frames);
        self.next_number += 1;
        self.stats.sets_completed += 1;

        observability::record_frame_set_completed(&set);
        debug!(
            number = set.number(),
            timestamp_ms = set.timestamp_ms(),
            spread_ms = set.spread_ms(),
            "frame set completed"
        );
        Some(set)
    }
}
