//! RawFrame / FrameSet - capture output and synchronizer output
//!
//! Frames own their payload through `Bytes`, so cloning a frame never copies
//! pixel data. A `FrameSet` is reference counted: the synchronizer and the
//! consumer share it and it is released when the last holder drops it.

use std::sync::Arc;

use bytes::Bytes;

use crate::{StreamKey, StreamKind, StreamProfile};

/// One frame of one stream, as produced by a capture source
#[derive(Debug, Clone)]
pub struct RawFrame {
    /// Profile of the stream that produced the frame
    pub profile: StreamProfile,

    /// Device clock timestamp (milliseconds)
    pub timestamp_ms: f64,

    /// Per-stream frame counter
    pub sequence: u64,

    /// Payload (zero-copy)
    pub data: Bytes,
}

impl RawFrame {
    pub fn new(profile: StreamProfile, timestamp_ms: f64, sequence: u64, data: Bytes) -> Self {
        Self {
            profile,
            timestamp_ms,
            sequence,
            data,
        }
    }

    #[inline]
    pub fn kind(&self) -> StreamKind {
        self.profile.kind
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.profile.index
    }

    #[inline]
    pub fn key(&self) -> StreamKey {
        self.profile.key()
    }
}

#[derive(Debug)]
struct FrameSetInner {
    number: u64,
    frames: Vec<RawFrame>,
}

/// Time-synchronized bundle of one frame per active stream
///
/// Immutable once built. Frames are ordered by (kind, index).
#[derive(Debug, Clone)]
pub struct FrameSet(Arc<FrameSetInner>);

impl FrameSet {
    /// Build a set from grouped frames
    pub fn new(number: u64, mut frames: Vec<RawFrame>) -> Self {
        frames.sort_by_key(|f| f.key());
        Self(Arc::new(FrameSetInner { number, frames }))
    }

    /// Monotonically increasing set number within one streaming session
    pub fn number(&self) -> u64 {
        self.0.number
    }

    /// Set timestamp: the earliest member timestamp
    pub fn timestamp_ms(&self) -> f64 {
        self.0
            .frames
            .iter()
            .map(|f| f.timestamp_ms)
            .fold(f64::INFINITY, f64::min)
    }

    /// Distance between the earliest and the latest member
    pub fn spread_ms(&self) -> f64 {
        let (min, max) = self
            .0
            .frames
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
                (lo.min(f.timestamp_ms), hi.max(f.timestamp_ms))
            });
        if self.0.frames.is_empty() {
            0.0
        } else {
            max - min
        }
    }

    pub fn len(&self) -> usize {
        self.0.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.frames.is_empty()
    }

    pub fn frames(&self) -> &[RawFrame] {
        &self.0.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawFrame> {
        self.0.frames.iter()
    }

    /// Frame for (kind, index); index 0 selects the first frame of `kind`
    pub fn get(&self, kind: StreamKind, index: u32) -> Option<&RawFrame> {
        self.0
            .frames
            .iter()
            .find(|f| f.kind() == kind && (index == 0 || f.index() == index))
    }

    pub fn depth(&self) -> Option<&RawFrame> {
        self.get(StreamKind::Depth, 0)
    }

    pub fn color(&self) -> Option<&RawFrame> {
        self.get(StreamKind::Color, 0)
    }

    /// Number of live handles to this set
    pub fn holders(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Format;

    fn frame(kind: StreamKind, index: u32, ts: f64) -> RawFrame {
        RawFrame::new(
            StreamProfile::new(kind, index, 4, 4, Format::Y8, 30),
            ts,
            1,
            Bytes::from_static(&[0u8; 16]),
        )
    }

    #[test]
    fn test_frames_sorted_by_key() {
        let set = FrameSet::new(
            1,
            vec![
                frame(StreamKind::Infrared, 2, 10.0),
                frame(StreamKind::Depth, 0, 10.5),
                frame(StreamKind::Infrared, 1, 9.5),
            ],
        );
        let keys: Vec<_> = set.iter().map(|f| f.key()).collect();
        assert_eq!(
            keys,
            vec![
                (StreamKind::Depth, 0),
                (StreamKind::Infrared, 1),
                (StreamKind::Infrared, 2)
            ]
        );
    }

    #[test]
    fn test_timestamp_and_spread() {
        let set = FrameSet::new(
            7,
            vec![
                frame(StreamKind::Depth, 0, 100.0),
                frame(StreamKind::Color, 0, 104.0),
            ],
        );
        assert_eq!(set.number(), 7);
        assert_eq!(set.timestamp_ms(), 100.0);
        assert_eq!(set.spread_ms(), 4.0);
    }

    #[test]
    fn test_lookup_default_index() {
        let set = FrameSet::new(
            1,
            vec![
                frame(StreamKind::Infrared, 2, 0.0),
                frame(StreamKind::Infrared, 1, 0.0),
            ],
        );
        assert_eq!(set.get(StreamKind::Infrared, 0).unwrap().index(), 1);
        assert_eq!(set.get(StreamKind::Infrared, 2).unwrap().index(), 2);
        assert!(set.depth().is_none());
    }

    #[test]
    fn test_shared_handles() {
        let set = FrameSet::new(1, vec![frame(StreamKind::Depth, 0, 0.0)]);
        let held = set.clone();
        assert_eq!(set.holders(), 2);
        drop(set);
        assert_eq!(held.holders(), 1);
    }
}
