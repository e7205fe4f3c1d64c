//! StreamRequest Set

use std::collections::BTreeMap;

use contracts::{StreamKey, StreamKind, StreamRequest};

/// User stream requests keyed by (kind, index)
///
/// Last write wins per key; iteration follows key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamRequestSet {
    entries: BTreeMap<StreamKey, StreamRequest>,
}

impl StreamRequestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the replaced request
    pub fn insert(&mut self, request: StreamRequest) -> Option<StreamRequest> {
        self.entries.insert(request.key(), request)
    }

    /// Remove every request of `kind`, whatever its index
    pub fn remove_kind(&mut self, kind: StreamKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(k, _), _| *k != kind);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn get(&self, key: StreamKey) -> Option<&StreamRequest> {
        self.entries.get(&key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StreamRequest> {
        self.entries.values()
    }
}

impl FromIterator<StreamRequest> for StreamRequestSet {
    fn from_iter<I: IntoIterator<Item = StreamRequest>>(iter: I) -> Self {
        let mut set = Self::new();
        for request in iter {
            set.insert(request);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::Format;

    #[test]
    fn test_last_write_wins() {
        let mut set = StreamRequestSet::new();
        set.insert(StreamRequest::new(StreamKind::Depth).with_fps(30));
        let replaced = set.insert(StreamRequest::new(StreamKind::Depth).with_fps(15));

        assert_eq!(replaced.map(|r| r.fps), Some(30));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get((StreamKind::Depth, 0)).unwrap().fps, 15);
    }

    #[test]
    fn test_remove_kind_drops_all_indices() {
        let mut set: StreamRequestSet = [
            StreamRequest::new(StreamKind::Infrared).with_index(1),
            StreamRequest::new(StreamKind::Infrared).with_index(2),
            StreamRequest::new(StreamKind::Color),
        ]
        .into_iter()
        .collect();

        assert_eq!(set.remove_kind(StreamKind::Infrared), 2);
        assert_eq!(set.remove_kind(StreamKind::Infrared), 0);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_iterates_in_key_order() {
        let set: StreamRequestSet = [
            StreamRequest::new(StreamKind::Infrared).with_index(2),
            StreamRequest::new(StreamKind::Color).with_format(Format::Rgb8),
            StreamRequest::new(StreamKind::Depth),
            StreamRequest::new(StreamKind::Infrared).with_index(1),
        ]
        .into_iter()
        .collect();

        let keys: Vec<_> = set.iter().map(|r| r.key()).collect();
        assert_eq!(
            keys,
            vec![
                (StreamKind::Depth, 0),
                (StreamKind::Color, 0),
                (StreamKind::Infrared, 1),
                (StreamKind::Infrared, 2),
            ]
        );
    }
}
