//! Ordered, single-consumer work queue of segment descriptors.
//!
//! Built once, fully, from a parsed manifest before the first dequeue.
//! The head stays in the queue while its fetch is in flight and is
//! removed only after the segment's completion event is observed, so a
//! failed fetch never skips a segment.

use std::collections::VecDeque;

use crate::manifest::SegmentDescriptor;

/// FIFO over [`SegmentDescriptor`] in media playback order.
#[derive(Debug, Default, Clone)]
pub struct SegmentQueue {
    inner: VecDeque<SegmentDescriptor>,
}

impl SegmentQueue {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the queue from parser output, preserving order.
    #[must_use]
    pub fn from_segments(segments: Vec<SegmentDescriptor>) -> Self {
        Self {
            inner: segments.into(),
        }
    }

    /// Returns the head without removing it.
    #[must_use]
    pub fn front(&self) -> Option<&SegmentDescriptor> {
        self.inner.front()
    }

    /// Removes and returns the head.
    pub fn dequeue(&mut self) -> Option<SegmentDescriptor> {
        self.inner.pop_front()
    }

    /// Whether any segments remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Number of remaining segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Sum of the remaining segments' byte estimates.
    #[must_use]
    pub fn expected_total_bytes(&self) -> u64 {
        self.inner.iter().map(|s| s.expected_bytes).sum()
    }

    /// Drops all remaining segments (terminal failure or cancellation).
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn segment(url: &str, bytes: u64) -> SegmentDescriptor {
        SegmentDescriptor::new(url, bytes)
    }

    #[test]
    fn test_dequeue_preserves_fifo_order() {
        let mut queue = SegmentQueue::from_segments(vec![
            segment("a.ts", 1),
            segment("b.ts", 2),
            segment("c.ts", 3),
        ]);

        assert_eq!(queue.dequeue().unwrap().url, "a.ts");
        assert_eq!(queue.dequeue().unwrap().url, "b.ts");
        assert_eq!(queue.dequeue().unwrap().url, "c.ts");
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_front_does_not_remove_head() {
        let mut queue = SegmentQueue::from_segments(vec![segment("a.ts", 1)]);

        assert_eq!(queue.front().unwrap().url, "a.ts");
        assert_eq!(queue.len(), 1, "front() must not consume the head");
        assert_eq!(queue.dequeue().unwrap().url, "a.ts");
        assert!(queue.is_empty());
    }

    #[test]
    fn test_expected_total_sums_estimates() {
        let queue = SegmentQueue::from_segments(vec![segment("a.ts", 300), segment("b.ts", 700)]);
        assert_eq!(queue.expected_total_bytes(), 1000);
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = SegmentQueue::new();
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
        assert_eq!(queue.expected_total_bytes(), 0);
        assert!(queue.front().is_none());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_clear_discards_pending_segments() {
        let mut queue = SegmentQueue::from_segments(vec![segment("a.ts", 1), segment("b.ts", 2)]);
        queue.clear();
        assert!(queue.is_empty());
    }
}
