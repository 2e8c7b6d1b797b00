use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::common::FrameId;

/// Queue length, as a multiple of capacity, above which stale entries are
/// compacted away.
const COMPACT_FACTOR: usize = 4;

#[derive(Debug)]
struct ReplacerState {
    /// Eviction order: (frame, version at enqueue time), oldest unpin at front
    queue: VecDeque<(FrameId, u64)>,
    /// Current version per frame. Bumped by every pin, which invalidates any
    /// entry queued before it.
    versions: Vec<u64>,
    /// Whether each frame is currently a victim candidate
    evictable: Vec<bool>,
    /// Number of evictable frames
    size: usize,
}

impl ReplacerState {
    fn is_live(&self, frame_id: FrameId, version: u64) -> bool {
        let idx = frame_id.as_usize();
        self.evictable[idx] && self.versions[idx] == version
    }

    fn compact(&mut self) {
        let mut queue = std::mem::take(&mut self.queue);
        queue.retain(|&(frame_id, version)| self.is_live(frame_id, version));
        self.queue = queue;
    }
}

/// LRU Replacement Policy
///
/// Frames become candidates in the order they were unpinned and the oldest
/// candidate is evicted first. `pin` never searches the queue; it bumps the
/// frame's version so the queued entry is skipped when it reaches the front.
pub struct LruReplacer {
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    state: Mutex<ReplacerState>,
}

impl LruReplacer {
    /// Creates a replacer for frames `0..max_frames`.
    pub fn new(max_frames: usize) -> Self {
        Self {
            max_frames,
            state: Mutex::new(ReplacerState {
                queue: VecDeque::with_capacity(max_frames),
                versions: vec![0; max_frames],
                evictable: vec![false; max_frames],
                size: 0,
            }),
        }
    }

    /// Pops the least recently unpinned evictable frame.
    /// Returns None if there are no evictable frames.
    pub fn victim(&self) -> Option<FrameId> {
        let mut state = self.state.lock();

        while let Some((frame_id, version)) = state.queue.pop_front() {
            if state.is_live(frame_id, version) {
                let idx = frame_id.as_usize();
                state.evictable[idx] = false;
                state.versions[idx] += 1;
                state.size -= 1;
                return Some(frame_id);
            }
        }

        None
    }

    /// Makes a frame ineligible for eviction. No-op if it already is.
    pub fn pin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let idx = frame_id.as_usize();
        if state.evictable[idx] {
            state.evictable[idx] = false;
            state.versions[idx] += 1;
            state.size -= 1;
        }
    }

    /// Marks a frame evictable and queues it behind the current candidates.
    /// A frame that is already evictable keeps its place in the queue.
    pub fn unpin(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let idx = frame_id.as_usize();
        if state.evictable[idx] {
            return;
        }

        state.evictable[idx] = true;
        state.size += 1;
        let version = state.versions[idx];
        state.queue.push_back((frame_id, version));

        if state.queue.len() > COMPACT_FACTOR * self.max_frames.max(1) {
            state.compact();
        }
    }

    /// Removes a frame from the replacer entirely.
    /// This should be called when a page is deleted from the BufferPoolManager.
    pub fn remove(&self, frame_id: FrameId) {
        self.pin(frame_id);
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().size
    }

    #[cfg(test)]
    fn queue_len(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_victim_in_unpin_order() {
        let replacer = LruReplacer::new(8);
        for i in [3, 1, 4, 0] {
            replacer.unpin(FrameId::new(i));
        }
        assert_eq!(replacer.size(), 4);

        for i in [3, 1, 4, 0] {
            assert_eq!(replacer.victim(), Some(FrameId::new(i)));
        }
        assert_eq!(replacer.victim(), None);
        assert_eq!(replacer.size(), 0);
    }

    #[test]
    fn test_unpin_is_idempotent() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.unpin(FrameId::new(0));

        assert_eq!(replacer.size(), 2);
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
    }

    #[test]
    fn test_pin_skips_stale_entry() {
        let replacer = LruReplacer::new(4);
        replacer.unpin(FrameId::new(0));
        replacer.unpin(FrameId::new(1));
        replacer.pin(FrameId::new(0));
        assert_eq!(replacer.size(), 1);

        // Re-unpinning moves frame 0 to the back
        replacer.unpin(FrameId::new(0));
        assert_eq!(replacer.victim(), Some(FrameId::new(1)));
        assert_eq!(replacer.victim(), Some(FrameId::new(0)));
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_queue_is_compacted() {
        let replacer = LruReplacer::new(2);
        for _ in 0..100 {
            replacer.unpin(FrameId::new(0));
            replacer.pin(FrameId::new(0));
        }
        assert!(replacer.queue_len() <= COMPACT_FACTOR * 2);
        assert_eq!(replacer.size(), 0);
        assert_eq!(replacer.victim(), None);
    }

    #[test]
    fn test_out_of_range_frames_ignored() {
        let replacer = LruReplacer::new(2);
        replacer.unpin(FrameId::new(5));
        replacer.pin(FrameId::new(5));
        assert_eq!(replacer.size(), 0);
    }
}
