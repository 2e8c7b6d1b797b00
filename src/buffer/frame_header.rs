use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

pub(crate) type PageData = Box<[u8; PAGE_SIZE]>;
pub(crate) type PageReadLatch = ArcRwLockReadGuard<RawRwLock, PageData>;
pub(crate) type PageWriteLatch = ArcRwLockWriteGuard<RawRwLock, PageData>;

/// One slot of the buffer pool.
///
/// Bookkeeping (resident page, pins, dirty bit) is atomic so the pool can
/// inspect a frame without taking its page latch. The bytes sit behind an
/// `Arc<RwLock<_>>` so that a page guard can own its latch outright.
pub struct FrameHeader {
    id: FrameId,
    resident: AtomicU32,
    pins: AtomicU32,
    dirty: AtomicBool,
    bytes: Arc<RwLock<PageData>>,
}

impl FrameHeader {
    pub fn new(id: FrameId) -> Self {
        Self {
            id,
            resident: AtomicU32::new(INVALID_PAGE_ID.as_u32()),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            bytes: Arc::new(RwLock::new(Box::new([0u8; PAGE_SIZE]))),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.id
    }

    /// Page currently held here, or `INVALID_PAGE_ID` for a free frame.
    pub fn page_id(&self) -> PageId {
        PageId::new(self.resident.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.resident.store(page_id.as_u32(), Ordering::Release);
    }

    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    /// Adds a pin; returns the new count.
    pub fn pin(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops a pin; returns the new count, or `None` when nothing was pinned.
    pub fn unpin(&self) -> Option<u32> {
        self.pins
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pins| pins.checked_sub(1))
            .ok()
            .map(|previous| previous - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn set_dirty(&self, dirty: bool) {
        self.dirty.store(dirty, Ordering::Release);
    }

    pub(crate) fn read_latch(&self) -> PageReadLatch {
        self.bytes.read_arc()
    }

    pub(crate) fn write_latch(&self) -> PageWriteLatch {
        self.bytes.write_arc()
    }

    /// Shared latch, or `None` while a writer holds the page.
    pub(crate) fn try_read_latch(&self) -> Option<PageReadLatch> {
        self.bytes.try_read_arc()
    }

    /// Overwrites the frame with a page image read from disk.
    pub fn load_bytes(&self, image: &[u8; PAGE_SIZE]) {
        self.bytes.write().copy_from_slice(image);
    }

    /// Copies the frame out for write-back.
    pub fn snapshot(&self) -> [u8; PAGE_SIZE] {
        **self.bytes.read()
    }

    /// Returns the frame to the free state: no page, no pins, zeroed bytes.
    pub fn reset(&self) {
        self.set_page_id(INVALID_PAGE_ID);
        self.pins.store(0, Ordering::Release);
        self.set_dirty(false);
        self.bytes.write().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_frame_is_free() {
        let frame = FrameHeader::new(FrameId::new(3));
        assert_eq!(frame.frame_id(), FrameId::new(3));
        assert!(!frame.page_id().is_valid());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
    }

    #[test]
    fn test_pins_floor_at_zero() {
        let frame = FrameHeader::new(FrameId::new(0));
        frame.pin();
        frame.pin();
        assert_eq!(frame.pin_count(), 2);

        assert_eq!(frame.unpin(), Some(1));
        assert_eq!(frame.unpin(), Some(0));
        assert_eq!(frame.unpin(), None);
        assert_eq!(frame.pin_count(), 0);
    }

    #[test]
    fn test_latch_outlives_borrow() {
        let frame = FrameHeader::new(FrameId::new(0));
        let mut latch = frame.write_latch();
        latch[7] = 9;
        drop(latch);

        let latch = frame.read_latch();
        assert_eq!(latch[7], 9);
    }

    #[test]
    fn test_reset_clears_everything() {
        let frame = FrameHeader::new(FrameId::new(0));
        frame.set_page_id(PageId::new(12));
        frame.pin();
        frame.set_dirty(true);
        frame.load_bytes(&[0xAB; PAGE_SIZE]);
        assert_eq!(frame.snapshot()[PAGE_SIZE - 1], 0xAB);

        frame.reset();
        assert!(!frame.page_id().is_valid());
        assert_eq!(frame.pin_count(), 0);
        assert!(!frame.is_dirty());
        assert!(frame.snapshot().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_try_read_latch_fails_under_writer() {
        let frame = FrameHeader::new(FrameId::new(0));
        let writer = frame.write_latch();
        assert!(frame.try_read_latch().is_none());
        drop(writer);

        let reader = frame.try_read_latch();
        assert!(reader.is_some());
        assert!(frame.try_read_latch().is_some());
    }
}
