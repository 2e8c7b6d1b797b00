use std::ops::{Deref, DerefMut};

use crate::common::PageId;

use super::frame_header::{PageReadLatch, PageWriteLatch};

/// Hands a page back to the pool: `(page, was_written)`.
pub(crate) type ReleaseCallback = Box<dyn FnOnce(PageId, bool) + Send + Sync>;

/// A pin on one page. Dropping it calls the pool's release hook once.
struct PagePin {
    page_id: PageId,
    written: bool,
    release: Option<ReleaseCallback>,
}

impl PagePin {
    fn new(page_id: PageId, release: ReleaseCallback) -> Self {
        Self {
            page_id,
            written: false,
            release: Some(release),
        }
    }
}

impl Drop for PagePin {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.page_id, self.written);
        }
    }
}

// Fields drop in declaration order: the latch must be released before the
// pin, otherwise the pool could hand the frame out while it is still latched.

/// Shared access to a pinned page.
pub struct ReadPageGuard {
    latch: PageReadLatch,
    pin: PagePin,
}

impl ReadPageGuard {
    pub(crate) fn new(page_id: PageId, latch: PageReadLatch, release: ReleaseCallback) -> Self {
        Self {
            latch,
            pin: PagePin::new(page_id, release),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }
}

impl Deref for ReadPageGuard {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

/// Exclusive access to a pinned page.
///
/// Any mutable borrow of the bytes, through `data_mut` or `DerefMut`, marks
/// the page dirty when the guard is released.
pub struct WritePageGuard {
    latch: PageWriteLatch,
    pin: PagePin,
}

impl WritePageGuard {
    pub(crate) fn new(page_id: PageId, latch: PageWriteLatch, release: ReleaseCallback) -> Self {
        Self {
            latch,
            pin: PagePin::new(page_id, release),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.pin.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.latch[..]
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        self.pin.written = true;
        &mut self.latch[..]
    }
}

impl Deref for WritePageGuard {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.data()
    }
}

impl DerefMut for WritePageGuard {
    fn deref_mut(&mut self) -> &mut [u8] {
        self.data_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameHeader;
    use crate::common::{FrameId, PAGE_SIZE};
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every release as `(page, written)`.
    fn recorder() -> (Arc<Mutex<Vec<(PageId, bool)>>>, ReleaseCallback) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&log);
        (log, Box::new(move |page_id, written| sink.lock().push((page_id, written))))
    }

    #[test]
    fn test_read_guard_releases_once_on_drop() {
        let frame = FrameHeader::new(FrameId::new(0));
        let mut image = [0u8; PAGE_SIZE];
        image[0] = 42;
        frame.load_bytes(&image);

        let (log, release) = recorder();
        let guard = ReadPageGuard::new(PageId::new(1), frame.read_latch(), release);
        assert_eq!(guard.page_id(), PageId::new(1));
        assert_eq!(guard[0], 42);
        assert!(log.lock().is_empty());

        drop(guard);
        assert_eq!(*log.lock(), vec![(PageId::new(1), false)]);
    }

    #[test]
    fn test_write_guard_reports_written() {
        let frame = FrameHeader::new(FrameId::new(0));
        let (log, release) = recorder();

        let mut guard = WritePageGuard::new(PageId::new(4), frame.write_latch(), release);
        guard[0] = 42;
        drop(guard);

        assert_eq!(*log.lock(), vec![(PageId::new(4), true)]);
        assert_eq!(frame.snapshot()[0], 42);
    }

    #[test]
    fn test_write_guard_clean_when_only_read() {
        let frame = FrameHeader::new(FrameId::new(0));
        let (log, release) = recorder();

        let guard = WritePageGuard::new(PageId::new(4), frame.write_latch(), release);
        assert_eq!(guard.data().len(), PAGE_SIZE);
        drop(guard);

        assert_eq!(*log.lock(), vec![(PageId::new(4), false)]);
    }

    #[test]
    fn test_latch_released_before_unpin() {
        let frame = Arc::new(FrameHeader::new(FrameId::new(0)));
        let observer = Arc::clone(&frame);
        let release: ReleaseCallback = Box::new(move |_, _| {
            // Would block forever if the write latch were still held
            drop(observer.read_latch());
        });

        let guard = WritePageGuard::new(PageId::new(2), frame.write_latch(), release);
        drop(guard);
    }
}
