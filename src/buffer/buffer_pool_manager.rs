use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, warn};

use crate::common::{FrameId, PageId, QuarryError, Result, PAGE_SIZE};
use crate::storage::disk::DiskManager;

use super::page_guard::ReleaseCallback;
use super::{FrameHeader, LruReplacer, ReadPageGuard, WritePageGuard};

/// Page table and free list. Guarded together so a page id can never be
/// observed in the table while its frame is also on the free list.
struct PoolInner {
    /// Maps resident page IDs to frame IDs
    page_table: HashMap<PageId, FrameId>,
    /// Frames that hold no page
    free_list: VecDeque<FrameId>,
}

/// Internal state that can be shared across threads
struct BufferPoolState {
    /// The buffer pool frames
    frames: Vec<FrameHeader>,
    inner: Mutex<PoolInner>,
    /// LRU replacer for eviction decisions
    replacer: LruReplacer,
    disk_manager: Arc<DiskManager>,
}

impl BufferPoolState {
    fn frame(&self, frame_id: FrameId) -> &FrameHeader {
        &self.frames[frame_id.as_usize()]
    }

    /// Decrements the pin count, handing the frame to the replacer when it
    /// reaches zero. Returns false if the page is not resident.
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        let inner = self.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return false;
        };

        let frame = self.frame(frame_id);
        if is_dirty {
            frame.set_dirty(true);
        }
        if let Some(0) = frame.unpin() {
            self.replacer.unpin(frame_id);
        }
        true
    }

    /// Gets a frame, either from the free list or by evicting a page.
    /// Returns None when every frame is pinned.
    fn acquire_frame(&self, inner: &mut PoolInner) -> Result<Option<FrameId>> {
        if let Some(frame_id) = inner.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.replacer.victim() else {
            return Ok(None);
        };

        let frame = self.frame(frame_id);
        let old_page_id = frame.page_id();

        // If the page is dirty, flush it to disk first
        if frame.is_dirty() {
            if let Err(e) = self.write_back(old_page_id, frame) {
                self.replacer.unpin(frame_id);
                return Err(e);
            }
        }

        inner.page_table.remove(&old_page_id);
        frame.reset();
        debug!(page_id = %old_page_id, %frame_id, "evicted page");

        Ok(Some(frame_id))
    }

    fn write_back(&self, page_id: PageId, frame: &FrameHeader) -> Result<()> {
        let image = frame.snapshot();
        self.disk_manager.write_page(page_id, &image)?;
        frame.set_dirty(false);
        Ok(())
    }

    /// Writes out pinned frames without holding the pool mutex, then unpins
    /// them. Guard holders take a page latch before the pool mutex, so the
    /// mutex must never be held while waiting on a latch here.
    ///
    /// A frame that is write-latched right now is skipped. Its writer marks
    /// it dirty on release, so a later flush or eviction picks it up.
    fn flush_pinned(&self, pinned: Vec<(PageId, FrameId)>) -> Result<()> {
        let mut first_error = None;
        for (page_id, frame_id) in pinned {
            if first_error.is_none() {
                if let Err(e) = self.flush_frame(page_id, self.frame(frame_id)) {
                    first_error = Some(e);
                }
            }
            self.unpin_page(page_id, false);
        }
        first_error.map_or(Ok(()), Err)
    }

    fn flush_frame(&self, page_id: PageId, frame: &FrameHeader) -> Result<()> {
        let Some(latch) = frame.try_read_latch() else {
            debug!(%page_id, "page is write-latched, flush skipped");
            return Ok(());
        };
        if !frame.is_dirty() {
            return Ok(());
        }
        let image: [u8; PAGE_SIZE] = **latch;
        // Cleared under the latch so a later writer's release re-dirties it
        frame.set_dirty(false);
        drop(latch);

        if let Err(e) = self.disk_manager.write_page(page_id, &image) {
            frame.set_dirty(true);
            return Err(e);
        }
        Ok(())
    }

    /// Pins a resident frame so it cannot be evicted or freed while the pool
    /// mutex is released.
    fn pin_resident(&self, frame_id: FrameId) {
        self.frame(frame_id).pin();
        self.replacer.pin(frame_id);
    }
}

impl Drop for BufferPoolState {
    fn drop(&mut self) {
        let inner = self.inner.lock();
        for (&page_id, &frame_id) in inner.page_table.iter() {
            let frame = self.frame(frame_id);
            if frame.is_dirty() {
                if let Err(e) = self.write_back(page_id, frame) {
                    error!(%page_id, error = %e, "failed to write back page on shutdown");
                }
            }
        }
    }
}

/// BufferPoolManager is responsible for fetching database pages from disk
/// and storing them in memory. It manages a fixed number of frames and
/// evicts the least recently unpinned page when it runs out.
///
/// Pages are handed out as [`ReadPageGuard`] / [`WritePageGuard`]; a page
/// stays pinned exactly as long as a guard for it is alive. "No frame
/// available" is reported as `Ok(None)`, never as an error.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<BufferPoolState>,
}

impl BufferPoolManager {
    /// Creates a new BufferPoolManager with the given pool size and disk manager.
    pub fn new(pool_size: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(FrameHeader::new(frame_id));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::with_capacity(pool_size),
                free_list,
            }),
            replacer: LruReplacer::new(pool_size),
            disk_manager,
        });

        Self { pool_size, state }
    }

    /// Allocates a fresh page and returns it pinned and write-latched.
    /// The frame is zeroed and the page starts dirty.
    /// Returns None if no frame is available.
    pub fn new_page(&self) -> Result<Option<WritePageGuard>> {
        let mut inner = self.state.inner.lock();
        let Some(frame_id) = self.state.acquire_frame(&mut inner)? else {
            return Ok(None);
        };

        let page_id = match self.state.disk_manager.allocate_page() {
            Ok(page_id) => page_id,
            Err(e) => {
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        };

        // A page deleted while pinned released its disk slot but kept its
        // frame. Drop the stale copy, or give the id back if still pinned.
        if let Some(&stale_frame_id) = inner.page_table.get(&page_id) {
            let stale = self.state.frame(stale_frame_id);
            if stale.pin_count() > 0 {
                inner.free_list.push_back(frame_id);
                self.state.disk_manager.deallocate_page(page_id)?;
                warn!(%page_id, "allocated page id is still pinned by a deleted page");
                return Err(QuarryError::PageStillPinned(page_id));
            }
            inner.page_table.remove(&page_id);
            self.state.replacer.remove(stale_frame_id);
            stale.reset();
            inner.free_list.push_back(stale_frame_id);
        }

        let frame = self.state.frame(frame_id);
        frame.reset();
        frame.set_page_id(page_id);
        frame.set_dirty(true);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);
        drop(inner);

        debug!(%page_id, %frame_id, "created page");
        Ok(Some(WritePageGuard::new(
            page_id,
            frame.write_latch(),
            self.release_callback(),
        )))
    }

    /// Fetches a page for read access.
    /// Returns None if the page is not resident and no frame is available.
    pub fn checked_read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard>> {
        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let latch = self.state.frame(frame_id).read_latch();
        Ok(Some(ReadPageGuard::new(page_id, latch, self.release_callback())))
    }

    /// Fetches a page for write access.
    /// Returns None if the page is not resident and no frame is available.
    pub fn checked_write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard>> {
        let Some(frame_id) = self.fetch_page(page_id)? else {
            return Ok(None);
        };
        let latch = self.state.frame(frame_id).write_latch();
        Ok(Some(WritePageGuard::new(page_id, latch, self.release_callback())))
    }

    /// Releases the page on disk and, unless a guard still holds it, frees its
    /// frame. The disk slot is released even when the frame is pinned, in
    /// which case this returns false.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        self.state.disk_manager.deallocate_page(page_id)?;

        let mut inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(true);
        };

        let frame = self.state.frame(frame_id);
        if frame.pin_count() > 0 {
            warn!(%page_id, pin_count = frame.pin_count(), "refusing to free frame of pinned page");
            return Ok(false);
        }

        inner.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        inner.free_list.push_back(frame_id);

        debug!(%page_id, %frame_id, "deleted page");
        Ok(true)
    }

    /// Writes a resident page to disk if it is dirty.
    /// Returns false if the page is not resident.
    ///
    /// Never waits on a page latch: if a write guard on the page is alive,
    /// including one held by the caller, the page is left dirty.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let inner = self.state.inner.lock();
        let Some(&frame_id) = inner.page_table.get(&page_id) else {
            return Ok(false);
        };
        self.state.pin_resident(frame_id);
        drop(inner);

        self.state.flush_pinned(vec![(page_id, frame_id)])?;
        Ok(true)
    }

    /// Flushes every dirty resident page that is not write-latched.
    pub fn flush_all_pages(&self) -> Result<()> {
        let inner = self.state.inner.lock();
        let dirty: Vec<(PageId, FrameId)> = inner
            .page_table
            .iter()
            .filter(|(_, &frame_id)| self.state.frame(frame_id).is_dirty())
            .map(|(&page_id, &frame_id)| (page_id, frame_id))
            .collect();
        for &(_, frame_id) in &dirty {
            self.state.pin_resident(frame_id);
        }
        drop(inner);

        self.state.flush_pinned(dirty)
    }

    /// Returns true if no resident page is pinned. Each pinned page is logged.
    pub fn check_all_unpinned(&self) -> bool {
        let inner = self.state.inner.lock();
        let mut all_unpinned = true;

        for (&page_id, &frame_id) in inner.page_table.iter() {
            let pin_count = self.state.frame(frame_id).pin_count();
            if pin_count > 0 {
                error!(%page_id, %frame_id, pin_count, "page is still pinned");
                all_unpinned = false;
            }
        }

        all_unpinned
    }

    /// Returns the pin count for a page, or None if it is not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.state.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&frame_id| self.state.frame(frame_id).pin_count())
    }

    /// Returns the frame holding a page, or None if it is not resident.
    pub fn frame_id_of(&self, page_id: PageId) -> Option<FrameId> {
        self.state.inner.lock().page_table.get(&page_id).copied()
    }

    /// Snapshot of the page table.
    pub fn resident_pages(&self) -> Vec<(PageId, FrameId)> {
        let inner = self.state.inner.lock();
        inner.page_table.iter().map(|(&p, &f)| (p, f)).collect()
    }

    /// Returns true if the page is not allocated on disk.
    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        self.state.disk_manager.is_page_free(page_id)
    }

    /// Returns the pool size.
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    /// Returns the number of free frames.
    pub fn free_frame_count(&self) -> usize {
        self.state.inner.lock().free_list.len()
    }

    /// Returns the number of resident, unpinned frames.
    pub fn evictable_count(&self) -> usize {
        self.state.replacer.size()
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.state.disk_manager
    }

    #[cfg(test)]
    fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin_page(page_id, is_dirty)
    }

    /// Pins a page, reading it from disk if it is not resident, and returns
    /// its frame. The page latch is taken by the caller after the pool lock
    /// is released.
    fn fetch_page(&self, page_id: PageId) -> Result<Option<FrameId>> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut inner = self.state.inner.lock();

        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            self.state.frame(frame_id).pin();
            self.state.replacer.pin(frame_id);
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.state.acquire_frame(&mut inner)? else {
            return Ok(None);
        };

        let mut data = [0u8; PAGE_SIZE];
        if let Err(e) = self.state.disk_manager.read_page(page_id, &mut data) {
            inner.free_list.push_back(frame_id);
            return Err(e);
        }

        let frame = self.state.frame(frame_id);
        frame.load_bytes(&data);
        frame.set_page_id(page_id);
        frame.set_dirty(false);
        frame.pin();
        inner.page_table.insert(page_id, frame_id);

        Ok(Some(frame_id))
    }

    fn release_callback(&self) -> ReleaseCallback {
        let state = Arc::clone(&self.state);
        Box::new(move |page_id, is_dirty| {
            state.unpin_page(page_id, is_dirty);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
        assert!(bpm.check_all_unpinned());
    }

    #[test]
    fn test_new_page_is_pinned_and_dirty() {
        let (bpm, _temp) = create_bpm(10);

        let guard = bpm.new_page().unwrap().unwrap();
        let page_id = guard.page_id();
        assert_eq!(page_id, PageId::new(0));
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        assert!(guard.data().iter().all(|&b| b == 0));
        assert!(!bpm.check_all_unpinned());
        drop(guard);

        assert_eq!(bpm.get_pin_count(page_id), Some(0));
        let frame_id = bpm.frame_id_of(page_id).unwrap();
        assert!(bpm.state.frame(frame_id).is_dirty());
    }

    #[test]
    fn test_unpin_page_floors_at_zero() {
        let (bpm, _temp) = create_bpm(4);

        let page_id = bpm.new_page().unwrap().unwrap().page_id();
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
        assert_eq!(bpm.evictable_count(), 1);

        assert!(bpm.unpin_page(page_id, false));
        assert_eq!(bpm.get_pin_count(page_id), Some(0));
        assert_eq!(bpm.evictable_count(), 1);

        assert!(!bpm.unpin_page(PageId::new(99), false));
    }

    #[test]
    fn test_flush_page_clears_dirty() {
        let (bpm, _temp) = create_bpm(4);

        let page_id = {
            let mut guard = bpm.new_page().unwrap().unwrap();
            guard.data_mut()[0] = 7;
            guard.page_id()
        };
        let frame_id = bpm.frame_id_of(page_id).unwrap();

        assert!(bpm.flush_page(page_id).unwrap());
        assert!(!bpm.state.frame(frame_id).is_dirty());
        assert!(!bpm.flush_page(PageId::new(42)).unwrap());

        let mut data = [0u8; PAGE_SIZE];
        bpm.disk_manager().read_page(page_id, &mut data).unwrap();
        assert_eq!(data[0], 7);
    }

    #[test]
    fn test_delete_pinned_page_releases_disk_slot() {
        let (bpm, _temp) = create_bpm(4);

        let guard = bpm.new_page().unwrap().unwrap();
        let page_id = guard.page_id();

        assert!(!bpm.delete_page(page_id).unwrap());
        assert!(bpm.is_page_free(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), Some(1));
        drop(guard);

        assert!(bpm.delete_page(page_id).unwrap());
        assert_eq!(bpm.get_pin_count(page_id), None);
        assert_eq!(bpm.free_frame_count(), 4);
        assert_eq!(bpm.evictable_count(), 0);
    }

    #[test]
    fn test_reused_id_of_deleted_page() {
        let (bpm, _temp) = create_bpm(4);

        let guard = bpm.new_page().unwrap().unwrap();
        let page_id = guard.page_id();
        assert!(!bpm.delete_page(page_id).unwrap());

        assert!(matches!(bpm.new_page(), Err(QuarryError::PageStillPinned(id)) if id == page_id));
        assert!(bpm.is_page_free(page_id).unwrap());
        drop(guard);

        // The stale frame is dropped and the id handed out again
        let fresh = bpm.new_page().unwrap().unwrap();
        assert_eq!(fresh.page_id(), page_id);
        assert!(fresh.data().iter().all(|&b| b == 0));
        drop(fresh);
        assert_eq!(bpm.resident_pages().len(), 1);
    }

    #[test]
    fn test_dirty_victim_written_back() {
        let (bpm, _temp) = create_bpm(1);

        let first = {
            let mut guard = bpm.new_page().unwrap().unwrap();
            guard.data_mut()[10] = 99;
            guard.page_id()
        };
        let second = bpm.new_page().unwrap().unwrap().page_id();
        assert_ne!(first, second);
        assert_eq!(bpm.frame_id_of(first), None);

        let guard = bpm.checked_read_page(first).unwrap().unwrap();
        assert_eq!(guard[10], 99);
    }
}
