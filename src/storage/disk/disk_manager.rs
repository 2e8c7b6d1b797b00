use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::bitmap_page::BitmapPage;
use super::meta_page::DiskFileMetaPage;
use crate::common::{PageId, QuarryError, Result, BITMAP_SIZE, MAX_EXTENTS, PAGE_SIZE};

/// File handle plus the cached meta page. Both live under one lock so an
/// allocation updates the bitmap and the meta page atomically.
struct DiskState {
    file: File,
    meta: DiskFileMetaPage,
}

/// DiskManager owns the database file and the allocation of logical pages.
///
/// The file is laid out as a meta page followed by extents, each extent being
/// a bitmap page and `extent_size` data pages:
///
/// ```text
/// | meta | bitmap 0 | data 0 .. data n-1 | bitmap 1 | data n .. |
/// ```
///
/// Callers only ever see logical page ids; the physical position is
/// `logical + logical / extent_size + 2`.
pub struct DiskManager {
    state: Mutex<DiskState>,
    db_path: String,
    extent_size: u32,
    /// Number of physical page reads performed
    num_reads: AtomicU32,
    /// Number of physical page writes performed
    num_writes: AtomicU32,
}

impl DiskManager {
    /// Opens or creates the database file with the largest extent a bitmap
    /// page can track.
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        Self::with_extent_size(db_path, BITMAP_SIZE)
    }

    /// Opens or creates the database file with `extent_size` pages per extent.
    /// Reopening a file with a different extent size is an error.
    pub fn with_extent_size<P: AsRef<Path>>(db_path: P, extent_size: u32) -> Result<Self> {
        if extent_size == 0 || extent_size > BITMAP_SIZE {
            return Err(QuarryError::InvalidConfig(format!(
                "extent size must be in 1..={}, got {}",
                BITMAP_SIZE, extent_size
            )));
        }

        let path_str = db_path.as_ref().to_string_lossy().to_string();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&db_path)?;

        let dm = Self {
            state: Mutex::new(DiskState {
                file,
                meta: DiskFileMetaPage::new(extent_size),
            }),
            db_path: path_str,
            extent_size,
            num_reads: AtomicU32::new(0),
            num_writes: AtomicU32::new(0),
        };

        {
            let mut state = dm.state.lock();
            let mut buf = [0u8; PAGE_SIZE];
            dm.read_physical(&mut state.file, 0, &mut buf)?;
            let meta = DiskFileMetaPage::decode(&buf);

            if meta.is_fresh() {
                info!(path = %dm.db_path, extent_size, "initializing new database file");
                dm.write_meta(&mut state)?;
            } else if meta.extent_size() != extent_size {
                return Err(QuarryError::InvalidDatabaseFile(format!(
                    "file was created with extent size {}, opened with {}",
                    meta.extent_size(),
                    extent_size
                )));
            } else {
                debug!(
                    path = %dm.db_path,
                    allocated = meta.num_allocated_pages(),
                    extents = meta.num_extents(),
                    "opened existing database file"
                );
                state.meta = meta;
            }
        }

        Ok(dm)
    }

    /// Reads a logical page into `data`. Pages never written read as zeros.
    pub fn read_page(&self, page_id: PageId, data: &mut [u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let physical = self.map_page_id(page_id)?;

        let mut state = self.state.lock();
        self.read_physical(&mut state.file, physical, data)
    }

    /// Writes `data` to a logical page.
    pub fn write_page(&self, page_id: PageId, data: &[u8]) -> Result<()> {
        assert_eq!(data.len(), PAGE_SIZE, "Buffer must be PAGE_SIZE bytes");
        let physical = self.map_page_id(page_id)?;

        let mut state = self.state.lock();
        self.write_physical(&mut state.file, physical, data)
    }

    /// Claims the lowest free page of the first extent with room, opening a
    /// new extent when every existing one is full.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.state.lock();

        let extent = state.meta.first_open_extent();
        if extent >= MAX_EXTENTS {
            warn!(max_pages = self.max_pages(), "disk is full");
            return Err(QuarryError::OutOfSpace {
                max_pages: self.max_pages(),
            });
        }

        let bitmap_pid = self.bitmap_physical(extent);
        let mut buf = [0u8; PAGE_SIZE];
        self.read_physical(&mut state.file, bitmap_pid, &mut buf)?;

        let offset = BitmapPage::new(&mut buf, self.extent_size)
            .allocate_page()
            .ok_or_else(|| {
                QuarryError::InvalidDatabaseFile(format!(
                    "bitmap of extent {} is full but meta page counts {} used pages",
                    extent,
                    state.meta.extent_used_pages(extent)
                ))
            })?;

        self.write_physical(&mut state.file, bitmap_pid, &buf)?;
        state.meta.record_allocation(extent);
        self.write_meta(&mut state)?;

        let page_id = PageId::new(extent * self.extent_size + offset);
        debug!(%page_id, extent, "allocated page");
        Ok(page_id)
    }

    /// Releases a logical page. Returns `false` without touching the file
    /// when the page is not currently allocated.
    pub fn deallocate_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }

        let mut state = self.state.lock();
        let extent = page_id.as_u32() / self.extent_size;
        let offset = page_id.as_u32() % self.extent_size;

        if extent >= state.meta.num_extents() {
            warn!(%page_id, "deallocating a page that was never allocated");
            return Ok(false);
        }

        let bitmap_pid = self.bitmap_physical(extent);
        let mut buf = [0u8; PAGE_SIZE];
        self.read_physical(&mut state.file, bitmap_pid, &mut buf)?;

        if !BitmapPage::new(&mut buf, self.extent_size).deallocate_page(offset) {
            warn!(%page_id, "deallocating a page that is already free");
            return Ok(false);
        }

        self.write_physical(&mut state.file, bitmap_pid, &buf)?;
        state.meta.record_deallocation(extent);
        self.write_meta(&mut state)?;

        debug!(%page_id, extent, "deallocated page");
        Ok(true)
    }

    /// Returns `true` if `page_id` is not currently allocated.
    pub fn is_page_free(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Ok(true);
        }

        let mut state = self.state.lock();
        let extent = page_id.as_u32() / self.extent_size;
        if extent >= state.meta.num_extents() {
            return Ok(true);
        }

        let mut buf = [0u8; PAGE_SIZE];
        self.read_physical(&mut state.file, self.bitmap_physical(extent), &mut buf)?;
        Ok(BitmapPage::new(&mut buf, self.extent_size).is_page_free(page_id.as_u32() % self.extent_size))
    }

    /// Returns the number of pages currently allocated.
    pub fn get_num_pages(&self) -> u32 {
        self.state.lock().meta.num_allocated_pages()
    }

    pub fn num_extents(&self) -> u32 {
        self.state.lock().meta.num_extents()
    }

    pub fn extent_used_pages(&self, extent: u32) -> u32 {
        self.state.lock().meta.extent_used_pages(extent)
    }

    pub fn extent_size(&self) -> u32 {
        self.extent_size
    }

    /// Upper bound on simultaneously allocated pages.
    pub fn max_pages(&self) -> u32 {
        MAX_EXTENTS.saturating_mul(self.extent_size)
    }

    /// Returns the number of disk reads performed.
    pub fn get_num_reads(&self) -> u32 {
        self.num_reads.load(Ordering::Relaxed)
    }

    /// Returns the number of disk writes performed.
    pub fn get_num_writes(&self) -> u32 {
        self.num_writes.load(Ordering::Relaxed)
    }

    /// Flushes any buffered writes to disk.
    pub fn sync(&self) -> Result<()> {
        let state = self.state.lock();
        state.file.sync_all()?;
        Ok(())
    }

    fn map_page_id(&self, page_id: PageId) -> Result<u64> {
        if !page_id.is_valid() {
            return Err(QuarryError::InvalidPageId(page_id));
        }
        let logical = page_id.as_u32() as u64;
        Ok(logical + logical / self.extent_size as u64 + 2)
    }

    fn bitmap_physical(&self, extent: u32) -> u64 {
        1 + extent as u64 * (self.extent_size as u64 + 1)
    }

    fn write_meta(&self, state: &mut DiskState) -> Result<()> {
        let mut buf = [0u8; PAGE_SIZE];
        state.meta.encode(&mut buf);
        self.write_physical(&mut state.file, 0, &buf)
    }

    fn read_physical(&self, file: &mut File, physical: u64, data: &mut [u8]) -> Result<()> {
        file.seek(SeekFrom::Start(physical * PAGE_SIZE as u64))?;

        // If we're reading beyond the file, fill with zeros
        let mut filled = 0;
        while filled < data.len() {
            let n = file.read(&mut data[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        data[filled..].fill(0);

        self.num_reads.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn write_physical(&self, file: &mut File, physical: u64, data: &[u8]) -> Result<()> {
        file.seek(SeekFrom::Start(physical * PAGE_SIZE as u64))?;
        file.write_all(data)?;
        file.flush()?;

        self.num_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        // Ensure all data is flushed to disk
        let state = self.state.get_mut();
        let _ = state.file.sync_all();
    }
}
