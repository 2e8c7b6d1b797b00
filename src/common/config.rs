use std::path::{Path, PathBuf};

use super::types::PageId;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// Invalid page ID constant
pub const INVALID_PAGE_ID: PageId = PageId(u32::MAX);

/// Bytes at the front of a bitmap page holding its counters
pub const BITMAP_HEADER_SIZE: usize = 8;

/// Number of pages one bitmap page can track
pub const BITMAP_SIZE: u32 = ((PAGE_SIZE - BITMAP_HEADER_SIZE) * 8) as u32;

/// Bytes at the front of the disk meta page holding its counters
pub const META_HEADER_SIZE: usize = 12;

/// Number of per-extent counters that fit in the disk meta page
pub const MAX_EXTENTS: u32 = ((PAGE_SIZE - META_HEADER_SIZE) / 4) as u32;

/// Reserved logical page for catalog metadata
pub const CATALOG_META_PAGE_ID: PageId = PageId(0);

/// Reserved logical page for the index roots directory
pub const INDEX_ROOTS_PAGE_ID: PageId = PageId(1);

/// Default buffer pool size (number of frames)
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 64;

/// Runtime settings for opening a storage engine.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Path of the database file.
    pub db_path: PathBuf,
    /// Number of frames in the buffer pool.
    pub pool_size: usize,
    /// Logical pages per extent. Fixed for the lifetime of a file.
    pub extent_size: u32,
}

impl StorageConfig {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_extent_size(mut self, extent_size: u32) -> Self {
        self.extent_size = extent_size;
        self
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("quarry.db"),
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            extent_size: BITMAP_SIZE,
        }
    }
}
