use std::sync::Arc;

use tracing::info;

use crate::buffer::BufferPoolManager;
use crate::common::{IndexId, QuarryError, Result, StorageConfig, CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID};
use crate::index::{BPlusTree, KeyComparator};
use crate::storage::disk::DiskManager;

/// Owns the disk manager and buffer pool for one database file.
pub struct StorageEngine {
    disk_manager: Arc<DiskManager>,
    bpm: Arc<BufferPoolManager>,
}

impl StorageEngine {
    /// Opens or creates the database at `config.db_path`. A fresh file gets
    /// its catalog meta page and index roots page reserved; an existing one
    /// must already have both.
    pub fn open(config: StorageConfig) -> Result<Self> {
        if config.pool_size < 2 {
            return Err(QuarryError::InvalidConfig(format!(
                "buffer pool needs at least 2 frames, got {}",
                config.pool_size
            )));
        }

        let disk_manager = Arc::new(DiskManager::with_extent_size(&config.db_path, config.extent_size)?);
        let bpm = Arc::new(BufferPoolManager::new(config.pool_size, Arc::clone(&disk_manager)));

        if disk_manager.get_num_pages() == 0 {
            for expected in [CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID] {
                let guard = bpm.new_page()?.ok_or(QuarryError::BufferPoolFull)?;
                if guard.page_id() != expected {
                    return Err(QuarryError::InvalidDatabaseFile(format!(
                        "reserved page came back as {}, expected {}",
                        guard.page_id(),
                        expected
                    )));
                }
            }
            info!(path = %config.db_path.display(), "initialized database file");
        } else {
            for reserved in [CATALOG_META_PAGE_ID, INDEX_ROOTS_PAGE_ID] {
                if disk_manager.is_page_free(reserved)? {
                    return Err(QuarryError::InvalidDatabaseFile(format!("reserved {} is not allocated", reserved)));
                }
            }
            info!(
                path = %config.db_path.display(),
                pages = disk_manager.get_num_pages(),
                "opened database file"
            );
        }

        Ok(Self { disk_manager, bpm })
    }

    pub fn bpm(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        &self.disk_manager
    }

    /// Opens (or prepares to create) the index registered under `index_id`.
    pub fn open_index<const N: usize, C: KeyComparator>(
        &self,
        index_id: IndexId,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<BPlusTree<N, C>> {
        BPlusTree::new(index_id, Arc::clone(&self.bpm), comparator, leaf_max_size, internal_max_size)
    }

    /// Writes back every dirty page and syncs the file.
    pub fn flush(&self) -> Result<()> {
        self.bpm.flush_all_pages()?;
        self.disk_manager.sync()
    }
}
