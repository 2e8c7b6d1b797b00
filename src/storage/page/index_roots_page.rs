use bytes::{Buf, BufMut};

use crate::common::{IndexId, PageId, PAGE_SIZE};

const COUNT_OFFSET: usize = 0;
const ENTRIES_OFFSET: usize = 4;

const ENTRY_SIZE: usize = 8; // index_id (4) + root_page_id (4)

/// Maximum number of indexes whose roots fit in one page.
pub const MAX_INDEX_ROOTS: usize = (PAGE_SIZE - ENTRIES_OFFSET) / ENTRY_SIZE;

/// Directory mapping each index to its current root page.
///
/// | Field        | Offset | Size                |
/// |--------------|--------|---------------------|
/// | count        | 0      | 4                   |
/// | entries      | 4      | 8 * count           |
///
/// Entries are unordered `(index_id, root_page_id)` pairs. A zeroed page is
/// an empty directory, so a fresh file needs no initialization pass.
pub struct IndexRootsPage<B> {
    data: B,
}

impl<B: AsRef<[u8]>> IndexRootsPage<B> {
    pub fn new(data: B) -> Self {
        assert_eq!(data.as_ref().len(), PAGE_SIZE);
        Self { data }
    }

    pub fn count(&self) -> usize {
        (&self.data.as_ref()[COUNT_OFFSET..]).get_u32_le() as usize
    }

    pub fn is_full(&self) -> bool {
        self.count() >= MAX_INDEX_ROOTS
    }

    pub fn get_root_id(&self, index_id: IndexId) -> Option<PageId> {
        self.find(index_id).map(|slot| self.entry_at(slot).1)
    }

    /// All registered `(index_id, root_page_id)` pairs.
    pub fn entries(&self) -> Vec<(IndexId, PageId)> {
        (0..self.count()).map(|slot| self.entry_at(slot)).collect()
    }

    fn find(&self, index_id: IndexId) -> Option<usize> {
        (0..self.count()).find(|&slot| self.entry_at(slot).0 == index_id)
    }

    fn entry_at(&self, slot: usize) -> (IndexId, PageId) {
        let mut buf = &self.data.as_ref()[ENTRIES_OFFSET + slot * ENTRY_SIZE..];
        let index_id = IndexId::new(buf.get_u32_le());
        let root = PageId::new(buf.get_u32_le());
        (index_id, root)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> IndexRootsPage<B> {
    pub fn init(&mut self) {
        self.data.as_mut().fill(0);
    }

    /// Registers a new index. Returns `false` if it already exists or the
    /// directory is full.
    pub fn insert(&mut self, index_id: IndexId, root_page_id: PageId) -> bool {
        if self.find(index_id).is_some() || self.is_full() {
            return false;
        }
        let slot = self.count();
        self.set_entry(slot, index_id, root_page_id);
        self.set_count(slot + 1);
        true
    }

    /// Changes the root of an existing index. Returns `false` if it is not
    /// registered.
    pub fn update(&mut self, index_id: IndexId, root_page_id: PageId) -> bool {
        match self.find(index_id) {
            Some(slot) => {
                self.set_entry(slot, index_id, root_page_id);
                true
            }
            None => false,
        }
    }

    /// Removes an index. The last entry moves into the vacated slot.
    pub fn delete(&mut self, index_id: IndexId) -> bool {
        let Some(slot) = self.find(index_id) else {
            return false;
        };
        let last = self.count() - 1;
        if slot != last {
            let (moved_id, moved_root) = self.entry_at(last);
            self.set_entry(slot, moved_id, moved_root);
        }
        self.set_entry(last, IndexId::new(0), PageId::new(0));
        self.set_count(last);
        true
    }

    fn set_count(&mut self, count: usize) {
        (&mut self.data.as_mut()[COUNT_OFFSET..]).put_u32_le(count as u32);
    }

    fn set_entry(&mut self, slot: usize, index_id: IndexId, root_page_id: PageId) {
        let mut buf = &mut self.data.as_mut()[ENTRIES_OFFSET + slot * ENTRY_SIZE..];
        buf.put_u32_le(index_id.as_u32());
        buf.put_u32_le(root_page_id.as_u32());
    }
}
