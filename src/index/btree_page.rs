//! Shared on-page layout of B+ tree pages.
//!
//! Every tree page starts with the same header; leaves append a sibling
//! link. All integers are little-endian.
//!
//! | Field          | Offset | Size | Notes                    |
//! |----------------|--------|------|--------------------------|
//! | page_type      | 0      | 4    | 1 = leaf, 2 = internal   |
//! | size           | 4      | 4    | occupied slots           |
//! | max_size       | 8      | 4    |                          |
//! | parent_page_id | 12     | 4    | `u32::MAX` for the root  |
//! | page_id        | 16     | 4    |                          |
//! | next_page_id   | 20     | 4    | leaves only              |

use bytes::{Buf, BufMut};

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, QuarryError, Result, PAGE_SIZE};

use super::internal_page::InternalPage;
use super::leaf_page::LeafPage;

pub(crate) const PAGE_TYPE_OFFSET: usize = 0;
pub(crate) const PARENT_PAGE_OFFSET: usize = 12;

pub(crate) const INTERNAL_HEADER_SIZE: usize = 20;
pub(crate) const LEAF_HEADER_SIZE: usize = 24;

const LEAF_PAGE_TYPE: u32 = 1;
const INTERNAL_PAGE_TYPE: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPageType {
    Leaf,
    Internal,
}

impl IndexPageType {
    pub(crate) fn as_u32(self) -> u32 {
        match self {
            IndexPageType::Leaf => LEAF_PAGE_TYPE,
            IndexPageType::Internal => INTERNAL_PAGE_TYPE,
        }
    }
}

/// Header fields common to both page kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageHeader {
    pub page_type: IndexPageType,
    pub size: u32,
    pub max_size: u32,
    pub parent_page_id: PageId,
    pub page_id: PageId,
}

impl PageHeader {
    pub(crate) fn read(buf: &mut &[u8]) -> Result<Self> {
        let raw_type = buf.get_u32_le();
        let page_type = match raw_type {
            LEAF_PAGE_TYPE => IndexPageType::Leaf,
            INTERNAL_PAGE_TYPE => IndexPageType::Internal,
            other => {
                return Err(QuarryError::IndexCorrupted(format!(
                    "unknown tree page type {}",
                    other
                )))
            }
        };
        Ok(Self {
            page_type,
            size: buf.get_u32_le(),
            max_size: buf.get_u32_le(),
            parent_page_id: PageId::new(buf.get_u32_le()),
            page_id: PageId::new(buf.get_u32_le()),
        })
    }

    pub(crate) fn write(&self, buf: &mut &mut [u8]) {
        buf.put_u32_le(self.page_type.as_u32());
        buf.put_u32_le(self.size);
        buf.put_u32_le(self.max_size);
        buf.put_u32_le(self.parent_page_id.as_u32());
        buf.put_u32_le(self.page_id.as_u32());
    }
}

/// Encoding shared by leaf and internal pages.
pub trait BTreePageLayout {
    fn page_id(&self) -> PageId;

    /// Serializes the page into a `PAGE_SIZE` buffer.
    fn encode(&self, data: &mut [u8]);
}

/// A decoded tree page.
#[derive(Debug, Clone)]
pub enum TreePage<const N: usize> {
    Internal(InternalPage<N>),
    Leaf(LeafPage<N>),
}

impl<const N: usize> TreePage<N> {
    pub fn decode(data: &[u8]) -> Result<Self> {
        assert_eq!(data.len(), PAGE_SIZE);
        let page_type = (&data[PAGE_TYPE_OFFSET..]).get_u32_le();
        match page_type {
            LEAF_PAGE_TYPE => Ok(TreePage::Leaf(LeafPage::decode(data)?)),
            INTERNAL_PAGE_TYPE => Ok(TreePage::Internal(InternalPage::decode(data)?)),
            other => Err(QuarryError::IndexCorrupted(format!(
                "unknown tree page type {}",
                other
            ))),
        }
    }

    pub fn page_type(&self) -> IndexPageType {
        match self {
            TreePage::Internal(_) => IndexPageType::Internal,
            TreePage::Leaf(_) => IndexPageType::Leaf,
        }
    }

    pub fn parent_page_id(&self) -> PageId {
        match self {
            TreePage::Internal(page) => page.parent_page_id(),
            TreePage::Leaf(page) => page.parent_page_id(),
        }
    }

    pub fn is_root(&self) -> bool {
        !self.parent_page_id().is_valid()
    }

    pub fn size(&self) -> usize {
        match self {
            TreePage::Internal(page) => page.size(),
            TreePage::Leaf(page) => page.size(),
        }
    }

    /// True when a non-root page has fallen below its occupancy bound.
    pub fn is_underfull(&self) -> bool {
        match self {
            TreePage::Internal(page) => page.size() <= page.min_size(),
            TreePage::Leaf(page) => page.size() < page.min_size(),
        }
    }
}

impl<const N: usize> BTreePageLayout for TreePage<N> {
    fn page_id(&self) -> PageId {
        match self {
            TreePage::Internal(page) => page.page_id(),
            TreePage::Leaf(page) => page.page_id(),
        }
    }

    fn encode(&self, data: &mut [u8]) {
        match self {
            TreePage::Internal(page) => page.encode(data),
            TreePage::Leaf(page) => page.encode(data),
        }
    }
}

/// Rewrites the parent pointer of an encoded page without decoding it.
pub(crate) fn write_parent_page_id(data: &mut [u8], parent_page_id: PageId) {
    (&mut data[PARENT_PAGE_OFFSET..]).put_u32_le(parent_page_id.as_u32());
}

/// Reads and decodes a tree page. A pool with no free frame is an error here:
/// tree operations cannot back off halfway through.
pub(crate) fn load_tree_page<const N: usize>(
    bpm: &BufferPoolManager,
    page_id: PageId,
) -> Result<TreePage<N>> {
    let guard = bpm
        .checked_read_page(page_id)?
        .ok_or(QuarryError::BufferPoolFull)?;
    let page = TreePage::decode(guard.data())?;
    if page.page_id() != page_id {
        return Err(QuarryError::IndexCorrupted(format!(
            "{} holds a header for {}",
            page_id,
            page.page_id()
        )));
    }
    Ok(page)
}

pub(crate) fn load_leaf_page<const N: usize>(
    bpm: &BufferPoolManager,
    page_id: PageId,
) -> Result<LeafPage<N>> {
    match load_tree_page(bpm, page_id)? {
        TreePage::Leaf(page) => Ok(page),
        TreePage::Internal(_) => Err(QuarryError::IndexCorrupted(format!(
            "{} was expected to be a leaf page",
            page_id
        ))),
    }
}

pub(crate) fn check_capacity(size: u32, max_size: u32, capacity: usize, page_id: PageId) -> Result<()> {
    if max_size as usize > capacity || size > max_size {
        return Err(QuarryError::IndexCorrupted(format!(
            "{} has size {} and max size {}, capacity is {}",
            page_id, size, max_size, capacity
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{RecordId, SlotId, INVALID_PAGE_ID};
    use crate::index::GenericKey;

    #[test]
    fn test_decode_dispatches_on_page_type() {
        let mut data = [0u8; PAGE_SIZE];

        let mut leaf = LeafPage::<8>::new(PageId::new(3), INVALID_PAGE_ID, 4);
        leaf.insert_entry(0, GenericKey::from_u32(1), RecordId::new(PageId::new(1), SlotId::new(0)));
        leaf.encode(&mut data);
        let page = TreePage::<8>::decode(&data).unwrap();
        assert_eq!(page.page_type(), IndexPageType::Leaf);
        assert!(page.is_root());
        assert_eq!(page.page_id(), PageId::new(3));

        let internal = InternalPage::<8>::new(PageId::new(4), PageId::new(9), 4);
        internal.encode(&mut data);
        let page = TreePage::<8>::decode(&data).unwrap();
        assert_eq!(page.page_type(), IndexPageType::Internal);
        assert_eq!(page.parent_page_id(), PageId::new(9));
    }

    #[test]
    fn test_zeroed_page_is_rejected() {
        let data = [0u8; PAGE_SIZE];
        assert!(matches!(
            TreePage::<8>::decode(&data),
            Err(QuarryError::IndexCorrupted(_))
        ));
    }

    #[test]
    fn test_write_parent_in_place() {
        let mut data = [0u8; PAGE_SIZE];
        LeafPage::<8>::new(PageId::new(3), INVALID_PAGE_ID, 4).encode(&mut data);

        write_parent_page_id(&mut data, PageId::new(12));
        let page = TreePage::<8>::decode(&data).unwrap();
        assert_eq!(page.parent_page_id(), PageId::new(12));
    }
}
