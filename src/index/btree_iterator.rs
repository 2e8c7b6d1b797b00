use std::sync::Arc;

use crate::buffer::BufferPoolManager;
use crate::common::{PageId, QuarryError, RecordId, Result, INVALID_PAGE_ID};

use super::btree_page::{load_leaf_page, BTreePageLayout};
use super::key_comparator::GenericKey;
use super::leaf_page::LeafPage;

/// Forward cursor over the leaf chain.
///
/// Holds a decoded copy of the current leaf rather than a pinned frame, so
/// an open iterator never blocks eviction. It is invalidated by any
/// structural change to the tree.
pub struct IndexIterator<const N: usize> {
    bpm: Arc<BufferPoolManager>,
    leaf: Option<LeafPage<N>>,
    index: usize,
    exact: bool,
    pending_error: Option<QuarryError>,
}

impl<const N: usize> IndexIterator<N> {
    pub(crate) fn new(bpm: Arc<BufferPoolManager>, leaf: LeafPage<N>, index: usize, exact: bool) -> Result<Self> {
        let mut iter = Self {
            bpm,
            leaf: Some(leaf),
            index,
            exact,
            pending_error: None,
        };
        iter.skip_exhausted_leaves()?;
        Ok(iter)
    }

    pub(crate) fn empty(bpm: Arc<BufferPoolManager>) -> Self {
        Self {
            bpm,
            leaf: None,
            index: 0,
            exact: false,
            pending_error: None,
        }
    }

    /// Leaf the cursor is on, `INVALID_PAGE_ID` for an empty tree.
    pub fn page_id(&self) -> PageId {
        self.leaf.as_ref().map_or(INVALID_PAGE_ID, |leaf| leaf.page_id())
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// True if the iterator was positioned by `begin_at` on an equal key.
    pub fn is_exact(&self) -> bool {
        self.exact
    }

    pub fn is_end(&self) -> bool {
        match &self.leaf {
            Some(leaf) => self.index >= leaf.size(),
            None => true,
        }
    }

    pub fn current(&self) -> Option<(GenericKey<N>, RecordId)> {
        let leaf = self.leaf.as_ref()?;
        (self.index < leaf.size()).then(|| leaf.entry_at(self.index))
    }

    /// Steps to the next entry, crossing into the right sibling when the
    /// current leaf is exhausted. A no-op at the end.
    pub fn advance(&mut self) -> Result<()> {
        if self.is_end() {
            return Ok(());
        }
        self.index += 1;
        self.exact = false;
        self.skip_exhausted_leaves()
    }

    fn skip_exhausted_leaves(&mut self) -> Result<()> {
        while let Some(leaf) = &self.leaf {
            if self.index < leaf.size() || !leaf.next_page_id().is_valid() {
                break;
            }
            let next = load_leaf_page(&self.bpm, leaf.next_page_id())?;
            self.leaf = Some(next);
            self.index = 0;
        }
        Ok(())
    }
}

impl<const N: usize> PartialEq for IndexIterator<N> {
    fn eq(&self, other: &Self) -> bool {
        self.page_id() == other.page_id() && self.index == other.index
    }
}

impl<const N: usize> Iterator for IndexIterator<N> {
    type Item = Result<(GenericKey<N>, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.pending_error.take() {
            // Stop after reporting, the position is unknown.
            self.leaf = None;
            return Some(Err(err));
        }

        let item = self.current()?;
        if let Err(err) = self.advance() {
            self.pending_error = Some(err);
        }
        Some(Ok(item))
    }
}
