use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::buffer::BufferPoolManager;
use crate::common::{IndexId, PageId, QuarryError, RecordId, Result, INDEX_ROOTS_PAGE_ID, INVALID_PAGE_ID};
use crate::storage::page::IndexRootsPage;

use super::btree_iterator::IndexIterator;
use super::btree_page::{load_tree_page, write_parent_page_id, BTreePageLayout, TreePage};
use super::internal_page::InternalPage;
use super::key_comparator::{GenericKey, KeyComparator};
use super::leaf_page::LeafPage;

/// Disk-backed B+ tree mapping unique fixed-width keys to record ids.
///
/// Pages are read into owned [`TreePage`] values, modified, and written back
/// through a short-lived write guard, so no page stays pinned between calls.
/// The current root is mirrored in the index roots page under `index_id`.
pub struct BPlusTree<const N: usize, C: KeyComparator> {
    index_id: IndexId,
    root_page_id: PageId,
    bpm: Arc<BufferPoolManager>,
    comparator: C,
    leaf_max_size: u32,
    internal_max_size: u32,
}

impl<const N: usize, C: KeyComparator> BPlusTree<N, C> {
    /// Opens the index `index_id`, picking up its root from the index roots
    /// page. `leaf_max_size` bounds entries per leaf and `internal_max_size`
    /// children per internal page.
    pub fn new(
        index_id: IndexId,
        bpm: Arc<BufferPoolManager>,
        comparator: C,
        leaf_max_size: usize,
        internal_max_size: usize,
    ) -> Result<Self> {
        if N < comparator.min_key_size() {
            return Err(QuarryError::InvalidConfig(format!(
                "comparator needs keys of at least {} bytes, got {}",
                comparator.min_key_size(),
                N
            )));
        }
        let leaf_capacity = LeafPage::<N>::capacity();
        if leaf_max_size < 2 || leaf_max_size > leaf_capacity {
            return Err(QuarryError::InvalidConfig(format!(
                "leaf max size must be in 2..={}, got {}",
                leaf_capacity, leaf_max_size
            )));
        }
        let internal_capacity = InternalPage::<N>::capacity();
        if internal_max_size < 3 || internal_max_size > internal_capacity {
            return Err(QuarryError::InvalidConfig(format!(
                "internal max size must be in 3..={}, got {}",
                internal_capacity, internal_max_size
            )));
        }
        if bpm.is_page_free(INDEX_ROOTS_PAGE_ID)? {
            return Err(QuarryError::InvalidDatabaseFile(
                "index roots page is not allocated".to_string(),
            ));
        }

        let root_page_id = {
            let guard = bpm
                .checked_read_page(INDEX_ROOTS_PAGE_ID)?
                .ok_or(QuarryError::BufferPoolFull)?;
            IndexRootsPage::new(guard.data())
                .get_root_id(index_id)
                .unwrap_or(INVALID_PAGE_ID)
        };
        debug!(%index_id, %root_page_id, "opened index");

        Ok(Self {
            index_id,
            root_page_id,
            bpm,
            comparator,
            leaf_max_size: leaf_max_size as u32,
            internal_max_size: internal_max_size as u32,
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn root_page_id(&self) -> PageId {
        self.root_page_id
    }

    pub fn is_empty(&self) -> bool {
        !self.root_page_id.is_valid()
    }

    pub fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Point lookup.
    pub fn get_value(&self, key: &GenericKey<N>) -> Result<Option<RecordId>> {
        if self.is_empty() {
            return Ok(None);
        }
        let leaf = self.find_leaf(key)?;
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Inserts a unique key. Returns false, changing nothing, if the key is
    /// already present.
    pub fn insert(&mut self, key: GenericKey<N>, value: RecordId) -> Result<bool> {
        if self.is_empty() {
            self.start_new_tree(key, value)?;
            return Ok(true);
        }

        let mut leaf = self.find_leaf(&key)?;
        if leaf.lookup(&key, &self.comparator).is_some() {
            return Ok(false);
        }

        if leaf.size() < leaf.max_size() {
            leaf.insert(key, value, &self.comparator);
            self.store(&leaf)?;
            return Ok(true);
        }

        let sibling_id = self.allocate_page_id()?;
        let mut sibling = LeafPage::new(sibling_id, leaf.parent_page_id(), self.leaf_max_size);
        leaf.move_half_to(&mut sibling);

        if self.compare(&key, &sibling.key_at(0)) == Ordering::Less {
            leaf.insert(key, value, &self.comparator);
        } else {
            sibling.insert(key, value, &self.comparator);
        }
        let separator = sibling.key_at(0);

        self.store(&leaf)?;
        self.store(&sibling)?;
        debug!(
            left = %leaf.page_id(),
            right = %sibling_id,
            separator = %self.comparator.display(separator.as_bytes()),
            "split leaf page"
        );

        self.insert_into_parent(leaf.page_id(), leaf.parent_page_id(), separator, sibling_id)?;
        Ok(true)
    }

    /// Removes a key. Returns false if it was not present.
    pub fn remove(&mut self, key: &GenericKey<N>) -> Result<bool> {
        if self.is_empty() {
            return Ok(false);
        }

        let mut leaf = self.find_leaf(key)?;
        let Some(index) = leaf.remove(key, &self.comparator) else {
            return Ok(false);
        };
        self.store(&leaf)?;

        if index == 0 && leaf.size() > 0 {
            self.refresh_routing_key(leaf.page_id(), leaf.parent_page_id(), leaf.key_at(0))?;
        }

        self.coalesce_or_redistribute(leaf.page_id())?;
        Ok(true)
    }

    /// Iterator positioned at the smallest key.
    pub fn begin(&self) -> Result<IndexIterator<N>> {
        if self.is_empty() {
            return Ok(IndexIterator::empty(Arc::clone(&self.bpm)));
        }
        let leaf = self.find_edge_leaf(false)?;
        IndexIterator::new(Arc::clone(&self.bpm), leaf, 0, false)
    }

    /// Iterator positioned at the first key `>= key`. `is_exact()` tells
    /// whether that key equals `key`.
    pub fn begin_at(&self, key: &GenericKey<N>) -> Result<IndexIterator<N>> {
        if self.is_empty() {
            return Ok(IndexIterator::empty(Arc::clone(&self.bpm)));
        }
        let leaf = self.find_leaf(key)?;
        let index = leaf.key_index(key, &self.comparator);
        let exact = index < leaf.size() && self.compare(&leaf.key_at(index), key) == Ordering::Equal;
        IndexIterator::new(Arc::clone(&self.bpm), leaf, index, exact)
    }

    /// One-past-the-end position on the rightmost leaf.
    pub fn end(&self) -> Result<IndexIterator<N>> {
        if self.is_empty() {
            return Ok(IndexIterator::empty(Arc::clone(&self.bpm)));
        }
        let leaf = self.find_edge_leaf(true)?;
        let index = leaf.size();
        IndexIterator::new(Arc::clone(&self.bpm), leaf, index, false)
    }

    /// All entries with `start <= key <= end`, in key order.
    pub fn range_scan(&self, start: &GenericKey<N>, end: &GenericKey<N>) -> Result<Vec<(GenericKey<N>, RecordId)>> {
        let mut out = Vec::new();
        for entry in self.begin_at(start)? {
            let (key, value) = entry?;
            if self.compare(&key, end) == Ordering::Greater {
                break;
            }
            out.push((key, value));
        }
        Ok(out)
    }

    /// Removes every entry, releasing all pages, and unregisters the index.
    pub fn destroy(&mut self) -> Result<()> {
        while !self.is_empty() {
            let leaf = self.find_edge_leaf(false)?;
            if leaf.size() == 0 {
                return Err(QuarryError::IndexCorrupted(format!(
                    "leftmost {} is empty",
                    leaf.page_id()
                )));
            }
            let first = leaf.key_at(0);
            if !self.remove(&first)? {
                return Err(QuarryError::IndexCorrupted(format!(
                    "first key of {} could not be removed",
                    leaf.page_id()
                )));
            }
        }

        let mut guard = self
            .bpm
            .checked_write_page(INDEX_ROOTS_PAGE_ID)?
            .ok_or(QuarryError::BufferPoolFull)?;
        IndexRootsPage::new(guard.data_mut()).delete(self.index_id);
        debug!(index_id = %self.index_id, "destroyed index");
        Ok(())
    }

    /// True if no page of the pool is left pinned.
    pub fn check(&self) -> bool {
        self.bpm.check_all_unpinned()
    }

    /// Walks the whole tree and checks key order, routing ranges, parent
    /// pointers, occupancy bounds, uniform leaf depth and the leaf chain.
    pub fn verify_integrity(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }

        let mut leaves = Vec::new();
        let mut leaf_depth = None;
        self.verify_subtree(self.root_page_id, INVALID_PAGE_ID, None, None, 0, &mut leaf_depth, &mut leaves)?;

        // The sibling chain must visit the leaves in the same order as the
        // in-order walk, with strictly increasing keys across boundaries.
        let mut previous_max: Option<GenericKey<N>> = None;
        for (i, leaf) in leaves.iter().enumerate() {
            let expected_next = leaves.get(i + 1).map_or(INVALID_PAGE_ID, |l| l.page_id());
            if leaf.next_page_id() != expected_next {
                return Err(self.corrupted(format!(
                    "{} links to {}, expected {}",
                    leaf.page_id(),
                    leaf.next_page_id(),
                    expected_next
                )));
            }
            if let (Some(prev), Some((first, _))) = (previous_max, leaf.entries().first()) {
                if self.compare(&prev, first) != Ordering::Less {
                    return Err(self.corrupted(format!("{} does not start above its left sibling", leaf.page_id())));
                }
            }
            if let Some((last, _)) = leaf.entries().last() {
                previous_max = Some(*last);
            }
        }
        Ok(())
    }

    /// Graphviz rendering of the tree.
    pub fn to_dot(&self) -> Result<String> {
        let mut out = String::from("digraph G {\n  node [shape=plaintext];\n");
        if self.is_empty() {
            out.push_str("  empty [label=\"empty tree\"];\n");
        } else {
            self.dot_subtree(self.root_page_id, &mut out)?;
        }
        out.push_str("}\n");
        Ok(out)
    }

    fn start_new_tree(&mut self, key: GenericKey<N>, value: RecordId) -> Result<()> {
        let root_id = self.allocate_page_id()?;
        let mut root = LeafPage::new(root_id, INVALID_PAGE_ID, self.leaf_max_size);
        root.insert(key, value, &self.comparator);
        self.store(&root)?;
        self.update_root(root_id)?;
        debug!(index_id = %self.index_id, %root_id, "started new tree");
        Ok(())
    }

    fn insert_into_parent(
        &mut self,
        old_id: PageId,
        parent_id: PageId,
        key: GenericKey<N>,
        new_id: PageId,
    ) -> Result<()> {
        if !parent_id.is_valid() {
            let root_id = self.allocate_page_id()?;
            let mut root = InternalPage::new(root_id, INVALID_PAGE_ID, self.internal_max_size);
            root.populate_new_root(old_id, key, new_id);
            self.store(&root)?;
            self.set_parent(old_id, root_id)?;
            self.set_parent(new_id, root_id)?;
            self.update_root(root_id)?;
            debug!(%root_id, "grew new root");
            return Ok(());
        }

        let mut parent = self.load_internal(parent_id)?;
        if !parent.insert_node_after(old_id, key, new_id) {
            return Err(self.corrupted(format!("{} is not a child of {}", old_id, parent_id)));
        }
        if parent.size() <= parent.max_size() {
            return self.store(&parent);
        }

        let sibling_id = self.allocate_page_id()?;
        let mut sibling = InternalPage::new(sibling_id, parent.parent_page_id(), self.internal_max_size);
        let middle = parent.move_half_to(&mut sibling);
        self.store(&parent)?;
        self.store(&sibling)?;
        for child in sibling.children() {
            self.set_parent(child, sibling_id)?;
        }
        debug!(
            left = %parent_id,
            right = %sibling_id,
            separator = %self.comparator.display(middle.as_bytes()),
            "split internal page"
        );

        self.insert_into_parent(parent_id, parent.parent_page_id(), middle, sibling_id)
    }

    /// Propagates a leaf's new minimum to the routing slot that bounds it.
    fn refresh_routing_key(&self, mut child_id: PageId, mut parent_id: PageId, key: GenericKey<N>) -> Result<()> {
        while parent_id.is_valid() {
            let mut parent = self.load_internal(parent_id)?;
            let index = parent
                .value_index(child_id)
                .ok_or_else(|| self.corrupted(format!("{} is not a child of {}", child_id, parent_id)))?;
            if index > 0 {
                parent.set_key_at(index, key);
                return self.store(&parent);
            }
            child_id = parent_id;
            parent_id = parent.parent_page_id();
        }
        Ok(())
    }

    fn coalesce_or_redistribute(&mut self, page_id: PageId) -> Result<()> {
        let node = self.load(page_id)?;
        if node.is_root() {
            return self.adjust_root(node);
        }
        if !node.is_underfull() {
            return Ok(());
        }

        let parent_id = node.parent_page_id();
        let mut parent = self.load_internal(parent_id)?;
        let index = parent
            .value_index(page_id)
            .ok_or_else(|| self.corrupted(format!("{} is not a child of {}", page_id, parent_id)))?;
        let sibling_index = if index == 0 { 1 } else { index - 1 };
        if sibling_index >= parent.size() {
            return Err(self.corrupted(format!("{} has a single child", parent_id)));
        }
        let sibling = self.load(parent.value_at(sibling_index))?;

        match (node, sibling) {
            (TreePage::Leaf(node), TreePage::Leaf(sibling)) => {
                if node.size() + sibling.size() > node.max_size() {
                    self.redistribute_leaf(node, sibling, parent, index)
                } else {
                    let (mut left, mut right, right_index) = if index == 0 {
                        (node, sibling, 1)
                    } else {
                        (sibling, node, index)
                    };
                    right.move_all_to(&mut left);
                    parent.remove(right_index);
                    self.store(&left)?;
                    self.store(&parent)?;
                    self.delete_page(right.page_id())?;
                    debug!(into = %left.page_id(), from = %right.page_id(), "coalesced leaf pages");
                    self.coalesce_or_redistribute(parent_id)
                }
            }
            (TreePage::Internal(node), TreePage::Internal(sibling)) => {
                if node.size() + sibling.size() > node.max_size() {
                    self.redistribute_internal(node, sibling, parent, index)
                } else {
                    let (mut left, mut right, right_index) = if index == 0 {
                        (node, sibling, 1)
                    } else {
                        (sibling, node, index)
                    };
                    let moved: Vec<PageId> = right.children().collect();
                    let middle = parent.key_at(right_index);
                    right.move_all_to(&mut left, middle);
                    parent.remove(right_index);
                    self.store(&left)?;
                    self.store(&parent)?;
                    for child in moved {
                        self.set_parent(child, left.page_id())?;
                    }
                    self.delete_page(right.page_id())?;
                    debug!(into = %left.page_id(), from = %right.page_id(), "coalesced internal pages");
                    self.coalesce_or_redistribute(parent_id)
                }
            }
            _ => Err(self.corrupted(format!("siblings under {} have different page types", parent_id))),
        }
    }

    fn redistribute_leaf(
        &self,
        mut node: LeafPage<N>,
        mut sibling: LeafPage<N>,
        mut parent: InternalPage<N>,
        index: usize,
    ) -> Result<()> {
        if index == 0 {
            sibling.move_first_to_end_of(&mut node);
            parent.set_key_at(1, sibling.key_at(0));
        } else {
            sibling.move_last_to_front_of(&mut node);
            parent.set_key_at(index, node.key_at(0));
        }
        self.store(&node)?;
        self.store(&sibling)?;
        self.store(&parent)?;
        debug!(to = %node.page_id(), from = %sibling.page_id(), "redistributed leaf entry");
        Ok(())
    }

    fn redistribute_internal(
        &self,
        mut node: InternalPage<N>,
        mut sibling: InternalPage<N>,
        mut parent: InternalPage<N>,
        index: usize,
    ) -> Result<()> {
        let moved = if index == 0 {
            let (moved, separator) = sibling.move_first_to_end_of(&mut node, parent.key_at(1));
            parent.set_key_at(1, separator);
            moved
        } else {
            let (moved, separator) = sibling.move_last_to_front_of(&mut node, parent.key_at(index));
            parent.set_key_at(index, separator);
            moved
        };
        self.store(&node)?;
        self.store(&sibling)?;
        self.store(&parent)?;
        self.set_parent(moved, node.page_id())?;
        debug!(to = %node.page_id(), from = %sibling.page_id(), "redistributed internal entry");
        Ok(())
    }

    fn adjust_root(&mut self, root: TreePage<N>) -> Result<()> {
        match root {
            TreePage::Internal(root) if root.size() == 1 => {
                let child = root.value_at(0);
                self.set_parent(child, INVALID_PAGE_ID)?;
                self.update_root(child)?;
                self.delete_page(root.page_id())?;
                debug!(old_root = %root.page_id(), new_root = %child, "collapsed root");
            }
            TreePage::Leaf(root) if root.size() == 0 => {
                self.update_root(INVALID_PAGE_ID)?;
                self.delete_page(root.page_id())?;
                debug!(index_id = %self.index_id, "tree is now empty");
            }
            _ => {}
        }
        Ok(())
    }

    fn find_leaf(&self, key: &GenericKey<N>) -> Result<LeafPage<N>> {
        let mut page_id = self.root_page_id;
        loop {
            match self.load(page_id)? {
                TreePage::Leaf(leaf) => return Ok(leaf),
                TreePage::Internal(internal) => page_id = internal.lookup(key, &self.comparator),
            }
        }
    }

    /// Leftmost or rightmost leaf.
    fn find_edge_leaf(&self, rightmost: bool) -> Result<LeafPage<N>> {
        let mut page_id = self.root_page_id;
        loop {
            match self.load(page_id)? {
                TreePage::Leaf(leaf) => return Ok(leaf),
                TreePage::Internal(internal) => {
                    if internal.size() == 0 {
                        return Err(self.corrupted(format!("{} has no children", page_id)));
                    }
                    let index = if rightmost { internal.size() - 1 } else { 0 };
                    page_id = internal.value_at(index);
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn verify_subtree(
        &self,
        page_id: PageId,
        expected_parent: PageId,
        lower: Option<GenericKey<N>>,
        upper: Option<GenericKey<N>>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
        leaves: &mut Vec<LeafPage<N>>,
    ) -> Result<()> {
        let page = self.load(page_id)?;
        if page.parent_page_id() != expected_parent {
            return Err(self.corrupted(format!(
                "{} has parent {}, expected {}",
                page_id,
                page.parent_page_id(),
                expected_parent
            )));
        }
        let is_root = !expected_parent.is_valid();

        match page {
            TreePage::Leaf(leaf) => {
                if !is_root && leaf.size() < leaf.min_size() {
                    return Err(self.corrupted(format!("{} is underfull ({} entries)", page_id, leaf.size())));
                }
                if is_root && leaf.size() == 0 {
                    return Err(self.corrupted(format!("root {} is an empty leaf", page_id)));
                }
                match *leaf_depth {
                    Some(d) if d != depth => {
                        return Err(self.corrupted(format!("{} sits at depth {}, expected {}", page_id, depth, d)))
                    }
                    _ => *leaf_depth = Some(depth),
                }
                let keys: Vec<GenericKey<N>> = leaf.entries().iter().map(|(k, _)| *k).collect();
                self.verify_keys(page_id, &keys, lower, upper)?;
                leaves.push(leaf);
            }
            TreePage::Internal(internal) => {
                if internal.size() < 2 {
                    return Err(self.corrupted(format!("{} has {} children", page_id, internal.size())));
                }
                if !is_root && internal.size() <= internal.min_size() {
                    return Err(self.corrupted(format!("{} is underfull ({} children)", page_id, internal.size())));
                }
                let keys: Vec<GenericKey<N>> = (1..internal.size()).map(|i| internal.key_at(i)).collect();
                self.verify_keys(page_id, &keys, lower, upper)?;

                for i in 0..internal.size() {
                    let child_lower = if i == 0 { lower } else { Some(internal.key_at(i)) };
                    let child_upper = if i + 1 < internal.size() { Some(internal.key_at(i + 1)) } else { upper };
                    self.verify_subtree(
                        internal.value_at(i),
                        page_id,
                        child_lower,
                        child_upper,
                        depth + 1,
                        leaf_depth,
                        leaves,
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Keys must be strictly increasing and lie in `[lower, upper)`.
    fn verify_keys(
        &self,
        page_id: PageId,
        keys: &[GenericKey<N>],
        lower: Option<GenericKey<N>>,
        upper: Option<GenericKey<N>>,
    ) -> Result<()> {
        for pair in keys.windows(2) {
            if self.compare(&pair[0], &pair[1]) != Ordering::Less {
                return Err(self.corrupted(format!("keys of {} are not strictly increasing", page_id)));
            }
        }
        if let (Some(lower), Some(first)) = (lower, keys.first()) {
            if self.compare(first, &lower) == Ordering::Less {
                return Err(self.corrupted(format!("{} holds a key below its routing range", page_id)));
            }
        }
        if let (Some(upper), Some(last)) = (upper, keys.last()) {
            if self.compare(last, &upper) != Ordering::Less {
                return Err(self.corrupted(format!("{} holds a key above its routing range", page_id)));
            }
        }
        Ok(())
    }

    fn dot_subtree(&self, page_id: PageId, out: &mut String) -> Result<()> {
        match self.load(page_id)? {
            TreePage::Leaf(leaf) => {
                let keys: Vec<String> = leaf
                    .entries()
                    .iter()
                    .map(|(k, _)| self.comparator.display(k.as_bytes()))
                    .collect();
                let _ = writeln!(
                    out,
                    "  page{} [label=\"L{} | {}\", color=green];",
                    page_id.as_u32(),
                    page_id.as_u32(),
                    keys.join(" ")
                );
                if leaf.next_page_id().is_valid() {
                    let _ = writeln!(
                        out,
                        "  page{} -> page{} [style=dashed]; {{rank=same page{} page{}}}",
                        page_id.as_u32(),
                        leaf.next_page_id().as_u32(),
                        page_id.as_u32(),
                        leaf.next_page_id().as_u32()
                    );
                }
            }
            TreePage::Internal(internal) => {
                let keys: Vec<String> = (1..internal.size())
                    .map(|i| self.comparator.display(internal.key_at(i).as_bytes()))
                    .collect();
                let _ = writeln!(
                    out,
                    "  page{} [label=\"I{} | {}\", color=pink];",
                    page_id.as_u32(),
                    page_id.as_u32(),
                    keys.join(" ")
                );
                for child in internal.children() {
                    let _ = writeln!(out, "  page{} -> page{};", page_id.as_u32(), child.as_u32());
                    self.dot_subtree(child, out)?;
                }
            }
        }
        Ok(())
    }

    fn compare(&self, a: &GenericKey<N>, b: &GenericKey<N>) -> Ordering {
        self.comparator.compare(a.as_bytes(), b.as_bytes())
    }

    fn corrupted(&self, detail: String) -> QuarryError {
        QuarryError::IndexCorrupted(format!("{}: {}", self.index_id, detail))
    }

    fn load(&self, page_id: PageId) -> Result<TreePage<N>> {
        load_tree_page(&self.bpm, page_id)
    }

    fn load_internal(&self, page_id: PageId) -> Result<InternalPage<N>> {
        match self.load(page_id)? {
            TreePage::Internal(page) => Ok(page),
            TreePage::Leaf(_) => Err(self.corrupted(format!("{} was expected to be an internal page", page_id))),
        }
    }

    fn store<P: BTreePageLayout>(&self, page: &P) -> Result<()> {
        let page_id = page.page_id();
        let mut guard = self
            .bpm
            .checked_write_page(page_id)?
            .ok_or(QuarryError::BufferPoolFull)?;
        page.encode(guard.data_mut());
        Ok(())
    }

    /// Patches a child's parent pointer in place. Callers never store their
    /// own copy of that child afterwards.
    fn set_parent(&self, child_id: PageId, parent_id: PageId) -> Result<()> {
        let mut guard = self
            .bpm
            .checked_write_page(child_id)?
            .ok_or(QuarryError::BufferPoolFull)?;
        write_parent_page_id(guard.data_mut(), parent_id);
        Ok(())
    }

    fn allocate_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.new_page()?.ok_or(QuarryError::BufferPoolFull)?;
        Ok(guard.page_id())
    }

    fn delete_page(&self, page_id: PageId) -> Result<()> {
        if !self.bpm.delete_page(page_id)? {
            warn!(%page_id, "tree page was still pinned when deleted");
        }
        Ok(())
    }

    fn update_root(&mut self, root_page_id: PageId) -> Result<()> {
        self.root_page_id = root_page_id;

        let mut guard = self
            .bpm
            .checked_write_page(INDEX_ROOTS_PAGE_ID)?
            .ok_or(QuarryError::BufferPoolFull)?;
        let mut roots = IndexRootsPage::new(guard.data_mut());
        if !roots.update(self.index_id, root_page_id) && !roots.insert(self.index_id, root_page_id) {
            return Err(QuarryError::IndexRootsFull(self.index_id));
        }
        Ok(())
    }
}
