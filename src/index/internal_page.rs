use std::cmp::Ordering;

use bytes::{Buf, BufMut};

use crate::common::{PageId, Result, PAGE_SIZE};

use super::btree_page::{check_capacity, BTreePageLayout, IndexPageType, PageHeader, INTERNAL_HEADER_SIZE};
use super::key_comparator::{GenericKey, KeyComparator};

const CHILD_SIZE: usize = 4; // PageId

/// Internal node: `size` `(key, child)` pairs. The key in slot 0 is a
/// placeholder and never compared; child 0 holds every key below slot 1's key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalPage<const N: usize> {
    page_id: PageId,
    parent_page_id: PageId,
    max_size: u32,
    entries: Vec<(GenericKey<N>, PageId)>,
}

impl<const N: usize> InternalPage<N> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            page_id,
            parent_page_id,
            max_size,
            entries: Vec::with_capacity(max_size as usize + 1),
        }
    }

    /// Number of children that fit in one page for key width `N`.
    pub fn capacity() -> usize {
        (PAGE_SIZE - INTERNAL_HEADER_SIZE) / (N + CHILD_SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = PageHeader::read(&mut buf)?;
        check_capacity(header.size, header.max_size, Self::capacity(), header.page_id)?;

        let mut entries = Vec::with_capacity(header.max_size as usize + 1);
        for _ in 0..header.size {
            let key = GenericKey::from_bytes(&buf[..N]);
            buf.advance(N);
            entries.push((key, PageId::new(buf.get_u32_le())));
        }

        Ok(Self {
            page_id: header.page_id,
            parent_page_id: header.parent_page_id,
            max_size: header.max_size,
            entries,
        })
    }

    pub fn parent_page_id(&self) -> PageId {
        self.parent_page_id
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size as usize
    }

    /// A non-root internal page must keep strictly more children than this.
    pub fn min_size(&self) -> usize {
        (self.max_size as usize + 1) / 2 - 1
    }

    pub fn key_at(&self, index: usize) -> GenericKey<N> {
        self.entries[index].0
    }

    pub fn set_key_at(&mut self, index: usize, key: GenericKey<N>) {
        self.entries[index].0 = key;
    }

    pub fn value_at(&self, index: usize) -> PageId {
        self.entries[index].1
    }

    /// Slot holding `child`, if any.
    pub fn value_index(&self, child: PageId) -> Option<usize> {
        self.entries.iter().position(|(_, c)| *c == child)
    }

    pub fn children(&self) -> impl Iterator<Item = PageId> + '_ {
        self.entries.iter().map(|(_, c)| *c)
    }

    /// Child whose key range contains `key`.
    pub fn lookup<C: KeyComparator>(&self, key: &GenericKey<N>, comparator: &C) -> PageId {
        let index = self.entries[1..]
            .partition_point(|(k, _)| comparator.compare(k.as_bytes(), key.as_bytes()) != Ordering::Greater);
        self.entries[index].1
    }

    /// Turns an empty page into a root with exactly two children.
    pub fn populate_new_root(&mut self, old_child: PageId, key: GenericKey<N>, new_child: PageId) {
        self.entries.clear();
        self.entries.push((GenericKey::default(), old_child));
        self.entries.push((key, new_child));
    }

    /// Inserts `(key, new_child)` right after `old_child`. May leave the page
    /// one entry over `max_size`; the caller splits it before storing.
    pub fn insert_node_after(&mut self, old_child: PageId, key: GenericKey<N>, new_child: PageId) -> bool {
        match self.value_index(old_child) {
            Some(index) => {
                self.entries.insert(index + 1, (key, new_child));
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, index: usize) {
        self.entries.remove(index);
    }

    /// Moves the upper half of an overfull page into its new right sibling
    /// and returns the key to push up. The pushed key stays in the sibling's
    /// placeholder slot.
    pub fn move_half_to(&mut self, recipient: &mut InternalPage<N>) -> GenericKey<N> {
        let keep = (self.entries.len() + 1) / 2;
        recipient.entries.extend(self.entries.drain(keep..));
        recipient.entries[0].0
    }

    /// Appends every child to the left sibling. `middle_key` is the parent's
    /// separator for this page and becomes the key of the first moved child.
    pub fn move_all_to(&mut self, recipient: &mut InternalPage<N>, middle_key: GenericKey<N>) {
        if let Some(first) = self.entries.first_mut() {
            first.0 = middle_key;
        }
        recipient.entries.append(&mut self.entries);
    }

    /// Rotates this page's first child into the end of its left neighbour.
    /// Returns the moved child and the new parent separator for this page.
    pub fn move_first_to_end_of(
        &mut self,
        recipient: &mut InternalPage<N>,
        middle_key: GenericKey<N>,
    ) -> (PageId, GenericKey<N>) {
        let (_, child) = self.entries.remove(0);
        recipient.entries.push((middle_key, child));
        (child, self.entries[0].0)
    }

    /// Rotates this page's last child into the front of its right neighbour.
    /// Returns the moved child and the new parent separator for the neighbour.
    pub fn move_last_to_front_of(
        &mut self,
        recipient: &mut InternalPage<N>,
        middle_key: GenericKey<N>,
    ) -> (PageId, GenericKey<N>) {
        let (key, child) = self.entries.remove(self.entries.len() - 1);
        recipient.entries[0].0 = middle_key;
        recipient.entries.insert(0, (key, child));
        (child, key)
    }
}

impl<const N: usize> BTreePageLayout for InternalPage<N> {
    fn page_id(&self) -> PageId {
        self.page_id
    }

    fn encode(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.fill(0);
        let mut buf = data;
        PageHeader {
            page_type: IndexPageType::Internal,
            size: self.entries.len() as u32,
            max_size: self.max_size,
            parent_page_id: self.parent_page_id,
            page_id: self.page_id,
        }
        .write(&mut buf);

        for (key, child) in &self.entries {
            buf.put_slice(key.as_bytes());
            buf.put_u32_le(child.as_u32());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::INVALID_PAGE_ID;
    use crate::index::IntegerComparator;

    fn key(k: u32) -> GenericKey<8> {
        GenericKey::from_u32(k)
    }

    /// children 100, 101, ... separated by the given keys
    fn internal_with(keys: &[u32]) -> InternalPage<8> {
        let mut page = InternalPage::new(PageId::new(1), INVALID_PAGE_ID, 8);
        page.populate_new_root(PageId::new(100), key(keys[0]), PageId::new(101));
        for (i, &k) in keys.iter().enumerate().skip(1) {
            let prev = PageId::new(100 + i as u32);
            assert!(page.insert_node_after(prev, key(k), PageId::new(101 + i as u32)));
        }
        page
    }

    #[test]
    fn test_lookup_routes_by_range() {
        let page = internal_with(&[10, 20, 30]);
        let cmp = IntegerComparator;

        assert_eq!(page.lookup(&key(5), &cmp), PageId::new(100));
        assert_eq!(page.lookup(&key(10), &cmp), PageId::new(101));
        assert_eq!(page.lookup(&key(25), &cmp), PageId::new(102));
        assert_eq!(page.lookup(&key(30), &cmp), PageId::new(103));
        assert_eq!(page.lookup(&key(99), &cmp), PageId::new(103));
    }

    #[test]
    fn test_split_pushes_up_middle_key() {
        // 5 children, max 4: left keeps 3, right gets 2
        let mut page = internal_with(&[10, 20, 30, 40]);
        let mut sibling = InternalPage::new(PageId::new(2), INVALID_PAGE_ID, 4);

        let middle = page.move_half_to(&mut sibling);
        assert_eq!(middle.as_u32(), 30);
        assert_eq!(page.size(), 3);
        assert_eq!(sibling.size(), 2);
        assert_eq!(sibling.children().collect::<Vec<_>>(), vec![PageId::new(103), PageId::new(104)]);
        assert_eq!(sibling.key_at(1).as_u32(), 40);
    }

    #[test]
    fn test_merge_pulls_down_separator() {
        let mut left = internal_with(&[10]);
        let mut right = InternalPage::new(PageId::new(2), INVALID_PAGE_ID, 8);
        right.populate_new_root(PageId::new(200), key(60), PageId::new(201));

        right.move_all_to(&mut left, key(50));
        assert_eq!(left.size(), 4);
        assert_eq!(left.key_at(2).as_u32(), 50);
        assert_eq!(left.key_at(3).as_u32(), 60);
        assert_eq!(right.size(), 0);
    }

    #[test]
    fn test_rotations() {
        let mut left = internal_with(&[10]);
        let mut right = InternalPage::new(PageId::new(2), INVALID_PAGE_ID, 8);
        right.populate_new_root(PageId::new(200), key(60), PageId::new(201));

        // Parent separator between left and right is 50
        let (moved, separator) = right.move_first_to_end_of(&mut left, key(50));
        assert_eq!(moved, PageId::new(200));
        assert_eq!(separator.as_u32(), 60);
        assert_eq!(left.key_at(2).as_u32(), 50);
        assert_eq!(right.size(), 1);

        let (moved, separator) = left.move_last_to_front_of(&mut right, separator);
        assert_eq!(moved, PageId::new(200));
        assert_eq!(separator.as_u32(), 50);
        assert_eq!(right.value_at(0), PageId::new(200));
        assert_eq!(right.key_at(1).as_u32(), 60);
    }

    #[test]
    fn test_encode_decode() {
        let page = internal_with(&[10, 20]);
        let mut data = [0u8; PAGE_SIZE];
        page.encode(&mut data);
        assert_eq!(InternalPage::<8>::decode(&data).unwrap(), page);
    }

    #[test]
    fn test_min_size() {
        assert_eq!(InternalPage::<8>::new(PageId::new(0), INVALID_PAGE_ID, 3).min_size(), 1);
        assert_eq!(InternalPage::<8>::new(PageId::new(0), INVALID_PAGE_ID, 4).min_size(), 1);
        assert_eq!(InternalPage::<8>::new(PageId::new(0), INVALID_PAGE_ID, 5).min_size(), 2);
    }
}
