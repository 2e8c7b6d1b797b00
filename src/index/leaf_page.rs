use std::cmp::Ordering;

use bytes::{Buf, BufMut};

use crate::common::{PageId, RecordId, Result, SlotId, INVALID_PAGE_ID, PAGE_SIZE};

use super::btree_page::{check_capacity, BTreePageLayout, IndexPageType, PageHeader, LEAF_HEADER_SIZE};
use super::key_comparator::{GenericKey, KeyComparator};

const VALUE_SIZE: usize = 6; // RecordId: PageId(4) + SlotId(2)

/// Leaf node: sorted, unique `(key, record id)` pairs plus a link to the
/// right sibling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPage<const N: usize> {
    page_id: PageId,
    parent_page_id: PageId,
    next_page_id: PageId,
    max_size: u32,
    entries: Vec<(GenericKey<N>, RecordId)>,
}

impl<const N: usize> LeafPage<N> {
    pub fn new(page_id: PageId, parent_page_id: PageId, max_size: u32) -> Self {
        Self {
            page_id,
            parent_page_id,
            next_page_id: INVALID_PAGE_ID,
            max_size,
            entries: Vec::with_capacity(max_size as usize),
        }
    }

    /// Number of entries that fit in one page for key width `N`.
    pub fn capacity() -> usize {
        (PAGE_SIZE - LEAF_HEADER_SIZE) / (N + VALUE_SIZE)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut buf = data;
        let header = PageHeader::read(&mut buf)?;
        let next_page_id = PageId::new(buf.get_u32_le());
        check_capacity(header.size, header.max_size, Self::capacity(), header.page_id)?;

        let mut entries = Vec::with_capacity(header.max_size as usize);
        for _ in 0..header.size {
            let key = GenericKey::from_bytes(&buf[..N]);
            buf.advance(N);
            let page_id = PageId::new(buf.get_u32_le());
            let slot_id = SlotId::new(buf.get_u16_le());
            entries.push((key, RecordId::new(page_id, slot_id)));
        }

        Ok(Self {
            page_id: header.page_id,
            parent_page_id: header.parent_page_id,
            next_page_id,
            max_size: header.max_size,
            entries,
        })
    }

    pub fn parent_page_id(&self) -> PageId {
        self.parent_page_id
    }

    pub fn next_page_id(&self) -> PageId {
        self.next_page_id
    }

    pub fn set_next_page_id(&mut self, next_page_id: PageId) {
        self.next_page_id = next_page_id;
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn max_size(&self) -> usize {
        self.max_size as usize
    }

    pub fn min_size(&self) -> usize {
        self.max_size as usize / 2
    }

    pub fn key_at(&self, index: usize) -> GenericKey<N> {
        self.entries[index].0
    }

    pub fn value_at(&self, index: usize) -> RecordId {
        self.entries[index].1
    }

    pub fn entry_at(&self, index: usize) -> (GenericKey<N>, RecordId) {
        self.entries[index]
    }

    pub fn entries(&self) -> &[(GenericKey<N>, RecordId)] {
        &self.entries
    }

    /// First slot whose key is `>= key`; `size()` if every key is smaller.
    pub fn key_index<C: KeyComparator>(&self, key: &GenericKey<N>, comparator: &C) -> usize {
        self.entries
            .partition_point(|(k, _)| comparator.compare(k.as_bytes(), key.as_bytes()) == Ordering::Less)
    }

    pub fn lookup<C: KeyComparator>(&self, key: &GenericKey<N>, comparator: &C) -> Option<RecordId> {
        let index = self.key_index(key, comparator);
        self.entries
            .get(index)
            .filter(|(k, _)| comparator.compare(k.as_bytes(), key.as_bytes()) == Ordering::Equal)
            .map(|(_, value)| *value)
    }

    /// Inserts in key order. Returns false if the key is already present.
    /// The caller splits full pages first.
    pub fn insert<C: KeyComparator>(&mut self, key: GenericKey<N>, value: RecordId, comparator: &C) -> bool {
        let index = self.key_index(&key, comparator);
        if let Some((existing, _)) = self.entries.get(index) {
            if comparator.compare(existing.as_bytes(), key.as_bytes()) == Ordering::Equal {
                return false;
            }
        }
        self.insert_entry(index, key, value);
        true
    }

    pub(crate) fn insert_entry(&mut self, index: usize, key: GenericKey<N>, value: RecordId) {
        self.entries.insert(index, (key, value));
    }

    /// Removes `key` and returns the slot it occupied.
    pub fn remove<C: KeyComparator>(&mut self, key: &GenericKey<N>, comparator: &C) -> Option<usize> {
        let index = self.key_index(key, comparator);
        match self.entries.get(index) {
            Some((existing, _)) if comparator.compare(existing.as_bytes(), key.as_bytes()) == Ordering::Equal => {
                self.entries.remove(index);
                Some(index)
            }
            _ => None,
        }
    }

    /// Moves the upper `ceil(size / 2)` entries into the freshly created
    /// right sibling and threads it into the leaf chain.
    pub fn move_half_to(&mut self, recipient: &mut LeafPage<N>) {
        let keep = self.entries.len() / 2;
        recipient.entries.extend(self.entries.drain(keep..));
        recipient.next_page_id = self.next_page_id;
        self.next_page_id = recipient.page_id;
    }

    /// Appends every entry to the left sibling and unlinks this page.
    pub fn move_all_to(&mut self, recipient: &mut LeafPage<N>) {
        recipient.entries.append(&mut self.entries);
        recipient.next_page_id = self.next_page_id;
    }

    /// Moves this page's first entry to the end of its left neighbour.
    pub fn move_first_to_end_of(&mut self, recipient: &mut LeafPage<N>) {
        if !self.entries.is_empty() {
            recipient.entries.push(self.entries.remove(0));
        }
    }

    /// Moves this page's last entry to the front of its right neighbour.
    pub fn move_last_to_front_of(&mut self, recipient: &mut LeafPage<N>) {
        if let Some(entry) = self.entries.pop() {
            recipient.entries.insert(0, entry);
        }
    }
}

impl<const N: usize> BTreePageLayout for LeafPage<N> {
    fn page_id(&self) -> PageId {
        self.page_id
    }

    fn encode(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        data.fill(0);
        let mut buf = data;
        PageHeader {
            page_type: IndexPageType::Leaf,
            size: self.entries.len() as u32,
            max_size: self.max_size,
            parent_page_id: self.parent_page_id,
            page_id: self.page_id,
        }
        .write(&mut buf);
        buf.put_u32_le(self.next_page_id.as_u32());

        for (key, value) in &self.entries {
            buf.put_slice(key.as_bytes());
            buf.put_u32_le(value.page_id.as_u32());
            buf.put_u16_le(value.slot_id.as_u16());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IntegerComparator;

    fn rid(n: u32) -> RecordId {
        RecordId::new(PageId::new(n), SlotId::new(n as u16))
    }

    fn leaf_with(keys: &[u32]) -> LeafPage<8> {
        let mut leaf = LeafPage::new(PageId::new(2), INVALID_PAGE_ID, 8);
        for &k in keys {
            assert!(leaf.insert(GenericKey::from_u32(k), rid(k), &IntegerComparator));
        }
        leaf
    }

    fn keys(leaf: &LeafPage<8>) -> Vec<u32> {
        leaf.entries().iter().map(|(k, _)| k.as_u32()).collect()
    }

    #[test]
    fn test_sorted_unique_insert() {
        let mut leaf = leaf_with(&[5, 3, 8, 1]);
        assert_eq!(keys(&leaf), vec![1, 3, 5, 8]);
        assert!(!leaf.insert(GenericKey::from_u32(3), rid(99), &IntegerComparator));
        assert_eq!(leaf.lookup(&GenericKey::from_u32(3), &IntegerComparator), Some(rid(3)));
        assert_eq!(leaf.lookup(&GenericKey::from_u32(4), &IntegerComparator), None);
    }

    #[test]
    fn test_remove_reports_slot() {
        let mut leaf = leaf_with(&[1, 2, 3]);
        assert_eq!(leaf.remove(&GenericKey::from_u32(1), &IntegerComparator), Some(0));
        assert_eq!(leaf.remove(&GenericKey::from_u32(1), &IntegerComparator), None);
        assert_eq!(keys(&leaf), vec![2, 3]);
    }

    #[test]
    fn test_move_half_links_sibling() {
        let mut leaf = leaf_with(&[1, 2, 3, 4, 5]);
        leaf.set_next_page_id(PageId::new(40));
        let mut sibling = LeafPage::new(PageId::new(7), INVALID_PAGE_ID, 8);

        leaf.move_half_to(&mut sibling);
        assert_eq!(keys(&leaf), vec![1, 2]);
        assert_eq!(keys(&sibling), vec![3, 4, 5]);
        assert_eq!(leaf.next_page_id(), PageId::new(7));
        assert_eq!(sibling.next_page_id(), PageId::new(40));
    }

    #[test]
    fn test_redistribute_primitives() {
        let mut left = leaf_with(&[1, 2]);
        let mut right = leaf_with(&[5, 6, 7]);

        right.move_first_to_end_of(&mut left);
        assert_eq!(keys(&left), vec![1, 2, 5]);
        assert_eq!(keys(&right), vec![6, 7]);

        left.move_last_to_front_of(&mut right);
        assert_eq!(keys(&left), vec![1, 2]);
        assert_eq!(keys(&right), vec![5, 6, 7]);
    }

    #[test]
    fn test_encode_decode() {
        let mut leaf = LeafPage::new(PageId::new(2), PageId::new(1), 8);
        for k in [10, 20, 30] {
            assert!(leaf.insert(GenericKey::from_u32(k), rid(k), &IntegerComparator));
        }
        leaf.set_next_page_id(PageId::new(9));

        let mut data = [0xffu8; PAGE_SIZE];
        leaf.encode(&mut data);
        assert_eq!(LeafPage::<8>::decode(&data).unwrap(), leaf);
    }

    #[test]
    fn test_capacity() {
        assert_eq!(LeafPage::<8>::capacity(), (PAGE_SIZE - 24) / 14);
        assert_eq!(LeafPage::<4>::capacity(), (PAGE_SIZE - 24) / 10);
    }
}
