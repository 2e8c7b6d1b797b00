use bytes::{Buf, BufMut};

use crate::common::{BITMAP_HEADER_SIZE, BITMAP_SIZE, PAGE_SIZE};

/// Bitmap page header layout:
///
/// | Field           | Offset | Size |
/// |-----------------|--------|------|
/// | allocated_count | 0      | 4    |
/// | next_free_page  | 4      | 4    |
/// | bitmap bytes    | 8      | rest |
const ALLOCATED_COUNT_OFFSET: usize = 0;
const NEXT_FREE_PAGE_OFFSET: usize = 4;

/// Allocation bitmap for one extent. Bit `i` is set while page `i` of the
/// extent is allocated. A zero-filled page is an empty extent.
pub struct BitmapPage<'a> {
    data: &'a mut [u8],
    max_pages: u32,
}

impl<'a> BitmapPage<'a> {
    /// Creates a bitmap view tracking the first `max_pages` bits of `data`.
    pub fn new(data: &'a mut [u8], max_pages: u32) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        assert!(max_pages > 0 && max_pages <= BITMAP_SIZE);
        Self { data, max_pages }
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn allocated_count(&self) -> u32 {
        (&self.data[ALLOCATED_COUNT_OFFSET..]).get_u32_le()
    }

    fn set_allocated_count(&mut self, count: u32) {
        (&mut self.data[ALLOCATED_COUNT_OFFSET..]).put_u32_le(count);
    }

    /// Offset the next allocation will try first.
    pub fn next_free_hint(&self) -> u32 {
        (&self.data[NEXT_FREE_PAGE_OFFSET..]).get_u32_le()
    }

    fn set_next_free_hint(&mut self, offset: u32) {
        (&mut self.data[NEXT_FREE_PAGE_OFFSET..]).put_u32_le(offset);
    }

    /// Claims the lowest-numbered free page at or after the hint and returns
    /// its offset, or `None` when the extent is full.
    pub fn allocate_page(&mut self) -> Option<u32> {
        if self.allocated_count() >= self.max_pages {
            return None;
        }

        let hint = self.next_free_hint();
        let offset = if hint < self.max_pages && self.is_page_free(hint) {
            hint
        } else {
            self.find_free_from(0)?
        };

        self.set_bit(offset, true);
        self.set_allocated_count(self.allocated_count() + 1);

        let next = self.find_free_from(offset + 1).unwrap_or(self.max_pages);
        self.set_next_free_hint(next);

        Some(offset)
    }

    /// Releases the page at `offset`. Returns `false` if it was not allocated.
    pub fn deallocate_page(&mut self, offset: u32) -> bool {
        if offset >= self.max_pages || self.is_page_free(offset) {
            return false;
        }

        self.set_bit(offset, false);
        self.set_allocated_count(self.allocated_count() - 1);
        if offset < self.next_free_hint() {
            self.set_next_free_hint(offset);
        }
        true
    }

    pub fn is_page_free(&self, offset: u32) -> bool {
        if offset >= self.max_pages {
            return true;
        }
        let (byte, bit) = Self::locate(offset);
        self.data[byte] & (1 << bit) == 0
    }

    fn find_free_from(&self, start: u32) -> Option<u32> {
        (start..self.max_pages).find(|&offset| self.is_page_free(offset))
    }

    fn set_bit(&mut self, offset: u32, allocated: bool) {
        let (byte, bit) = Self::locate(offset);
        if allocated {
            self.data[byte] |= 1 << bit;
        } else {
            self.data[byte] &= !(1 << bit);
        }
    }

    fn locate(offset: u32) -> (usize, u32) {
        (BITMAP_HEADER_SIZE + (offset / 8) as usize, offset % 8)
    }
}
