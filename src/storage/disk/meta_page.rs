use bytes::{Buf, BufMut};

use crate::common::{MAX_EXTENTS, PAGE_SIZE};

/// In-memory copy of physical page 0, the disk file's header.
///
/// | Field               | Offset | Size            |
/// |---------------------|--------|-----------------|
/// | num_allocated_pages | 0      | 4               |
/// | num_extents         | 4      | 4               |
/// | extent_size         | 8      | 4               |
/// | extent_used_pages   | 12     | 4 * MAX_EXTENTS |
///
/// An all-zero page decodes to a fresh file with `extent_size == 0`,
/// which the disk manager fills in on first open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskFileMetaPage {
    num_allocated_pages: u32,
    num_extents: u32,
    extent_size: u32,
    extent_used_pages: Vec<u32>,
}

impl DiskFileMetaPage {
    pub fn new(extent_size: u32) -> Self {
        Self {
            num_allocated_pages: 0,
            num_extents: 0,
            extent_size,
            extent_used_pages: vec![0; MAX_EXTENTS as usize],
        }
    }

    pub fn decode(data: &[u8]) -> Self {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut buf = data;
        let num_allocated_pages = buf.get_u32_le();
        let num_extents = buf.get_u32_le();
        let extent_size = buf.get_u32_le();
        let extent_used_pages = (0..MAX_EXTENTS).map(|_| buf.get_u32_le()).collect();

        Self {
            num_allocated_pages,
            num_extents,
            extent_size,
            extent_used_pages,
        }
    }

    pub fn encode(&self, data: &mut [u8]) {
        assert_eq!(data.len(), PAGE_SIZE);
        let mut buf = data;
        buf.put_u32_le(self.num_allocated_pages);
        buf.put_u32_le(self.num_extents);
        buf.put_u32_le(self.extent_size);
        for used in &self.extent_used_pages {
            buf.put_u32_le(*used);
        }
    }

    /// True for a file that has never been initialized.
    pub fn is_fresh(&self) -> bool {
        self.extent_size == 0 && self.num_allocated_pages == 0 && self.num_extents == 0
    }

    pub fn num_allocated_pages(&self) -> u32 {
        self.num_allocated_pages
    }

    pub fn num_extents(&self) -> u32 {
        self.num_extents
    }

    pub fn extent_size(&self) -> u32 {
        self.extent_size
    }

    pub fn extent_used_pages(&self, extent: u32) -> u32 {
        self.extent_used_pages
            .get(extent as usize)
            .copied()
            .unwrap_or(0)
    }

    /// First extent with a free slot, or `num_extents` if every extent is full.
    pub fn first_open_extent(&self) -> u32 {
        (0..self.num_extents)
            .find(|&e| self.extent_used_pages(e) < self.extent_size)
            .unwrap_or(self.num_extents)
    }

    pub(crate) fn record_allocation(&mut self, extent: u32) {
        if extent >= self.num_extents {
            self.num_extents = extent + 1;
        }
        self.extent_used_pages[extent as usize] += 1;
        self.num_allocated_pages += 1;
    }

    pub(crate) fn record_deallocation(&mut self, extent: u32) {
        self.extent_used_pages[extent as usize] -= 1;
        self.num_allocated_pages -= 1;
        while self.num_extents > 0 && self.extent_used_pages(self.num_extents - 1) == 0 {
            self.num_extents -= 1;
        }
    }
}
