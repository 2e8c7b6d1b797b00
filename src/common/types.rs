use std::fmt;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u32);

        impl $name {
            pub fn new(id: u32) -> Self {
                Self(id)
            }

            pub fn as_u32(&self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

define_id!(
    /// Logical page number. Stable across evictions; the disk manager maps
    /// it to a file offset.
    PageId
);

define_id!(
    /// Slot in the buffer pool's frame array.
    FrameId
);

define_id!(
    /// Key of an entry in the index roots directory.
    IndexId
);

impl PageId {
    /// `false` only for `INVALID_PAGE_ID`.
    pub fn is_valid(&self) -> bool {
        self.0 != u32::MAX
    }
}

impl FrameId {
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// Position of a record within its heap page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(pub u16);

impl SlotId {
    pub fn new(id: u16) -> Self {
        Self(id)
    }

    pub fn as_u16(&self) -> u16 {
        self.0
    }
}

/// Address of a record; the value half of every leaf entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot_id: SlotId,
}

impl RecordId {
    pub fn new(page_id: PageId, slot_id: SlotId) -> Self {
        Self { page_id, slot_id }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_display_with_type_name() {
        assert_eq!(PageId::new(7).to_string(), "PageId(7)");
        assert_eq!(FrameId::new(0).to_string(), "FrameId(0)");
        assert_eq!(IndexId::new(3).to_string(), "IndexId(3)");
    }

    #[test]
    fn test_invalid_page_id() {
        assert!(PageId::new(0).is_valid());
        assert!(!PageId::new(u32::MAX).is_valid());
    }
}
