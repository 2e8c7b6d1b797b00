use std::cmp::Ordering;
use std::fmt;

/// Fixed-width index key. Shorter inputs are zero-padded, longer ones are
/// truncated to `N` bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenericKey<const N: usize> {
    data: [u8; N],
}

impl<const N: usize> GenericKey<N> {
    pub const SIZE: usize = N;

    pub fn new(data: [u8; N]) -> Self {
        Self { data }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; N];
        let len = bytes.len().min(N);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Encodes `value` little-endian in the leading bytes, the layout
    /// [`IntegerComparator`] reads.
    pub fn from_u32(value: u32) -> Self {
        Self::from_bytes(&value.to_le_bytes())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Reads back a key built by [`GenericKey::from_u32`].
    pub fn as_u32(&self) -> u32 {
        let mut buf = [0u8; 4];
        let len = N.min(4);
        buf[..len].copy_from_slice(&self.data[..len]);
        u32::from_le_bytes(buf)
    }
}

impl<const N: usize> Default for GenericKey<N> {
    fn default() -> Self {
        Self { data: [0u8; N] }
    }
}

impl<const N: usize> fmt::Debug for GenericKey<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GenericKey(")?;
        for byte in &self.data {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, ")")
    }
}

/// Total order over raw key bytes.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;

    /// Narrowest key width this comparator can order. Trees with narrower
    /// keys are rejected when opened.
    fn min_key_size(&self) -> usize {
        0
    }

    /// Human-readable rendering of a key, used by debug output.
    fn display(&self, key: &[u8]) -> String {
        key.iter().map(|b| format!("{:02x}", b)).collect()
    }
}

/// Orders keys by the little-endian `u32` in their first four bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerComparator;

impl IntegerComparator {
    fn read(key: &[u8]) -> Option<u32> {
        let bytes: [u8; 4] = key.get(..4)?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }
}

impl KeyComparator for IntegerComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        match (Self::read(a), Self::read(b)) {
            (Some(a_val), Some(b_val)) => a_val.cmp(&b_val),
            _ => a.len().cmp(&b.len()),
        }
    }

    fn min_key_size(&self) -> usize {
        4
    }

    fn display(&self, key: &[u8]) -> String {
        match Self::read(key) {
            Some(value) => value.to_string(),
            None => format!("{:?}", key),
        }
    }
}

/// Lexicographic byte order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl KeyComparator for BytewiseComparator {
    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }

    fn display(&self, key: &[u8]) -> String {
        let end = key.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        String::from_utf8_lossy(&key[..end]).into_owned()
    }
}
