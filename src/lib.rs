//! Quarry - a page-addressed storage engine with a disk-backed B+ tree index
//!
//! A single database file is divided into fixed-size pages. The layers are:
//!
//! - **Storage** (`storage`): page I/O and allocation
//!   - `DiskManager`: maps logical page ids onto extents, each tracked by a
//!     bitmap page, and reads/writes pages
//!   - `IndexRootsPage`: directory from index id to root page id
//!
//! - **Buffer Pool** (`buffer`): caches pages in a fixed set of frames
//!   - `BufferPoolManager`: pin counting, LRU eviction and dirty write-back
//!   - `ReadPageGuard`/`WritePageGuard`: RAII guards that unpin on drop
//!
//! - **Index** (`index`): B+ tree over fixed-width keys mapping to `RecordId`s
//!
//! - **Engine** (`engine`): owns the above for one file
//!
//! # Example
//!
//! ```rust,no_run
//! use quarry::index::{GenericKey, IntegerComparator};
//! use quarry::{IndexId, PageId, RecordId, SlotId, StorageConfig, StorageEngine};
//!
//! let engine = StorageEngine::open(StorageConfig::new("quarry.db")).unwrap();
//! let mut index = engine
//!     .open_index::<8, _>(IndexId::new(1), IntegerComparator, 32, 32)
//!     .unwrap();
//!
//! let rid = RecordId::new(PageId::new(10), SlotId::new(3));
//! index.insert(GenericKey::from_u32(42), rid).unwrap();
//! assert_eq!(index.get_value(&GenericKey::from_u32(42)).unwrap(), Some(rid));
//!
//! engine.flush().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod engine;
pub mod index;
pub mod storage;

pub use common::{IndexId, PageId, QuarryError, RecordId, Result, SlotId, StorageConfig};
pub use engine::StorageEngine;
