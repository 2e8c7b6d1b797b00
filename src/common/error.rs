use thiserror::Error;

use super::types::{IndexId, PageId};

/// Storage engine error types
#[derive(Error, Debug)]
pub enum QuarryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Disk is full: at most {max_pages} pages can be allocated")]
    OutOfSpace { max_pages: u32 },

    #[error("Invalid page ID: {0}")]
    InvalidPageId(PageId),

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Page {0} is still pinned")]
    PageStillPinned(PageId),

    #[error("Invalid database file: {0}")]
    InvalidDatabaseFile(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Index roots page is full, cannot register {0}")]
    IndexRootsFull(IndexId),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

pub type Result<T> = std::result::Result<T, QuarryError>;
