mod config;
mod error;
mod types;

pub use config::*;
pub use error::{QuarryError, Result};
pub use types::{FrameId, IndexId, PageId, RecordId, SlotId};
