mod bitmap_page;
mod disk_manager;
mod meta_page;

pub use bitmap_page::BitmapPage;
pub use disk_manager::DiskManager;
pub use meta_page::DiskFileMetaPage;
