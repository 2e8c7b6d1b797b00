mod index_roots_page;

pub use index_roots_page::{IndexRootsPage, MAX_INDEX_ROOTS};
