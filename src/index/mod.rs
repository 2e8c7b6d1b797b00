pub mod btree_index;
pub mod btree_iterator;
pub mod btree_page;
pub mod internal_page;
pub mod key_comparator;
pub mod leaf_page;

pub use btree_index::BPlusTree;
pub use btree_iterator::IndexIterator;
pub use btree_page::{BTreePageLayout, IndexPageType, TreePage};
pub use internal_page::InternalPage;
pub use key_comparator::{BytewiseComparator, GenericKey, IntegerComparator, KeyComparator};
pub use leaf_page::LeafPage;
