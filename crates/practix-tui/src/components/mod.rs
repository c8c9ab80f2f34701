pub mod category_tree;
pub mod search_bar;
pub mod virtual_list;

pub use category_tree::CategoryTree;
pub use search_bar::{highlight_matches, SearchBar};
pub use virtual_list::{RowKey, VirtualList};
