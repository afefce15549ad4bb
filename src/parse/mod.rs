pub mod summary;
pub mod tree_json;

pub use summary::{export_tree_text, format_tree};
pub use tree_json::{parse_tree, serialize_tree, tree_from_value};
