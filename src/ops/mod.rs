pub mod cascade;
pub mod check;
pub mod merge;
pub mod todo_ops;
pub mod tree_ops;
