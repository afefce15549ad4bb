pub mod config;
pub mod identity;
pub mod saved;
pub mod todo;
pub mod tree;

pub use config::*;
pub use identity::*;
pub use saved::*;
pub use todo::*;
pub use tree::*;
