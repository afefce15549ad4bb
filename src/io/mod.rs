pub mod completion;
pub mod config_io;
pub mod lock;
pub mod recovery;
pub mod saved_io;
pub mod store;
pub mod workspace;
