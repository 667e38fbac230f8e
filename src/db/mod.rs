//! Database collaborators: handle registry and scheduled-update queue

pub mod registry;
pub mod update_queue;

pub use registry::{absolute, DbHandle, DbManager, DbRegistry, DB_FILES};
pub use update_queue::UpdateQueue;
