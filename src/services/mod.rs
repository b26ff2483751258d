pub mod sync_manager;

pub use sync_manager::{RepairStrategy, SyncManager};
