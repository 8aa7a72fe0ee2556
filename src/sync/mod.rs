//! Deduplicator engines: cursor sync and metadata sync.

mod engine;
mod metadata;

pub use engine::{run_table_sync, run_table_sync_serial, sync_once, SyncCycle, SyncTable};
pub use metadata::run_metadata_sync;
