//! Multi-device synchronization: merge policy, engine, and scheduling

mod engine;
mod merge;
mod scheduler;

pub use engine::{
    EngineStatus, FarmLink, SyncEngine, SyncOutcome, SyncState, UPLOAD_BATCH_SIZE,
};
pub use merge::{
    merge_by_timestamp, merge_usage, partition_rows, rows_for_upload, PulledData, Replicated,
};
pub use scheduler::{SyncScheduler, DEFAULT_SYNC_INTERVAL};
