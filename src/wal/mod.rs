pub mod log;
pub mod snapshot;

pub use log::{LogEntry, Operation, Wal};
pub use snapshot::{Snapshot, SnapshotManager, SnapshotMetadata};
