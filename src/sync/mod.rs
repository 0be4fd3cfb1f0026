mod channel;
mod command;
mod event;
mod memory;
mod source;

pub use channel::{CommandOutcome, SyncChannel, SyncError};
pub use command::{CommandEnvelope, SortOrderChange, SyncCommand};
pub use event::{EventEnvelope, SortOrderEcho, SortOrderUpdate, SyncEvent, DEPENDENCIES_INCOMPLETE};
pub use memory::{regroup_snapshot, MemoryChannel, StaticSnapshotSource, StaticSubtaskSource};
pub use source::{SnapshotQuery, SnapshotSource, SubtaskPage, SubtaskQuery, SubtaskSource};
