mod color;
mod group;
mod grouping;
mod task;

pub use color::normalize_color;
pub use group::{BoardSnapshot, Group, SnapshotGroup};
pub use grouping::{GroupBy, UNMAPPED_GROUP_ID};
pub use task::{format_time_estimate, FieldValue, Label, StatusCategory, Task};

/// Opaque task identifier.
pub type TaskId = String;

/// Opaque group identifier (a status, priority or phase id).
pub type GroupId = String;

/// Board (project or template) a session is bound to.
pub type BoardId = String;
