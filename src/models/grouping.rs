use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::task::Task;
use super::GroupId;

/// Group id used for tasks without a phase when grouping by phase.
pub const UNMAPPED_GROUP_ID: &str = "Unmapped";

/// Which task field decides group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    Status,
    Priority,
    Phase,
}

impl GroupBy {
    pub fn all() -> [GroupBy; 3] {
        [GroupBy::Status, GroupBy::Priority, GroupBy::Phase]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupBy::Status => "status",
            GroupBy::Priority => "priority",
            GroupBy::Phase => "phase",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GroupBy::Status => "Status",
            GroupBy::Priority => "Priority",
            GroupBy::Phase => "Phase",
        }
    }

    /// Target group of `task` under this dimension.
    ///
    /// Phase-less tasks land in [`UNMAPPED_GROUP_ID`]; a task missing its
    /// status or priority has no target.
    pub fn group_id_for(&self, task: &Task) -> Option<GroupId> {
        match self {
            GroupBy::Status => task.status.as_ref().map(|s| s.id.clone()),
            GroupBy::Priority => task.priority.as_ref().map(|p| p.id.clone()),
            GroupBy::Phase => Some(
                task.phase
                    .as_ref()
                    .map(|p| p.id.clone())
                    .unwrap_or_else(|| UNMAPPED_GROUP_ID.to_string()),
            ),
        }
    }
}

impl std::fmt::Display for GroupBy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        GroupBy::all()
            .into_iter()
            .find(|g| g.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown grouping dimension: {s}"))
    }
}
