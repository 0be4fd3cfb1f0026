use serde::{Deserialize, Serialize};

use crate::models::{BoardId, BoardSnapshot, GroupBy, Task, TaskId};

use super::channel::SyncError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub board_id: BoardId,
    pub group_by: GroupBy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default)]
    pub include_subtasks: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtaskQuery {
    pub parent_task: TaskId,
    /// 1-based.
    pub page: usize,
    pub size: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubtaskPage {
    pub items: Vec<Task>,
    /// Total number of sub-tasks across all pages.
    pub total: usize,
}

/// Initial grouped fetch of a board.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn fetch_groups(&self, query: &SnapshotQuery) -> Result<BoardSnapshot, SyncError>;
}

/// Paginated fetch of one parent's sub-tasks.
#[async_trait::async_trait]
pub trait SubtaskSource: Send + Sync {
    async fn fetch_page(&self, query: &SubtaskQuery) -> Result<SubtaskPage, SyncError>;
}
