use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BoardId, GroupId, Label, StatusCategory, Task, TaskId};

/// Reason attached to server refusals caused by the dependency guard.
pub const DEPENDENCIES_INCOMPLETE: &str = "task dependencies are not completed";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrderUpdate {
    pub id: TaskId,
    pub sort_order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Body of a `sort-order-change` broadcast: either the new orders of the
/// board, or a refusal from the dependency guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortOrderEcho {
    Updates(Vec<SortOrderUpdate>),
    Refused { completed_deps: bool },
}

/// Inbound broadcasts, tagged like [`SyncCommand`](super::SyncCommand).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncEvent {
    NameChange {
        id: TaskId,
        #[serde(default)]
        parent_task: Option<TaskId>,
        name: String,
    },
    StatusChange {
        id: TaskId,
        status_id: GroupId,
        #[serde(default)]
        color_code: String,
        #[serde(default, alias = "statusCategory")]
        status_category: Option<StatusCategory>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        completed_deps: Option<bool>,
    },
    PriorityChange {
        id: TaskId,
        priority_id: GroupId,
        #[serde(default)]
        color_code: String,
    },
    PhaseChange {
        task_id: TaskId,
        /// `None` when the phase was cleared.
        #[serde(default, rename = "id")]
        phase_id: Option<GroupId>,
        #[serde(default)]
        color_code: String,
    },
    SortOrderChange(SortOrderEcho),
    LabelChange {
        id: TaskId,
        #[serde(default)]
        labels: Vec<Label>,
        #[serde(default)]
        all_labels: Vec<Label>,
        #[serde(default)]
        new_label: Option<Label>,
        #[serde(default)]
        is_new: Option<bool>,
    },
    DescriptionChange {
        id: TaskId,
        #[serde(default)]
        description: Option<String>,
    },
    TimeEstimationChange {
        id: TaskId,
        #[serde(default)]
        total_hours: Option<u32>,
        #[serde(default)]
        total_minutes: Option<u32>,
        total_time_string: String,
    },
    StartDateChange {
        id: TaskId,
        #[serde(default)]
        parent_task: Option<TaskId>,
        #[serde(default)]
        start_date: Option<DateTime<Utc>>,
    },
    EndDateChange {
        id: TaskId,
        #[serde(default)]
        parent_task: Option<TaskId>,
        #[serde(default)]
        end_date: Option<DateTime<Utc>>,
    },
    TaskCreated(Task),
    TaskDeleted {
        id: TaskId,
    },
    TasksBulkDeleted {
        ids: Vec<TaskId>,
    },
    TasksBulkArchived {
        ids: Vec<TaskId>,
    },
    Rejected {
        reason: String,
    },
}

impl SyncEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::NameChange { .. } => "name-change",
            SyncEvent::StatusChange { .. } => "status-change",
            SyncEvent::PriorityChange { .. } => "priority-change",
            SyncEvent::PhaseChange { .. } => "phase-change",
            SyncEvent::SortOrderChange(_) => "sort-order-change",
            SyncEvent::LabelChange { .. } => "label-change",
            SyncEvent::DescriptionChange { .. } => "description-change",
            SyncEvent::TimeEstimationChange { .. } => "time-estimation-change",
            SyncEvent::StartDateChange { .. } => "start-date-change",
            SyncEvent::EndDateChange { .. } => "end-date-change",
            SyncEvent::TaskCreated(_) => "task-created",
            SyncEvent::TaskDeleted { .. } => "task-deleted",
            SyncEvent::TasksBulkDeleted { .. } => "tasks-bulk-deleted",
            SyncEvent::TasksBulkArchived { .. } => "tasks-bulk-archived",
            SyncEvent::Rejected { .. } => "rejected",
        }
    }

    /// The refusal reason when this broadcast means the server turned the
    /// originating command down.
    pub fn rejection(&self) -> Option<&str> {
        match self {
            SyncEvent::Rejected { reason } => Some(reason),
            SyncEvent::StatusChange {
                completed_deps: Some(false),
                ..
            }
            | SyncEvent::SortOrderChange(SortOrderEcho::Refused {
                completed_deps: false,
            }) => Some(DEPENDENCIES_INCOMPLETE),
            _ => None,
        }
    }
}

/// An inbound broadcast for one board. `correlation_id` is set when the
/// broadcast answers a command this client sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    pub board_id: BoardId,
    pub event: SyncEvent,
}

impl EventEnvelope {
    pub fn broadcast(board_id: impl Into<BoardId>, event: SyncEvent) -> Self {
        Self {
            correlation_id: None,
            board_id: board_id.into(),
            event,
        }
    }

    pub fn reply(
        correlation_id: impl Into<String>,
        board_id: impl Into<BoardId>,
        event: SyncEvent,
    ) -> Self {
        Self {
            correlation_id: Some(correlation_id.into()),
            board_id: board_id.into(),
            event,
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}
