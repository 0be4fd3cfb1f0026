use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{BoardId, GroupBy, GroupId, Task, TaskId};

/// Payload of a drag-drop reorder.
///
/// `from_index` and `to_index` are sort orders, not positions: the dragged
/// task's order and the order of the destination neighbour it was dropped on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortOrderChange {
    pub template_id: BoardId,
    pub from_index: i64,
    pub to_index: i64,
    pub to_last_index: bool,
    pub from_group: GroupId,
    pub to_group: GroupId,
    pub group_by: GroupBy,
    pub task: Task,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

/// Outbound operations. The tag doubles as the name of the echo event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncCommand {
    NameChange {
        task_id: TaskId,
        name: String,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    StatusChange {
        task_id: TaskId,
        status_id: GroupId,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    PriorityChange {
        task_id: TaskId,
        priority_id: GroupId,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    PhaseChange {
        task_id: TaskId,
        /// `None` clears the phase.
        phase_id: Option<GroupId>,
    },
    SortOrderChange(SortOrderChange),
    LabelChange {
        task_id: TaskId,
        label_id: String,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    DescriptionChange {
        task_id: TaskId,
        description: String,
    },
    TimeEstimationChange {
        task_id: TaskId,
        total_hours: u32,
        total_minutes: u32,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    StartDateChange {
        task_id: TaskId,
        start_date: Option<DateTime<Utc>>,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
    EndDateChange {
        task_id: TaskId,
        end_date: Option<DateTime<Utc>>,
        #[serde(default)]
        parent_task: Option<TaskId>,
    },
}

impl SyncCommand {
    pub fn name(&self) -> &'static str {
        match self {
            SyncCommand::NameChange { .. } => "name-change",
            SyncCommand::StatusChange { .. } => "status-change",
            SyncCommand::PriorityChange { .. } => "priority-change",
            SyncCommand::PhaseChange { .. } => "phase-change",
            SyncCommand::SortOrderChange(_) => "sort-order-change",
            SyncCommand::LabelChange { .. } => "label-change",
            SyncCommand::DescriptionChange { .. } => "description-change",
            SyncCommand::TimeEstimationChange { .. } => "time-estimation-change",
            SyncCommand::StartDateChange { .. } => "start-date-change",
            SyncCommand::EndDateChange { .. } => "end-date-change",
        }
    }

    pub fn task_id(&self) -> &TaskId {
        match self {
            SyncCommand::SortOrderChange(change) => &change.task.id,
            SyncCommand::NameChange { task_id, .. }
            | SyncCommand::StatusChange { task_id, .. }
            | SyncCommand::PriorityChange { task_id, .. }
            | SyncCommand::PhaseChange { task_id, .. }
            | SyncCommand::LabelChange { task_id, .. }
            | SyncCommand::DescriptionChange { task_id, .. }
            | SyncCommand::TimeEstimationChange { task_id, .. }
            | SyncCommand::StartDateChange { task_id, .. }
            | SyncCommand::EndDateChange { task_id, .. } => task_id,
        }
    }
}

/// A command addressed to one board, tagged for matching its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub correlation_id: String,
    pub board_id: BoardId,
    pub command: SyncCommand,
}

impl CommandEnvelope {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_is_tagged_by_operation_name() {
        let envelope = CommandEnvelope {
            correlation_id: "c-1".to_string(),
            board_id: "board".to_string(),
            command: SyncCommand::StatusChange {
                task_id: "T1".to_string(),
                status_id: "S2".to_string(),
                parent_task: None,
            },
        };

        let json: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

        assert_eq!(json["correlation_id"], "c-1");
        assert_eq!(json["command"]["status-change"]["status_id"], "S2");
        assert_eq!(envelope.command.name(), "status-change");
    }

    #[test]
    fn sort_order_change_task_id_comes_from_task() {
        let command = SyncCommand::SortOrderChange(SortOrderChange {
            template_id: "board".to_string(),
            from_index: 3,
            to_index: -1,
            to_last_index: true,
            from_group: "A".to_string(),
            to_group: "B".to_string(),
            group_by: GroupBy::Status,
            task: Task::new("T9", "drag me"),
            team_id: None,
        });

        assert_eq!(command.task_id(), "T9");
        let json = serde_json::to_value(&command).unwrap();
        assert_eq!(json["sort-order-change"]["group_by"], "status");
        assert!(json["sort-order-change"].get("team_id").is_none());
    }
}
