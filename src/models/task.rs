use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{GroupBy, TaskId};

/// A colored value of one grouping field (a status, a priority or a phase).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub id: String,
    #[serde(default)]
    pub color_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl FieldValue {
    pub fn new(id: impl Into<String>, color_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            color_code: color_code.into(),
            name: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCategory {
    #[serde(default)]
    pub is_todo: bool,
    #[serde(default)]
    pub is_doing: bool,
    #[serde(default)]
    pub is_done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub color_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub status: Option<FieldValue>,
    #[serde(default)]
    pub status_category: Option<StatusCategory>,
    #[serde(default)]
    pub priority: Option<FieldValue>,
    #[serde(default)]
    pub phase: Option<FieldValue>,
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sort_order: i64,
    #[serde(default)]
    pub parent_task_id: Option<TaskId>,
    #[serde(default, alias = "sub_tasks_count")]
    pub sub_task_count: u32,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub total_hours: u32,
    #[serde(default)]
    pub total_minutes: u32,
    #[serde(default)]
    pub total_time_string: Option<String>,
    /// Whether the nested sub-task list is expanded in the view.
    #[serde(default, skip_serializing)]
    pub show_sub_tasks: bool,
    #[serde(default, skip_serializing)]
    pub sub_tasks_loading: bool,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: None,
            status_category: None,
            priority: None,
            phase: None,
            start_date: None,
            end_date: None,
            completed_at: None,
            sort_order: 0,
            parent_task_id: None,
            sub_task_count: 0,
            labels: Vec::new(),
            description: None,
            total_hours: 0,
            total_minutes: 0,
            total_time_string: None,
            show_sub_tasks: false,
            sub_tasks_loading: false,
        }
    }

    pub fn with_status(mut self, id: impl Into<String>, color: impl Into<String>) -> Self {
        self.status = Some(FieldValue::new(id, color));
        self
    }

    pub fn with_priority(mut self, id: impl Into<String>, color: impl Into<String>) -> Self {
        self.priority = Some(FieldValue::new(id, color));
        self
    }

    pub fn with_phase(mut self, id: impl Into<String>, color: impl Into<String>) -> Self {
        self.phase = Some(FieldValue::new(id, color));
        self
    }

    pub fn with_sort_order(mut self, sort_order: i64) -> Self {
        self.sort_order = sort_order;
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<TaskId>) -> Self {
        self.parent_task_id = Some(parent_id.into());
        self
    }

    pub fn with_sub_task_count(mut self, count: u32) -> Self {
        self.sub_task_count = count;
        self
    }

    pub fn is_sub_task(&self) -> bool {
        self.parent_task_id.is_some()
    }

    pub fn field(&self, group_by: GroupBy) -> Option<&FieldValue> {
        match group_by {
            GroupBy::Status => self.status.as_ref(),
            GroupBy::Priority => self.priority.as_ref(),
            GroupBy::Phase => self.phase.as_ref(),
        }
    }

    pub fn set_field(&mut self, group_by: GroupBy, value: Option<FieldValue>) {
        match group_by {
            GroupBy::Status => self.status = value,
            GroupBy::Priority => self.priority = value,
            GroupBy::Phase => self.phase = value,
        }
    }

    pub fn set_time_estimate(&mut self, hours: u32, minutes: u32) {
        let total = u64::from(hours) * 60 + u64::from(minutes);
        self.total_hours = u32::try_from(total / 60).unwrap_or(u32::MAX);
        self.total_minutes = (total % 60) as u32;
        self.total_time_string = Some(format_time_estimate(self.total_hours, self.total_minutes));
    }
}

/// Renders an estimate the way the board shows it, e.g. `2h 30m`.
pub fn format_time_estimate(hours: u32, minutes: u32) -> String {
    match (hours, minutes) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_new_creates_top_level_task() {
        let task = Task::new("T1", "Write docs");

        assert_eq!(task.id, "T1");
        assert_eq!(task.name, "Write docs");
        assert!(!task.is_sub_task());
        assert_eq!(task.sub_task_count, 0);
        assert!(!task.show_sub_tasks);
    }

    #[test]
    fn task_with_parent_is_sub_task() {
        let task = Task::new("T2", "Child").with_parent("T1");
        assert!(task.is_sub_task());
        assert_eq!(task.parent_task_id.as_deref(), Some("T1"));
    }

    #[test]
    fn task_set_field_touches_only_requested_dimension() {
        let mut task = Task::new("T1", "x")
            .with_status("todo", "#aaa")
            .with_priority("low", "#0f0");

        task.set_field(GroupBy::Status, Some(FieldValue::new("done", "#fff")));

        assert_eq!(task.field(GroupBy::Status).unwrap().id, "done");
        assert_eq!(task.field(GroupBy::Priority).unwrap().id, "low");
        assert!(task.field(GroupBy::Phase).is_none());
    }

    #[test]
    fn task_set_time_estimate_carries_minutes() {
        let mut task = Task::new("T1", "x");
        task.set_time_estimate(1, 90);

        assert_eq!(task.total_hours, 2);
        assert_eq!(task.total_minutes, 30);
        assert_eq!(task.total_time_string.as_deref(), Some("2h 30m"));
    }

    #[test]
    fn format_time_estimate_omits_zero_parts() {
        assert_eq!(format_time_estimate(0, 45), "45m");
        assert_eq!(format_time_estimate(3, 0), "3h");
        assert_eq!(format_time_estimate(0, 0), "0m");
    }

    #[test]
    fn task_deserializes_from_snapshot_json() {
        let json = r##"{
            "id": "T9",
            "name": "Ship it",
            "status": {"id": "doing", "color_code": "#ffcc00"},
            "sort_order": 4,
            "sub_tasks_count": 2,
            "labels": [{"id": "L1", "name": "bug", "color_code": "#f00"}]
        }"##;

        let task: Task = serde_json::from_str(json).unwrap();
        assert_eq!(task.id, "T9");
        assert_eq!(task.status.as_ref().unwrap().id, "doing");
        assert_eq!(task.sort_order, 4);
        assert_eq!(task.sub_task_count, 2);
        assert_eq!(task.labels.len(), 1);
        assert!(task.priority.is_none());
    }

    #[test]
    fn task_view_flags_are_not_serialized() {
        let mut task = Task::new("T1", "x");
        task.show_sub_tasks = true;

        let json = serde_json::to_string(&task).unwrap();
        assert!(!json.contains("show_sub_tasks"));
        assert!(!json.contains("sub_tasks_loading"));
    }
}
