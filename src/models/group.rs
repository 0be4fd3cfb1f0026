use serde::{Deserialize, Serialize};

use super::{normalize_color, GroupId, Task, TaskId};

/// A bucket of top-level tasks sharing one value of the active grouping field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub color_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    /// Ordered top-level task ids.
    #[serde(default)]
    pub tasks: Vec<TaskId>,
}

impl Group {
    pub fn new(id: impl Into<GroupId>, name: impl Into<String>, color_code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color_code: color_code.into(),
            category_id: None,
            tasks: Vec::new(),
        }
    }

    pub fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|id| id == task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.position(task_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

/// One group as delivered by the snapshot fetch, carrying full task records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub color_code: String,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl SnapshotGroup {
    /// The group without its tasks. Valid hex colors are lowercased; anything
    /// else is kept as sent.
    pub fn header(&self) -> Group {
        Group {
            id: self.id.clone(),
            name: self.name.clone(),
            color_code: normalize_color(&self.color_code)
                .unwrap_or_else(|| self.color_code.clone()),
            category_id: self.category_id.clone(),
            tasks: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardSnapshot {
    #[serde(default)]
    pub groups: Vec<SnapshotGroup>,
}
