use tracing::debug;

use crate::models::{FieldValue, GroupBy, StatusCategory, TaskId};
use crate::store::{GroupedListStore, RegroupOutcome, StoreError};

/// A new value for one of the three grouping fields of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub task_id: TaskId,
    pub dimension: GroupBy,
    /// `None` clears the field (only meaningful for phases).
    pub value: Option<FieldValue>,
    pub status_category: Option<StatusCategory>,
}

impl FieldChange {
    pub fn new(task_id: impl Into<TaskId>, dimension: GroupBy, value: Option<FieldValue>) -> Self {
        Self {
            task_id: task_id.into(),
            dimension,
            value,
            status_category: None,
        }
    }
}

/// Applies grouping-field changes, moving the task when the changed field is
/// the one the board is grouped by.
pub struct GroupReassignment;

impl GroupReassignment {
    /// Safe to apply repeatedly: a second identical change finds the task
    /// already in its target group and leaves the store as it is.
    pub fn apply(
        store: &mut GroupedListStore,
        change: &FieldChange,
    ) -> Result<RegroupOutcome, StoreError> {
        let Some(current) = store.task(&change.task_id) else {
            return Err(StoreError::TaskNotFound(change.task_id.clone()));
        };
        let mut task = current.clone();
        task.set_field(change.dimension, change.value.clone());
        if change.dimension == GroupBy::Status && change.status_category.is_some() {
            task.status_category = change.status_category;
        }

        match (store.group_by(), change.dimension) {
            (GroupBy::Status, GroupBy::Status)
            | (GroupBy::Priority, GroupBy::Priority)
            | (GroupBy::Phase, GroupBy::Phase) => store.update_task_group(task, true),
            (active, dimension) => {
                debug!(
                    "{} change on {} while grouped by {}, no regroup",
                    dimension, change.task_id, active
                );
                store.update_task(&change.task_id, |t| *t = task);
                Ok(RegroupOutcome::Unchanged)
            }
        }
    }
}
