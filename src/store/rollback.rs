use crate::models::{GroupId, Task, TaskId};

/// Inverse of one optimistic mutation on a single task.
///
/// Built by `GroupedListStore::track` around the local mutation and applied
/// by `GroupedListStore::restore` when the command fails to send or is
/// refused. Only what the mutation itself changed is reverted: a field that
/// moved on since (a broadcast landed in between) keeps its newer value, and
/// the row is only moved back if it still sits where the mutation put it.
#[derive(Debug, Clone, Default)]
pub struct Rollback {
    pub(super) task_id: TaskId,
    pub(super) before: Option<Task>,
    pub(super) after: Option<Task>,
    /// Top-level group and index before the mutation.
    pub(super) origin: Option<(GroupId, usize)>,
    /// Top-level group right after the mutation.
    pub(super) landed: Option<GroupId>,
}

impl Rollback {
    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    /// Whether the row now sits somewhere other than where it started.
    pub(super) fn relocated(&self, current_index: Option<usize>) -> bool {
        match (&self.origin, &self.landed) {
            (Some((from, index)), Some(to)) => from != to || Some(*index) != current_index,
            _ => false,
        }
    }

    /// Revert on `current` every field the mutation changed and nobody has
    /// changed again since. Returns whether anything was reverted.
    pub(super) fn revert_fields(&self, current: &mut Task) -> bool {
        let (Some(before), Some(after)) = (&self.before, &self.after) else {
            return false;
        };
        let mut reverted = false;
        reverted |= revert(&mut current.name, &before.name, &after.name);
        reverted |= revert(&mut current.description, &before.description, &after.description);
        reverted |= revert(&mut current.status, &before.status, &after.status);
        reverted |= revert(
            &mut current.status_category,
            &before.status_category,
            &after.status_category,
        );
        reverted |= revert(&mut current.priority, &before.priority, &after.priority);
        reverted |= revert(&mut current.phase, &before.phase, &after.phase);
        reverted |= revert(&mut current.start_date, &before.start_date, &after.start_date);
        reverted |= revert(&mut current.end_date, &before.end_date, &after.end_date);
        reverted |= revert(&mut current.completed_at, &before.completed_at, &after.completed_at);
        reverted |= revert(&mut current.sort_order, &before.sort_order, &after.sort_order);
        reverted |= revert(&mut current.labels, &before.labels, &after.labels);
        reverted |= revert(&mut current.total_hours, &before.total_hours, &after.total_hours);
        reverted |= revert(&mut current.total_minutes, &before.total_minutes, &after.total_minutes);
        reverted |= revert(
            &mut current.total_time_string,
            &before.total_time_string,
            &after.total_time_string,
        );
        reverted
    }
}

fn revert<T: PartialEq + Clone>(current: &mut T, before: &T, after: &T) -> bool {
    if before != after && current == after {
        *current = before.clone();
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FieldValue, GroupBy};

    fn rollback(before: Task, after: Task) -> Rollback {
        Rollback {
            task_id: before.id.clone(),
            before: Some(before),
            after: Some(after),
            origin: None,
            landed: None,
        }
    }

    #[test]
    fn revert_skips_fields_changed_since() {
        let before = Task::new("T1", "Old").with_status("todo", "#aaaaaa");
        let mut after = before.clone();
        after.name = "New".to_string();
        after.set_field(GroupBy::Status, Some(FieldValue::new("doing", "#bbbbbb")));
        let undo = rollback(before, after.clone());

        let mut current = after;
        current.name = "Renamed remotely".to_string();
        assert!(undo.revert_fields(&mut current));

        assert_eq!(current.name, "Renamed remotely");
        assert_eq!(current.status.as_ref().unwrap().id, "todo");
    }

    #[test]
    fn relocated_compares_group_and_index() {
        let mut undo = Rollback {
            origin: Some(("todo".to_string(), 1)),
            landed: Some("todo".to_string()),
            ..Default::default()
        };
        assert!(!undo.relocated(Some(1)));
        assert!(undo.relocated(Some(0)));
        undo.landed = Some("doing".to_string());
        assert!(undo.relocated(Some(1)));
    }
}
