use tracing::{debug, warn};

use crate::models::{FieldValue, GroupBy, Task, TaskId};
use crate::store::{GroupedListStore, RegroupOutcome, StoreError};
use crate::sync::{SortOrderEcho, SyncEvent};

use super::reassign::{FieldChange, GroupReassignment};
use super::reorder::ReorderCoordinator;

/// What an inbound event did to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    Applied,
    /// The event referenced nothing the store knows about.
    Stale,
}

/// Folds authoritative broadcasts into the store.
///
/// Events are applied in arrival order; each field is last-applied-wins.
pub struct Reconciler;

impl Reconciler {
    pub fn apply(store: &mut GroupedListStore, event: SyncEvent) -> Reconciled {
        let kind = event.name();
        let result = match event {
            SyncEvent::NameChange { id, name, .. } => {
                Ok(Self::touch(store, &id, |t| t.name = name))
            }
            SyncEvent::StatusChange {
                id,
                status_id,
                color_code,
                status_category,
                ..
            } => {
                let value = Self::field_value(store, &id, GroupBy::Status, status_id, color_code);
                let mut change = FieldChange::new(id, GroupBy::Status, Some(value));
                change.status_category = status_category;
                Self::regroup(store, &change)
            }
            SyncEvent::PriorityChange {
                id,
                priority_id,
                color_code,
            } => {
                let value =
                    Self::field_value(store, &id, GroupBy::Priority, priority_id, color_code);
                Self::regroup(store, &FieldChange::new(id, GroupBy::Priority, Some(value)))
            }
            SyncEvent::PhaseChange {
                task_id,
                phase_id,
                color_code,
            } => {
                let value = phase_id
                    .map(|id| Self::field_value(store, &task_id, GroupBy::Phase, id, color_code));
                Self::regroup(store, &FieldChange::new(task_id, GroupBy::Phase, value))
            }
            SyncEvent::SortOrderChange(SortOrderEcho::Updates(updates)) => {
                let updated = ReorderCoordinator::apply_echo(store, &updates);
                Ok(!updated.is_empty())
            }
            SyncEvent::SortOrderChange(SortOrderEcho::Refused { .. }) => Ok(false),
            SyncEvent::LabelChange { id, labels, .. } => {
                Ok(Self::touch(store, &id, |t| t.labels = labels))
            }
            SyncEvent::DescriptionChange { id, description } => {
                Ok(Self::touch(store, &id, |t| t.description = description))
            }
            SyncEvent::TimeEstimationChange {
                id,
                total_hours,
                total_minutes,
                total_time_string,
            } => Ok(Self::touch(store, &id, |t| {
                if let (Some(hours), Some(minutes)) = (total_hours, total_minutes) {
                    t.set_time_estimate(hours, minutes);
                }
                t.total_time_string = Some(total_time_string);
            })),
            SyncEvent::StartDateChange { id, start_date, .. } => {
                Ok(Self::touch(store, &id, |t| t.start_date = start_date))
            }
            SyncEvent::EndDateChange { id, end_date, .. } => {
                Ok(Self::touch(store, &id, |t| t.end_date = end_date))
            }
            SyncEvent::TaskCreated(task) => Self::created(store, task),
            SyncEvent::TaskDeleted { id } => match store.delete_task(&id) {
                Ok(_) => Ok(true),
                Err(StoreError::TaskNotFound(_)) => Ok(false),
                Err(e) => Err(e),
            },
            SyncEvent::TasksBulkDeleted { ids } | SyncEvent::TasksBulkArchived { ids } => {
                let removed = store.delete_tasks(&ids);
                store.deselect_all();
                Ok(removed > 0)
            }
            SyncEvent::Rejected { reason } => {
                warn!("Uncorrelated rejection ignored: {}", reason);
                Ok(false)
            }
        };

        match result {
            Ok(true) => Reconciled::Applied,
            Ok(false) => {
                debug!("Ignoring stale {} event", kind);
                Reconciled::Stale
            }
            Err(e) => {
                warn!("Could not apply {} event: {}", kind, e);
                Reconciled::Stale
            }
        }
    }

    /// Build the value an event sets. Events carry no display name, so it
    /// comes from the group header when `dimension` is the active one, or
    /// from the task's current value when the id is unchanged.
    fn field_value(
        store: &GroupedListStore,
        task_id: &str,
        dimension: GroupBy,
        id: String,
        color_code: String,
    ) -> FieldValue {
        let mut value = FieldValue::new(id, color_code);
        let header = (store.group_by() == dimension)
            .then(|| store.group(&value.id))
            .flatten();
        if let Some(header) = header {
            value.name = Some(header.name.clone());
            if value.color_code.is_empty() {
                value.color_code = header.color_code.clone();
            }
            return value;
        }
        let current = store.task(task_id).and_then(|t| t.field(dimension));
        if let Some(current) = current.filter(|c| c.id == value.id) {
            value.name = current.name.clone();
            if value.color_code.is_empty() {
                value.color_code = current.color_code.clone();
            }
        }
        value
    }

    fn touch<F>(store: &mut GroupedListStore, task_id: &TaskId, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        store.update_task(task_id, f)
    }

    fn regroup(store: &mut GroupedListStore, change: &FieldChange) -> Result<bool, StoreError> {
        match GroupReassignment::apply(store, change) {
            Ok(_) => Ok(true),
            Err(StoreError::TaskNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn created(
        store: &mut GroupedListStore,
        task: Task,
    ) -> Result<bool, StoreError> {
        let known = store
            .task(&task.id)
            .is_some_and(|t| t.is_sub_task() == task.is_sub_task());
        if known {
            debug!("Task {} created again, updating in place", task.id);
            return match store.update_task_group(task, false)? {
                RegroupOutcome::Skipped => Ok(false),
                _ => Ok(true),
            };
        }
        if task.is_sub_task() {
            return match store.add_task(task, "", false) {
                Ok(_) => Ok(true),
                Err(StoreError::TaskNotFound(_)) => Ok(false),
                Err(e) => Err(e),
            };
        }
        let Some(group_id) = store.group_by().group_id_for(&task) else {
            return Ok(false);
        };
        if store.group(&group_id).is_none() {
            return Ok(false);
        }
        store.add_task(task, &group_id, true)?;
        Ok(true)
    }
}
