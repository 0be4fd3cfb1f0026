use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{
    BoardSnapshot, FieldValue, Group, GroupBy, GroupId, Task, TaskId, UNMAPPED_GROUP_ID,
};

use super::notify::{ChangeNotifier, StoreEvent};
use super::registry::TaskRegistry;
use super::rollback::Rollback;
use super::selection::{CheckState, SelectionIndex};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {task_id} is not at index {index} of group {group_id}")]
    StaleIndex {
        task_id: TaskId,
        group_id: GroupId,
        index: usize,
    },

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

/// Where a task sits in the grouped view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    TopLevel {
        group_id: GroupId,
        index: usize,
    },
    Nested {
        group_id: GroupId,
        parent_id: TaskId,
        index: usize,
    },
    /// Sub-task of a parent whose nested list is not loaded; only the
    /// parent's counter reflects it.
    Counted {
        group_id: GroupId,
        parent_id: TaskId,
    },
}

impl Placement {
    pub fn group_id(&self) -> &GroupId {
        match self {
            Placement::TopLevel { group_id, .. }
            | Placement::Nested { group_id, .. }
            | Placement::Counted { group_id, .. } => group_id,
        }
    }
}

/// Result of [`GroupedListStore::update_task_group`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegroupOutcome {
    /// Already in the target group; fields refreshed in place.
    Unchanged,
    Moved {
        from: Option<GroupId>,
        to: GroupId,
    },
    /// No target group could be resolved; the store was left untouched.
    Skipped,
}

/// Ordered groups of top-level tasks with lazily loaded nested sub-task lists.
///
/// Owns the [`TaskRegistry`] and [`SelectionIndex`] and keeps the three
/// consistent. Every mutation publishes [`StoreEvent`]s through its
/// [`ChangeNotifier`].
#[derive(Debug)]
pub struct GroupedListStore {
    group_by: GroupBy,
    groups: Vec<Group>,
    registry: TaskRegistry,
    selection: SelectionIndex,
    /// Loaded sub-task lists keyed by parent id.
    nested: HashMap<TaskId, Vec<TaskId>>,
    notifier: ChangeNotifier,
}

impl GroupedListStore {
    pub fn new(group_by: GroupBy) -> Self {
        Self {
            group_by,
            groups: Vec::new(),
            registry: TaskRegistry::new(),
            selection: SelectionIndex::new(),
            nested: HashMap::new(),
            notifier: ChangeNotifier::new(),
        }
    }

    pub fn group_by(&self) -> GroupBy {
        self.group_by
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.notifier.subscribe()
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn selection(&self) -> &SelectionIndex {
        &self.selection
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.id == group_id)
    }

    fn group_index(&self, group_id: &str) -> Option<usize> {
        self.groups.iter().position(|g| g.id == group_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.registry.get(task_id)
    }

    /// Loaded sub-task ids of `parent_id`, or `None` when never fetched.
    pub fn sub_tasks(&self, parent_id: &str) -> Option<&[TaskId]> {
        self.nested.get(parent_id).map(Vec::as_slice)
    }

    /// Top-level task records of a group in display order.
    pub fn tasks_in_group(&self, group_id: &str) -> Vec<&Task> {
        self.group(group_id)
            .map(|g| {
                g.tasks
                    .iter()
                    .filter_map(|id| self.registry.get(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn group_counts(&self) -> Vec<(GroupId, usize)> {
        self.groups
            .iter()
            .map(|g| (g.id.clone(), g.tasks.len()))
            .collect()
    }

    pub fn check_state(&self, group_id: &str) -> CheckState {
        self.selection.check_state(group_id)
    }

    fn emit(&self, event: StoreEvent) {
        self.notifier.publish(event);
    }

    fn emit_counts(&self, group_ids: &[&GroupId]) {
        let mut ids: Vec<GroupId> = Vec::new();
        for id in group_ids {
            if !ids.contains(id) {
                ids.push((*id).clone());
            }
        }
        self.emit(StoreEvent::GroupCountsChanged { group_ids: ids });
    }

    fn emit_if_emptied(&self, group_id: &str) {
        if self.group(group_id).is_some_and(Group::is_empty) {
            debug!("Group {} is now empty", group_id);
            self.emit(StoreEvent::GroupEmptied {
                group_id: group_id.to_string(),
            });
        }
    }

    /// Upsert a record, keeping the counter of a loaded parent in step with
    /// its nested list.
    fn upsert_record(&mut self, mut task: Task) {
        if let Some(children) = self.nested.get(&task.id) {
            task.sub_task_count = u32::try_from(children.len()).unwrap_or(u32::MAX);
        }
        self.registry.upsert(task);
    }

    /// Add a group header. Re-registering an id refreshes its name and color
    /// but keeps its tasks.
    pub fn register_group(&mut self, group: Group) {
        self.selection.register_group(&group.id);
        if let Some(existing) = self.groups.iter_mut().find(|g| g.id == group.id) {
            existing.name = group.name;
            existing.color_code = group.color_code;
            existing.category_id = group.category_id;
            return;
        }
        self.groups.push(Group {
            tasks: Vec::new(),
            ..group
        });
    }

    /// Replace the whole store content with a freshly fetched snapshot.
    ///
    /// Sub-tasks present in the snapshot are attached to their parents'
    /// nested lists; duplicates and orphans are dropped.
    pub fn load_snapshot(&mut self, snapshot: BoardSnapshot) {
        self.clear();
        let mut deferred = Vec::new();

        for snapshot_group in snapshot.groups {
            self.register_group(snapshot_group.header());
            let Some(group_idx) = self.group_index(&snapshot_group.id) else {
                continue;
            };
            for task in snapshot_group.tasks {
                if task.is_sub_task() {
                    deferred.push(task);
                    continue;
                }
                if self.registry.contains(&task.id) {
                    warn!("Snapshot lists task {} twice, keeping first", task.id);
                    continue;
                }
                self.selection.add(&snapshot_group.id, &task.id);
                self.groups[group_idx].tasks.push(task.id.clone());
                self.registry.upsert(task);
            }
        }

        for task in deferred {
            let Some(parent_id) = task.parent_task_id.clone() else {
                continue;
            };
            let Some(group_id) = self.top_level_group_of(&parent_id) else {
                debug!("Dropping sub-task {} of unknown parent {}", task.id, parent_id);
                continue;
            };
            if self.registry.contains(&task.id) {
                continue;
            }
            self.selection.add(&group_id, &task.id);
            self.nested
                .entry(parent_id.clone())
                .or_default()
                .push(task.id.clone());
            self.registry.upsert(task);
        }

        let parents: Vec<(TaskId, usize)> = self
            .nested
            .iter()
            .map(|(id, list)| (id.clone(), list.len()))
            .collect();
        for (parent_id, len) in parents {
            self.registry.update(&parent_id, |p| {
                p.sub_task_count = u32::try_from(len).unwrap_or(u32::MAX);
                p.show_sub_tasks = true;
            });
        }

        for idx in 0..self.groups.len() {
            self.sort_group_by_order(idx);
        }

        debug!(
            "Loaded snapshot: {} groups, {} tasks",
            self.groups.len(),
            self.registry.len()
        );
        self.emit(StoreEvent::StoreReset);
        let ids: Vec<&GroupId> = self.groups.iter().map(|g| &g.id).collect();
        self.emit_counts(&ids);
    }

    /// Group that displays `task_id` as a top-level row.
    fn top_level_group_of(&self, task_id: &str) -> Option<GroupId> {
        if let Some(group_id) = self.selection.get_group_id(task_id) {
            if self.group(group_id).is_some_and(|g| g.contains(task_id)) {
                return Some(group_id.clone());
            }
        }
        self.groups
            .iter()
            .find(|g| g.contains(task_id))
            .map(|g| g.id.clone())
    }

    /// Insert `task` into `group_id`, or under its parent when it is a
    /// sub-task (the parent's group wins over `group_id`).
    ///
    /// A task that is already placed somewhere is moved, never duplicated.
    pub fn add_task(
        &mut self,
        task: Task,
        group_id: &str,
        insert_at_front: bool,
    ) -> Result<Placement, StoreError> {
        if let Some(parent_id) = task.parent_task_id.clone() {
            return self.add_sub_task(task, &parent_id);
        }

        let group_idx = self
            .group_index(group_id)
            .ok_or_else(|| StoreError::GroupNotFound(group_id.to_string()))?;

        let previous = self.detach(&task.id);
        let task_id = task.id.clone();
        self.upsert_record(task);

        let index = if insert_at_front {
            self.groups[group_idx].tasks.insert(0, task_id.clone());
            0
        } else {
            self.groups[group_idx].tasks.push(task_id.clone());
            self.groups[group_idx].tasks.len() - 1
        };
        self.fit_sort_order(group_idx, index);
        self.selection.add(group_id, &task_id);
        self.retarget_children(&task_id, group_id);

        debug!("Added task {} to group {} at {}", task_id, group_id, index);
        self.emit(StoreEvent::TaskAdded {
            task_id: task_id.clone(),
            group_id: group_id.to_string(),
            parent_id: None,
        });
        let group_id = group_id.to_string();
        match previous.as_ref().map(Placement::group_id) {
            Some(from) if *from != group_id => {
                self.emit_counts(&[from, &group_id]);
                self.emit_if_emptied(from);
            }
            _ => self.emit_counts(&[&group_id]),
        }

        Ok(Placement::TopLevel { group_id, index })
    }

    fn add_sub_task(&mut self, task: Task, parent_id: &str) -> Result<Placement, StoreError> {
        let group_id = self
            .top_level_group_of(parent_id)
            .ok_or_else(|| StoreError::TaskNotFound(parent_id.to_string()))?;

        let already_nested = self
            .nested
            .get(parent_id)
            .is_some_and(|list| list.contains(&task.id));
        if already_nested {
            let index = self
                .nested
                .get(parent_id)
                .and_then(|list| list.iter().position(|id| *id == task.id))
                .unwrap_or(0);
            self.registry.upsert(task);
            return Ok(Placement::Nested {
                group_id,
                parent_id: parent_id.to_string(),
                index,
            });
        }

        self.detach(&task.id);
        let task_id = task.id.clone();
        self.registry.update(parent_id, |p| {
            p.sub_task_count = p.sub_task_count.saturating_add(1);
        });

        let placement = match self.nested.get_mut(parent_id) {
            Some(list) => {
                list.push(task_id.clone());
                let index = list.len() - 1;
                self.registry.upsert(task);
                self.selection.add(&group_id, &task_id);
                Placement::Nested {
                    group_id: group_id.clone(),
                    parent_id: parent_id.to_string(),
                    index,
                }
            }
            None => Placement::Counted {
                group_id: group_id.clone(),
                parent_id: parent_id.to_string(),
            },
        };

        debug!("Added sub-task {} under {}", task_id, parent_id);
        self.emit(StoreEvent::TaskAdded {
            task_id,
            group_id: group_id.clone(),
            parent_id: Some(parent_id.to_string()),
        });
        self.emit(StoreEvent::SubtasksChanged {
            parent_id: parent_id.to_string(),
        });
        self.emit_counts(&[&group_id]);
        Ok(placement)
    }

    /// Unlink `task_id` from whichever list holds it. Registry and selection
    /// entries are left alone.
    fn detach(&mut self, task_id: &str) -> Option<Placement> {
        let parent_id = self
            .registry
            .get(task_id)
            .and_then(|t| t.parent_task_id.clone());

        if let Some(parent_id) = parent_id {
            let index = self
                .nested
                .get(&parent_id)
                .and_then(|list| list.iter().position(|id| id == task_id))?;
            if let Some(list) = self.nested.get_mut(&parent_id) {
                list.remove(index);
            }
            self.registry.update(&parent_id, |p| {
                p.sub_task_count = p.sub_task_count.saturating_sub(1);
            });
            let group_id = self
                .top_level_group_of(&parent_id)
                .unwrap_or_default();
            return Some(Placement::Nested {
                group_id,
                parent_id,
                index,
            });
        }

        let group_id = self.top_level_group_of(task_id)?;
        let group_idx = self.group_index(&group_id)?;
        let index = self.groups[group_idx].position(task_id)?;
        self.groups[group_idx].tasks.remove(index);
        Some(Placement::TopLevel { group_id, index })
    }

    /// Point the selection entries of a parent's loaded sub-tasks at `group_id`.
    fn retarget_children(&mut self, parent_id: &str, group_id: &str) {
        if let Some(children) = self.nested.get(parent_id) {
            for child in children {
                self.selection.add(group_id, child);
            }
        }
    }

    /// Remove a task for good: unlink it, drop its record and selection
    /// entry (plus those of its loaded sub-tasks), then clear the selection.
    pub fn delete_task(&mut self, task_id: &str) -> Result<Placement, StoreError> {
        let placement = self
            .detach(task_id)
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;

        self.registry.remove(task_id);
        self.selection.remove(task_id);
        if let Some(children) = self.nested.remove(task_id) {
            for child in children {
                self.registry.remove(&child);
                self.selection.remove(&child);
            }
        }
        self.selection.deselect_all();

        let (group_id, parent_id) = match &placement {
            Placement::TopLevel { group_id, .. } => (group_id.clone(), None),
            Placement::Nested {
                group_id,
                parent_id,
                ..
            }
            | Placement::Counted {
                group_id,
                parent_id,
            } => (group_id.clone(), Some(parent_id.clone())),
        };

        debug!("Deleted task {} from group {}", task_id, group_id);
        self.emit(StoreEvent::TaskRemoved {
            task_id: task_id.to_string(),
            group_id: group_id.clone(),
            parent_id: parent_id.clone(),
        });
        if let Some(parent_id) = parent_id {
            self.emit(StoreEvent::SubtasksChanged { parent_id });
        }
        self.emit_counts(&[&group_id]);
        self.emit_if_emptied(&group_id);
        self.emit(StoreEvent::SelectionChanged);
        Ok(placement)
    }

    /// Delete several tasks, ignoring ids that are not present.
    pub fn delete_tasks(&mut self, task_ids: &[TaskId]) -> usize {
        let removed = task_ids
            .iter()
            .filter(|id| self.delete_task(id).is_ok())
            .count();
        self.selection.deselect_all();
        removed
    }

    /// Turn a top-level row into a sub-task of `parent_id`.
    pub fn convert_to_sub_task(
        &mut self,
        task_id: &str,
        parent_id: &str,
    ) -> Result<Placement, StoreError> {
        if task_id == parent_id {
            return Err(StoreError::Invariant(format!(
                "task {task_id} cannot be its own parent"
            )));
        }
        let mut task = self
            .registry
            .get(task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        if self.top_level_group_of(parent_id).is_none() {
            return Err(StoreError::TaskNotFound(parent_id.to_string()));
        }

        if let Some(Placement::TopLevel { group_id, .. }) = self.detach(task_id) {
            self.emit_counts(&[&group_id]);
            self.emit_if_emptied(&group_id);
        }
        if let Some(children) = self.nested.remove(task_id) {
            for child in children {
                self.registry.remove(&child);
                self.selection.remove(&child);
            }
        }
        self.selection.remove(task_id);
        self.registry.remove(task_id);
        self.selection.deselect_all();

        task.parent_task_id = Some(parent_id.to_string());
        task.show_sub_tasks = false;
        self.add_sub_task(task, parent_id)
    }

    /// Re-place `task` according to the active grouping dimension.
    ///
    /// Removes the task from its current list before inserting it into the
    /// target group, so applying the same change twice is a no-op the second
    /// time. Sub-tasks only get their fields refreshed: the parent's group is
    /// authoritative for them.
    pub fn update_task_group(
        &mut self,
        task: Task,
        insert_at_front: bool,
    ) -> Result<RegroupOutcome, StoreError> {
        if task.is_sub_task() {
            let task_id = task.id.clone();
            if self.registry.contains(&task_id) {
                self.registry.upsert(task);
                self.emit(StoreEvent::TaskUpdated { task_id });
            }
            return Ok(RegroupOutcome::Unchanged);
        }

        let Some(target) = self.group_by.group_id_for(&task) else {
            debug!("Task {} has no {} value, not regrouping", task.id, self.group_by);
            return Ok(RegroupOutcome::Skipped);
        };
        if self.group_index(&target).is_none() {
            warn!(
                "Target group {} for task {} does not exist, ignoring",
                target, task.id
            );
            return Ok(RegroupOutcome::Skipped);
        }

        let current = self.top_level_group_of(&task.id);
        if current.as_deref() == Some(target.as_str()) {
            let task_id = task.id.clone();
            self.upsert_record(task);
            if let Some(group_idx) = self.group_index(&target) {
                if let Some(pos) = self.groups[group_idx].position(&task_id) {
                    self.fit_sort_order(group_idx, pos);
                }
            }
            self.emit(StoreEvent::TaskUpdated { task_id });
            return Ok(RegroupOutcome::Unchanged);
        }

        let task_id = task.id.clone();
        let color_code = self
            .group(&target)
            .map(|g| g.color_code.clone())
            .unwrap_or_default();
        self.add_task(task, &target, insert_at_front)?;

        debug!("Regrouped task {} from {:?} to {}", task_id, current, target);
        if let Some(from) = &current {
            self.emit(StoreEvent::TaskMoved {
                task_id: task_id.clone(),
                from_group: from.clone(),
                to_group: target.clone(),
            });
        }
        self.emit(StoreEvent::GroupValueChanged {
            task_id,
            group_id: target.clone(),
            color_code,
        });

        Ok(RegroupOutcome::Moved {
            from: current,
            to: target,
        })
    }

    /// Move a dragged row. `from_index` must point at `task_id` in
    /// `from_group`; `to_index` is clamped to the destination bounds.
    ///
    /// Cross-group moves rewrite the task's active grouping field to the
    /// destination group's value.
    pub fn reposition(
        &mut self,
        task_id: &str,
        from_group: &str,
        from_index: usize,
        to_group: &str,
        to_index: usize,
    ) -> Result<usize, StoreError> {
        let from_idx = self
            .group_index(from_group)
            .ok_or_else(|| StoreError::GroupNotFound(from_group.to_string()))?;
        let to_idx = self
            .group_index(to_group)
            .ok_or_else(|| StoreError::GroupNotFound(to_group.to_string()))?;

        if self.groups[from_idx].tasks.get(from_index).map(String::as_str) != Some(task_id) {
            return Err(StoreError::StaleIndex {
                task_id: task_id.to_string(),
                group_id: from_group.to_string(),
                index: from_index,
            });
        }

        let moved = self.groups[from_idx].tasks.remove(from_index);

        if from_idx == to_idx {
            let to = to_index.min(self.groups[to_idx].tasks.len());
            self.groups[to_idx].tasks.insert(to, moved);
            self.fit_sort_order(to_idx, to);
            self.emit(StoreEvent::TaskMoved {
                task_id: task_id.to_string(),
                from_group: from_group.to_string(),
                to_group: to_group.to_string(),
            });
            return Ok(to);
        }

        let to = to_index.min(self.groups[to_idx].tasks.len());
        self.groups[to_idx].tasks.insert(to, moved);
        self.fit_sort_order(to_idx, to);
        self.selection.add(to_group, task_id);
        self.retarget_children(task_id, to_group);

        let destination = &self.groups[to_idx];
        let color_code = destination.color_code.clone();
        let value = if self.group_by == GroupBy::Phase && destination.id == UNMAPPED_GROUP_ID {
            None
        } else {
            Some(FieldValue {
                id: destination.id.clone(),
                color_code: color_code.clone(),
                name: Some(destination.name.clone()),
            })
        };
        let group_by = self.group_by;
        self.registry
            .update(task_id, |t| t.set_field(group_by, value));

        debug!(
            "Moved task {} from {}[{}] to {}[{}]",
            task_id, from_group, from_index, to_group, to
        );
        self.emit(StoreEvent::TaskMoved {
            task_id: task_id.to_string(),
            from_group: from_group.to_string(),
            to_group: to_group.to_string(),
        });
        self.emit(StoreEvent::GroupValueChanged {
            task_id: task_id.to_string(),
            group_id: to_group.to_string(),
            color_code,
        });
        let (from_id, to_id) = (from_group.to_string(), to_group.to_string());
        self.emit_counts(&[&from_id, &to_id]);
        self.emit_if_emptied(from_group);
        Ok(to)
    }

    fn sort_order_at(&self, group_idx: usize, pos: usize) -> Option<i64> {
        self.groups[group_idx]
            .tasks
            .get(pos)
            .and_then(|id| self.registry.get(id))
            .map(|t| t.sort_order)
    }

    /// Give the task at `pos` a provisional sort order between its
    /// neighbours when its current one breaks the group's ordering.
    fn fit_sort_order(&mut self, group_idx: usize, pos: usize) {
        let Some(current) = self.sort_order_at(group_idx, pos) else {
            return;
        };
        let prev = pos
            .checked_sub(1)
            .and_then(|p| self.sort_order_at(group_idx, p));
        let next = self.sort_order_at(group_idx, pos + 1);

        let fits = prev.map_or(true, |p| p <= current) && next.map_or(true, |n| current <= n);
        if fits {
            return;
        }

        let provisional = match (prev, next) {
            (Some(p), Some(n)) => p + n.saturating_sub(p) / 2,
            (Some(p), None) => p.saturating_add(1),
            (None, Some(n)) => n.saturating_sub(1),
            (None, None) => current,
        };
        let task_id = self.groups[group_idx].tasks[pos].clone();
        self.registry
            .update(&task_id, |t| t.sort_order = provisional);
    }

    fn sort_group_by_order(&mut self, group_idx: usize) {
        let registry = &self.registry;
        self.groups[group_idx]
            .tasks
            .sort_by_key(|id| registry.get(id).map(|t| t.sort_order).unwrap_or(i64::MAX));
    }

    /// Overwrite a task's authoritative sort order. Membership is untouched.
    pub fn set_sort_order(
        &mut self,
        task_id: &str,
        sort_order: i64,
        completed_at: Option<DateTime<Utc>>,
    ) -> bool {
        self.registry.update(task_id, |t| {
            t.sort_order = sort_order;
            if completed_at.is_some() {
                t.completed_at = completed_at;
            }
        })
    }

    /// Stable re-sort of every group (and loaded nested list) holding one of
    /// `task_ids`, after authoritative sort orders arrived.
    pub fn resort_containing(&mut self, task_ids: &[TaskId]) {
        let wanted: HashSet<&str> = task_ids.iter().map(String::as_str).collect();
        for idx in 0..self.groups.len() {
            if self.groups[idx]
                .tasks
                .iter()
                .any(|id| wanted.contains(id.as_str()))
            {
                self.sort_group_by_order(idx);
            }
        }
        let registry = &self.registry;
        for list in self.nested.values_mut() {
            if list.iter().any(|id| wanted.contains(id.as_str())) {
                list.sort_by_key(|id| registry.get(id).map(|t| t.sort_order).unwrap_or(i64::MAX));
            }
        }
        self.emit(StoreEvent::SortOrderUpdated {
            task_ids: task_ids.to_vec(),
        });
    }

    /// Apply a non-structural field change to a record.
    pub fn update_task<F>(&mut self, task_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        let found = self.registry.update(task_id, f);
        if found {
            self.emit(StoreEvent::TaskUpdated {
                task_id: task_id.to_string(),
            });
        }
        found
    }

    /// Install the fetched sub-tasks of a top-level parent and expand it.
    pub fn set_sub_tasks(&mut self, parent_id: &str, sub_tasks: Vec<Task>) -> Result<usize, StoreError> {
        let group_id = self
            .top_level_group_of(parent_id)
            .ok_or_else(|| StoreError::TaskNotFound(parent_id.to_string()))?;

        if let Some(previous) = self.nested.remove(parent_id) {
            for child in previous {
                self.selection.remove(&child);
                self.registry.remove(&child);
            }
        }

        let mut ids = Vec::with_capacity(sub_tasks.len());
        for mut task in sub_tasks {
            if ids.contains(&task.id) || task.id == parent_id {
                continue;
            }
            if self.top_level_group_of(&task.id).is_some() {
                warn!("Sub-task {} is also a top-level row, skipping", task.id);
                continue;
            }
            task.parent_task_id = Some(parent_id.to_string());
            self.selection.add(&group_id, &task.id);
            ids.push(task.id.clone());
            self.registry.upsert(task);
        }

        let count = ids.len();
        self.nested.insert(parent_id.to_string(), ids);
        self.registry.update(parent_id, |p| {
            p.sub_task_count = u32::try_from(count).unwrap_or(u32::MAX);
            p.show_sub_tasks = true;
            p.sub_tasks_loading = false;
        });
        self.emit(StoreEvent::SubtasksChanged {
            parent_id: parent_id.to_string(),
        });
        Ok(count)
    }

    /// Drop a parent's loaded sub-tasks from memory and collapse it. The
    /// counter keeps the server value.
    pub fn clear_sub_tasks(&mut self, parent_id: &str) -> Vec<TaskId> {
        let removed = self.nested.remove(parent_id).unwrap_or_default();
        for child in &removed {
            self.selection.remove(child);
            self.registry.remove(child);
        }
        self.registry.update(parent_id, |p| {
            p.show_sub_tasks = false;
            p.sub_tasks_loading = false;
        });
        if !removed.is_empty() {
            self.emit(StoreEvent::SelectionChanged);
        }
        self.emit(StoreEvent::SubtasksChanged {
            parent_id: parent_id.to_string(),
        });
        removed
    }

    pub fn set_sub_tasks_loading(&mut self, parent_id: &str, loading: bool) -> bool {
        self.registry
            .update(parent_id, |p| p.sub_tasks_loading = loading)
    }

    pub fn select_task(&mut self, task_id: &str) -> bool {
        let selected = self.selection.select_task(task_id);
        if selected {
            self.emit(StoreEvent::SelectionChanged);
        }
        selected
    }

    pub fn deselect_task(&mut self, task_id: &str) -> bool {
        let was = self.selection.deselect_task(task_id);
        if was {
            self.emit(StoreEvent::SelectionChanged);
        }
        was
    }

    pub fn deselect_all(&mut self) {
        self.selection.deselect_all();
        self.emit(StoreEvent::SelectionChanged);
    }

    /// Header checkbox: select every row of a group, loaded sub-tasks
    /// included.
    pub fn select_group(&mut self, group_id: &str) -> usize {
        self.set_group_selected(group_id, true)
    }

    pub fn deselect_group(&mut self, group_id: &str) -> usize {
        self.set_group_selected(group_id, false)
    }

    fn set_group_selected(&mut self, group_id: &str, selected: bool) -> usize {
        let ids = self.selection.group_members(group_id);
        let mut changed = 0;
        for id in &ids {
            let hit = if selected {
                self.selection.select_task(id)
            } else {
                self.selection.deselect_task(id)
            };
            if hit {
                changed += 1;
            }
        }
        self.emit(StoreEvent::SelectionChanged);
        changed
    }

    fn clear(&mut self) {
        self.groups.clear();
        self.registry.clear();
        self.selection.clear();
        self.nested.clear();
    }

    /// Full teardown of the board content.
    pub fn reset(&mut self) {
        self.clear();
        debug!("Store reset");
        self.emit(StoreEvent::StoreReset);
    }

    /// Switch the grouping dimension. Existing groups are meaningless under
    /// the new dimension, so the store is reset.
    pub fn set_group_by(&mut self, group_by: GroupBy) {
        self.group_by = group_by;
        self.reset();
    }

    /// Run `mutate` against the store and hand back its inverse along with
    /// its result. The mutation is expected to touch `task_id` only.
    pub fn track<T, F>(&mut self, task_id: &str, mutate: F) -> Result<(T, Rollback), StoreError>
    where
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        let origin = self.top_level_group_of(task_id).and_then(|group_id| {
            let index = self.group(&group_id)?.position(task_id)?;
            Some((group_id, index))
        });
        let mut rollback = Rollback {
            task_id: task_id.to_string(),
            before: self.registry.get(task_id).cloned(),
            origin,
            ..Default::default()
        };

        let value = mutate(self)?;

        rollback.after = self.registry.get(task_id).cloned();
        rollback.landed = self.top_level_group_of(task_id);
        Ok((value, rollback))
    }

    /// Undo a tracked mutation on top of whatever happened since.
    ///
    /// Fields are reverted only where they still hold the mutation's value,
    /// and the row only goes back to its old slot (clamped to the current
    /// list) if it is still in the group the mutation put it in. Other rows
    /// and records are never touched.
    pub fn restore(&mut self, rollback: Rollback) {
        let task_id = rollback.task_id.clone();
        let Some(mut current) = self.registry.get(&task_id).cloned() else {
            debug!("Task {} is gone, nothing to roll back", task_id);
            return;
        };

        if rollback.revert_fields(&mut current) {
            self.upsert_record(current);
            self.emit(StoreEvent::TaskUpdated {
                task_id: task_id.clone(),
            });
        }
        self.restore_placement(&rollback);

        if let Some(group_id) = self.top_level_group_of(&task_id) {
            if let Some(group_idx) = self.group_index(&group_id) {
                if let Some(pos) = self.groups[group_idx].position(&task_id) {
                    self.fit_sort_order(group_idx, pos);
                }
            }
        }
    }

    fn restore_placement(&mut self, rollback: &Rollback) {
        let Some((origin, index)) = &rollback.origin else {
            return;
        };
        let task_id = rollback.task_id.as_str();
        let current = self.top_level_group_of(task_id);
        if current != rollback.landed {
            debug!(
                "Task {} moved on to {:?} since, keeping it there",
                task_id, current
            );
            return;
        }
        let Some(landed) = current else {
            return;
        };
        let current_index = self.group(&landed).and_then(|g| g.position(task_id));
        if !rollback.relocated(current_index) {
            return;
        }
        let Some(origin_idx) = self.group_index(origin) else {
            warn!("Group {} vanished, leaving {} in {}", origin, task_id, landed);
            return;
        };

        self.detach(task_id);
        let to = (*index).min(self.groups[origin_idx].tasks.len());
        self.groups[origin_idx].tasks.insert(to, task_id.to_string());
        self.selection.add(origin, task_id);
        self.retarget_children(task_id, origin);

        debug!("Put {} back at {}[{}]", task_id, origin, to);
        self.emit(StoreEvent::TaskMoved {
            task_id: task_id.to_string(),
            from_group: landed.clone(),
            to_group: origin.clone(),
        });
        if landed != *origin {
            self.emit_counts(&[&landed, origin]);
            self.emit_if_emptied(&landed);
        }
    }

    /// Verify the structural invariants of the grouped view.
    pub fn check_invariants(&self) -> Result<(), StoreError> {
        let mut seen: HashSet<&str> = HashSet::new();

        for group in &self.groups {
            let mut last: Option<i64> = None;
            for id in &group.tasks {
                if !seen.insert(id.as_str()) {
                    return Err(StoreError::Invariant(format!("task {id} listed twice")));
                }
                let task = self.registry.get(id).ok_or_else(|| {
                    StoreError::Invariant(format!("task {id} in group {} has no record", group.id))
                })?;
                if task.is_sub_task() {
                    return Err(StoreError::Invariant(format!(
                        "sub-task {id} placed at top level of {}",
                        group.id
                    )));
                }
                if self.selection.get_group_id(id) != Some(&group.id) {
                    return Err(StoreError::Invariant(format!(
                        "task {id} indexed outside its group {}",
                        group.id
                    )));
                }
                if last.is_some_and(|prev| task.sort_order < prev) {
                    return Err(StoreError::Invariant(format!(
                        "sort order decreases at {id} in {}",
                        group.id
                    )));
                }
                last = Some(task.sort_order);
            }
        }

        for (parent_id, children) in &self.nested {
            let parent = self.registry.get(parent_id).ok_or_else(|| {
                StoreError::Invariant(format!("nested list of missing parent {parent_id}"))
            })?;
            if parent.sub_task_count as usize != children.len() {
                return Err(StoreError::Invariant(format!(
                    "parent {parent_id} counts {} sub-tasks but holds {}",
                    parent.sub_task_count,
                    children.len()
                )));
            }
            for id in children {
                if !seen.insert(id.as_str()) {
                    return Err(StoreError::Invariant(format!("task {id} listed twice")));
                }
                let child = self.registry.get(id).ok_or_else(|| {
                    StoreError::Invariant(format!("sub-task {id} has no record"))
                })?;
                if child.parent_task_id.as_deref() != Some(parent_id.as_str()) {
                    return Err(StoreError::Invariant(format!(
                        "sub-task {id} nested under the wrong parent {parent_id}"
                    )));
                }
            }
        }

        for id in self.selection.selected_ids() {
            let group_id = self.selection.get_group_id(&id).ok_or_else(|| {
                StoreError::Invariant(format!("selected task {id} has no index entry"))
            })?;
            if self.group(group_id).is_none() {
                return Err(StoreError::Invariant(format!(
                    "selected task {id} points at missing group {group_id}"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SnapshotGroup;

    fn task(id: &str, status: &str, order: i64) -> Task {
        Task::new(id, format!("Task {id}"))
            .with_status(status, "#cccccc")
            .with_sort_order(order)
    }

    fn snapshot(groups: &[(&str, &[&str])]) -> BoardSnapshot {
        BoardSnapshot {
            groups: groups
                .iter()
                .map(|(gid, ids)| SnapshotGroup {
                    id: gid.to_string(),
                    name: gid.to_uppercase(),
                    color_code: format!("#{}", "a".repeat(6)),
                    category_id: None,
                    tasks: ids
                        .iter()
                        .enumerate()
                        .map(|(i, id)| task(id, gid, i as i64 + 1))
                        .collect(),
                })
                .collect(),
        }
    }

    fn ids(store: &GroupedListStore, group: &str) -> Vec<String> {
        store.group(group).unwrap().tasks.clone()
    }

    fn create_test_store() -> GroupedListStore {
        let mut store = GroupedListStore::new(GroupBy::Status);
        store.load_snapshot(snapshot(&[
            ("todo", &["T1", "T2", "T3", "T4"]),
            ("doing", &["T5", "T6"]),
            ("done", &[]),
        ]));
        store
    }

    #[test]
    fn load_snapshot_builds_groups_and_index() {
        let store = create_test_store();

        assert_eq!(store.groups().len(), 3);
        assert_eq!(ids(&store, "todo"), vec!["T1", "T2", "T3", "T4"]);
        assert_eq!(
            store.selection().get_group_id("T5").map(String::as_str),
            Some("doing")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn load_snapshot_sorts_by_sort_order() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        let mut snap = snapshot(&[("todo", &["A", "B", "C"])]);
        snap.groups[0].tasks[0].sort_order = 9;
        store.load_snapshot(snap);

        assert_eq!(ids(&store, "todo"), vec!["B", "C", "A"]);
    }

    #[test]
    fn load_snapshot_attaches_sub_tasks_to_parent() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        let mut snap = snapshot(&[("todo", &["P"])]);
        snap.groups[0]
            .tasks
            .push(task("C1", "todo", 1).with_parent("P"));
        snap.groups[0]
            .tasks
            .push(task("C2", "todo", 2).with_parent("missing"));
        store.load_snapshot(snap);

        assert_eq!(store.sub_tasks("P").unwrap(), ["C1".to_string()]);
        assert_eq!(store.task("P").unwrap().sub_task_count, 1);
        assert!(store.task("C2").is_none());
        store.check_invariants().unwrap();
    }

    #[test]
    fn add_task_appends_or_inserts_at_front() {
        let mut store = create_test_store();

        store.add_task(task("N1", "done", 50), "done", false).unwrap();
        store.add_task(task("N2", "done", 60), "done", true).unwrap();

        assert_eq!(ids(&store, "done"), vec!["N2", "N1"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn add_task_to_unknown_group_fails() {
        let mut store = create_test_store();
        let err = store.add_task(task("N1", "x", 1), "nowhere", false).unwrap_err();
        assert!(matches!(err, StoreError::GroupNotFound(_)));
        assert!(store.task("N1").is_none());
    }

    #[test]
    fn add_task_twice_does_not_duplicate() {
        let mut store = create_test_store();
        store.add_task(task("T1", "todo", 1), "done", false).unwrap();

        assert_eq!(ids(&store, "done"), vec!["T1"]);
        assert!(!store.group("todo").unwrap().contains("T1"));
        store.check_invariants().unwrap();
    }

    #[test]
    fn add_sub_task_counts_when_parent_not_loaded() {
        let mut store = create_test_store();
        let placement = store
            .add_task(Task::new("S1", "child").with_parent("T1"), "ignored", false)
            .unwrap();

        assert!(matches!(placement, Placement::Counted { .. }));
        assert_eq!(store.task("T1").unwrap().sub_task_count, 1);
        assert!(store.task("S1").is_none());
    }

    #[test]
    fn add_sub_task_appends_to_loaded_list() {
        let mut store = create_test_store();
        store.set_sub_tasks("T1", vec![Task::new("S1", "a")]).unwrap();

        let placement = store
            .add_task(Task::new("S2", "b").with_parent("T1"), "doing", false)
            .unwrap();

        assert_eq!(
            placement,
            Placement::Nested {
                group_id: "todo".into(),
                parent_id: "T1".into(),
                index: 1
            }
        );
        assert_eq!(store.task("T1").unwrap().sub_task_count, 2);
        assert_eq!(
            store.selection().get_group_id("S2").map(String::as_str),
            Some("todo")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn delete_sub_task_decrements_parent_count() {
        let mut store = create_test_store();
        store
            .set_sub_tasks("T1", vec![Task::new("S1", "a"), Task::new("S2", "b")])
            .unwrap();

        store.delete_task("S1").unwrap();

        assert_eq!(store.sub_tasks("T1").unwrap(), ["S2".to_string()]);
        assert_eq!(store.task("T1").unwrap().sub_task_count, 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn delete_sub_task_count_never_goes_negative() {
        let mut store = create_test_store();
        store.set_sub_tasks("T1", vec![Task::new("S1", "a")]).unwrap();
        store.update_task("T1", |t| t.sub_task_count = 0);

        store.delete_task("S1").unwrap();

        assert_eq!(store.task("T1").unwrap().sub_task_count, 0);
    }

    #[test]
    fn delete_top_level_task_clears_selection() {
        let mut store = create_test_store();
        store.select_task("T2");
        store.select_task("T5");

        store.delete_task("T1").unwrap();

        assert_eq!(ids(&store, "todo"), vec!["T2", "T3", "T4"]);
        assert!(store.task("T1").is_none());
        assert_eq!(store.selection().selected_count(), 0);
        store.check_invariants().unwrap();
    }

    #[test]
    fn delete_unknown_task_is_an_error_without_side_effects() {
        let mut store = create_test_store();
        store.select_task("T2");

        assert!(matches!(
            store.delete_task("ghost"),
            Err(StoreError::TaskNotFound(_))
        ));
        assert!(store.selection().is_selected("T2"));
    }

    #[test]
    fn delete_last_task_emits_group_emptied() {
        let mut store = create_test_store();
        store.add_task(task("N1", "done", 1), "done", false).unwrap();
        let mut rx = store.subscribe();

        store.delete_task("N1").unwrap();

        let mut saw_emptied = false;
        while let Ok(event) = rx.try_recv() {
            if event == (StoreEvent::GroupEmptied { group_id: "done".into() }) {
                saw_emptied = true;
            }
        }
        assert!(saw_emptied);
    }

    #[test]
    fn update_task_group_moves_between_groups() {
        let mut store = create_test_store();

        let changed = store.task("T1").unwrap().clone().with_status("doing", "#fff");
        let outcome = store.update_task_group(changed, true).unwrap();

        assert_eq!(
            outcome,
            RegroupOutcome::Moved {
                from: Some("todo".into()),
                to: "doing".into()
            }
        );
        assert_eq!(store.group("todo").unwrap().len(), 3);
        assert_eq!(ids(&store, "doing"), vec!["T1", "T5", "T6"]);
        assert_eq!(
            store.selection().get_group_id("T1").map(String::as_str),
            Some("doing")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn update_task_group_twice_is_idempotent() {
        let mut store = create_test_store();
        let changed = store.task("T2").unwrap().clone().with_status("doing", "#fff");

        store.update_task_group(changed.clone(), true).unwrap();
        let first: Vec<_> = store.groups().to_vec();
        let outcome = store.update_task_group(changed, true).unwrap();

        assert_eq!(outcome, RegroupOutcome::Unchanged);
        assert_eq!(store.groups(), first.as_slice());
    }

    #[test]
    fn update_task_group_to_missing_group_is_skipped() {
        let mut store = create_test_store();
        let changed = store.task("T1").unwrap().clone().with_status("archived", "#000");

        assert_eq!(
            store.update_task_group(changed, true).unwrap(),
            RegroupOutcome::Skipped
        );
        assert!(store.group("todo").unwrap().contains("T1"));
        assert_eq!(store.task("T1").unwrap().status.as_ref().unwrap().id, "todo");
    }

    #[test]
    fn update_task_group_keeps_selection_flag() {
        let mut store = create_test_store();
        store.select_task("T1");
        let changed = store.task("T1").unwrap().clone().with_status("done", "#fff");

        store.update_task_group(changed, false).unwrap();

        assert!(store.selection().is_selected("T1"));
        assert!(store.selection().is_all_selected("done"));
        store.check_invariants().unwrap();
    }

    #[test]
    fn update_task_group_ignores_placement_of_sub_tasks() {
        let mut store = create_test_store();
        store.set_sub_tasks("T1", vec![Task::new("S1", "a")]).unwrap();
        let changed = store.task("S1").unwrap().clone().with_status("done", "#fff");

        assert_eq!(
            store.update_task_group(changed, false).unwrap(),
            RegroupOutcome::Unchanged
        );
        assert_eq!(store.sub_tasks("T1").unwrap(), ["S1".to_string()]);
        assert_eq!(store.task("S1").unwrap().status.as_ref().unwrap().id, "done");
        assert!(store.group("done").unwrap().is_empty());
    }

    #[test]
    fn regrouped_parent_carries_sub_task_index_entries() {
        let mut store = create_test_store();
        store.set_sub_tasks("T1", vec![Task::new("S1", "a")]).unwrap();
        let changed = store.task("T1").unwrap().clone().with_status("done", "#fff");

        store.update_task_group(changed, false).unwrap();

        assert_eq!(
            store.selection().get_group_id("S1").map(String::as_str),
            Some("done")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn reposition_within_group() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        store.load_snapshot(snapshot(&[("A", &["T1", "T2", "T3"])]));

        store.reposition("T1", "A", 0, "A", 2).unwrap();

        assert_eq!(ids(&store, "A"), vec!["T2", "T3", "T1"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn reposition_across_groups_rewrites_active_field() {
        let mut store = create_test_store();

        store.reposition("T2", "todo", 1, "doing", 1).unwrap();

        assert_eq!(ids(&store, "doing"), vec!["T5", "T2", "T6"]);
        let moved = store.task("T2").unwrap();
        assert_eq!(moved.status.as_ref().unwrap().id, "doing");
        assert_eq!(
            store.selection().get_group_id("T2").map(String::as_str),
            Some("doing")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn reposition_rejects_stale_index() {
        let mut store = create_test_store();
        let err = store.reposition("T2", "todo", 0, "doing", 0).unwrap_err();
        assert!(matches!(err, StoreError::StaleIndex { .. }));
        assert_eq!(ids(&store, "todo"), vec!["T1", "T2", "T3", "T4"]);
    }

    #[test]
    fn reposition_into_phase_unmapped_clears_phase() {
        let mut store = GroupedListStore::new(GroupBy::Phase);
        store.register_group(Group::new("p1", "Design", "#123456"));
        store.register_group(Group::new(UNMAPPED_GROUP_ID, "Unmapped", "#999999"));
        store
            .add_task(Task::new("T1", "x").with_phase("p1", "#123456"), "p1", false)
            .unwrap();

        store.reposition("T1", "p1", 0, UNMAPPED_GROUP_ID, 0).unwrap();

        assert!(store.task("T1").unwrap().phase.is_none());
        assert!(store.group("p1").unwrap().is_empty());
    }

    #[test]
    fn fit_sort_order_places_between_neighbours() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        let mut snap = snapshot(&[("A", &["T1", "T2", "T3"])]);
        snap.groups[0].tasks[0].sort_order = 10;
        snap.groups[0].tasks[1].sort_order = 20;
        snap.groups[0].tasks[2].sort_order = 30;
        store.load_snapshot(snap);

        store.reposition("T3", "A", 2, "A", 1).unwrap();

        assert_eq!(ids(&store, "A"), vec!["T1", "T3", "T2"]);
        assert_eq!(store.task("T3").unwrap().sort_order, 15);
    }

    #[test]
    fn fit_sort_order_survives_extreme_neighbours() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        let mut snap = snapshot(&[("A", &["T1", "T2", "T3"]), ("B", &["T4", "T5", "T6"])]);
        snap.groups[0].tasks[0].sort_order = i64::MIN;
        snap.groups[0].tasks[1].sort_order = i64::MIN / 2;
        snap.groups[0].tasks[2].sort_order = i64::MAX;
        snap.groups[1].tasks[0].sort_order = i64::MIN;
        snap.groups[1].tasks[1].sort_order = i64::MIN;
        snap.groups[1].tasks[2].sort_order = 5;
        store.load_snapshot(snap);

        store.reposition("T1", "A", 0, "A", 1).unwrap();
        store.reposition("T6", "B", 2, "B", 0).unwrap();

        assert_eq!(ids(&store, "A"), vec!["T2", "T1", "T3"]);
        assert_eq!(store.task("T1").unwrap().sort_order, -1);
        assert_eq!(ids(&store, "B"), vec!["T6", "T4", "T5"]);
        assert_eq!(store.task("T6").unwrap().sort_order, i64::MIN);
        store.check_invariants().unwrap();
    }

    #[test]
    fn select_group_covers_loaded_sub_tasks() {
        let mut store = GroupedListStore::new(GroupBy::Status);
        store.load_snapshot(snapshot(&[("A", &["T1", "T2"])]));
        store
            .set_sub_tasks("T1", vec![Task::new("S1", "a")])
            .unwrap();

        assert_eq!(store.select_group("A"), 3);
        assert_eq!(store.check_state("A"), CheckState::Checked);
        assert!(store.selection().is_selected("S1"));

        assert_eq!(store.deselect_group("A"), 3);
        assert_eq!(store.check_state("A"), CheckState::Unchecked);
    }

    #[test]
    fn set_and_clear_sub_tasks() {
        let mut store = create_test_store();
        store
            .set_sub_tasks("T1", vec![Task::new("S1", "a"), Task::new("S2", "b")])
            .unwrap();
        store.select_task("S1");
        assert!(store.task("T1").unwrap().show_sub_tasks);

        let removed = store.clear_sub_tasks("T1");

        assert_eq!(removed.len(), 2);
        assert!(store.sub_tasks("T1").is_none());
        assert!(!store.selection().is_selected("S1"));
        assert!(!store.task("T1").unwrap().show_sub_tasks);
        assert_eq!(store.task("T1").unwrap().sub_task_count, 2);
        store.check_invariants().unwrap();
    }

    #[test]
    fn convert_to_sub_task_moves_row_under_parent() {
        let mut store = create_test_store();
        store.set_sub_tasks("T5", vec![]).unwrap();

        store.convert_to_sub_task("T2", "T5").unwrap();

        assert!(!store.group("todo").unwrap().contains("T2"));
        assert_eq!(store.sub_tasks("T5").unwrap(), ["T2".to_string()]);
        assert_eq!(store.task("T5").unwrap().sub_task_count, 1);
        store.check_invariants().unwrap();
    }

    #[test]
    fn select_group_drives_tri_state() {
        let mut store = create_test_store();

        store.select_group("todo");
        assert_eq!(store.check_state("todo"), CheckState::Checked);

        store.deselect_task("T3");
        assert_eq!(store.check_state("todo"), CheckState::Indeterminate);

        store.deselect_group("todo");
        assert_eq!(store.check_state("todo"), CheckState::Unchecked);
    }

    #[test]
    fn track_and_restore_undo_a_move() {
        let mut store = create_test_store();
        let before: Vec<_> = store.groups().to_vec();
        let record = store.task("T1").cloned();

        let (_, rollback) = store
            .track("T1", |s| s.reposition("T1", "todo", 0, "doing", 2))
            .unwrap();
        assert_eq!(ids(&store, "doing"), vec!["T5", "T6", "T1"]);
        store.restore(rollback);

        assert_eq!(store.groups(), before.as_slice());
        assert_eq!(store.task("T1").cloned(), record);
        assert_eq!(
            store.selection().get_group_id("T1").map(String::as_str),
            Some("todo")
        );
        store.check_invariants().unwrap();
    }

    #[test]
    fn restore_leaves_later_changes_alone() {
        let mut store = create_test_store();
        let (_, rollback) = store
            .track("T1", |s| s.reposition("T1", "todo", 0, "doing", 0))
            .unwrap();

        // Arrives while the move is in flight.
        store.reposition("T5", "doing", 1, "done", 0).unwrap();
        store
            .add_task(task("T9", "doing", 0), "doing", true)
            .unwrap();
        store.update_task("T1", |t| t.name = "Renamed elsewhere".to_string());

        store.restore(rollback);

        assert_eq!(ids(&store, "todo"), vec!["T1", "T2", "T3", "T4"]);
        assert_eq!(ids(&store, "doing"), vec!["T9", "T6"]);
        assert_eq!(ids(&store, "done"), vec!["T5"]);
        let t1 = store.task("T1").unwrap();
        assert_eq!(t1.status.as_ref().unwrap().id, "todo");
        assert_eq!(t1.name, "Renamed elsewhere");
        store.check_invariants().unwrap();
    }

    #[test]
    fn restore_keeps_a_row_moved_again_since() {
        let mut store = create_test_store();
        let (_, rollback) = store
            .track("T1", |s| s.reposition("T1", "todo", 0, "doing", 0))
            .unwrap();
        store.reposition("T1", "doing", 0, "done", 0).unwrap();

        store.restore(rollback);

        assert_eq!(ids(&store, "done"), vec!["T1"]);
        assert_eq!(store.task("T1").unwrap().status.as_ref().unwrap().id, "done");
        store.check_invariants().unwrap();
    }

    #[test]
    fn restore_clamps_to_the_shrunken_origin() {
        let mut store = create_test_store();
        let (_, rollback) = store
            .track("T4", |s| s.reposition("T4", "todo", 3, "done", 0))
            .unwrap();
        store.delete_task("T2").unwrap();
        store.delete_task("T3").unwrap();

        store.restore(rollback);

        assert_eq!(ids(&store, "todo"), vec!["T1", "T4"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn restore_after_delete_is_a_no_op() {
        let mut store = create_test_store();
        let (_, rollback) = store
            .track("T1", |s| s.reposition("T1", "todo", 0, "doing", 0))
            .unwrap();
        store.delete_task("T1").unwrap();

        store.restore(rollback);

        assert!(store.task("T1").is_none());
        assert_eq!(ids(&store, "todo"), vec!["T2", "T3", "T4"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn resort_containing_follows_authoritative_orders() {
        let mut store = create_test_store();
        store.set_sort_order("T1", 100, None);

        store.resort_containing(&["T1".to_string()]);

        assert_eq!(ids(&store, "todo"), vec!["T2", "T3", "T4", "T1"]);
        store.check_invariants().unwrap();
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = create_test_store();
        store.select_task("T1");

        store.reset();

        assert!(store.groups().is_empty());
        assert!(store.registry().is_empty());
        assert_eq!(store.selection().selected_count(), 0);
    }

    #[test]
    fn set_group_by_resets_store() {
        let mut store = create_test_store();
        store.set_group_by(GroupBy::Priority);
        assert_eq!(store.group_by(), GroupBy::Priority);
        assert!(store.groups().is_empty());
    }
}
