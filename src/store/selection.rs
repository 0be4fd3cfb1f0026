use std::collections::{BTreeSet, HashMap, HashSet};

use crate::models::{GroupId, TaskId};

/// Header checkbox state of one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Checked,
    Indeterminate,
    Unchecked,
}

/// Maps task ids to the group they are displayed in and tracks multi-select.
///
/// Sub-tasks are registered under their parent's group. Selection is
/// advisory view state: selecting an unknown id is silently ignored.
#[derive(Debug, Clone, Default)]
pub struct SelectionIndex {
    group_of: HashMap<TaskId, GroupId>,
    members: HashMap<GroupId, HashSet<TaskId>>,
    selected: HashSet<TaskId>,
}

impl SelectionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_group(&mut self, group_id: &str) {
        self.members.entry(group_id.to_string()).or_default();
    }

    /// Record `task_id` as displayed in `group_id`, replacing any previous
    /// entry. The selected flag is kept.
    pub fn add(&mut self, group_id: &str, task_id: &str) {
        if let Some(previous) = self.group_of.get(task_id) {
            if previous == group_id {
                return;
            }
            if let Some(set) = self.members.get_mut(previous) {
                set.remove(task_id);
            }
        }
        self.group_of
            .insert(task_id.to_string(), group_id.to_string());
        self.members
            .entry(group_id.to_string())
            .or_default()
            .insert(task_id.to_string());
    }

    /// Drop the entry for `task_id`, deselecting it.
    pub fn remove(&mut self, task_id: &str) -> Option<GroupId> {
        self.selected.remove(task_id);
        let group_id = self.group_of.remove(task_id)?;
        if let Some(set) = self.members.get_mut(&group_id) {
            set.remove(task_id);
        }
        Some(group_id)
    }

    pub fn get_group_id(&self, task_id: &str) -> Option<&GroupId> {
        self.group_of.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.group_of.contains_key(task_id)
    }

    /// Returns whether the task became (or already was) selected.
    pub fn select_task(&mut self, task_id: &str) -> bool {
        if !self.group_of.contains_key(task_id) {
            return false;
        }
        self.selected.insert(task_id.to_string());
        true
    }

    /// Returns whether the task was selected before.
    pub fn deselect_task(&mut self, task_id: &str) -> bool {
        self.selected.remove(task_id)
    }

    pub fn deselect_all(&mut self) {
        self.selected.clear();
    }

    pub fn is_selected(&self, task_id: &str) -> bool {
        self.selected.contains(task_id)
    }

    /// Selected ids in a stable order.
    pub fn selected_ids(&self) -> Vec<TaskId> {
        self.selected
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn selected_count(&self) -> usize {
        self.selected.len()
    }

    /// Ids registered under `group_id`, including loaded sub-tasks.
    pub fn group_members(&self, group_id: &str) -> Vec<TaskId> {
        self.members
            .get(group_id)
            .map(|set| {
                set.iter()
                    .cloned()
                    .collect::<BTreeSet<_>>()
                    .into_iter()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn selected_in_group(&self, group_id: &str) -> (usize, usize) {
        match self.members.get(group_id) {
            Some(set) => (
                set.iter().filter(|id| self.selected.contains(*id)).count(),
                set.len(),
            ),
            None => (0, 0),
        }
    }

    pub fn is_all_selected(&self, group_id: &str) -> bool {
        let (selected, total) = self.selected_in_group(group_id);
        total > 0 && selected == total
    }

    pub fn is_all_deselected(&self, group_id: &str) -> bool {
        let (selected, _) = self.selected_in_group(group_id);
        selected == 0
    }

    pub fn check_state(&self, group_id: &str) -> CheckState {
        if self.is_all_selected(group_id) {
            CheckState::Checked
        } else if self.is_all_deselected(group_id) {
            CheckState::Unchecked
        } else {
            CheckState::Indeterminate
        }
    }

    pub fn clear(&mut self) {
        self.group_of.clear();
        self.members.clear();
        self.selected.clear();
    }
}
