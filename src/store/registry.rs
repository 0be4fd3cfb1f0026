use std::collections::HashMap;

use crate::models::{Task, TaskId};

/// Canonical task records keyed by id.
///
/// The registry is the single source of truth for task fields. It never
/// touches group membership: callers that upsert or remove records are
/// responsible for keeping group lists and the selection index in step.
#[derive(Debug, Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<TaskId, Task>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.tasks.contains_key(task_id)
    }

    /// Insert or replace a record, returning the previous one.
    ///
    /// View-only flags of an existing record survive the replacement so an
    /// echo does not collapse an expanded row.
    pub fn upsert(&mut self, mut task: Task) -> Option<Task> {
        if let Some(existing) = self.tasks.get(&task.id) {
            task.show_sub_tasks = existing.show_sub_tasks;
            task.sub_tasks_loading = existing.sub_tasks_loading;
        }
        self.tasks.insert(task.id.clone(), task)
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Task> {
        self.tasks.remove(task_id)
    }

    /// Apply `f` to the record if present. Returns whether it was found.
    pub fn update<F>(&mut self, task_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut Task),
    {
        match self.tasks.get_mut(task_id) {
            Some(task) => {
                f(task);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
