use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::{
    BoardSnapshot, FieldValue, GroupBy, SnapshotGroup, Task, TaskId, UNMAPPED_GROUP_ID,
};

use super::channel::{SyncChannel, SyncError};
use super::command::CommandEnvelope;
use super::event::EventEnvelope;
use super::source::{SnapshotQuery, SnapshotSource, SubtaskPage, SubtaskQuery, SubtaskSource};

const EVENT_CAPACITY: usize = 256;

/// In-process channel: records every command it is given and lets the owner
/// inject broadcasts. Used by the offline CLI and by tests.
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    sent: Arc<Mutex<Vec<CommandEnvelope>>>,
    failure: Arc<Mutex<Option<String>>>,
    events: broadcast::Sender<EventEnvelope>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            failure: Arc::new(Mutex::new(None)),
            events,
        }
    }

    /// Make every following `send` fail with `reason`, or succeed again
    /// with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        if let Ok(mut failure) = self.failure.lock() {
            *failure = reason.map(str::to_string);
        }
    }

    pub fn sent(&self) -> Vec<CommandEnvelope> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    pub fn last_sent(&self) -> Option<CommandEnvelope> {
        self.sent.lock().ok().and_then(|sent| sent.last().cloned())
    }

    /// Broadcast `envelope` to every subscriber. Returns how many received it.
    pub fn deliver(&self, envelope: EventEnvelope) -> usize {
        match self.events.send(envelope) {
            Ok(count) => count,
            Err(_) => {
                debug!("No subscribers for delivered event");
                0
            }
        }
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl SyncChannel for MemoryChannel {
    async fn send(&self, envelope: CommandEnvelope) -> Result<(), SyncError> {
        let failure = self
            .failure
            .lock()
            .map_err(|_| SyncError::Closed)?
            .clone();
        if let Some(reason) = failure {
            return Err(SyncError::Transport(reason));
        }
        debug!(
            "Sending {} ({}) for board {}",
            envelope.command.name(),
            envelope.correlation_id,
            envelope.board_id
        );
        self.sent
            .lock()
            .map_err(|_| SyncError::Closed)?
            .push(envelope);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.events.subscribe()
    }
}

/// Serves a fixed board snapshot, regrouped on demand for the requested
/// dimension.
#[derive(Debug, Clone)]
pub struct StaticSnapshotSource {
    snapshot: BoardSnapshot,
    native: GroupBy,
    queries: Arc<Mutex<Vec<SnapshotQuery>>>,
}

impl StaticSnapshotSource {
    /// `native` is the dimension `snapshot` is already grouped by.
    pub fn new(snapshot: BoardSnapshot, native: GroupBy) -> Self {
        Self {
            snapshot,
            native,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<SnapshotQuery> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SnapshotSource for StaticSnapshotSource {
    async fn fetch_groups(&self, query: &SnapshotQuery) -> Result<BoardSnapshot, SyncError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        let snapshot = if query.group_by == self.native {
            self.snapshot.clone()
        } else {
            regroup_snapshot(&self.snapshot, query.group_by)
        };
        Ok(filter_snapshot(
            snapshot,
            query.search.as_deref(),
            query.include_subtasks,
        ))
    }
}

/// Rebuild groups from each task's field for `group_by`, in order of first
/// appearance. Tasks without a target group are dropped.
pub fn regroup_snapshot(snapshot: &BoardSnapshot, group_by: GroupBy) -> BoardSnapshot {
    let mut groups: Vec<SnapshotGroup> = Vec::new();

    for task in snapshot.groups.iter().flat_map(|g| g.tasks.iter()) {
        let Some(group_id) = group_by.group_id_for(task) else {
            warn!("Task {} has no {} value, leaving it out", task.id, group_by);
            continue;
        };
        let position = match groups.iter().position(|g| g.id == group_id) {
            Some(position) => position,
            None => {
                let value = task.field(group_by).cloned().unwrap_or_else(|| {
                    FieldValue {
                        id: UNMAPPED_GROUP_ID.to_string(),
                        color_code: String::new(),
                        name: Some(UNMAPPED_GROUP_ID.to_string()),
                    }
                });
                groups.push(SnapshotGroup {
                    name: value.name.clone().unwrap_or_else(|| group_id.clone()),
                    id: group_id,
                    color_code: value.color_code,
                    category_id: None,
                    tasks: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[position].tasks.push(task.clone());
    }

    BoardSnapshot { groups }
}

fn filter_snapshot(
    mut snapshot: BoardSnapshot,
    search: Option<&str>,
    include_subtasks: bool,
) -> BoardSnapshot {
    let needle = search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    for group in &mut snapshot.groups {
        group.tasks.retain(|task| {
            (include_subtasks || !task.is_sub_task())
                && needle
                    .as_ref()
                    .map_or(true, |n| task.name.to_lowercase().contains(n))
        });
    }
    snapshot
}

/// Serves sub-tasks from a fixed map, page by page.
#[derive(Debug, Clone, Default)]
pub struct StaticSubtaskSource {
    by_parent: HashMap<TaskId, Vec<Task>>,
    queries: Arc<Mutex<Vec<SubtaskQuery>>>,
}

impl StaticSubtaskSource {
    pub fn new(by_parent: HashMap<TaskId, Vec<Task>>) -> Self {
        Self {
            by_parent,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn queries(&self) -> Vec<SubtaskQuery> {
        self.queries
            .lock()
            .map(|queries| queries.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl SubtaskSource for StaticSubtaskSource {
    async fn fetch_page(&self, query: &SubtaskQuery) -> Result<SubtaskPage, SyncError> {
        if let Ok(mut queries) = self.queries.lock() {
            queries.push(query.clone());
        }
        let all = self
            .by_parent
            .get(&query.parent_task)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let start = query.page.saturating_sub(1).saturating_mul(query.size);
        let items = all
            .iter()
            .skip(start)
            .take(query.size)
            .cloned()
            .collect();
        Ok(SubtaskPage {
            items,
            total: all.len(),
        })
    }
}
