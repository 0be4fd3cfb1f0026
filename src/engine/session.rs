use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tracing::{debug, info, warn};

use crate::config::{Config, Preferences};
use crate::models::{BoardId, FieldValue, GroupBy, GroupId, Task, TaskId, UNMAPPED_GROUP_ID};
use crate::store::{GroupedListStore, Rollback, StoreError, StoreEvent};
use crate::sync::{
    CommandEnvelope, CommandOutcome, EventEnvelope, SnapshotQuery, SnapshotSource, SubtaskSource,
    SyncChannel, SyncCommand, SyncError,
};

use super::reassign::{FieldChange, GroupReassignment};
use super::reconcile::{Reconciled, Reconciler};
use super::reorder::{DragMove, ReorderCoordinator};
use super::subtasks::{ExpandStep, ExpandTicket, SubtaskAggregator};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub team_id: Option<String>,
    pub group_by: GroupBy,
    pub subtask_page_size: usize,
    pub pending_ttl: Duration,
    pub search: Option<String>,
    pub include_subtasks: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            team_id: None,
            group_by: GroupBy::Status,
            subtask_page_size: 50,
            pending_ttl: Duration::seconds(30),
            search: None,
            include_subtasks: false,
        }
    }
}

impl SessionOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            team_id: config.team_id.clone(),
            group_by: config.default_group_by,
            subtask_page_size: config.subtask_page_size,
            pending_ttl: Duration::seconds(
                config.pending_command_ttl_secs.min(u64::from(u32::MAX)) as i64,
            ),
            search: None,
            include_subtasks: false,
        }
    }
}

/// What handling one inbound envelope did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Other board, unknown ids, or nothing to do.
    Discarded,
    /// The server refused one of our commands; its local change was undone.
    RolledBack {
        correlation_id: String,
        reason: String,
    },
}

/// An optimistic change awaiting its echo.
#[derive(Debug)]
struct PendingCommand {
    name: &'static str,
    task_id: TaskId,
    issued_at: DateTime<Utc>,
    rollback: Rollback,
}

/// One open board: the grouped store plus everything that keeps it in step
/// with the server.
///
/// Every mutating operation is two-phase: the change is applied locally while
/// its inverse is tracked, then the command is sent. A send failure or a
/// server refusal applies the inverse on top of whatever arrived since.
pub struct BoardSession {
    board_id: BoardId,
    generation: u64,
    store: GroupedListStore,
    channel: Arc<dyn SyncChannel>,
    snapshots: Arc<dyn SnapshotSource>,
    subtasks: SubtaskAggregator,
    reorder: ReorderCoordinator,
    events: broadcast::Receiver<EventEnvelope>,
    pending: HashMap<String, PendingCommand>,
    next_correlation: u64,
    options: SessionOptions,
    preferences: Option<Preferences>,
}

impl BoardSession {
    pub fn new(
        board_id: impl Into<BoardId>,
        channel: Arc<dyn SyncChannel>,
        snapshots: Arc<dyn SnapshotSource>,
        subtasks: Arc<dyn SubtaskSource>,
        options: SessionOptions,
    ) -> Self {
        let board_id = board_id.into();
        let events = channel.subscribe();
        Self {
            reorder: ReorderCoordinator::new(board_id.clone(), options.team_id.clone()),
            subtasks: SubtaskAggregator::new(subtasks, options.subtask_page_size),
            store: GroupedListStore::new(options.group_by),
            board_id,
            generation: 0,
            channel,
            snapshots,
            events,
            pending: HashMap::new(),
            next_correlation: 0,
            options,
            preferences: None,
        }
    }

    /// Use (and from now on persist) the board's stored grouping.
    pub fn with_preferences(mut self, preferences: Preferences) -> Self {
        if let Some(group_by) = preferences.group_by(&self.board_id) {
            self.store.set_group_by(group_by);
        }
        self.preferences = Some(preferences);
        self
    }

    pub fn board_id(&self) -> &BoardId {
        &self.board_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn store(&self) -> &GroupedListStore {
        &self.store
    }

    pub fn group_by(&self) -> GroupBy {
        self.store.group_by()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Results of earlier requests must not land in the new state.
    fn begin_generation(&mut self) {
        self.generation += 1;
        if !self.pending.is_empty() {
            debug!("Dropping {} pending commands", self.pending.len());
            self.pending.clear();
        }
    }

    /// Fetch the snapshot for the current grouping and replace the store
    /// content with it.
    pub async fn load(&mut self) -> Result<(), SyncError> {
        self.begin_generation();
        let query = SnapshotQuery {
            board_id: self.board_id.clone(),
            group_by: self.store.group_by(),
            search: self.options.search.clone(),
            include_subtasks: self.options.include_subtasks,
        };
        let snapshot = self.snapshots.fetch_groups(&query).await?;
        self.store.load_snapshot(snapshot);
        info!(
            "Loaded board {} grouped by {} ({} groups)",
            self.board_id,
            query.group_by,
            self.store.groups().len()
        );
        Ok(())
    }

    /// Switch grouping: persist the choice, reset and reload.
    pub async fn set_group_by(&mut self, group_by: GroupBy) -> Result<(), SyncError> {
        if let Some(preferences) = &self.preferences {
            if let Err(e) = preferences.set_group_by(&self.board_id, group_by) {
                warn!("Could not persist group-by for {}: {:#}", self.board_id, e);
            }
        }
        self.store.set_group_by(group_by);
        self.load().await
    }

    /// Board teardown.
    pub fn teardown(&mut self) {
        self.begin_generation();
        self.store.reset();
    }

    fn next_correlation_id(&mut self) -> String {
        self.next_correlation += 1;
        format!("{}-{}", self.generation, self.next_correlation)
    }

    async fn dispatch(&mut self, command: SyncCommand, rollback: Rollback) -> CommandOutcome {
        let correlation_id = self.next_correlation_id();
        let name = command.name();
        let task_id = command.task_id().clone();
        let envelope = CommandEnvelope {
            correlation_id: correlation_id.clone(),
            board_id: self.board_id.clone(),
            command,
        };

        let channel = Arc::clone(&self.channel);
        match channel.send(envelope).await {
            Ok(()) => {
                debug!("Sent {} for {} as {}", name, task_id, correlation_id);
                self.pending.insert(
                    correlation_id.clone(),
                    PendingCommand {
                        name,
                        task_id,
                        issued_at: Utc::now(),
                        rollback,
                    },
                );
                CommandOutcome::Sent { correlation_id }
            }
            Err(SyncError::Rejected(reason)) => {
                warn!("{} for {} refused: {}", name, task_id, reason);
                self.store.restore(rollback);
                self.store.notifier().publish(StoreEvent::CommandRejected {
                    correlation_id,
                    reason: reason.clone(),
                });
                CommandOutcome::Rejected { reason }
            }
            Err(e) => {
                warn!("{} for {} not sent, rolling back: {}", name, task_id, e);
                self.store.restore(rollback);
                CommandOutcome::TransportFailed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Drag-drop reorder, within or across groups.
    pub async fn move_task(&mut self, drag: DragMove) -> Result<CommandOutcome, StoreError> {
        let change = self.reorder.plan(&self.store, &drag)?;
        let reorder = &self.reorder;
        let (_, rollback) = self
            .store
            .track(&drag.task_id, |store| reorder.apply_local(store, &drag))?;
        if drag.is_cross_group() {
            debug!(
                "{} now in {} pending confirmation",
                drag.task_id, drag.to_group
            );
        }
        Ok(self
            .dispatch(SyncCommand::SortOrderChange(change), rollback)
            .await)
    }

    /// Set a task's status, priority or phase. Changing the active
    /// dimension moves the task to the matching group.
    pub async fn change_group_field(
        &mut self,
        task_id: &str,
        dimension: GroupBy,
        value_id: Option<GroupId>,
    ) -> Result<CommandOutcome, StoreError> {
        let task = self
            .store
            .task(task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(task_id.to_string()))?;
        let value_id = value_id.filter(|id| id != UNMAPPED_GROUP_ID);
        if value_id.is_none() && dimension != GroupBy::Phase {
            return Err(StoreError::Invariant(format!(
                "{dimension} of {task_id} cannot be cleared"
            )));
        }

        let active = dimension == self.store.group_by();
        let value = value_id.clone().map(|id| {
            let header = if active { self.store.group(&id) } else { None };
            FieldValue {
                color_code: header.map(|g| g.color_code.clone()).unwrap_or_default(),
                name: header.map(|g| g.name.clone()),
                id,
            }
        });

        let change = FieldChange::new(task_id, dimension, value);
        let (_, rollback) = self
            .store
            .track(task_id, |store| GroupReassignment::apply(store, &change))?;

        let task_id = task_id.to_string();
        let parent_task = task.parent_task_id;
        let command = match (dimension, value_id) {
            (GroupBy::Status, Some(status_id)) => SyncCommand::StatusChange {
                task_id,
                status_id,
                parent_task,
            },
            (GroupBy::Priority, Some(priority_id)) => SyncCommand::PriorityChange {
                task_id,
                priority_id,
                parent_task,
            },
            (_, phase_id) => SyncCommand::PhaseChange { task_id, phase_id },
        };
        Ok(self.dispatch(command, rollback).await)
    }

    /// Apply a plain field edit locally and send `command`.
    async fn edit<F>(
        &mut self,
        task_id: &str,
        command: SyncCommand,
        f: F,
    ) -> Result<CommandOutcome, StoreError>
    where
        F: FnOnce(&mut Task),
    {
        if self.store.task(task_id).is_none() {
            return Err(StoreError::TaskNotFound(task_id.to_string()));
        }
        let (_, rollback) = self.store.track(task_id, |store| {
            store.update_task(task_id, f);
            Ok(())
        })?;
        Ok(self.dispatch(command, rollback).await)
    }

    fn parent_of(&self, task_id: &str) -> Option<TaskId> {
        self.store
            .task(task_id)
            .and_then(|t| t.parent_task_id.clone())
    }

    pub async fn rename(&mut self, task_id: &str, name: &str) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::NameChange {
            task_id: task_id.to_string(),
            name: name.to_string(),
            parent_task: self.parent_of(task_id),
        };
        let name = name.to_string();
        self.edit(task_id, command, |t| t.name = name).await
    }

    pub async fn set_description(
        &mut self,
        task_id: &str,
        description: &str,
    ) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::DescriptionChange {
            task_id: task_id.to_string(),
            description: description.to_string(),
        };
        let description = description.to_string();
        self.edit(task_id, command, |t| t.description = Some(description))
            .await
    }

    pub async fn set_time_estimate(
        &mut self,
        task_id: &str,
        hours: u32,
        minutes: u32,
    ) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::TimeEstimationChange {
            task_id: task_id.to_string(),
            total_hours: hours,
            total_minutes: minutes,
            parent_task: self.parent_of(task_id),
        };
        self.edit(task_id, command, |t| t.set_time_estimate(hours, minutes))
            .await
    }

    pub async fn set_start_date(
        &mut self,
        task_id: &str,
        start_date: Option<DateTime<Utc>>,
    ) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::StartDateChange {
            task_id: task_id.to_string(),
            start_date,
            parent_task: self.parent_of(task_id),
        };
        self.edit(task_id, command, |t| t.start_date = start_date)
            .await
    }

    pub async fn set_end_date(
        &mut self,
        task_id: &str,
        end_date: Option<DateTime<Utc>>,
    ) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::EndDateChange {
            task_id: task_id.to_string(),
            end_date,
            parent_task: self.parent_of(task_id),
        };
        self.edit(task_id, command, |t| t.end_date = end_date).await
    }

    /// Labels have no local effect; the echo carries the new label set.
    pub async fn toggle_label(
        &mut self,
        task_id: &str,
        label_id: &str,
    ) -> Result<CommandOutcome, StoreError> {
        let command = SyncCommand::LabelChange {
            task_id: task_id.to_string(),
            label_id: label_id.to_string(),
            parent_task: self.parent_of(task_id),
        };
        self.edit(task_id, command, |_| {}).await
    }

    pub async fn expand(&mut self, task_id: &str) -> Result<ExpandStep, StoreError> {
        self.subtasks
            .expand(&mut self.store, task_id, self.generation)
            .await
    }

    /// Start an expand whose fetch is driven by the caller, see
    /// [`SubtaskAggregator::fetch`].
    pub fn begin_expand(&mut self, task_id: &str) -> Result<ExpandStep, StoreError> {
        self.subtasks
            .begin_expand(&mut self.store, task_id, self.generation)
    }

    pub fn finish_expand(
        &mut self,
        ticket: ExpandTicket,
        result: Result<Vec<Task>, SyncError>,
    ) -> bool {
        self.subtasks
            .finish_expand(&mut self.store, ticket, result, self.generation)
    }

    pub fn subtask_aggregator(&self) -> &SubtaskAggregator {
        &self.subtasks
    }

    pub fn collapse(&mut self, task_id: &str) -> Vec<TaskId> {
        self.subtasks.collapse(&mut self.store, task_id)
    }

    pub fn select_task(&mut self, task_id: &str) -> bool {
        self.store.select_task(task_id)
    }

    pub fn deselect_task(&mut self, task_id: &str) -> bool {
        self.store.deselect_task(task_id)
    }

    pub fn deselect_all(&mut self) {
        self.store.deselect_all();
    }

    pub fn select_group(&mut self, group_id: &str) -> usize {
        self.store.select_group(group_id)
    }

    pub fn deselect_group(&mut self, group_id: &str) -> usize {
        self.store.deselect_group(group_id)
    }

    /// Reconcile one inbound envelope.
    pub fn handle_event(&mut self, envelope: EventEnvelope) -> EventOutcome {
        if envelope.board_id != self.board_id {
            debug!(
                "Discarding {} for board {} (active {})",
                envelope.event.name(),
                envelope.board_id,
                self.board_id
            );
            return EventOutcome::Discarded;
        }

        if let Some(reason) = envelope.event.rejection() {
            let reason = reason.to_string();
            let pending = envelope
                .correlation_id
                .as_ref()
                .and_then(|id| self.pending.remove(id).map(|p| (id.clone(), p)));
            return match pending {
                Some((correlation_id, command)) => {
                    warn!(
                        "{} for {} rejected: {}",
                        command.name, command.task_id, reason
                    );
                    debug!("Rolling back {}", command.rollback.task_id());
                    self.store.restore(command.rollback);
                    self.store.notifier().publish(StoreEvent::CommandRejected {
                        correlation_id: correlation_id.clone(),
                        reason: reason.clone(),
                    });
                    EventOutcome::RolledBack {
                        correlation_id,
                        reason,
                    }
                }
                None => {
                    warn!("Rejection with no pending command: {}", reason);
                    EventOutcome::Discarded
                }
            };
        }

        if let Some(correlation_id) = &envelope.correlation_id {
            if let Some(command) = self.pending.remove(correlation_id) {
                debug!("{} for {} confirmed", command.name, command.task_id);
            }
        }

        match Reconciler::apply(&mut self.store, envelope.event) {
            Reconciled::Applied => EventOutcome::Applied,
            Reconciled::Stale => EventOutcome::Discarded,
        }
    }

    /// Handle every envelope already queued on the channel.
    pub fn drain_events(&mut self) -> Vec<EventOutcome> {
        let mut outcomes = Vec::new();
        loop {
            match self.events.try_recv() {
                Ok(envelope) => outcomes.push(self.handle_event(envelope)),
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("Missed {} events, store may be stale", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        outcomes
    }

    /// Wait for and handle the next envelope. `None` once the channel closed.
    pub async fn next_event(&mut self) -> Option<EventOutcome> {
        loop {
            match self.events.recv().await {
                Ok(envelope) => return Some(self.handle_event(envelope)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} events, store may be stale", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Treat commands older than the configured TTL as confirmed. Returns how
    /// many were dropped.
    pub fn expire_pending(&mut self, now: DateTime<Utc>) -> usize {
        let ttl = self.options.pending_ttl;
        let before = self.pending.len();
        self.pending.retain(|id, command| {
            let keep = now - command.issued_at < ttl;
            if !keep {
                debug!("Pending {} ({}) expired", command.name, id);
            }
            keep
        });
        before - self.pending.len()
    }
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use crate::models::{BoardSnapshot, SnapshotGroup};
    use crate::sync::{
        MemoryChannel, SortOrderEcho, SortOrderUpdate, StaticSnapshotSource, StaticSubtaskSource,
        SyncEvent,
    };
    use proptest::prelude::*;

    const GROUPS: [&str; 3] = ["todo", "doing", "done"];

    fn session(channel: &MemoryChannel, sizes: &[usize]) -> BoardSession {
        let mut next = 0;
        let groups = GROUPS
            .iter()
            .zip(sizes)
            .map(|(id, size)| {
                let tasks = (0..*size)
                    .map(|i| {
                        next += 1;
                        Task::new(format!("T{next}"), format!("task {next}"))
                            .with_status(*id, "#111")
                            .with_sort_order(i as i64 * 10)
                    })
                    .collect();
                SnapshotGroup {
                    id: id.to_string(),
                    name: id.to_string(),
                    color_code: "#111".to_string(),
                    category_id: None,
                    tasks,
                }
            })
            .collect();
        BoardSession::new(
            "board-p",
            Arc::new(channel.clone()),
            Arc::new(StaticSnapshotSource::new(
                BoardSnapshot { groups },
                GroupBy::Status,
            )),
            Arc::new(StaticSubtaskSource::default()),
            SessionOptions::default(),
        )
    }

    /// Turn raw numbers into a drag that is valid for the current store.
    fn pick_drag(store: &GroupedListStore, raw: (usize, usize, usize, usize)) -> Option<DragMove> {
        let non_empty: Vec<&crate::models::Group> =
            store.groups().iter().filter(|g| !g.is_empty()).collect();
        if non_empty.is_empty() {
            return None;
        }
        let from = non_empty[raw.0 % non_empty.len()];
        let from_index = raw.1 % from.len();
        let to = &store.groups()[raw.2 % store.groups().len()];
        Some(DragMove {
            task_id: from.tasks[from_index].clone(),
            from_group: from.id.clone(),
            from_index,
            to_group: to.id.clone(),
            to_index: raw.3 % (to.len() + 1),
        })
    }

    /// Turn raw numbers into a broadcast that touches the current store.
    fn pick_event(
        store: &GroupedListStore,
        raw: (usize, usize, usize),
        fresh: usize,
    ) -> Option<SyncEvent> {
        let group = GROUPS[raw.2 % GROUPS.len()].to_string();
        if raw.0 % 5 == 0 {
            return Some(SyncEvent::TaskCreated(
                Task::new(format!("N{fresh}"), "created")
                    .with_status(group, "#111")
                    .with_sort_order(raw.1 as i64 * 5),
            ));
        }
        let rows: Vec<TaskId> = store
            .groups()
            .iter()
            .flat_map(|g| g.tasks.iter().cloned())
            .collect();
        let id = rows.get(raw.1 % rows.len().max(1))?.clone();
        Some(match raw.0 % 5 {
            1 => SyncEvent::StatusChange {
                id,
                status_id: group,
                color_code: String::new(),
                status_category: None,
                completed_deps: None,
            },
            2 => SyncEvent::TaskDeleted { id },
            3 => SyncEvent::SortOrderChange(SortOrderEcho::Updates(vec![SortOrderUpdate {
                id,
                sort_order: raw.2 as i64 * 7 - 20,
                completed_at: None,
            }])),
            _ => SyncEvent::NameChange {
                id,
                parent_task: None,
                name: format!("renamed {fresh}"),
            },
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn failed_moves_leave_store_untouched(
            sizes in prop::collection::vec(0usize..6, 3),
            drags in prop::collection::vec((0usize..8, 0usize..8, 0usize..8, 0usize..8), 1..20)
        ) {
            tokio_test::block_on(async {
                let channel = MemoryChannel::new();
                let mut session = session(&channel, &sizes);
                session.load().await.unwrap();
                channel.set_failure(Some("offline"));

                let groups = session.store().groups().to_vec();
                let tasks: Vec<Task> = groups
                    .iter()
                    .flat_map(|g| g.tasks.iter())
                    .filter_map(|id| session.store().task(id).cloned())
                    .collect();

                for raw in drags {
                    let Some(drag) = pick_drag(session.store(), raw) else {
                        break;
                    };
                    let outcome = session.move_task(drag).await.unwrap();
                    assert!(matches!(outcome, CommandOutcome::TransportFailed { .. }));
                }

                assert_eq!(session.store().groups(), groups.as_slice());
                for task in &tasks {
                    assert_eq!(session.store().task(&task.id), Some(task));
                }
                assert!(channel.sent().is_empty());
                session.store().check_invariants().unwrap();
            });
        }

        #[test]
        fn sent_moves_keep_invariants(
            sizes in prop::collection::vec(0usize..6, 3),
            drags in prop::collection::vec((0usize..8, 0usize..8, 0usize..8, 0usize..8), 1..20)
        ) {
            tokio_test::block_on(async {
                let channel = MemoryChannel::new();
                let mut session = session(&channel, &sizes);
                session.load().await.unwrap();
                let total: usize = sizes.iter().sum();

                let mut sent = 0;
                for raw in drags {
                    let Some(drag) = pick_drag(session.store(), raw) else {
                        break;
                    };
                    let task_id = drag.task_id.clone();
                    let to_group = drag.to_group.clone();
                    session.move_task(drag).await.unwrap();
                    sent += 1;
                    assert_eq!(
                        session.store().selection().get_group_id(&task_id),
                        Some(&to_group)
                    );
                }

                let placed: usize = session.store().groups().iter().map(|g| g.len()).sum();
                assert_eq!(placed, total);
                assert_eq!(channel.sent().len(), sent);
                assert_eq!(session.pending_count(), sent);
                session.store().check_invariants().unwrap();
            });
        }

        #[test]
        fn replies_after_interleaved_broadcasts_keep_invariants(
            sizes in prop::collection::vec(0usize..6, 3),
            steps in prop::collection::vec(
                (
                    (0usize..8, 0usize..8, 0usize..8, 0usize..8),
                    prop::collection::vec((0usize..5, 0usize..8, 0usize..8), 0..4),
                    any::<bool>(),
                ),
                1..12
            )
        ) {
            tokio_test::block_on(async {
                let channel = MemoryChannel::new();
                let mut session = session(&channel, &sizes);
                session.load().await.unwrap();
                let mut fresh = 0;

                for (raw, broadcasts, refuse) in steps {
                    let Some(drag) = pick_drag(session.store(), raw) else {
                        break;
                    };
                    let outcome = session.move_task(drag).await.unwrap();
                    let correlation_id = outcome.correlation_id().unwrap().to_string();

                    for raw in broadcasts {
                        fresh += 1;
                        if let Some(event) = pick_event(session.store(), raw, fresh) {
                            channel.deliver(EventEnvelope::broadcast("board-p", event));
                            session.drain_events();
                            session.store().check_invariants().unwrap();
                        }
                    }

                    let reply = if refuse {
                        SyncEvent::Rejected { reason: "refused".to_string() }
                    } else {
                        SyncEvent::SortOrderChange(SortOrderEcho::Updates(Vec::new()))
                    };
                    channel.deliver(EventEnvelope::reply(correlation_id.clone(), "board-p", reply));
                    let outcomes = session.drain_events();
                    if refuse {
                        assert!(matches!(
                            outcomes.last(),
                            Some(EventOutcome::RolledBack { correlation_id: id, .. }) if *id == correlation_id
                        ));
                    }
                    assert_eq!(session.pending_count(), 0);
                    session.store().check_invariants().unwrap();
                }
            });
        }
    }
}
