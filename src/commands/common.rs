use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tasksync::config::{Config, Preferences};
use tasksync::engine::{BoardSession, SessionOptions};
use tasksync::models::{BoardId, BoardSnapshot, GroupBy, SnapshotGroup, Task, TaskId};
use tasksync::store::{CheckState, GroupedListStore};
use tasksync::sync::{MemoryChannel, StaticSnapshotSource, StaticSubtaskSource};
use tasksync::utils::truncate_str;

const NAME_WIDTH: usize = 40;

/// A board exported to disk: its groups under `group_by` plus the sub-tasks
/// served on expand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardFile {
    pub board_id: BoardId,
    #[serde(default)]
    pub group_by: GroupBy,
    pub groups: Vec<SnapshotGroup>,
    #[serde(default)]
    pub sub_tasks: HashMap<TaskId, Vec<Task>>,
}

impl BoardFile {
    /// Reads YAML (or JSON, which YAML accepts).
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read board file: {:?}", path))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse board file: {:?}", path))
    }
}

/// Open an offline session over `board`. An explicit `group_by` wins over
/// the stored preference and is not persisted.
pub async fn open_session(
    board: BoardFile,
    config: &Config,
    group_by: Option<GroupBy>,
    search: Option<String>,
    include_subtasks: bool,
) -> Result<(BoardSession, MemoryChannel)> {
    let channel = MemoryChannel::new();
    let snapshots = StaticSnapshotSource::new(
        BoardSnapshot {
            groups: board.groups,
        },
        board.group_by,
    );
    let subtasks = StaticSubtaskSource::new(board.sub_tasks);

    let mut options = SessionOptions::from_config(config);
    options.search = search;
    options.include_subtasks = include_subtasks;
    if let Some(group_by) = group_by {
        options.group_by = group_by;
    }

    let mut session = BoardSession::new(
        board.board_id,
        Arc::new(channel.clone()),
        Arc::new(snapshots),
        Arc::new(subtasks),
        options,
    );
    if group_by.is_none() {
        session = session.with_preferences(Preferences::new(config.preferences_path()));
    }
    session
        .load()
        .await
        .context("Failed to load board snapshot")?;
    Ok((session, channel))
}

fn check_symbol(state: CheckState) -> &'static str {
    match state {
        CheckState::Checked => "[x]",
        CheckState::Indeterminate => "[-]",
        CheckState::Unchecked => "[ ]",
    }
}

fn print_task(store: &GroupedListStore, task_id: &str, depth: usize) {
    let Some(task) = store.task(task_id) else {
        return;
    };
    let mark = if store.selection().is_selected(task_id) {
        "*"
    } else {
        " "
    };
    let subs = if task.sub_task_count > 0 {
        format!(" (+{})", task.sub_task_count)
    } else {
        String::new()
    };
    println!(
        "  {}{} {:<10} {:<width$} #{}{}",
        "  ".repeat(depth),
        mark,
        task.id,
        truncate_str(&task.name, NAME_WIDTH),
        task.sort_order,
        subs,
        width = NAME_WIDTH
    );
    if task.show_sub_tasks {
        for child in store.sub_tasks(task_id).unwrap_or_default() {
            print_task(store, child, depth + 1);
        }
    }
}

pub fn print_board(session: &BoardSession) {
    let store = session.store();
    println!("Board: {} (by {})", session.board_id(), store.group_by());
    for group in store.groups() {
        println!(
            "\n{} {} {} [{}]",
            check_symbol(store.check_state(&group.id)),
            group.name,
            group.color_code,
            group.len()
        );
        for task in store.tasks_in_group(&group.id) {
            print_task(store, &task.id, 0);
        }
    }
}
