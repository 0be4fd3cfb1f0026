use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::{BoardId, GroupId, TaskId};
use crate::store::{GroupedListStore, StoreError};
use crate::sync::{SortOrderChange, SortOrderUpdate};

/// One drag-drop gesture, in view positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragMove {
    pub task_id: TaskId,
    pub from_group: GroupId,
    pub from_index: usize,
    pub to_group: GroupId,
    pub to_index: usize,
}

impl DragMove {
    pub fn is_cross_group(&self) -> bool {
        self.from_group != self.to_group
    }
}

/// Turns drags into local moves plus `sort-order-change` commands, and folds
/// the authoritative order echo back into the store.
#[derive(Debug, Clone)]
pub struct ReorderCoordinator {
    template_id: BoardId,
    team_id: Option<String>,
}

impl ReorderCoordinator {
    pub fn new(template_id: impl Into<BoardId>, team_id: Option<String>) -> Self {
        Self {
            template_id: template_id.into(),
            team_id,
        }
    }

    /// Build the command from the store as it is before the move.
    ///
    /// `to_index` carries the sort order of the task currently sitting at the
    /// drop position, else the destination's last sort order, else `-1`.
    pub fn plan(
        &self,
        store: &GroupedListStore,
        drag: &DragMove,
    ) -> Result<SortOrderChange, StoreError> {
        let from = store
            .group(&drag.from_group)
            .ok_or_else(|| StoreError::GroupNotFound(drag.from_group.clone()))?;
        let to = store
            .group(&drag.to_group)
            .ok_or_else(|| StoreError::GroupNotFound(drag.to_group.clone()))?;

        if from.tasks.get(drag.from_index) != Some(&drag.task_id) {
            return Err(StoreError::StaleIndex {
                task_id: drag.task_id.clone(),
                group_id: drag.from_group.clone(),
                index: drag.from_index,
            });
        }
        let task = store
            .task(&drag.task_id)
            .cloned()
            .ok_or_else(|| StoreError::TaskNotFound(drag.task_id.clone()))?;

        let order_at = |id: &TaskId| store.task(id).map(|t| t.sort_order);
        let neighbour = to.tasks.get(drag.to_index).and_then(order_at);
        let last = to.tasks.last().and_then(order_at);

        Ok(SortOrderChange {
            template_id: self.template_id.clone(),
            from_index: task.sort_order,
            to_index: neighbour.or(last).unwrap_or(-1),
            to_last_index: neighbour.is_none(),
            from_group: drag.from_group.clone(),
            to_group: drag.to_group.clone(),
            group_by: store.group_by(),
            task,
            team_id: self.team_id.clone(),
        })
    }

    /// Apply the move to the local lists right away.
    pub fn apply_local(
        &self,
        store: &mut GroupedListStore,
        drag: &DragMove,
    ) -> Result<usize, StoreError> {
        store.reposition(
            &drag.task_id,
            &drag.from_group,
            drag.from_index,
            &drag.to_group,
            drag.to_index,
        )
    }

    /// Overwrite sort orders from the server. Membership is never derived
    /// from the echo; unknown ids are skipped. Returns the ids updated.
    pub fn apply_echo(store: &mut GroupedListStore, updates: &[SortOrderUpdate]) -> Vec<TaskId> {
        let updated: Vec<TaskId> = updates
            .iter()
            .filter(|u| store.set_sort_order(&u.id, u.sort_order, u.completed_at))
            .map(|u| u.id.clone())
            .collect();
        if !updated.is_empty() {
            store.resort_containing(&updated);
        }
        debug!(
            "Sort order echo: {} of {} entries applied",
            updated.len(),
            updates.len()
        );
        updated
    }
}
