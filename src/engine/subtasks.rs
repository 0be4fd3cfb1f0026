use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{Task, TaskId};
use crate::store::{GroupedListStore, StoreError};
use crate::sync::{SubtaskQuery, SubtaskSource, SyncError};

/// First step of an expand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpandStep {
    /// Nothing to fetch; the row is expanded already.
    Shown,
    /// A fetch for this parent is in flight; the call was ignored.
    AlreadyLoading,
    /// Fetch with [`SubtaskAggregator::fetch`], then hand the result to
    /// [`SubtaskAggregator::finish_expand`].
    Fetch(ExpandTicket),
}

/// Identifies one in-flight sub-task fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandTicket {
    pub parent_id: TaskId,
    pub generation: u64,
}

/// Lazy loading and collapsing of nested sub-task lists.
#[derive(Clone)]
pub struct SubtaskAggregator {
    source: Arc<dyn SubtaskSource>,
    page_size: usize,
}

impl SubtaskAggregator {
    pub fn new(source: Arc<dyn SubtaskSource>, page_size: usize) -> Self {
        Self {
            source,
            page_size: page_size.max(1),
        }
    }

    pub fn begin_expand(
        &self,
        store: &mut GroupedListStore,
        parent_id: &str,
        generation: u64,
    ) -> Result<ExpandStep, StoreError> {
        let (loading, sub_task_count) = store
            .task(parent_id)
            .map(|p| (p.sub_tasks_loading, p.sub_task_count))
            .ok_or_else(|| StoreError::TaskNotFound(parent_id.to_string()))?;

        if loading {
            debug!("Sub-tasks of {} already loading", parent_id);
            return Ok(ExpandStep::AlreadyLoading);
        }

        let loaded = store.sub_tasks(parent_id).is_some();
        if loaded {
            store.update_task(parent_id, |p| p.show_sub_tasks = true);
            return Ok(ExpandStep::Shown);
        }
        if sub_task_count == 0 {
            store.set_sub_tasks(parent_id, Vec::new())?;
            return Ok(ExpandStep::Shown);
        }

        store.set_sub_tasks_loading(parent_id, true);
        Ok(ExpandStep::Fetch(ExpandTicket {
            parent_id: parent_id.to_string(),
            generation,
        }))
    }

    /// Fetch every page of the ticket's sub-tasks. The first page tells how
    /// many more there are; those are requested together.
    pub async fn fetch(&self, ticket: &ExpandTicket) -> Result<Vec<Task>, SyncError> {
        let query = |page| SubtaskQuery {
            parent_task: ticket.parent_id.clone(),
            page,
            size: self.page_size,
        };

        let first = self.source.fetch_page(&query(1)).await?;
        let pages = first.total.div_ceil(self.page_size);
        let mut items = first.items;

        if pages > 1 {
            let queries: Vec<SubtaskQuery> = (2..=pages).map(query).collect();
            let rest = join_all(queries.iter().map(|q| self.source.fetch_page(q))).await;
            for page in rest {
                items.extend(page?.items);
            }
        }

        debug!(
            "Fetched {} sub-tasks of {} in {} pages",
            items.len(),
            ticket.parent_id,
            pages.max(1)
        );
        Ok(items)
    }

    /// Install fetched sub-tasks, unless the board was reloaded or the parent
    /// disappeared while the fetch was in flight. Returns whether the result
    /// was applied.
    pub fn finish_expand(
        &self,
        store: &mut GroupedListStore,
        ticket: ExpandTicket,
        result: Result<Vec<Task>, SyncError>,
        current_generation: u64,
    ) -> bool {
        if ticket.generation != current_generation {
            debug!(
                "Discarding sub-tasks of {} from generation {}",
                ticket.parent_id, ticket.generation
            );
            return false;
        }
        if store.task(&ticket.parent_id).is_none() {
            debug!("Discarding sub-tasks of removed task {}", ticket.parent_id);
            return false;
        }

        match result {
            Ok(sub_tasks) => match store.set_sub_tasks(&ticket.parent_id, sub_tasks) {
                Ok(_) => true,
                Err(e) => {
                    warn!("Could not attach sub-tasks of {}: {}", ticket.parent_id, e);
                    store.set_sub_tasks_loading(&ticket.parent_id, false);
                    false
                }
            },
            Err(e) => {
                warn!("Failed to fetch sub-tasks of {}: {}", ticket.parent_id, e);
                store.set_sub_tasks_loading(&ticket.parent_id, false);
                false
            }
        }
    }

    /// Expand in one go.
    pub async fn expand(
        &self,
        store: &mut GroupedListStore,
        parent_id: &str,
        generation: u64,
    ) -> Result<ExpandStep, StoreError> {
        let step = self.begin_expand(store, parent_id, generation)?;
        if let ExpandStep::Fetch(ticket) = &step {
            let result = self.fetch(ticket).await;
            self.finish_expand(store, ticket.clone(), result, generation);
        }
        Ok(step)
    }

    /// Deselect and drop the parent's loaded sub-tasks. Local only.
    pub fn collapse(&self, store: &mut GroupedListStore, parent_id: &str) -> Vec<TaskId> {
        store.clear_sub_tasks(parent_id)
    }
}
