use tokio::sync::broadcast;
use tracing::debug;

use crate::models::{GroupId, TaskId};

const NOTIFY_CAPACITY: usize = 256;

/// Change notifications published after each store mutation.
///
/// Views subscribe to these to recompute counters, badges and rows; they
/// never mutate the store themselves.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    TaskAdded {
        task_id: TaskId,
        group_id: GroupId,
        parent_id: Option<TaskId>,
    },
    TaskRemoved {
        task_id: TaskId,
        group_id: GroupId,
        parent_id: Option<TaskId>,
    },
    TaskMoved {
        task_id: TaskId,
        from_group: GroupId,
        to_group: GroupId,
    },
    TaskUpdated {
        task_id: TaskId,
    },
    /// The task's badge for the active dimension now shows `group_id`'s value.
    GroupValueChanged {
        task_id: TaskId,
        group_id: GroupId,
        color_code: String,
    },
    GroupCountsChanged {
        group_ids: Vec<GroupId>,
    },
    /// The last task left the group; the view may reset its collapse toggle.
    GroupEmptied {
        group_id: GroupId,
    },
    SubtasksChanged {
        parent_id: TaskId,
    },
    SortOrderUpdated {
        task_ids: Vec<TaskId>,
    },
    SelectionChanged,
    CommandRejected {
        correlation_id: String,
        reason: String,
    },
    StoreReset,
}

/// Fan-out of [`StoreEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<StoreEvent>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    /// Publish `event`; having no subscribers is not an error.
    pub fn publish(&self, event: StoreEvent) {
        if self.sender.send(event).is_err() {
            debug!("Store event dropped, no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifier_delivers_to_every_subscriber() {
        let notifier = ChangeNotifier::new();
        let mut rx1 = notifier.subscribe();
        let mut rx2 = notifier.subscribe();
        assert_eq!(notifier.subscriber_count(), 2);

        notifier.publish(StoreEvent::StoreReset);

        assert_eq!(rx1.recv().await.unwrap(), StoreEvent::StoreReset);
        assert_eq!(rx2.recv().await.unwrap(), StoreEvent::StoreReset);
    }

    #[test]
    fn notifier_publish_without_subscribers_is_silent() {
        let notifier = ChangeNotifier::new();
        notifier.publish(StoreEvent::SelectionChanged);
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
