mod reassign;
mod reconcile;
mod reorder;
mod session;
mod subtasks;

pub use reassign::{FieldChange, GroupReassignment};
pub use reconcile::{Reconciled, Reconciler};
pub use reorder::{DragMove, ReorderCoordinator};
pub use session::{BoardSession, EventOutcome, SessionOptions};
pub use subtasks::{ExpandStep, ExpandTicket, SubtaskAggregator};
