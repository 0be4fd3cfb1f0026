mod grouped;
mod notify;
mod registry;
mod rollback;
mod selection;

pub use grouped::{GroupedListStore, Placement, RegroupOutcome, StoreError};
pub use notify::{ChangeNotifier, StoreEvent};
pub use registry::TaskRegistry;
pub use rollback::Rollback;
pub use selection::{CheckState, SelectionIndex};
