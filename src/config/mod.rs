mod loader;
mod preferences;

pub use loader::{Config, LogConfig};
pub use preferences::Preferences;
