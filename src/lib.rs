//! Grouped task-list synchronization.
//!
//! A [`store::GroupedListStore`] holds one board's tasks partitioned into
//! groups by status, priority or phase. [`engine::BoardSession`] applies user
//! edits optimistically, sends them over a [`sync::SyncChannel`] and folds the
//! server's broadcasts back in.

pub mod config;
pub mod engine;
pub mod models;
pub mod store;
pub mod sync;
pub mod utils;
