pub mod common;
pub mod group_by;
pub mod replay;
pub mod show;
