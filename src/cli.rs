use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{group_by, replay, show};

#[derive(Parser)]
#[command(name = "tasksync")]
#[command(about = "Grouped task boards with optimistic, server-confirmed edits")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Team id sent with reorder commands
    #[arg(long, global = true)]
    pub team: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print a board file grouped by status, priority or phase
    Show(show::Args),

    /// Run a script of edits and server events against a board file
    Replay(replay::Args),

    /// Show or change the stored grouping of a board
    GroupBy(group_by::Args),
}
