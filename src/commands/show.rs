use anyhow::Result;
use clap::Args as ClapArgs;
use std::path::PathBuf;

use crate::commands::common::{self, BoardFile};
use tasksync::config::Config;
use tasksync::models::GroupBy;

#[derive(ClapArgs)]
pub struct Args {
    /// Board file (YAML or JSON)
    pub board: PathBuf,

    /// Grouping dimension: status, priority or phase
    #[arg(short, long)]
    pub group_by: Option<GroupBy>,

    /// Only show tasks whose name contains this text
    #[arg(short, long)]
    pub search: Option<String>,

    /// Include sub-tasks as top-level rows
    #[arg(long)]
    pub subtasks: bool,

    /// Expand these parents before printing
    #[arg(short, long)]
    pub expand: Vec<String>,
}

pub async fn execute(args: Args, config: &Config) -> Result<()> {
    let board = BoardFile::load(&args.board)?;
    let (mut session, _channel) =
        common::open_session(board, config, args.group_by, args.search, args.subtasks).await?;

    for parent in &args.expand {
        session.expand(parent).await?;
    }

    common::print_board(&session);
    Ok(())
}
