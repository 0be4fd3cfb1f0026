use anyhow::Result;
use clap::Args as ClapArgs;

use tasksync::config::{Config, Preferences};
use tasksync::models::GroupBy;

#[derive(ClapArgs)]
pub struct Args {
    /// Board id
    pub board_id: String,

    /// New grouping; prints the stored one when omitted
    pub value: Option<GroupBy>,
}

pub async fn execute(args: Args, config: &Config) -> Result<()> {
    let preferences = Preferences::new(config.preferences_path());

    match args.value {
        Some(group_by) => {
            preferences.set_group_by(&args.board_id, group_by)?;
            println!("{}: grouped by {}", args.board_id, group_by.label());
        }
        None => {
            let group_by = preferences
                .group_by(&args.board_id)
                .unwrap_or(config.default_group_by);
            println!("{}: grouped by {}", args.board_id, group_by.label());
        }
    }
    Ok(())
}
