use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Args as ClapArgs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::commands::common::{self, BoardFile};
use tasksync::config::Config;
use tasksync::engine::{BoardSession, DragMove};
use tasksync::models::{GroupBy, GroupId, TaskId};
use tasksync::sync::{CommandOutcome, EventEnvelope, MemoryChannel, SyncEvent};

#[derive(ClapArgs)]
pub struct Args {
    /// Board file (YAML or JSON)
    pub board: PathBuf,

    /// Script of steps to run (YAML)
    pub script: PathBuf,

    /// Grouping dimension to start with
    #[arg(short, long)]
    pub group_by: Option<GroupBy>,

    /// Print every command sent, as JSON
    #[arg(long)]
    pub commands: bool,
}

#[derive(Debug, Deserialize)]
struct Script {
    steps: Vec<Step>,
}

/// One scripted action. Edits go through the session; `event` and `reply`
/// play the server's part.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Step {
    Move(DragMove),
    Set {
        task_id: TaskId,
        field: GroupBy,
        #[serde(default)]
        value: Option<GroupId>,
    },
    Rename {
        task_id: TaskId,
        name: String,
    },
    Describe {
        task_id: TaskId,
        description: String,
    },
    Estimate {
        task_id: TaskId,
        hours: u32,
        minutes: u32,
    },
    Dates {
        task_id: TaskId,
        #[serde(default)]
        start: Option<DateTime<Utc>>,
        #[serde(default)]
        end: Option<DateTime<Utc>>,
    },
    Label {
        task_id: TaskId,
        label_id: String,
    },
    Expand(TaskId),
    Collapse(TaskId),
    Select(TaskId),
    Deselect(TaskId),
    SelectGroup(GroupId),
    DeselectGroup(GroupId),
    DeselectAll,
    GroupBy(GroupBy),
    /// Make sends fail with this reason; `null` restores them.
    FailTransport(Option<String>),
    /// A broadcast from the server.
    Event(SyncEvent),
    /// The server's answer to the most recent command.
    Reply(SyncEvent),
}

impl Script {
    fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script: {:?}", path))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse script: {:?}", path))
    }
}

struct Replay {
    session: BoardSession,
    channel: MemoryChannel,
    last_correlation: Option<String>,
}

impl Replay {
    fn record(&mut self, outcome: CommandOutcome) {
        match &outcome {
            CommandOutcome::Sent { correlation_id } => {
                println!("  sent as {}", correlation_id);
                self.last_correlation = Some(correlation_id.clone());
            }
            CommandOutcome::TransportFailed { reason } => {
                println!("  not sent, rolled back: {}", reason);
            }
            CommandOutcome::Rejected { reason } => println!("  rejected: {}", reason),
        }
    }

    fn deliver(&mut self, envelope: EventEnvelope) {
        self.channel.deliver(envelope);
        for outcome in self.session.drain_events() {
            println!("  {:?}", outcome);
        }
    }

    async fn run(&mut self, step: Step) -> Result<()> {
        match step {
            Step::Move(drag) => {
                let outcome = self.session.move_task(drag).await?;
                self.record(outcome);
            }
            Step::Set {
                task_id,
                field,
                value,
            } => {
                let outcome = self
                    .session
                    .change_group_field(&task_id, field, value)
                    .await?;
                self.record(outcome);
            }
            Step::Rename { task_id, name } => {
                let outcome = self.session.rename(&task_id, &name).await?;
                self.record(outcome);
            }
            Step::Describe {
                task_id,
                description,
            } => {
                let outcome = self.session.set_description(&task_id, &description).await?;
                self.record(outcome);
            }
            Step::Estimate {
                task_id,
                hours,
                minutes,
            } => {
                let outcome = self
                    .session
                    .set_time_estimate(&task_id, hours, minutes)
                    .await?;
                self.record(outcome);
            }
            Step::Dates {
                task_id,
                start,
                end,
            } => {
                let outcome = self.session.set_start_date(&task_id, start).await?;
                self.record(outcome);
                let outcome = self.session.set_end_date(&task_id, end).await?;
                self.record(outcome);
            }
            Step::Label { task_id, label_id } => {
                let outcome = self.session.toggle_label(&task_id, &label_id).await?;
                self.record(outcome);
            }
            Step::Expand(task_id) => {
                let step = self.session.expand(&task_id).await?;
                println!("  {:?}", step);
            }
            Step::Collapse(task_id) => {
                let removed = self.session.collapse(&task_id);
                println!("  {} sub-tasks dropped", removed.len());
            }
            Step::Select(task_id) => {
                self.session.select_task(&task_id);
            }
            Step::Deselect(task_id) => {
                self.session.deselect_task(&task_id);
            }
            Step::SelectGroup(group_id) => {
                let count = self.session.select_group(&group_id);
                println!("  {} selected", count);
            }
            Step::DeselectGroup(group_id) => {
                let count = self.session.deselect_group(&group_id);
                println!("  {} deselected", count);
            }
            Step::DeselectAll => self.session.deselect_all(),
            Step::GroupBy(group_by) => {
                self.session.set_group_by(group_by).await?;
                self.last_correlation = None;
            }
            Step::FailTransport(reason) => self.channel.set_failure(reason.as_deref()),
            Step::Event(event) => {
                let envelope = EventEnvelope::broadcast(self.session.board_id().clone(), event);
                self.deliver(envelope);
            }
            Step::Reply(event) => {
                let envelope = match &self.last_correlation {
                    Some(id) => {
                        EventEnvelope::reply(id.clone(), self.session.board_id().clone(), event)
                    }
                    None => EventEnvelope::broadcast(self.session.board_id().clone(), event),
                };
                self.deliver(envelope);
            }
        }
        Ok(())
    }
}

pub async fn execute(args: Args, config: &Config) -> Result<()> {
    let board = BoardFile::load(&args.board)?;
    let script = Script::load(&args.script)?;
    let (session, channel) =
        common::open_session(board, config, args.group_by, None, false).await?;

    let mut replay = Replay {
        session,
        channel,
        last_correlation: None,
    };

    let total = script.steps.len();
    for (i, step) in script.steps.into_iter().enumerate() {
        println!("[{}/{}] {:?}", i + 1, total, step);
        replay
            .run(step)
            .await
            .with_context(|| format!("Step {} failed", i + 1))?;
    }
    info!(
        "Replayed {} steps, {} commands pending",
        total,
        replay.session.pending_count()
    );

    println!();
    common::print_board(&replay.session);

    if args.commands {
        println!("\nCommands:");
        for envelope in replay.channel.sent() {
            println!("{}", envelope.to_json()?);
        }
    }
    Ok(())
}
