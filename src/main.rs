use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use tasksync::config::{Config, LogConfig};

/// Log to stderr, or to `log.file` when set. `RUST_LOG` overrides the
/// configured level.
fn init_tracing(log: &LogConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&log.level))
        .map_err(|e| anyhow!("invalid log filter: {e}"))?;

    match &log.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| anyhow!("log file has no name: {:?}", path))?;
            let appender = tracing_appender::rolling::never(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.clone())?.with_team_id(cli.team.clone());
    let _guard = init_tracing(&config.log)?;

    match cli.command {
        Commands::Show(args) => commands::show::execute(args, &config).await,
        Commands::Replay(args) => commands::replay::execute(args, &config).await,
        Commands::GroupBy(args) => commands::group_by::execute(args, &config).await,
    }
}
