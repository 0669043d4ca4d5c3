mod bench;
mod pipeline;
mod pool;
mod process;

use crate::app::{
    config::{Command, RunConfig},
    report::Report,
};
use conveyor::CancellationSignal;

/// Runs the selected subcommand under `root`.
///
/// Tripping `root` (Ctrl+C, SIGTERM) stops the command at its next
/// cancellation point.
pub async fn run(config: &RunConfig, root: &CancellationSignal) -> anyhow::Result<Report> {
    match &config.command {
        Command::Pool(args) => pool::run(config, args, root).await,
        Command::Pipeline(args) => pipeline::run(config, args, root).await,
        Command::Process(args) => process::run(config, args, root).await,
        Command::Bench(args) => bench::run(config, args, root).await,
    }
}

/// Signal for one command: a child of `root`, bounded by the configured
/// deadline if there is one.
fn command_signal(config: &RunConfig, root: &CancellationSignal) -> CancellationSignal {
    match config.timeout {
        Some(timeout) => root.child_with_deadline(timeout),
        None => root.child(),
    }
}
