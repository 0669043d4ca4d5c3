use super::command_signal;
use crate::app::{
    config::{ProcessArgs, RunConfig},
    report::{ModeRun, ProcessReport, Report},
};
use conveyor::{CancellationSignal, TextProcessor};
use std::time::Instant;

const DEFAULT_WORKERS: usize = 2;

pub const SAMPLES: [&str; 5] = [
    "hello world",
    "go programming",
    "performance optimization",
    "concurrent processing",
    "memory management",
];

/// Runs the sample sentences through every processing mode.
pub async fn run(
    config: &RunConfig,
    args: &ProcessArgs,
    root: &CancellationSignal,
) -> anyhow::Result<Report> {
    let signal = command_signal(config, root);
    let processor = TextProcessor::new();
    let workers = config.workers.unwrap_or(DEFAULT_WORKERS);
    let mut modes = Vec::with_capacity(3);

    let started = Instant::now();
    let outputs = processor.process(&SAMPLES, &signal)?;
    modes.push(ModeRun {
        mode: "sequential",
        elapsed: started.elapsed(),
        outputs,
    });

    let started = Instant::now();
    let outputs = processor.process_batch(&SAMPLES, args.batch_size, &signal)?;
    modes.push(ModeRun {
        mode: "batch",
        elapsed: started.elapsed(),
        outputs,
    });

    let started = Instant::now();
    let outputs = processor
        .process_concurrent(&SAMPLES, workers, &signal)
        .await?;
    modes.push(ModeRun {
        mode: "concurrent",
        elapsed: started.elapsed(),
        outputs,
    });

    signal.disarm().await;

    #[cfg(feature = "tracing")]
    tracing::debug!("{} buffers idle after processing", processor.pool().idle());

    Ok(Report::Process(ProcessReport {
        inputs: SAMPLES.iter().map(|s| (*s).to_owned()).collect(),
        modes,
    }))
}
