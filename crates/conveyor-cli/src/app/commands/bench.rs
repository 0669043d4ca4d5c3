use super::command_signal;
use crate::app::{
    config::{BenchArgs, RunConfig},
    report::{BenchReport, BenchRun, Report},
};
use conveyor::{CancellationSignal, TextProcessor};
use core::hint::black_box;
use std::time::Instant;

#[derive(Clone, Copy, Debug)]
enum Mode {
    Sequential,
    Batch,
    Concurrent,
}

impl Mode {
    const ALL: [Self; 3] = [Self::Sequential, Self::Batch, Self::Concurrent];

    const fn name(self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Batch => "batch",
            Self::Concurrent => "concurrent",
        }
    }
}

/// Times every processing mode over `items` generated strings.
///
/// Each mode gets `warmup` untimed runs, then `iterations` timed ones.
/// Concurrent runs use one worker per CPU unless `--workers` is set, and
/// batched runs use the library's default batch size.
pub async fn run(
    config: &RunConfig,
    args: &BenchArgs,
    root: &CancellationSignal,
) -> anyhow::Result<Report> {
    let signal = command_signal(config, root);
    let processor = TextProcessor::new();
    let workers = config.workers.unwrap_or(0);
    let data: Vec<String> = (0..args.items).map(|i| format!("test data {i}")).collect();

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Benchmarking {} items: {} warm-up runs, {} iterations",
        args.items,
        args.warmup,
        args.iterations
    );

    let mut modes = Vec::with_capacity(Mode::ALL.len());
    for mode in Mode::ALL {
        for _ in 0..args.warmup {
            run_mode(mode, &processor, &data, workers, &signal).await?;
        }

        let started = Instant::now();
        for _ in 0..args.iterations {
            black_box(run_mode(mode, &processor, &data, workers, &signal).await?);
        }
        let per_iteration = started.elapsed().div_f64(args.iterations as f64);

        modes.push(BenchRun {
            mode: mode.name(),
            per_iteration,
            per_item: per_iteration.div_f64(args.items as f64),
        });
    }

    signal.disarm().await;

    Ok(Report::Bench(BenchReport {
        items: args.items,
        warmup: args.warmup,
        iterations: args.iterations,
        modes,
    }))
}

async fn run_mode(
    mode: Mode,
    processor: &TextProcessor,
    data: &[String],
    workers: usize,
    signal: &CancellationSignal,
) -> conveyor::Result<Vec<String>> {
    match mode {
        Mode::Sequential => processor.process(data, signal),
        Mode::Batch => processor.process_batch(data, 0, signal),
        Mode::Concurrent => processor.process_concurrent(data, workers, signal).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::config::{CliArgs, Command};
    use clap::Parser;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn small_bench_reports_every_mode() {
        let config = RunConfig::try_from(
            CliArgs::try_parse_from([
                "conveyor",
                "bench",
                "--items",
                "20",
                "--warmup",
                "1",
                "--iterations",
                "2",
            ])
            .expect("args"),
        )
        .expect("config");
        let Command::Bench(args) = config.command.clone() else {
            panic!("expected the bench command");
        };

        let Report::Bench(report) = run(&config, &args, &CancellationSignal::new())
            .await
            .expect("bench")
        else {
            panic!("expected a bench report");
        };

        let names: Vec<_> = report.modes.iter().map(|m| m.mode).collect();
        assert_eq!(names, ["sequential", "batch", "concurrent"]);
        assert!(report.modes.iter().all(|m| m.per_item <= m.per_iteration));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tripped_root_aborts_the_bench() {
        let config = RunConfig::try_from(
            CliArgs::try_parse_from(["conveyor", "bench"]).expect("args"),
        )
        .expect("config");
        let Command::Bench(args) = config.command.clone() else {
            panic!("expected the bench command");
        };
        let root = CancellationSignal::new();
        root.trip();

        let err = run(&config, &args, &root).await.expect_err("cancelled");
        assert!(matches!(
            err.downcast_ref::<conveyor::Error>(),
            Some(conveyor::Error::Cancelled { .. })
        ));
    }
}
