use anyhow::bail;
use clap::{Args, Parser, Subcommand, ValueEnum};
use conveyor::{DEFAULT_QUEUE_CAPACITY, PoolConfig};
use core::time::Duration;

/// Runtime configuration for the `conveyor` binary.
///
/// Global options apply to every subcommand and can also be set through
/// environment variables (or a `.env` file in the working directory).
#[derive(Parser, Debug, Clone)]
#[command(
    name = "conveyor",
    version,
    about = "Bounded worker pools, pipelines and pooled text processing",
    arg_required_else_help = true
)]
pub struct CliArgs {
    /// Number of workers used by the pool, process and bench commands.
    ///
    /// When unset each command uses its own default: 3 for `pool`, 2 for
    /// `process` and one per CPU for `bench`.
    ///
    /// Environment variable: `CONVEYOR_WORKERS`
    #[arg(long, global = true, env = "CONVEYOR_WORKERS")]
    pub workers: Option<usize>,

    /// Capacity of the bounded job queue.
    ///
    /// The producer waits once this many jobs are queued and no worker has
    /// picked them up yet.
    ///
    /// Environment variable: `CONVEYOR_QUEUE_CAPACITY`
    #[arg(long, global = true, env = "CONVEYOR_QUEUE_CAPACITY", default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Deadline for the whole run, in milliseconds.
    ///
    /// When unset `pool` uses 2000 ms and the other commands run without a
    /// deadline.
    ///
    /// Environment variable: `CONVEYOR_TIMEOUT_MS`
    #[arg(long, global = true, env = "CONVEYOR_TIMEOUT_MS")]
    pub timeout_ms: Option<u64>,

    /// How the run report is printed on stdout.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// How diagnostics are logged on stderr. Filter them with `RUST_LOG`.
    ///
    /// Environment variable: `CONVEYOR_LOG_FORMAT`
    #[arg(long, global = true, value_enum, env = "CONVEYOR_LOG_FORMAT", default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Doubles numbered jobs on a bounded worker pool under a deadline.
    Pool(PoolArgs),
    /// Squares and increments numbers through a two-stage pipeline.
    Pipeline(PipelineArgs),
    /// Upper-cases sample sentences sequentially, in batches and
    /// concurrently.
    Process(ProcessArgs),
    /// Times every text processing mode over generated items.
    Bench(BenchArgs),
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PoolArgs {
    /// Number of jobs, numbered from 1.
    #[arg(long, default_value_t = 10)]
    pub jobs: u64,

    /// Simulated latency of each job, in milliseconds.
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Reject jobs above this number instead of processing them.
    #[arg(long)]
    pub reject_above: Option<u64>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct PipelineArgs {
    /// Feed the numbers 1 through `count`.
    #[arg(long, default_value_t = 5)]
    pub count: u64,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProcessArgs {
    /// Batch size of the batched mode. 0 means the library default.
    #[arg(long, default_value_t = 2)]
    pub batch_size: usize,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct BenchArgs {
    /// Number of generated items.
    #[arg(long, default_value_t = 1000)]
    pub items: usize,

    /// Untimed runs of each mode before measuring.
    #[arg(long, default_value_t = 3)]
    pub warmup: usize,

    /// Timed runs of each mode.
    #[arg(long, default_value_t = 10)]
    pub iterations: usize,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub workers: Option<usize>,
    pub queue_capacity: usize,
    pub timeout: Option<Duration>,
    pub format: OutputFormat,
    pub log_format: LogFormat,
    pub command: Command,
}

impl RunConfig {
    /// Pool sizing for a command, falling back to that command's defaults.
    pub fn pool_config(&self, default_workers: usize, default_timeout: Option<Duration>) -> PoolConfig {
        let config = PoolConfig::new(self.workers.unwrap_or(default_workers))
            .with_queue_capacity(self.queue_capacity);

        match self.timeout.or(default_timeout) {
            Some(timeout) => config.with_timeout(timeout),
            None => config,
        }
    }
}

impl TryFrom<CliArgs> for RunConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.workers == Some(0) {
            bail!("CONVEYOR_WORKERS must be greater than 0");
        }

        if args.queue_capacity == 0 {
            bail!("CONVEYOR_QUEUE_CAPACITY must be greater than 0");
        }

        if args.timeout_ms == Some(0) {
            bail!("CONVEYOR_TIMEOUT_MS must be greater than 0");
        }

        match &args.command {
            Command::Pool(pool) if pool.delay_ms > 60_000 => {
                bail!("--delay-ms ({}) must not exceed 60000", pool.delay_ms);
            }
            Command::Bench(bench) if bench.items == 0 || bench.iterations == 0 => {
                bail!("--items and --iterations must be greater than 0");
            }
            _ => {}
        }

        Ok(Self {
            workers: args.workers,
            queue_capacity: args.queue_capacity,
            timeout: args.timeout_ms.map(Duration::from_millis),
            format: args.format,
            log_format: args.log_format,
            command: args.command,
        })
    }
}
