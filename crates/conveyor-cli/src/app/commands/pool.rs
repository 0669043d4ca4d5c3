use crate::app::{
    config::{PoolArgs, RunConfig},
    report::{PoolReport, Report},
};
use conveyor::{CancellationSignal, Dispatcher, TransformError, Validated};
use core::time::Duration;

const DEFAULT_WORKERS: usize = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Doubles jobs `1..=jobs`, each after a simulated delay.
///
/// Jobs above `--reject-above` are refused by a validator and show up as
/// per-item errors; they never stop the batch.
pub async fn run(
    config: &RunConfig,
    args: &PoolArgs,
    root: &CancellationSignal,
) -> anyhow::Result<Report> {
    let pool = config.pool_config(DEFAULT_WORKERS, Some(DEFAULT_TIMEOUT));
    let delay = Duration::from_millis(args.delay_ms);
    let limit = args.reject_above.unwrap_or(u64::MAX);

    let within_limit = move |job: &u64| {
        if *job <= limit {
            Ok(())
        } else {
            Err(TransformError::rejected(format!("job {job} exceeds {limit}")))
        }
    };
    let double = move |job: u64| {
        std::thread::sleep(delay);
        Ok::<_, TransformError>(job * 2)
    };

    #[cfg(feature = "tracing")]
    tracing::info!(
        "Running {} jobs on {} workers (timeout {:?})",
        args.jobs,
        pool.num_workers,
        pool.timeout
    );

    let dispatcher = Dispatcher::new(pool, Validated::new(within_limit, double)).with_parent(root);
    let batch = dispatcher.dispatch(1..=args.jobs).await?;

    let error = batch.error().map(|err| err.to_string());
    if let Some(_err) = &error {
        #[cfg(feature = "tracing")]
        tracing::warn!("Pool stopped early: {_err}");
    }

    Ok(Report::Pool(PoolReport {
        state: batch.state,
        workers: pool.num_workers,
        total: batch.total,
        completed: batch.completed(),
        failures: batch.failures(),
        elapsed: batch.elapsed,
        results: batch.results,
        error,
    }))
}
