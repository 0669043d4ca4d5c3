use super::command_signal;
use crate::app::{
    config::{PipelineArgs, RunConfig},
    report::{PipelineReport, Report},
};
use conveyor::{CancellationSignal, Pipeline};
use std::time::Instant;

/// Feeds `1..=count` through `square` then `increment`.
pub async fn run(
    config: &RunConfig,
    args: &PipelineArgs,
    root: &CancellationSignal,
) -> anyhow::Result<Report> {
    let signal = command_signal(config, root);
    let inputs: Vec<u64> = (1..=args.count).collect();

    #[cfg(feature = "tracing")]
    tracing::info!("Running {} items through 2 stages", inputs.len());

    let started = Instant::now();
    let result = Pipeline::source(inputs.clone(), &signal, 1)?
        .stage("square", |x: u64| x * x)
        .stage("increment", |x: u64| x + 1)
        .run()
        .await;
    let elapsed = started.elapsed();
    signal.disarm().await;

    let (outputs, error) = match result {
        Ok(outputs) => (outputs, None),
        Err(err) if err.is_interrupted() => {
            #[cfg(feature = "tracing")]
            tracing::warn!("Pipeline stopped early: {err}");
            (Vec::new(), Some(err.to_string()))
        }
        Err(err) => return Err(err.into()),
    };

    Ok(Report::Pipeline(PipelineReport {
        inputs,
        outputs,
        elapsed,
        error,
    }))
}
