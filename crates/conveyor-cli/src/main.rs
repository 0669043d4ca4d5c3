mod app;

use app::{
    commands,
    config::{CliArgs, RunConfig},
    shutdown::trip_on_shutdown,
    telemetry::init_telemetry,
};
use clap::Parser;
use conveyor::CancellationSignal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = RunConfig::try_from(args)?;

    init_telemetry(config.log_format)?;

    #[cfg(feature = "tracing")]
    {
        if cfg!(debug_assertions) {
            tracing::debug!("Running with full config: {:#?}", config);
        }
    }

    let root = CancellationSignal::new();
    let watcher = tokio::spawn(trip_on_shutdown(root.clone()));

    let report = commands::run(&config, &root).await;
    watcher.abort();
    let report = report?;

    println!("{}", report.render(config.format)?);

    if let Some(err) = report.error() {
        anyhow::bail!("{err}");
    }
    Ok(())
}
