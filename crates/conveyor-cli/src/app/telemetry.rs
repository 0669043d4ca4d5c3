//! Diagnostics for the `conveyor` binary.
//!
//! Events from the library and the binary go through `tracing` and are
//! written to stderr, leaving stdout to the run report. Verbosity follows
//! `RUST_LOG` and defaults to `info`; `debug` shows worker and signal
//! activity, `trace` shows every worker and stage starting and stopping.
//!
//! ```bash
//! RUST_LOG=debug conveyor pool --log-format json
//! ```

use crate::app::config::LogFormat;
use tracing_subscriber::{EnvFilter, fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_telemetry(format: LogFormat) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_target(false)
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_file(true)
                    .with_writer(std::io::stderr)
                    .pretty(),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_thread_ids(true)
                    .with_line_number(true)
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_file(true)
                    .with_writer(std::io::stderr)
                    .json(),
            )
            .try_init()?,
    }

    Ok(())
}
