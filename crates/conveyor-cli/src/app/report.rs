use crate::app::config::OutputFormat;
use conveyor::{DispatchState, Outcome};
use core::{fmt, time::Duration};
use serde::Serialize;

/// What a command produced, printed as text or JSON.
#[derive(Debug, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Report {
    Pool(PoolReport),
    Pipeline(PipelineReport),
    Process(ProcessReport),
    Bench(BenchReport),
}

#[derive(Debug, Serialize)]
pub struct PoolReport {
    pub state: DispatchState,
    pub workers: usize,
    pub total: usize,
    pub completed: usize,
    pub failures: usize,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub results: Vec<Outcome<u64>>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub inputs: Vec<u64>,
    pub outputs: Vec<u64>,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProcessReport {
    pub inputs: Vec<String>,
    pub modes: Vec<ModeRun>,
}

#[derive(Debug, Serialize)]
pub struct ModeRun {
    pub mode: &'static str,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    pub outputs: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub items: usize,
    pub warmup: usize,
    pub iterations: usize,
    pub modes: Vec<BenchRun>,
}

#[derive(Debug, Serialize)]
pub struct BenchRun {
    pub mode: &'static str,
    #[serde(with = "millis")]
    pub per_iteration: Duration,
    #[serde(with = "millis")]
    pub per_item: Duration,
}

impl Report {
    /// Batch-level error of an interrupted run, if any.
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Pool(report) => report.error.as_deref(),
            Self::Pipeline(report) => report.error.as_deref(),
            Self::Process(_) | Self::Bench(_) => None,
        }
    }

    pub fn render(&self, format: OutputFormat) -> anyhow::Result<String> {
        Ok(match format {
            OutputFormat::Text => self.to_string(),
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pool(report) => fmt::Display::fmt(report, f),
            Self::Pipeline(report) => fmt::Display::fmt(report, f),
            Self::Process(report) => fmt::Display::fmt(report, f),
            Self::Bench(report) => fmt::Display::fmt(report, f),
        }
    }
}

impl fmt::Display for PoolReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for outcome in &self.results {
            match &outcome.value {
                Ok(value) => writeln!(f, "job {}: {value}", outcome.index + 1)?,
                Err(err) => writeln!(f, "job {}: {err}", outcome.index + 1)?,
            }
        }
        write!(
            f,
            "{}: {} of {} jobs on {} workers in {:?} ({} failed)",
            self.state, self.completed, self.total, self.workers, self.elapsed, self.failures
        )?;
        if let Some(err) = &self.error {
            write!(f, "\nerror: {err}")?;
        }
        Ok(())
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (input, output) in self.inputs.iter().zip(&self.outputs) {
            writeln!(f, "{input} -> {output}")?;
        }
        write!(
            f,
            "{} of {} items in {:?}",
            self.outputs.len(),
            self.inputs.len(),
            self.elapsed
        )?;
        if let Some(err) = &self.error {
            write!(f, "\nerror: {err}")?;
        }
        Ok(())
    }
}

impl fmt::Display for ProcessReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for run in &self.modes {
            if !first {
                writeln!(f)?;
            }
            first = false;

            writeln!(f, "{} ({:?}):", run.mode, run.elapsed)?;
            for (input, output) in self.inputs.iter().zip(&run.outputs) {
                writeln!(f, "  {input} -> {output}")?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} items, {} warm-up runs, {} timed iterations",
            self.items, self.warmup, self.iterations
        )?;
        for run in &self.modes {
            write!(
                f,
                "\n{:<12} {:>12?}/iteration {:>10?}/item",
                run.mode, run.per_iteration, run.per_item
            )?;
        }
        Ok(())
    }
}

/// Serializes a [`Duration`] as fractional milliseconds.
mod millis {
    use core::time::Duration;
    use serde::Serializer;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_nanos() as f64 / 1_000_000.0)
    }
}
