//! Linear chain of single-task stages connected by bounded channels.
//!
//! Each stage's output channel is the next stage's input. A stage closes its
//! output only after its input closed or the pipeline's signal tripped, and
//! every stage watches the same signal on its reads and its writes. A trip
//! therefore stops the whole chain, not just its head.
//!
//! Items keep their order: each stage is a single task.
//!
//! ```
//! use conveyor::{CancellationSignal, Pipeline};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> conveyor::Result<()> {
//! let signal = CancellationSignal::new();
//! let out = Pipeline::source(1..=5_u64, &signal, 1)?
//!     .stage("square", |x| x * x)
//!     .stage("increment", |x| x + 1)
//!     .run()
//!     .await?;
//! assert_eq!(out, [2, 5, 10, 17, 26]);
//! # Ok(())
//! # }
//! ```

mod stage;

use crate::{CancellationSignal, Error, Result, gauge::TaskGauge};
use futures::{StreamExt, future::join_all};
use stage::{run_source, run_stage};
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_stream::wrappers::ReceiverStream;

struct StageTask {
    name: String,
    handle: JoinHandle<()>,
}

/// A pipeline whose last stage produces items of type `T`.
///
/// Building a pipeline spawns its tasks right away, so it must be built
/// inside a Tokio runtime.
pub struct Pipeline<T> {
    rx: mpsc::Receiver<T>,
    tasks: Vec<StageTask>,
    signal: CancellationSignal,
    capacity: usize,
    total: usize,
    gauge: TaskGauge,
}

impl<T: Send + 'static> Pipeline<T> {
    /// Starts a pipeline that emits `inputs` in order.
    ///
    /// The pipeline runs under a child of `signal`, so tripping `signal`
    /// (or its deadline elapsing) stops every stage.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `capacity` is zero.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn source(
        inputs: impl IntoIterator<Item = T>,
        signal: &CancellationSignal,
        capacity: usize,
    ) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::invalid_input(
                "pipeline capacity must be greater than 0",
            ));
        }

        let inputs: Vec<T> = inputs.into_iter().collect();
        let total = inputs.len();
        let signal = signal.child();
        let gauge = TaskGauge::new();

        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(run_source(inputs, tx, signal.clone(), gauge.enter()));

        Ok(Self {
            rx,
            tasks: vec![StageTask {
                name: "source".to_owned(),
                handle,
            }],
            signal,
            capacity,
            total,
            gauge,
        })
    }

    /// Appends a stage applying `f` to every item.
    ///
    /// `f` runs inline on the stage task and should not block.
    #[must_use]
    pub fn stage<O, F>(self, name: impl Into<String>, f: F) -> Pipeline<O>
    where
        O: Send + 'static,
        F: Fn(T) -> O + Send + Sync + 'static,
    {
        let Self {
            rx,
            mut tasks,
            signal,
            capacity,
            total,
            gauge,
        } = self;

        let name = name.into();
        let (tx, next_rx) = mpsc::channel(capacity);
        let handle = tokio::spawn(run_stage(
            name.clone(),
            rx,
            tx,
            f,
            signal.clone(),
            gauge.enter(),
        ));
        tasks.push(StageTask { name, handle });

        Pipeline {
            rx: next_rx,
            tasks,
            signal,
            capacity,
            total,
            gauge,
        }
    }

    /// The signal every stage of this pipeline observes. Tripping it stops
    /// this pipeline only.
    pub fn signal(&self) -> &CancellationSignal {
        &self.signal
    }

    /// Number of source and stage tasks still running.
    pub fn active_tasks(&self) -> usize {
        self.gauge.active()
    }

    /// Hands out the final stage's output as a stream.
    ///
    /// The stage tasks keep running detached. They exit once the input is
    /// exhausted, the signal trips, or the stream is dropped.
    pub fn into_stream(self) -> ReceiverStream<T> {
        ReceiverStream::new(self.rx)
    }

    /// Collects every output and waits for all stages to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the deadline elapsed before every item made it
    ///   through.
    /// - [`Error::Cancelled`] if the signal was tripped before that.
    /// - [`Error::WorkerFailed`] if a stage panicked. `worker_id` is the
    ///   stage's position, with the source at 0.
    pub async fn run(self) -> Result<Vec<T>> {
        let started = Instant::now();
        let Self {
            rx,
            tasks,
            signal,
            total,
            ..
        } = self;

        let outputs: Vec<T> = ReceiverStream::new(rx).collect().await;

        let (names, handles): (Vec<_>, Vec<_>) =
            tasks.into_iter().map(|t| (t.name, t.handle)).unzip();
        let joined = join_all(handles).await;
        signal.disarm().await;

        for (worker_id, (name, joined)) in names.into_iter().zip(joined).enumerate() {
            if let Err(e) = joined {
                return Err(Error::WorkerFailed {
                    worker_id,
                    context: format!("stage {name}: {e}"),
                });
            }
        }

        let completed = outputs.len();
        if completed == total {
            return Ok(outputs);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Pipeline stopped after {completed} of {total} items");

        Err(Error::interrupted(
            signal.cause(),
            started.elapsed(),
            completed,
            total,
        ))
    }
}
