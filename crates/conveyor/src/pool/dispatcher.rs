//! The outer driver of one batch.
//!
//! A [`Dispatcher`] owns the whole lifecycle of a batch: it derives the
//! batch's [`CancellationSignal`], builds the job queue and the result
//! channel, starts the worker set and a producer, drains the results while
//! the workers run, joins every task and finally decides how the batch
//! ended.
//!
//! ## State machine
//!
//! ```text
//! Idle ──dispatch──▶ Running ──┬──▶ Completed   every job produced an outcome
//!                              ├──▶ TimedOut    deadline elapsed first
//!                              └──▶ Cancelled   explicit or parent trip first
//! ```
//!
//! Terminal states are final. A dispatcher runs one batch; build a new one
//! for the next batch.

use crate::{
    CancellationSignal, Error, PoolConfig, Result, Transform, TripCause,
    gauge::TaskGauge,
    pool::{
        queue::{feed_jobs, job_queue},
        sink::{Outcome, result_sink},
        worker::worker_loop,
    },
};
use core::{fmt, marker::PhantomData, time::Duration};
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::time::Instant;

/// Lifecycle of a [`Dispatcher`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DispatchState {
    Idle,
    Running,
    Completed,
    TimedOut,
    Cancelled,
}

impl DispatchState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::TimedOut | Self::Cancelled)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a finished batch produced, complete or not.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Batch<O> {
    /// Terminal state the batch ended in.
    pub state: DispatchState,
    /// One outcome per job that was started and delivered, sorted by index.
    pub results: Vec<Outcome<O>>,
    /// Number of jobs submitted.
    pub total: usize,
    pub elapsed: Duration,
}

impl<O> Batch<O> {
    pub fn completed(&self) -> usize {
        self.results.len()
    }

    pub const fn is_complete(&self) -> bool {
        matches!(self.state, DispatchState::Completed)
    }

    /// Number of outcomes carrying a [`TransformError`](crate::TransformError).
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|o| !o.is_ok()).count()
    }

    /// The batch-level error describing why the batch stopped early, or
    /// `None` if it completed.
    pub fn error(&self) -> Option<Error> {
        let completed = self.results.len();
        match self.state {
            DispatchState::Completed => None,
            DispatchState::TimedOut => Some(Error::Timeout {
                elapsed: self.elapsed,
                completed,
                total: self.total,
            }),
            _ => Some(Error::Cancelled {
                completed,
                total: self.total,
            }),
        }
    }

    /// Returns the outcomes of a completed batch, or the batch-level error
    /// describing why it stopped early. Partial outcomes are dropped.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if the batch timed out.
    /// - [`Error::Cancelled`] if it was cancelled.
    pub fn into_result(self) -> Result<Vec<Outcome<O>>> {
        match self.error() {
            Some(err) => Err(err),
            None => Ok(self.results),
        }
    }
}

/// Runs one batch of jobs through a bounded worker set.
///
/// ```
/// use conveyor::{Dispatcher, DispatchState, PoolConfig, TransformError};
/// use core::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> conveyor::Result<()> {
/// let config = PoolConfig::new(3).with_timeout(Duration::from_secs(2));
/// let dispatcher = Dispatcher::new(config, |x: u64| Ok::<_, TransformError>(x * 2));
///
/// let batch = dispatcher.dispatch(1..=5).await?;
/// assert_eq!(batch.state, DispatchState::Completed);
/// assert_eq!(batch.results[4].value, Ok(10));
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher<I, T> {
    config: PoolConfig,
    transform: Arc<T>,
    parent: Option<CancellationSignal>,
    state: Mutex<DispatchState>,
    gauge: TaskGauge,
    _jobs: PhantomData<fn(I)>,
}

impl<I, T> Dispatcher<I, T>
where
    I: Send + 'static,
    T: Transform<I>,
{
    pub fn new(config: PoolConfig, transform: T) -> Self {
        Self {
            config,
            transform: Arc::new(transform),
            parent: None,
            state: Mutex::new(DispatchState::Idle),
            gauge: TaskGauge::new(),
            _jobs: PhantomData,
        }
    }

    /// Ties the batch to `parent`: tripping the parent cancels the batch.
    #[must_use]
    pub fn with_parent(mut self, parent: &CancellationSignal) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    pub fn state(&self) -> DispatchState {
        *self.state.lock()
    }

    /// Number of workers and producers still running. Zero whenever
    /// [`dispatch`](Self::dispatch) is not in progress.
    pub fn active_tasks(&self) -> usize {
        self.gauge.active()
    }

    /// Processes `inputs` and waits for every task of the batch to exit.
    ///
    /// Interrupted batches are returned as `Ok` with a partial result and a
    /// `TimedOut` or `Cancelled` state; use [`Batch::into_result`] to turn
    /// them into errors. An empty input completes immediately.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] if the configuration is invalid or this
    ///   dispatcher already ran a batch.
    /// - [`Error::WorkerFailed`] if a worker panicked or was aborted.
    pub async fn dispatch(&self, inputs: impl IntoIterator<Item = I>) -> Result<Batch<T::Output>> {
        self.config.validate()?;
        self.begin()?;

        let started = Instant::now();
        let inputs: Vec<I> = inputs.into_iter().collect();
        let total = inputs.len();

        if total == 0 {
            return Ok(self.finish(DispatchState::Completed, Vec::new(), 0, started));
        }

        let signal = self.batch_signal();
        let abandon = AbandonGuard {
            state: &self.state,
            signal: signal.clone(),
            finished: false,
        };
        let num_workers = self.config.num_workers;

        #[cfg(feature = "tracing")]
        tracing::debug!("Dispatching {total} jobs across {num_workers} workers");

        let (job_tx, job_rx) = job_queue(self.config.queue_capacity);
        let (result_tx, sink) = result_sink(self.config.result_capacity, total);

        let workers: Vec<_> = (0..num_workers)
            .map(|worker_id| {
                tokio::spawn(worker_loop(
                    worker_id,
                    job_rx.clone(),
                    result_tx.clone(),
                    signal.clone(),
                    Arc::clone(&self.transform),
                    self.gauge.enter(),
                ))
            })
            .collect();

        // Only the workers may keep these ends open.
        drop(job_rx);
        drop(result_tx);

        let producer = tokio::spawn(feed_jobs(job_tx, inputs, signal.clone(), self.gauge.enter()));

        let results = sink.drain().await;
        let joined = join_all(workers).await;
        let _queued = producer.await;

        signal.disarm().await;
        abandon.defuse();

        let mut failure = None;
        for (worker_id, joined) in joined.into_iter().enumerate() {
            let err = match joined {
                Ok(Ok(_)) => continue,
                Ok(Err(err)) => err,
                Err(e) => Error::WorkerFailed {
                    worker_id,
                    context: e.to_string(),
                },
            };
            #[cfg(feature = "tracing")]
            tracing::error!("{err}");
            failure.get_or_insert(err);
        }

        let state = if results.len() == total {
            DispatchState::Completed
        } else if failure.is_none() && signal.cause() == Some(TripCause::Deadline) {
            DispatchState::TimedOut
        } else {
            DispatchState::Cancelled
        };
        let batch = self.finish(state, results, total, started);

        match failure {
            Some(err) => Err(err),
            None => Ok(batch),
        }
    }

    fn batch_signal(&self) -> CancellationSignal {
        match (&self.parent, self.config.timeout) {
            (Some(parent), Some(timeout)) => parent.child_with_deadline(timeout),
            (Some(parent), None) => parent.child(),
            (None, Some(timeout)) => CancellationSignal::with_deadline(timeout),
            (None, None) => CancellationSignal::new(),
        }
    }

    fn begin(&self) -> Result<()> {
        let mut state = self.state.lock();
        if *state != DispatchState::Idle {
            return Err(Error::invalid_input(format!(
                "dispatcher already ran a batch (state: {state})"
            )));
        }
        *state = DispatchState::Running;
        Ok(())
    }

    fn finish(
        &self,
        state: DispatchState,
        results: Vec<Outcome<T::Output>>,
        total: usize,
        started: Instant,
    ) -> Batch<T::Output> {
        *self.state.lock() = state;

        let elapsed = started.elapsed();

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Batch {state} after {elapsed:?} ({} of {total} jobs)",
            results.len()
        );

        Batch {
            state,
            results,
            total,
            elapsed,
        }
    }
}

/// Trips the batch signal and marks the dispatcher cancelled if the
/// `dispatch` future is dropped before every task was joined.
struct AbandonGuard<'a> {
    state: &'a Mutex<DispatchState>,
    signal: CancellationSignal,
    finished: bool,
}

impl AbandonGuard<'_> {
    fn defuse(mut self) {
        self.finished = true;
    }
}

impl Drop for AbandonGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Dispatch dropped mid-batch, cancelling its tasks");

        self.signal.trip();
        *self.state.lock() = DispatchState::Cancelled;
    }
}

impl<I, T> fmt::Debug for Dispatcher<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .field("state", &*self.state.lock())
            .field("active_tasks", &self.gauge.active())
            .finish_non_exhaustive()
    }
}

/// Runs `inputs` through `num_workers` workers under a `timeout` deadline.
///
/// Convenience wrapper over [`Dispatcher`] with the default channel
/// capacities.
///
/// # Errors
///
/// - [`Error::InvalidInput`] if `num_workers` is zero.
/// - [`Error::Timeout`] if the deadline elapsed before every job finished.
/// - [`Error::WorkerFailed`] if a worker panicked.
pub async fn submit<I, T>(
    inputs: impl IntoIterator<Item = I>,
    num_workers: usize,
    timeout: Duration,
    transform: T,
) -> Result<Vec<Outcome<T::Output>>>
where
    I: Send + 'static,
    T: Transform<I>,
{
    let config = PoolConfig::new(num_workers).with_timeout(timeout);
    Dispatcher::new(config, transform)
        .dispatch(inputs)
        .await?
        .into_result()
}
