//! Bounded, single-producer job queue shared by every worker of a batch.

use crate::{CancellationSignal, Error, Result, gauge::TaskGuard};
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

/// One unit of input, tagged with its position in the submitted sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Job<I> {
    pub index: usize,
    pub payload: I,
}

/// What a worker got when it asked the queue for work.
#[derive(Debug, PartialEq, Eq)]
pub enum Next<I> {
    Job(Job<I>),
    /// The producer closed the queue and every job has been taken.
    Exhausted,
    /// The signal tripped while waiting.
    Cancelled,
}

/// What happened to a job handed to [`JobSender::push`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Push {
    Queued,
    /// The signal tripped first and the job was dropped.
    Abandoned,
}

/// Creates a job queue holding at most `capacity` jobs.
///
/// # Panics
///
/// Panics if `capacity` is zero. [`PoolConfig::validate`] rejects that
/// value before a queue is ever built.
///
/// [`PoolConfig::validate`]: crate::PoolConfig::validate
pub fn job_queue<I>(capacity: usize) -> (JobSender<I>, JobReceiver<I>) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        JobSender { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}

/// The producing half. There is exactly one, and dropping it closes the
/// queue.
#[derive(Debug)]
pub struct JobSender<I> {
    tx: mpsc::Sender<Job<I>>,
}

impl<I> JobSender<I> {
    /// Queues `job`, waiting while the queue is full.
    ///
    /// The wait is abandoned as soon as `signal` trips. A tripped signal also
    /// wins over free capacity, so nothing is queued after a trip.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelError`] if every receiver is gone.
    pub async fn push(&self, job: Job<I>, signal: &CancellationSignal) -> Result<Push> {
        tokio::select! {
            biased;
            () = signal.tripped() => Ok(Push::Abandoned),
            sent = self.tx.send(job) => match sent {
                Ok(()) => Ok(Push::Queued),
                Err(_) => Err(Error::ChannelError {
                    context: "Job queue closed before the producer finished".to_owned(),
                }),
            },
        }
    }
}

/// The consuming half, cloned once per worker.
///
/// Workers take turns on the underlying receiver, so each job is handed to
/// exactly one of them.
#[derive(Debug)]
pub struct JobReceiver<I> {
    rx: Arc<Mutex<mpsc::Receiver<Job<I>>>>,
}

impl<I> Clone for JobReceiver<I> {
    fn clone(&self) -> Self {
        Self {
            rx: Arc::clone(&self.rx),
        }
    }
}

impl<I> JobReceiver<I> {
    /// Waits for the next job.
    ///
    /// Never blocks past a trip of `signal` or past the producer closing an
    /// empty queue.
    pub async fn next(&self, signal: &CancellationSignal) -> Next<I> {
        if signal.is_tripped() {
            return Next::Cancelled;
        }

        let mut rx = tokio::select! {
            biased;
            () = signal.tripped() => return Next::Cancelled,
            rx = self.rx.lock() => rx,
        };

        tokio::select! {
            biased;
            () = signal.tripped() => Next::Cancelled,
            job = rx.recv() => job.map_or(Next::Exhausted, Next::Job),
        }
    }
}

/// Feeds `inputs` into the queue in order, then closes it.
///
/// Returns how many jobs were queued. Stops early, and closes the queue all
/// the same, if the signal trips or every worker has gone away.
pub(crate) async fn feed_jobs<I>(
    jobs: JobSender<I>,
    inputs: Vec<I>,
    signal: CancellationSignal,
    _guard: TaskGuard,
) -> usize {
    let mut queued = 0;

    for (index, payload) in inputs.into_iter().enumerate() {
        match jobs.push(Job { index, payload }, &signal).await {
            Ok(Push::Queued) => queued += 1,
            Ok(Push::Abandoned) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Producer stopped by signal after {queued} jobs");
                break;
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Producer stopped after {queued} jobs: {_e}");
                break;
            }
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Producer closed the job queue ({queued} jobs)");

    queued
}
