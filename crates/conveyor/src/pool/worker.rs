use crate::{
    CancellationSignal, Error, Result, Transform,
    gauge::TaskGuard,
    pool::{
        queue::{Job, JobReceiver, Next},
        sink::Outcome,
    },
};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Worker task that turns jobs into outcomes until the queue is exhausted or
/// the signal trips.
///
/// The transform runs on Tokio's blocking pool. A job that has been taken
/// from the queue always runs to completion, even if the signal trips in the
/// meantime; the signal is next observed when the outcome is written.
///
/// # Arguments
///
/// - `worker_id`: Position of this worker in the set (used for logs and
///   errors).
/// - `jobs`: Shared receiving end of the job queue.
/// - `results`: This worker's clone of the result channel.
/// - `signal`: The batch's cancellation signal.
/// - `transform`: The per-item function.
/// - `_guard`: Keeps this worker counted as active until it returns.
///
/// Returns the number of outcomes this worker delivered.
///
/// # Errors
///
/// Returns [`Error::WorkerFailed`] if the transform panicked. The signal is
/// tripped first so the rest of the set stops too.
pub async fn worker_loop<I, T>(
    worker_id: usize,
    jobs: JobReceiver<I>,
    results: mpsc::Sender<Outcome<T::Output>>,
    signal: CancellationSignal,
    transform: Arc<T>,
    _guard: TaskGuard,
) -> Result<usize>
where
    I: Send + 'static,
    T: Transform<I>,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} started");

    let mut delivered = 0;

    loop {
        let Job { index, payload } = match jobs.next(&signal).await {
            Next::Job(job) => job,
            Next::Exhausted => break,
            Next::Cancelled => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Worker {worker_id} observed cancellation");
                break;
            }
        };

        let transform = Arc::clone(&transform);
        let value = match tokio::task::spawn_blocking(move || transform.apply(payload)).await {
            Ok(value) => value,
            Err(e) => {
                signal.trip();
                return Err(Error::WorkerFailed {
                    worker_id,
                    context: format!("transform of job {index} did not complete: {e}"),
                });
            }
        };

        if !deliver(&results, Outcome { index, value }, &signal).await {
            break;
        }
        delivered += 1;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Worker {worker_id} stopped after {delivered} jobs");

    Ok(delivered)
}

/// Writes `outcome`, preferring delivery when the sink has room and giving
/// up only if the sink stays full after the signal trips.
async fn deliver<O>(
    results: &mpsc::Sender<Outcome<O>>,
    outcome: Outcome<O>,
    signal: &CancellationSignal,
) -> bool {
    match results.try_send(outcome) {
        Ok(()) => true,
        Err(TrySendError::Closed(_)) => false,
        Err(TrySendError::Full(outcome)) => {
            tokio::select! {
                biased;
                sent = results.send(outcome) => sent.is_ok(),
                () = signal.tripped() => false,
            }
        }
    }
}
