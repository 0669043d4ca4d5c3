//! Text processing built on pooled scratch buffers.
//!
//! [`TextProcessor`] upper-cases the ASCII letters of each input string and
//! offers three ways to run a whole slice:
//!
//! - [`process`](TextProcessor::process): one item at a time, one pooled
//!   buffer per item.
//! - [`process_batch`](TextProcessor::process_batch): items in fixed-size
//!   batches, one pooled buffer per batch.
//! - [`process_concurrent`](TextProcessor::process_concurrent): items spread
//!   over a [`Dispatcher`] worker set, reassembled in input order.
//!
//! ## Error Cases
//! - `InvalidInput`: the input slice is empty.
//! - `Timeout` / `Cancelled`: the signal tripped before every item was
//!   processed. Sequential modes stop at the next item boundary.

mod buffer;

pub use buffer::*;

use crate::{CancellationSignal, Dispatcher, Error, PoolConfig, Result, TransformError};
use tokio::time::Instant;

/// Batch size used when `process_batch` is given zero.
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Clone, Debug, Default)]
pub struct TextProcessor {
    pool: BufferPool,
}

impl TextProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn with_pool(pool: BufferPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &BufferPool {
        &self.pool
    }

    /// Upper-cases the ASCII letters of `item`; other characters are kept
    /// as they are.
    pub fn transform(&self, item: &str) -> String {
        let mut buf = self.pool.get();
        transform_into(&mut buf, item)
    }

    /// Processes `data` sequentially.
    ///
    /// # Errors
    ///
    /// See the [module docs](self).
    pub fn process<S: AsRef<str>>(
        &self,
        data: &[S],
        signal: &CancellationSignal,
    ) -> Result<Vec<String>> {
        ensure_not_empty(data)?;

        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len());
        for item in data {
            check_signal(signal, started, out.len(), data.len())?;
            out.push(self.transform(item.as_ref()));
        }
        Ok(out)
    }

    /// Processes `data` in batches of `batch_size`, sharing one scratch
    /// buffer per batch. A `batch_size` of 0 means [`DEFAULT_BATCH_SIZE`].
    ///
    /// # Errors
    ///
    /// See the [module docs](self).
    pub fn process_batch<S: AsRef<str>>(
        &self,
        data: &[S],
        batch_size: usize,
        signal: &CancellationSignal,
    ) -> Result<Vec<String>> {
        ensure_not_empty(data)?;

        let batch_size = if batch_size == 0 {
            DEFAULT_BATCH_SIZE
        } else {
            batch_size
        };

        let started = Instant::now();
        let mut out = Vec::with_capacity(data.len());
        for batch in data.chunks(batch_size) {
            let mut buf = self.pool.get();
            for item in batch {
                check_signal(signal, started, out.len(), data.len())?;
                out.push(transform_into(&mut buf, item.as_ref()));
            }
        }
        Ok(out)
    }

    /// Processes `data` on `num_workers` workers. Zero workers means one per
    /// CPU. The result keeps the input order.
    ///
    /// # Errors
    ///
    /// See the [module docs](self). [`Error::WorkerFailed`] is returned if a
    /// worker dies.
    pub async fn process_concurrent<S: AsRef<str>>(
        &self,
        data: &[S],
        num_workers: usize,
        signal: &CancellationSignal,
    ) -> Result<Vec<String>> {
        ensure_not_empty(data)?;

        let num_workers = if num_workers == 0 {
            num_cpus::get()
        } else {
            num_workers
        };

        let processor = self.clone();
        let upper = move |item: String| Ok::<_, TransformError>(processor.transform(&item));
        let inputs: Vec<String> = data.iter().map(|s| s.as_ref().to_owned()).collect();

        let dispatcher = Dispatcher::new(PoolConfig::new(num_workers), upper).with_parent(signal);
        let outcomes = dispatcher.dispatch(inputs).await?.into_result()?;

        outcomes
            .into_iter()
            .map(|outcome| {
                outcome.value.map_err(|err| Error::WorkerFailed {
                    worker_id: outcome.index,
                    context: err.to_string(),
                })
            })
            .collect()
    }
}

fn transform_into(buf: &mut Vec<u8>, item: &str) -> String {
    buf.clear();
    buf.extend(item.bytes().map(|b| b.to_ascii_uppercase()));
    // Only ASCII bytes changed, so the buffer is still valid UTF-8.
    String::from_utf8_lossy(buf.as_slice()).into_owned()
}

fn ensure_not_empty<S>(data: &[S]) -> Result<()> {
    if data.is_empty() {
        return Err(Error::invalid_input("data cannot be empty"));
    }
    Ok(())
}

fn check_signal(
    signal: &CancellationSignal,
    started: Instant,
    completed: usize,
    total: usize,
) -> Result<()> {
    if signal.is_tripped() {
        return Err(Error::interrupted(
            signal.cause(),
            started.elapsed(),
            completed,
            total,
        ));
    }
    Ok(())
}
