use crate::{Error, Result};
use core::time::Duration;

/// Default capacity of the bounded job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Default capacity of the result channel.
pub const DEFAULT_RESULT_CAPACITY: usize = 10;

/// Sizing and deadline for one [`Dispatcher`](crate::Dispatcher).
///
/// ```
/// use conveyor::PoolConfig;
/// use core::time::Duration;
///
/// let config = PoolConfig::new(3)
///     .with_queue_capacity(10)
///     .with_timeout(Duration::from_secs(2));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PoolConfig {
    /// Number of workers started for each batch.
    pub num_workers: usize,
    /// Capacity of the job queue. The producer waits once it is full.
    pub queue_capacity: usize,
    /// Capacity of the result channel. Workers wait once it is full.
    pub result_capacity: usize,
    /// Deadline applied to each batch, measured from the start of dispatch.
    pub timeout: Option<Duration>,
}

impl PoolConfig {
    pub const fn new(num_workers: usize) -> Self {
        Self {
            num_workers,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            result_capacity: DEFAULT_RESULT_CAPACITY,
            timeout: None,
        }
    }

    #[must_use]
    pub const fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity;
        self
    }

    #[must_use]
    pub const fn with_result_capacity(mut self, result_capacity: usize) -> Self {
        self.result_capacity = result_capacity;
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Checks the configuration before any worker is started.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the worker count or either channel
    /// capacity is zero.
    pub fn validate(&self) -> Result<()> {
        if self.num_workers == 0 {
            return Err(Error::invalid_input("num_workers must be greater than 0"));
        }
        if self.queue_capacity == 0 {
            return Err(Error::invalid_input("queue_capacity must be greater than 0"));
        }
        if self.result_capacity == 0 {
            return Err(Error::invalid_input(
                "result_capacity must be greater than 0",
            ));
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(num_cpus::get())
    }
}
