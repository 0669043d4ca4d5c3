//! Error types for batch dispatch and pipelines.
//!
//! This module defines two error enums with deliberately different reach:
//!
//! - [`Error`] is a *batch-level* error. It is returned directly to whoever
//!   called the dispatcher, the pipeline or the text processor, and it means
//!   the batch as a whole did not finish normally.
//! - [`TransformError`] is a *per-item* error. It is stored inside an
//!   [`Outcome`](crate::Outcome) and never aborts the batch it belongs to.
//!
//! ## Error Cases
//! - `InvalidInput`: the caller's input failed a precondition before any
//!   worker started.
//! - `Timeout`: the cancellation signal tripped because its deadline elapsed.
//! - `Cancelled`: the cancellation signal was tripped explicitly or by a
//!   parent signal.
//! - `ChannelError`: an internal channel closed unexpectedly.
//! - `WorkerFailed`: a worker or stage task panicked or was aborted.

use crate::TripCause;
use core::time::Duration;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified batch-level error type.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The input or the configuration was rejected before any work started.
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// The deadline elapsed before every job was drained.
    #[error("Timed out after {elapsed:?} ({completed} of {total} jobs completed)")]
    Timeout {
        elapsed: Duration,
        completed: usize,
        total: usize,
    },

    /// The batch was cancelled before every job was drained.
    #[error("Cancelled ({completed} of {total} jobs completed)")]
    Cancelled { completed: usize, total: usize },

    /// Internal channel send/receive failure.
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// A worker or pipeline stage terminated abnormally.
    #[error("Worker {worker_id} failed: {context}")]
    WorkerFailed { worker_id: usize, context: String },
}

impl Error {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Returns `true` for the two variants caused by the signal tripping.
    pub const fn is_interrupted(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Cancelled { .. })
    }

    /// Maps a tripped signal's cause to `Timeout` or `Cancelled`.
    pub(crate) const fn interrupted(
        cause: Option<TripCause>,
        elapsed: Duration,
        completed: usize,
        total: usize,
    ) -> Self {
        match cause {
            Some(TripCause::Deadline) => Self::Timeout {
                elapsed,
                completed,
                total,
            },
            _ => Self::Cancelled { completed, total },
        }
    }
}

/// Failure of a single job, carried inside its outcome.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TransformError {
    /// A validator refused the job before the transform ran.
    #[error("rejected: {reason}")]
    Rejected { reason: String },

    /// The transform ran and failed.
    #[error("failed: {reason}")]
    Failed { reason: String },
}

impl TransformError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected {
            reason: reason.into(),
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_reports_progress() {
        let err = Error::Timeout {
            elapsed: Duration::from_millis(250),
            completed: 3,
            total: 10,
        };
        assert_eq!(
            err.to_string(),
            "Timed out after 250ms (3 of 10 jobs completed)"
        );
        assert!(err.is_interrupted());
    }

    #[test]
    fn invalid_input_is_not_an_interruption() {
        let err = Error::invalid_input("num_workers must be greater than 0");
        assert_eq!(
            err.to_string(),
            "Invalid input: num_workers must be greater than 0"
        );
        assert!(!err.is_interrupted());
    }

    #[test]
    fn only_deadline_trips_become_timeouts() {
        let elapsed = Duration::from_millis(5);
        assert!(matches!(
            Error::interrupted(Some(TripCause::Deadline), elapsed, 1, 2),
            Error::Timeout { .. }
        ));
        assert_eq!(
            Error::interrupted(Some(TripCause::Parent), elapsed, 1, 2),
            Error::Cancelled {
                completed: 1,
                total: 2
            }
        );
    }

    #[test]
    fn transform_errors_render_their_kind() {
        assert_eq!(
            TransformError::rejected("job 11 exceeds 10").to_string(),
            "rejected: job 11 exceeds 10"
        );
        assert_eq!(
            TransformError::failed("bad utf-8").to_string(),
            "failed: bad utf-8"
        );
    }
}
