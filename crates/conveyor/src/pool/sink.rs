use crate::TransformError;
use tokio::sync::mpsc;

/// The result of one job, tagged with the job's input index.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Outcome<O> {
    pub index: usize,
    pub value: Result<O, TransformError>,
}

impl<O> Outcome<O> {
    pub const fn is_ok(&self) -> bool {
        self.value.is_ok()
    }

    pub fn error(&self) -> Option<&TransformError> {
        self.value.as_ref().err()
    }
}

/// Creates the result channel of a batch of `expected` jobs.
///
/// Every worker holds a clone of the returned sender. The sink sees the end
/// of the stream only after the last clone is dropped, which happens when
/// the last worker exits.
pub fn result_sink<O>(
    capacity: usize,
    expected: usize,
) -> (mpsc::Sender<Outcome<O>>, ResultSink<O>) {
    let (tx, rx) = mpsc::channel(capacity);
    (tx, ResultSink { rx, expected })
}

/// Collects one outcome per started job.
#[derive(Debug)]
pub struct ResultSink<O> {
    rx: mpsc::Receiver<Outcome<O>>,
    expected: usize,
}

impl<O> ResultSink<O> {
    /// Reads outcomes until every sender is gone, then returns them sorted
    /// by input index.
    ///
    /// Delivery order across workers is arbitrary, so the index is the only
    /// thing the ordering relies on.
    pub async fn drain(mut self) -> Vec<Outcome<O>> {
        let mut outcomes = Vec::with_capacity(self.expected);
        while let Some(outcome) = self.rx.recv().await {
            outcomes.push(outcome);
        }

        outcomes.sort_unstable_by_key(|outcome| outcome.index);
        debug_assert!(
            outcomes.windows(2).all(|w| w[0].index < w[1].index),
            "each job must produce at most one outcome"
        );
        outcomes
    }
}
