use crate::{CancellationSignal, gauge::TaskGuard};
use tokio::sync::mpsc;

/// Sends `inputs` downstream in order, then closes the channel.
pub(crate) async fn run_source<T>(
    inputs: Vec<T>,
    output: mpsc::Sender<T>,
    signal: CancellationSignal,
    _guard: TaskGuard,
) {
    for item in inputs {
        if !forward(&output, item, &signal).await {
            break;
        }
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Pipeline source closed");
}

/// One pipeline stage: reads from `input`, applies `f`, writes to `output`.
///
/// Exits when its input is closed and drained, when the next stage is gone,
/// or when the signal trips, whichever comes first. Both the read and the
/// write observe the signal, so a stage never stays blocked on a neighbour
/// that stopped early. The output closes when this returns.
pub(crate) async fn run_stage<I, O, F>(
    name: String,
    mut input: mpsc::Receiver<I>,
    output: mpsc::Sender<O>,
    f: F,
    signal: CancellationSignal,
    _guard: TaskGuard,
) where
    F: Fn(I) -> O,
{
    #[cfg(feature = "tracing")]
    tracing::trace!("Stage {name} started");

    let mut forwarded = 0_usize;

    loop {
        let item = tokio::select! {
            biased;
            () = signal.tripped() => break,
            item = input.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        if !forward(&output, f(item), &signal).await {
            break;
        }
        forwarded += 1;
    }

    #[cfg(feature = "tracing")]
    tracing::trace!("Stage {name} stopped after {forwarded} items");
    #[cfg(not(feature = "tracing"))]
    let _ = (name, forwarded);
}

/// Writes one item downstream unless the signal trips first. Returns
/// `false` when the caller should stop.
async fn forward<T>(output: &mpsc::Sender<T>, item: T, signal: &CancellationSignal) -> bool {
    tokio::select! {
        biased;
        () = signal.tripped() => false,
        sent = output.send(item) => sent.is_ok(),
    }
}
