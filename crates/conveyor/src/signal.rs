//! Shared, monotonic stop signal with an optional deadline.
//!
//! A [`CancellationSignal`] is handed to every producer, worker and pipeline
//! stage of a batch. Each of them observes it cooperatively at their own
//! suspension points (channel reads and writes) and stops taking new work
//! once it has tripped.
//!
//! The signal trips in one of three ways, recorded as a [`TripCause`]:
//!
//! - [`TripCause::Deadline`]: the deadline elapsed. A timer task trips the
//!   signal on time even if nobody is polling it.
//! - [`TripCause::Explicit`]: somebody called [`CancellationSignal::trip`].
//! - [`TripCause::Parent`]: a parent signal tripped and the trip propagated
//!   down to this child.
//!
//! The first cause wins, and a tripped signal never resets.

use core::{fmt, time::Duration};
use parking_lot::Mutex;
use portable_atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;

const UNSET: u8 = 0;
const DEADLINE: u8 = 1;
const EXPLICIT: u8 = 2;
const PARENT: u8 = 3;

/// Why a [`CancellationSignal`] tripped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TripCause {
    /// The deadline elapsed.
    Deadline,
    /// [`CancellationSignal::trip`] was called.
    Explicit,
    /// A parent signal tripped.
    Parent,
}

impl TripCause {
    const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            DEADLINE => Some(Self::Deadline),
            EXPLICIT => Some(Self::Explicit),
            PARENT => Some(Self::Parent),
            _ => None,
        }
    }
}

/// A cloneable handle to a shared stop flag.
///
/// Cloning is cheap and every clone observes the same state. Use
/// [`child`](Self::child) to derive a signal that trips with its parent but
/// can also be tripped on its own without affecting the parent.
#[derive(Clone)]
pub struct CancellationSignal {
    inner: Arc<Inner>,
}

struct Inner {
    token: CancellationToken,
    cause: Arc<AtomicU8>,
    deadline: Option<Instant>,
    disarm: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.get_mut().take() {
            timer.abort();
        }
    }
}

impl CancellationSignal {
    /// Creates a signal without a deadline. It only trips explicitly.
    pub fn new() -> Self {
        Self::from_parts(CancellationToken::new(), None)
    }

    /// Creates a signal that trips automatically once `timeout` has elapsed.
    /// A timeout too large to represent as an instant means no deadline.
    ///
    /// When called inside a Tokio runtime a timer task is spawned to trip
    /// the signal on time. Outside a runtime the deadline is still honoured,
    /// but only when the signal is polled.
    pub fn with_deadline(timeout: Duration) -> Self {
        Self::from_parts(CancellationToken::new(), Instant::now().checked_add(timeout))
    }

    /// Derives a child signal that inherits this signal's trips and
    /// deadline.
    pub fn child(&self) -> Self {
        Self::from_parts(self.inner.token.child_token(), self.inner.deadline)
    }

    /// Derives a child signal whose deadline is the earlier of `timeout`
    /// from now and this signal's own deadline.
    pub fn child_with_deadline(&self, timeout: Duration) -> Self {
        let own = Instant::now().checked_add(timeout);
        let deadline = match (self.inner.deadline, own) {
            (Some(parent), Some(own)) => Some(parent.min(own)),
            (parent, own) => parent.or(own),
        };
        Self::from_parts(self.inner.token.child_token(), deadline)
    }

    fn from_parts(token: CancellationToken, deadline: Option<Instant>) -> Self {
        let cause = Arc::new(AtomicU8::new(UNSET));
        let disarm = CancellationToken::new();

        let timer = deadline.and_then(|deadline| {
            let runtime = tokio::runtime::Handle::try_current().ok()?;
            Some(runtime.spawn(deadline_timer(
                deadline,
                token.clone(),
                Arc::clone(&cause),
                disarm.clone(),
            )))
        });
        Self {
            inner: Arc::new(Inner {
                token,
                cause,
                deadline,
                disarm,
                timer: Mutex::new(timer),
            }),
        }
    }

    /// Trips the signal. Safe to call any number of times from any thread;
    /// only the first call has an effect.
    pub fn trip(&self) {
        self.trip_with(EXPLICIT);
    }

    fn trip_with(&self, raw: u8) {
        // A trip inherited from the parent must not be overwritten later.
        if self.inner.token.is_cancelled() {
            record_cause(&self.inner.cause, self.inherited_cause());
        }

        if record_cause(&self.inner.cause, raw) {
            #[cfg(feature = "tracing")]
            tracing::debug!("Cancellation signal tripped ({:?})", TripCause::from_raw(raw));
        }
        self.inner.token.cancel();
    }

    /// Returns whether the signal has tripped, without blocking.
    ///
    /// If the deadline has passed but the timer has not fired yet, the
    /// signal trips here.
    pub fn is_tripped(&self) -> bool {
        if self.inner.token.is_cancelled() {
            return true;
        }

        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.trip_with(DEADLINE);
                true
            }
            _ => false,
        }
    }

    /// Waits until the signal trips.
    ///
    /// Resolves by the deadline whether or not a timer task is running.
    pub async fn tripped(&self) {
        match self.inner.deadline {
            Some(deadline) => {
                tokio::select! {
                    biased;
                    () = self.inner.token.cancelled() => {}
                    () = tokio::time::sleep_until(deadline) => self.trip_with(DEADLINE),
                }
            }
            None => self.inner.token.cancelled().await,
        }
    }

    /// Returns why the signal tripped, or `None` if it has not.
    pub fn cause(&self) -> Option<TripCause> {
        let raw = self.inner.cause.load(Ordering::Acquire);
        if raw == UNSET && self.inner.token.is_cancelled() {
            record_cause(&self.inner.cause, self.inherited_cause());
            return TripCause::from_raw(self.inner.cause.load(Ordering::Acquire));
        }
        TripCause::from_raw(raw)
    }

    /// Cause recorded for a trip that arrived through the parent token. A
    /// parent tripping at or after this signal's own deadline counts as
    /// that deadline.
    fn inherited_cause(&self) -> u8 {
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => DEADLINE,
            _ => PARENT,
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Time left until the deadline, saturating at zero.
    pub fn remaining(&self) -> Option<Duration> {
        self.inner
            .deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    /// Stops the deadline timer and waits for it to exit.
    ///
    /// A disarmed signal can still be tripped explicitly. Past the deadline,
    /// a poll or a [`tripped`](Self::tripped) waiter still trips it.
    pub async fn disarm(&self) {
        self.inner.disarm.cancel();
        let timer = self.inner.timer.lock().take();
        if let Some(timer) = timer {
            let _ = timer.await;
        }
    }
}

impl Default for CancellationSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationSignal")
            .field("tripped", &self.inner.token.is_cancelled())
            .field("cause", &self.cause())
            .field("deadline", &self.inner.deadline)
            .finish()
    }
}

/// Records `raw` as the trip cause unless one is already set.
fn record_cause(cause: &AtomicU8, raw: u8) -> bool {
    cause
        .compare_exchange(UNSET, raw, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

async fn deadline_timer(
    deadline: Instant,
    token: CancellationToken,
    cause: Arc<AtomicU8>,
    disarm: CancellationToken,
) {
    tokio::select! {
        biased;
        () = token.cancelled() => {}
        () = disarm.cancelled() => {}
        () = tokio::time::sleep_until(deadline) => {
            if record_cause(&cause, DEADLINE) {
                #[cfg(feature = "tracing")]
                tracing::debug!("Deadline elapsed, cancellation signal tripped");
            }
            token.cancel();
        }
    }
}
