//! Bounded worker pools and pipelines with cooperative cancellation.
//!
//! - [`CancellationSignal`]: shared, monotonic stop flag with an optional
//!   deadline.
//! - [`Dispatcher`] / [`submit`]: run a batch of jobs through a fixed set of
//!   workers and get one [`Outcome`] per job back, in input order.
//! - [`Pipeline`]: chain single-task stages over bounded channels.
//! - [`TextProcessor`]: pooled-buffer text processing in sequential, batched
//!   and concurrent modes.

mod config;
mod error;
mod gauge;
mod pipeline;
mod pool;
mod processor;
mod signal;
mod transform;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::gauge::*;
pub use crate::pipeline::*;
pub use crate::pool::*;
pub use crate::processor::*;
pub use crate::signal::*;
pub use crate::transform::*;
