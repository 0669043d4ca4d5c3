//! Bounded worker pool: job queue, worker set, result sink and the
//! dispatcher that wires them together for one batch.

mod dispatcher;
mod queue;
mod sink;
mod worker;

#[cfg(test)]
mod tests;

pub use dispatcher::*;
pub use queue::{Job, JobReceiver, JobSender, Next, Push, job_queue};
pub use sink::*;
pub use worker::*;
