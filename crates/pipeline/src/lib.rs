//! The asynchronous job pipeline: dispatch queue boundary, job service
//! facade, and the worker execution loop.
//!
//! Submission writes a `Pending` record and enqueues the job id; a worker
//! consumes one id at a time, runs the configured generator strategy, and
//! is the single place generation outcomes are translated into record
//! mutations.

mod queue;
mod service;
mod worker;

pub use queue::{DispatchQueue, LocalQueue, QueueError};
pub use service::{JobOutcome, JobResponse, JobService, ServiceError};
pub use worker::{Worker, INITIAL_PROGRESS};
