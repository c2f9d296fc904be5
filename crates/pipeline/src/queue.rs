//! Dispatch queue boundary.
//!
//! The queue hands each enqueued job id to at most one worker at a time,
//! with at-least-once delivery: a redelivered id must be tolerated by the
//! consumer (the worker treats terminal jobs as a no-op). Ordering across
//! jobs is not guaranteed and not relied upon.

use async_trait::async_trait;
use styleforge_core::types::JobId;
use tokio::sync::mpsc;
use tokio::sync::Mutex;

/// Errors from the dispatch queue boundary.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue can no longer accept submissions.
    #[error("dispatch queue is closed")]
    Closed,
}

/// At-least-once delivery channel handing job ids to worker executions.
///
/// Production deployments back this with a broker; [`LocalQueue`] covers
/// tests and single-process runs.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    /// Enqueue a job id for processing.
    async fn submit(&self, job_id: JobId) -> Result<(), QueueError>;

    /// Block until the next job id is available. `None` means the queue
    /// has shut down and no more ids will ever arrive.
    async fn consume(&self) -> Option<JobId>;
}

/// In-process dispatch queue over an unbounded channel.
pub struct LocalQueue {
    tx: mpsc::UnboundedSender<JobId>,
    rx: Mutex<mpsc::UnboundedReceiver<JobId>>,
}

impl LocalQueue {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }
}

impl Default for LocalQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DispatchQueue for LocalQueue {
    async fn submit(&self, job_id: JobId) -> Result<(), QueueError> {
        self.tx.send(job_id).map_err(|_| QueueError::Closed)
    }

    async fn consume(&self) -> Option<JobId> {
        // The mutex makes consumption one-at-a-time even when several
        // tasks share one queue handle.
        self.rx.lock().await.recv().await
    }
}
