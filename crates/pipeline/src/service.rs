//! Job service facade.
//!
//! The one entry point callers use to submit jobs and poll status, and the
//! one the worker uses to translate execution outcomes into record
//! mutations. Everything that touches the store or the queue goes through
//! here.

use std::sync::Arc;

use serde::Serialize;
use styleforge_core::storage::Storage;
use styleforge_core::styles::StyleRegistry;
use styleforge_core::types::{JobId, Timestamp};
use styleforge_store::{JobPatch, JobRecord, JobStatus, JobStore, StatusCounts, StoreError};
use uuid::Uuid;

use crate::queue::{DispatchQueue, QueueError};

/// Errors surfaced by the job service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Submission referenced a style id that is not registered.
    #[error("unknown style: {0}")]
    UnknownStyle(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Client-facing view of a job record.
#[derive(Debug, Clone, Serialize)]
pub struct JobResponse {
    pub job_id: JobId,
    pub status: JobStatus,
    pub progress: u8,
    pub style_id: String,
    /// URL path of the finished output; set only once the job completed.
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Terminal outcome of one worker execution.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Completed { output_filename: String },
    Failed { error: String },
}

/// Facade over the record store, the dispatch queue, the style registry
/// and the storage layer.
pub struct JobService {
    store: Arc<JobStore>,
    queue: Arc<dyn DispatchQueue>,
    storage: Storage,
    styles: Arc<StyleRegistry>,
}

impl JobService {
    pub fn new(
        store: Arc<JobStore>,
        queue: Arc<dyn DispatchQueue>,
        storage: Storage,
        styles: Arc<StyleRegistry>,
    ) -> Self {
        Self {
            store,
            queue,
            storage,
            styles,
        }
    }

    /// Create a `Pending` record and enqueue it for processing.
    ///
    /// An unknown style id is rejected before any record is created or
    /// anything is enqueued.
    pub async fn submit(
        &self,
        style_id: &str,
        input_filename: &str,
    ) -> Result<JobResponse, ServiceError> {
        if !self.styles.exists(style_id) {
            return Err(ServiceError::UnknownStyle(style_id.to_string()));
        }

        let job_id = Uuid::new_v4();
        let record = self.store.create(job_id, style_id, input_filename).await?;
        self.queue.submit(job_id).await?;

        tracing::info!(job_id = %job_id, style_id, "Job submitted");
        Ok(self.to_response(record))
    }

    /// Current client-facing view of a job, or `None` for an unknown id.
    ///
    /// Polling has no side effects; the same terminal record always yields
    /// the same response.
    pub async fn status(&self, job_id: JobId) -> Result<Option<JobResponse>, ServiceError> {
        Ok(self
            .store
            .get(job_id)
            .await?
            .map(|record| self.to_response(record)))
    }

    /// Raw record lookup for the worker.
    pub async fn record(&self, job_id: JobId) -> Result<Option<JobRecord>, ServiceError> {
        Ok(self.store.get(job_id).await?)
    }

    /// Transition a job into `Processing` with an initial progress value,
    /// conditional on the version the caller read the record at. A version
    /// conflict means another execution claimed the job first.
    pub async fn begin_processing(
        &self,
        job_id: JobId,
        initial_progress: u8,
        expected_version: u64,
    ) -> Result<JobRecord, ServiceError> {
        Ok(self
            .store
            .update(
                job_id,
                JobPatch::processing(initial_progress).expecting_version(expected_version),
            )
            .await?)
    }

    /// Persist a progress value reported mid-generation.
    pub async fn report_progress(&self, job_id: JobId, progress: u8) -> Result<(), ServiceError> {
        self.store.update(job_id, JobPatch::progress(progress)).await?;
        Ok(())
    }

    /// Record the terminal outcome of a worker execution.
    pub async fn finish(
        &self,
        job_id: JobId,
        outcome: JobOutcome,
    ) -> Result<JobRecord, ServiceError> {
        let patch = match outcome {
            JobOutcome::Completed { output_filename } => JobPatch::completed(output_filename),
            JobOutcome::Failed { error } => JobPatch::failed(error),
        };
        Ok(self.store.update(job_id, patch).await?)
    }

    /// Job counts by status across the whole store.
    pub async fn metrics(&self) -> Result<StatusCounts, ServiceError> {
        Ok(self.store.status_counts().await?)
    }

    /// Ids of jobs that never reached a terminal state, for re-enqueueing
    /// after a restart.
    pub async fn recoverable_ids(&self) -> Result<Vec<JobId>, ServiceError> {
        Ok(self.store.non_terminal_ids().await?)
    }

    /// Re-enqueue an already-persisted job id.
    pub async fn enqueue(&self, job_id: JobId) -> Result<(), ServiceError> {
        Ok(self.queue.submit(job_id).await?)
    }

    pub fn styles(&self) -> &StyleRegistry {
        &self.styles
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    fn to_response(&self, record: JobRecord) -> JobResponse {
        let result_url = record
            .output_filename
            .as_deref()
            .map(|filename| self.storage.output_url(filename));
        JobResponse {
            job_id: record.job_id,
            status: record.status,
            progress: record.progress,
            style_id: record.style_id,
            result_url,
            error: record.error,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}
