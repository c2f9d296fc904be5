//! Worker execution loop.
//!
//! One worker consumes one job id at a time from the dispatch queue, runs
//! the configured generator, and translates the result into a terminal
//! record update. The worker owns the per-job deadline; generators never
//! time themselves out.

use std::sync::Arc;
use std::time::Duration;

use styleforge_core::types::JobId;
use styleforge_generator::{progress_channel, ImageGenerator};
use styleforge_store::StoreError;
use tokio_util::sync::CancellationToken;

use crate::queue::DispatchQueue;
use crate::service::{JobOutcome, JobService, ServiceError};

/// Progress value stamped when a job enters `Processing`, before the
/// generator has reported anything.
pub const INITIAL_PROGRESS: u8 = 5;

/// Consumes job ids from the dispatch queue and executes them.
pub struct Worker {
    service: Arc<JobService>,
    queue: Arc<dyn DispatchQueue>,
    generator: Arc<dyn ImageGenerator>,
    job_timeout: Duration,
}

impl Worker {
    pub fn new(
        service: Arc<JobService>,
        queue: Arc<dyn DispatchQueue>,
        generator: Arc<dyn ImageGenerator>,
        job_timeout: Duration,
    ) -> Self {
        Self {
            service,
            queue,
            generator,
            job_timeout,
        }
    }

    /// Consume and process jobs until the token is cancelled or the queue
    /// shuts down.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            generator = self.generator.name(),
            timeout_secs = self.job_timeout.as_secs(),
            "Worker started",
        );
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Worker stopping");
                    break;
                }
                next = self.queue.consume() => {
                    let Some(job_id) = next else {
                        tracing::info!("Dispatch queue closed, worker stopping");
                        break;
                    };
                    if let Err(e) = self.process_job(job_id).await {
                        tracing::error!(job_id = %job_id, error = %e, "Job processing aborted");
                    }
                }
            }
        }
    }

    /// Execute one delivered job id end to end.
    ///
    /// Job-level failures (missing input, generation errors, timeout) are
    /// recorded on the job itself; only store/queue failures bubble up as
    /// `Err`.
    pub async fn process_job(&self, job_id: JobId) -> Result<(), ServiceError> {
        let Some(record) = self.service.record(job_id).await? else {
            tracing::error!(job_id = %job_id, "No record for delivered job id, dropping");
            return Ok(());
        };
        if record.status.is_terminal() {
            tracing::info!(
                job_id = %job_id,
                status = %record.status,
                "Job already terminal, ignoring duplicate delivery",
            );
            return Ok(());
        }

        // Claim the job conditionally on the version we just read; losing
        // the claim means another execution picked up the same delivery.
        match self
            .service
            .begin_processing(job_id, INITIAL_PROGRESS, record.version)
            .await
        {
            Ok(_) => {}
            Err(ServiceError::Store(
                StoreError::VersionConflict { .. } | StoreError::TerminalJob(_),
            )) => {
                tracing::info!(job_id = %job_id, "Job claimed by another execution, dropping");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        let Some(style) = self.service.styles().get(&record.style_id).cloned() else {
            self.fail(job_id, format!("Style not found: {}", record.style_id))
                .await?;
            return Ok(());
        };

        let input_path = self
            .service
            .storage()
            .resolve_input_path(&record.input_filename);
        if !input_path.is_file() {
            self.fail(
                job_id,
                format!("Input file not found: {}", input_path.display()),
            )
            .await?;
            return Ok(());
        }

        let output_filename = format!("{job_id}-output.png");
        let output_path = self.service.storage().resolve_output_path(&output_filename);

        // Progress reports flow through a channel so the generator never
        // touches the store; the forwarder writes them in order.
        let (tx, mut rx) = progress_channel();
        let forwarder = {
            let service = self.service.clone();
            tokio::spawn(async move {
                while let Some(progress) = rx.recv().await {
                    if let Err(e) = service.report_progress(job_id, progress).await {
                        tracing::warn!(job_id = %job_id, error = %e, "Progress write failed");
                    }
                }
            })
        };

        tracing::info!(
            job_id = %job_id,
            style_id = %style.id,
            generator = self.generator.name(),
            "Generating styled image",
        );

        let result = tokio::time::timeout(
            self.job_timeout,
            self.generator.generate(&input_path, &style, &output_path, &tx),
        )
        .await;

        // Drop our sender and drain pending progress before the terminal
        // write, so no progress update can land after the outcome.
        drop(tx);
        let _ = forwarder.await;

        match result {
            Ok(Ok(path)) => {
                self.service
                    .finish(job_id, JobOutcome::Completed { output_filename })
                    .await?;
                tracing::info!(job_id = %job_id, output = %path.display(), "Job completed");
            }
            Ok(Err(e)) => {
                tracing::error!(job_id = %job_id, error = %e, "Generation failed");
                self.fail(job_id, e.to_string()).await?;
            }
            Err(_) => {
                tracing::error!(
                    job_id = %job_id,
                    timeout_secs = self.job_timeout.as_secs(),
                    "Generation timed out",
                );
                self.fail(
                    job_id,
                    format!("Job timed out after {}s", self.job_timeout.as_secs()),
                )
                .await?;
            }
        }

        Ok(())
    }

    async fn fail(&self, job_id: JobId, error: String) -> Result<(), ServiceError> {
        self.service
            .finish(job_id, JobOutcome::Failed { error })
            .await?;
        Ok(())
    }
}
