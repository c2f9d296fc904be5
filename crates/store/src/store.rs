//! File-backed job record store.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use styleforge_core::types::JobId;
use tokio::sync::Mutex;

use crate::record::{JobPatch, JobRecord, JobStatus, StatusCounts};

/// Errors from the job record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `create` was called with an id that already has a record.
    #[error("job {0} already exists")]
    AlreadyExists(JobId),

    /// No record exists for the given id.
    #[error("job {0} not found")]
    NotFound(JobId),

    /// The record is `Completed` or `Failed` and must not be mutated.
    #[error("job {0} is in a terminal state")]
    TerminalJob(JobId),

    /// The patch expected an older record version: another writer updated
    /// the record after the caller last read it.
    #[error("job {job_id} is at version {found}, update expected version {expected}")]
    VersionConflict {
        job_id: JobId,
        expected: u64,
        found: u64,
    },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record on disk could not be parsed.
    #[error("corrupt record for job {job_id}: {source}")]
    Corrupt {
        job_id: JobId,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize record: {0}")]
    Serialize(#[source] serde_json::Error),
}

/// Durable key-value store mapping job ids to [`JobRecord`]s.
///
/// One JSON file per job under `root`. Writers serialize per job id via an
/// async lock; callers that read a record first can make their update
/// conditional on the version they saw ([`JobPatch::expecting_version`]).
pub struct JobStore {
    root: PathBuf,
    locks: Mutex<HashMap<JobId, Arc<Mutex<()>>>>,
}

impl JobStore {
    /// Open a store rooted at the metadata directory, creating it if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create a new `Pending` record with progress 0.
    pub async fn create(
        &self,
        job_id: JobId,
        style_id: &str,
        input_filename: &str,
    ) -> Result<JobRecord, StoreError> {
        let _guard = self.lock_for(job_id).await;

        if self.record_path(job_id).exists() {
            return Err(StoreError::AlreadyExists(job_id));
        }

        let now = Utc::now();
        let record = JobRecord {
            job_id,
            status: JobStatus::Pending,
            progress: 0,
            style_id: style_id.to_string(),
            input_filename: input_filename.to_string(),
            output_filename: None,
            error: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };

        self.persist(&record).await?;
        tracing::info!(job_id = %job_id, style_id, "Job record created");
        Ok(record)
    }

    /// Load a record, or `None` if no record exists for the id.
    pub async fn get(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        match tokio::fs::read(self.record_path(job_id)).await {
            Ok(bytes) => {
                let record = serde_json::from_slice(&bytes)
                    .map_err(|source| StoreError::Corrupt { job_id, source })?;
                Ok(Some(record))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Apply a partial update: load the current record, apply only the
    /// populated patch fields, stamp `updated_at`, bump `version`, persist.
    ///
    /// Fails with [`StoreError::TerminalJob`] if the record is already
    /// `Completed` or `Failed`, and with [`StoreError::VersionConflict`] if
    /// the patch carries an expected version the stored record has moved
    /// past.
    pub async fn update(&self, job_id: JobId, patch: JobPatch) -> Result<JobRecord, StoreError> {
        let _guard = self.lock_for(job_id).await;

        let mut record = self
            .get(job_id)
            .await?
            .ok_or(StoreError::NotFound(job_id))?;

        if record.status.is_terminal() {
            return Err(StoreError::TerminalJob(job_id));
        }

        if let Some(expected) = patch.expected_version {
            if record.version != expected {
                return Err(StoreError::VersionConflict {
                    job_id,
                    expected,
                    found: record.version,
                });
            }
        }

        patch.apply(&mut record);
        record.updated_at = Utc::now();
        record.version += 1;

        self.persist(&record).await?;
        tracing::debug!(
            job_id = %job_id,
            status = %record.status,
            progress = record.progress,
            "Job record updated",
        );
        Ok(record)
    }

    /// Count records by status with a full directory scan.
    ///
    /// Unparseable files are skipped rather than failing the scan.
    pub async fn status_counts(&self) -> Result<StatusCounts, StoreError> {
        let mut counts = StatusCounts::default();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match tokio::fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<JobRecord>(&bytes) {
                    Ok(record) => counts.bump(record.status),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Skipping corrupt record");
                    }
                },
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Skipping unreadable record");
                }
            }
        }

        Ok(counts)
    }

    /// Ids of all records not yet in a terminal state (startup recovery).
    pub async fn non_terminal_ids(&self) -> Result<Vec<JobId>, StoreError> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Ok(bytes) = tokio::fs::read(&path).await {
                if let Ok(record) = serde_json::from_slice::<JobRecord>(&bytes) {
                    if !record.status.is_terminal() {
                        ids.push(record.job_id);
                    }
                }
            }
        }

        Ok(ids)
    }

    /// Directory this store persists into.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, job_id: JobId) -> PathBuf {
        self.root.join(format!("{job_id}.json"))
    }

    /// Write the record to a temp file and rename it into place, so a
    /// crash mid-write never leaves a truncated record behind.
    async fn persist(&self, record: &JobRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(record).map_err(StoreError::Serialize)?;
        let final_path = self.record_path(record.job_id);
        let tmp_path = self.root.join(format!("{}.json.tmp", record.job_id));

        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, &final_path).await?;
        Ok(())
    }

    async fn lock_for(&self, job_id: JobId) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(job_id).or_default().clone()
        };
        lock.lock_owned().await
    }
}
