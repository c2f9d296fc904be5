//! Job record model and update DTOs.

use serde::{Deserialize, Serialize};
use styleforge_core::types::{JobId, Timestamp};

/// Job processing status.
///
/// Legal transitions: `Pending -> Processing -> {Completed, Failed}`.
/// `Completed` and `Failed` are terminal; the store rejects any further
/// mutation of a terminal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Whether no further mutation of the record is permitted.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Lowercase wire name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One persisted job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Opaque unique identifier, immutable after creation.
    pub job_id: JobId,
    pub status: JobStatus,
    /// Percentage in `0..=100`.
    pub progress: u8,
    /// Identifier of the style preset; the preset itself is resolved at
    /// processing time.
    pub style_id: String,
    pub input_filename: String,
    /// Set if and only if the job completed.
    pub output_filename: Option<String>,
    /// Set if and only if the job failed.
    pub error: Option<String>,
    /// Optimistic concurrency token, bumped on every persisted mutation.
    pub version: u64,
    pub created_at: Timestamp,
    /// Refreshed on every mutation.
    pub updated_at: Timestamp,
}

/// Partial update applied to a job record.
///
/// Only the populated fields are touched; `updated_at` and `version` are
/// stamped by the store.
#[derive(Debug, Clone, Default)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub output_filename: Option<String>,
    pub error: Option<String>,
    /// When set, the update applies only if the stored record is still at
    /// this version.
    pub expected_version: Option<u64>,
}

impl JobPatch {
    /// Progress-only update.
    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }

    /// Transition into `Processing` with an initial progress value.
    pub fn processing(initial_progress: u8) -> Self {
        Self {
            status: Some(JobStatus::Processing),
            progress: Some(initial_progress),
            ..Self::default()
        }
    }

    /// Terminal success: output filename recorded, progress forced to 100.
    pub fn completed(output_filename: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            output_filename: Some(output_filename.into()),
            ..Self::default()
        }
    }

    /// Make the patch conditional on the record still being at `version`.
    ///
    /// A caller that read the record at version N can use this to lose
    /// gracefully when another writer got there first.
    pub fn expecting_version(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }

    /// Terminal failure. Progress is deliberately left untouched so the
    /// record keeps the last value reported before the failure.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Apply this patch to a record, clamping progress into `0..=100`.
    pub(crate) fn apply(&self, record: &mut JobRecord) {
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(progress) = self.progress {
            record.progress = progress.min(100);
        }
        if let Some(output_filename) = &self.output_filename {
            record.output_filename = Some(output_filename.clone());
        }
        if let Some(error) = &self.error {
            record.error = Some(error.clone());
        }
    }
}

/// Job counts by status, from a full scan of the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl StatusCounts {
    pub(crate) fn bump(&mut self, status: JobStatus) {
        self.total += 1;
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
        let parsed: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(parsed, JobStatus::Failed);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
    }

    #[test]
    fn patch_clamps_progress() {
        let mut record = JobRecord {
            job_id: uuid::Uuid::new_v4(),
            status: JobStatus::Processing,
            progress: 10,
            style_id: "classic-tuxedo".into(),
            input_filename: "in.png".into(),
            output_filename: None,
            error: None,
            version: 1,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        JobPatch::progress(250).apply(&mut record);
        assert_eq!(record.progress, 100);
    }

    #[test]
    fn failed_patch_preserves_progress() {
        let patch = JobPatch::failed("boom");
        assert!(patch.progress.is_none());
        assert_eq!(patch.status, Some(JobStatus::Failed));
    }
}
