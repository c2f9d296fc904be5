/// Jobs are identified by opaque UUIDs (v4), assigned at submission.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
