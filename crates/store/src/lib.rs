//! Durable job record store.
//!
//! One JSON document per job under the metadata directory. Updates are
//! read-modify-write under a per-job async lock, persisted atomically
//! (temp file + rename) and guarded by an optimistic version token, so
//! concurrent writers cannot silently clobber each other.

mod record;
mod store;

pub use record::{JobPatch, JobRecord, JobStatus, StatusCounts};
pub use store::{JobStore, StoreError};
