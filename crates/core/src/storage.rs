//! Upload/output path resolution.
//!
//! Pure path arithmetic plus existence checks. All real I/O (writing
//! uploads, persisting generated images) happens at the call sites.

use std::path::{Path, PathBuf};

use crate::config::Settings;

/// Resolves filenames under the configured upload and output directories.
#[derive(Debug, Clone)]
pub struct Storage {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl Storage {
    pub fn new(settings: &Settings) -> Self {
        Self {
            upload_dir: settings.upload_dir.clone(),
            output_dir: settings.output_dir.clone(),
        }
    }

    /// Build a storage layer over explicit directories (tests).
    pub fn with_dirs(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Full path for an uploaded input file.
    pub fn resolve_input_path(&self, filename: &str) -> PathBuf {
        self.upload_dir.join(filename)
    }

    /// Full path for a generated output file.
    pub fn resolve_output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }

    /// Whether an uploaded input file exists on disk.
    pub fn input_exists(&self, filename: &str) -> bool {
        self.resolve_input_path(filename).is_file()
    }

    /// Whether a generated output file exists on disk.
    pub fn output_exists(&self, filename: &str) -> bool {
        self.resolve_output_path(filename).is_file()
    }

    /// URL path clients fetch a finished output from.
    pub fn output_url(&self, filename: &str) -> String {
        format!("/outputs/{filename}")
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}
