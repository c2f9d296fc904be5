//! The generator contract shared by all variants.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use styleforge_core::styles::StylePreset;

use crate::progress::ProgressSender;

/// Errors from a generator strategy.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The input file does not exist. Precondition, not a generation
    /// failure — nothing was attempted.
    #[error("Input file not found: {0}")]
    InputNotFound(PathBuf),

    /// The input path exists but is not a regular file. Also a
    /// precondition error.
    #[error("Input path is not a file: {0}")]
    InputNotAFile(PathBuf),

    /// The generator cannot be constructed or selected as configured.
    #[error("Generator configuration error: {0}")]
    Config(String),

    /// Generation was attempted and failed. Always terminal for the job.
    #[error("{message}")]
    Failed {
        /// Human-readable failure summary, recorded on the job record.
        message: String,
        /// Underlying error, when one exists.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl GenerationError {
    /// A generation failure with no underlying cause.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
            source: None,
        }
    }

    /// A generation failure wrapping an underlying cause.
    pub fn wrap(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Failed {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Whether this is a precondition error (nothing was attempted).
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::InputNotFound(_) | Self::InputNotAFile(_))
    }
}

/// Verify the input exists and is a regular file before any generation
/// work starts.
pub fn validate_input(input_path: &Path) -> Result<(), GenerationError> {
    if !input_path.exists() {
        return Err(GenerationError::InputNotFound(input_path.to_path_buf()));
    }
    if !input_path.is_file() {
        return Err(GenerationError::InputNotAFile(input_path.to_path_buf()));
    }
    Ok(())
}

/// Encode PNG bytes as a `data:` URI for remote generation payloads.
pub(crate) fn png_data_uri(bytes: &[u8]) -> String {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    format!("data:image/png;base64,{}", STANDARD.encode(bytes))
}

/// A polymorphic image generator.
///
/// Implementations write the styled result to `output_path` and return
/// that path. Progress values sent on `progress` are clamped to
/// `0..=100` by [`crate::report`] and should be non-decreasing; consumers
/// must tolerate duplicates.
#[async_trait]
pub trait ImageGenerator: Send + Sync + std::fmt::Debug {
    /// Generate a styled version of the input image.
    async fn generate(
        &self,
        input_path: &Path,
        style: &StylePreset,
        output_path: &Path,
        progress: &ProgressSender,
    ) -> Result<PathBuf, GenerationError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_input_is_precondition() {
        let err = validate_input(Path::new("/definitely/not/here.png")).unwrap_err();
        assert!(err.is_precondition());
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn directory_input_is_precondition() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_input(dir.path()).unwrap_err();
        assert!(err.is_precondition());
    }

    #[test]
    fn regular_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.png");
        std::fs::write(&path, b"png").unwrap();
        assert!(validate_input(&path).is_ok());
    }

    #[test]
    fn generation_failure_is_not_precondition() {
        assert!(!GenerationError::failed("remote exploded").is_precondition());
    }
}
