//! Core error type shared across the workspace.

/// Errors produced by core-level validation and configuration.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// A value failed validation (bad enum literal, malformed number, ...).
    #[error("{0}")]
    Validation(String),

    /// A required or malformed environment variable.
    #[error("invalid configuration for {key}: {reason}")]
    Config {
        /// Environment variable name.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}
