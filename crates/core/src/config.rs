//! Environment-driven settings.
//!
//! Binaries load `.env` via `dotenvy` before calling
//! [`Settings::from_env`]. Every knob has a default so a bare environment
//! yields a working local deployment (stub generator, `./data` storage).

use std::path::PathBuf;
use std::time::Duration;

use crate::error::CoreError;

/// Which generator strategy a deployment runs.
///
/// Selected once at worker startup; all jobs processed by one deployment
/// use the same strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneratorKind {
    /// Deterministic local transform, no network dependency.
    Stub,
    /// Remote inference endpoint that may be cold-starting (retry/backoff).
    Warmup,
    /// Remote face-preserving img2img service (single blocking call).
    Synchronous,
}

impl std::str::FromStr for GeneratorKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stub" => Ok(Self::Stub),
            "warmup" => Ok(Self::Warmup),
            "synchronous" => Ok(Self::Synchronous),
            other => Err(CoreError::Validation(format!(
                "Unknown generator kind '{other}'. Must be one of: stub, warmup, synchronous"
            ))),
        }
    }
}

/// Application settings loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding uploaded input images.
    pub upload_dir: PathBuf,
    /// Directory generated output images are written to.
    pub output_dir: PathBuf,
    /// Directory the job record store persists into.
    pub metadata_dir: PathBuf,
    /// Generator strategy for this deployment.
    pub generator: GeneratorKind,
    /// Token for the warmup inference endpoint. Optional: the endpoint
    /// accepts anonymous calls at a lower rate limit.
    pub huggingface_api_token: Option<String>,
    /// Token for the synchronous generation service. Required when
    /// `generator` is [`GeneratorKind::Synchronous`].
    pub replicate_api_token: Option<String>,
    /// Whether the stub generator sleeps to simulate remote latency.
    pub stub_simulate_delay: bool,
    /// Total simulated latency for the stub generator.
    pub stub_delay: Duration,
    /// Hard deadline for a single job execution.
    pub job_timeout: Duration,
}

impl Settings {
    /// Load settings from the process environment.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup (tests inject a map).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let generator = match lookup("IMAGE_GENERATOR") {
            Some(raw) => raw.parse()?,
            None => GeneratorKind::Stub,
        };

        Ok(Self {
            upload_dir: path_var(&lookup, "UPLOAD_DIR", "./data/uploads"),
            output_dir: path_var(&lookup, "OUTPUT_DIR", "./data/outputs"),
            metadata_dir: path_var(&lookup, "METADATA_DIR", "./data/metadata"),
            generator,
            huggingface_api_token: non_empty(lookup("HUGGINGFACE_API_TOKEN")),
            replicate_api_token: non_empty(lookup("REPLICATE_API_TOKEN")),
            stub_simulate_delay: bool_var(&lookup, "STUB_SIMULATE_DELAY", true)?,
            stub_delay: Duration::from_secs_f64(f64_var(&lookup, "STUB_DELAY_SECS", 3.0)?),
            job_timeout: Duration::from_secs(u64_var(&lookup, "JOB_TIMEOUT_SECS", 300)?),
        })
    }

    /// Create the storage directories if they do not exist yet.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.upload_dir)?;
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.metadata_dir)?;
        Ok(())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn path_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: &str,
) -> PathBuf {
    lookup(key).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
}

fn bool_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, CoreError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(true),
            "0" | "false" | "no" => Ok(false),
            _ => Err(CoreError::Config {
                key,
                reason: format!("expected a boolean, got '{raw}'"),
            }),
        },
    }
}

fn f64_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: f64,
) -> Result<f64, CoreError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| CoreError::Config {
                key,
                reason: format!("expected a non-negative number, got '{raw}'"),
            }),
    }
}

fn u64_var(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
) -> Result<u64, CoreError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw.parse::<u64>().map_err(|_| CoreError::Config {
            key,
            reason: format!("expected an integer number of seconds, got '{raw}'"),
        }),
    }
}
