//! Startup-time generator selection.
//!
//! Strategy choice is process-wide configuration, resolved exactly once
//! when a worker boots. Jobs never carry a strategy of their own.

use std::sync::Arc;

use styleforge_core::config::{GeneratorKind, Settings};

use crate::base::{GenerationError, ImageGenerator};
use crate::stub::StubGenerator;
use crate::synchronous::{SyncConfig, SynchronousGenerator};
use crate::warmup::{WarmupConfig, WarmupGenerator};

/// Resolve the configured generator strategy.
pub fn build_generator(settings: &Settings) -> Result<Arc<dyn ImageGenerator>, GenerationError> {
    match settings.generator {
        GeneratorKind::Stub => Ok(Arc::new(StubGenerator::new(
            settings.stub_simulate_delay,
            settings.stub_delay,
        ))),
        GeneratorKind::Warmup => Ok(Arc::new(WarmupGenerator::new(WarmupConfig {
            api_token: settings.huggingface_api_token.clone(),
            ..WarmupConfig::default()
        }))),
        GeneratorKind::Synchronous => {
            let token = settings.replicate_api_token.clone().ok_or_else(|| {
                GenerationError::Config(
                    "REPLICATE_API_TOKEN is required when IMAGE_GENERATOR=synchronous".into(),
                )
            })?;
            Ok(Arc::new(SynchronousGenerator::new(SyncConfig::new(token))?))
        }
    }
}
