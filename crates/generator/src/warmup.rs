//! Remote generator for inference endpoints that may be cold-starting.
//!
//! One synchronous request per attempt. A "model loading" response carries
//! an estimated-wait hint that is honored up to a cap; rate limiting and
//! transport errors back off with fixed delays. At most
//! [`MAX_ATTEMPTS`] attempts total, then the job fails.
//!
//! Progress milestones are coarse checkpoints bracketing preparation,
//! submission, and completion — they do not track actual remote progress.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::imageops::FilterType;
use image::ImageFormat;
use reqwest::StatusCode;
use styleforge_core::styles::StylePreset;

use crate::base::{png_data_uri, validate_input, GenerationError, ImageGenerator};
use crate::progress::{report, ProgressSender};

/// Default inference model.
pub const MODEL_ID: &str = "runwayml/stable-diffusion-v1-5";

/// Base URL the default endpoint is built from.
pub const API_URL: &str = "https://api-inference.huggingface.co/models/";

/// Total attempts before giving up (first try included).
pub const MAX_ATTEMPTS: u32 = 3;

/// Inputs larger than this on their longest side are downscaled first.
const MAX_INPUT_DIM: u32 = 768;

/// Wait assumed when a loading response carries no usable hint.
const DEFAULT_LOADING_WAIT_SECS: f64 = 20.0;

const NEGATIVE_PROMPT: &str = "blurry, bad quality, distorted, ugly, deformed, cartoon, \
     anime, drawing, painting, illustration, text, watermark";

/// Tunable parameters for the warmup retry protocol.
#[derive(Debug, Clone)]
pub struct WarmupConfig {
    /// Full endpoint URL for the inference model.
    pub endpoint: String,
    /// Bearer token; optional (anonymous calls get a lower rate limit).
    pub api_token: Option<String>,
    /// Upper bound on the sleep honored from a loading-wait hint.
    pub loading_wait_cap: Duration,
    /// Fixed sleep after a rate-limited response.
    pub rate_limit_delay: Duration,
    /// Fixed sleep after any other failed attempt.
    pub retry_delay: Duration,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl Default for WarmupConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("{API_URL}{MODEL_ID}"),
            api_token: None,
            loading_wait_cap: Duration::from_secs(30),
            rate_limit_delay: Duration::from_secs(10),
            retry_delay: Duration::from_secs(5),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Generator backed by a cold-startable remote inference endpoint.
#[derive(Debug)]
pub struct WarmupGenerator {
    config: WarmupConfig,
    client: reqwest::Client,
}

impl WarmupGenerator {
    pub fn new(config: WarmupConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn build_prompt(style: &StylePreset) -> String {
        format!(
            "professional portrait photo of a person, {}, photorealistic, high quality, \
             detailed, studio lighting, fashion photography, 8k uhd",
            style.prompt
        )
    }

    /// Read the input, normalize to RGB, downscale oversized frames, and
    /// encode as PNG.
    fn prepare_input(input_path: &Path) -> Result<Vec<u8>, GenerationError> {
        let img = image::open(input_path)
            .map_err(|e| GenerationError::wrap("Could not read input image", e))?;

        let img = if img.width().max(img.height()) > MAX_INPUT_DIM {
            img.resize(MAX_INPUT_DIM, MAX_INPUT_DIM, FilterType::Lanczos3)
        } else {
            img
        };

        let mut png = Vec::new();
        img.to_rgb8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| GenerationError::wrap("Could not encode input image", e))?;
        Ok(png)
    }
}

#[async_trait]
impl ImageGenerator for WarmupGenerator {
    async fn generate(
        &self,
        input_path: &Path,
        style: &StylePreset,
        output_path: &Path,
        progress: &ProgressSender,
    ) -> Result<PathBuf, GenerationError> {
        validate_input(input_path)?;
        report(progress, 10);

        let png = Self::prepare_input(input_path)?;
        let image_uri = png_data_uri(&png);
        report(progress, 20);

        let prompt = Self::build_prompt(style);
        report(progress, 30);

        let payload = serde_json::json!({
            "inputs": prompt,
            "parameters": {
                "image": image_uri,
                "negative_prompt": NEGATIVE_PROMPT,
                "num_inference_steps": 25,
                "guidance_scale": 7.5,
            },
        });
        report(progress, 40);

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self
                .client
                .post(&self.config.endpoint)
                .timeout(self.config.request_timeout)
                .json(&payload);
            if let Some(token) = &self.config.api_token {
                request = request.bearer_auth(token);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        report(progress, 50);
                        report(progress, 80);
                        let bytes = response.bytes().await.map_err(|e| {
                            GenerationError::wrap("Could not read inference response", e)
                        })?;
                        let img = image::load_from_memory(&bytes).map_err(|e| {
                            GenerationError::wrap("Inference endpoint returned an unreadable image", e)
                        })?;
                        report(progress, 90);
                        img.save_with_format(output_path, ImageFormat::Png).map_err(|e| {
                            GenerationError::wrap("Could not save generated image", e)
                        })?;
                        report(progress, 100);
                        return Ok(output_path.to_path_buf());
                    }

                    if status == StatusCode::SERVICE_UNAVAILABLE {
                        // Model is cold-starting; the body carries a wait hint.
                        let hint = response
                            .json::<serde_json::Value>()
                            .await
                            .ok()
                            .and_then(|v| v.get("estimated_time").and_then(|t| t.as_f64()))
                            .unwrap_or(DEFAULT_LOADING_WAIT_SECS);
                        let wait =
                            Duration::from_secs_f64(hint.max(0.0)).min(self.config.loading_wait_cap);
                        tracing::info!(
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "Model loading, waiting before retry",
                        );
                        report(progress, 50);
                        tokio::time::sleep(wait).await;
                        continue;
                    }

                    if status == StatusCode::TOO_MANY_REQUESTS {
                        tracing::warn!(attempt, "Rate limited by inference endpoint");
                        tokio::time::sleep(self.config.rate_limit_delay).await;
                        continue;
                    }

                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "<unreadable body>".to_string());
                    tracing::warn!(attempt, status = status.as_u16(), "Inference request failed");
                    if attempt == MAX_ATTEMPTS {
                        return Err(GenerationError::failed(format!(
                            "Inference endpoint error ({}): {body}",
                            status.as_u16()
                        )));
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "Inference request transport error");
                    if attempt == MAX_ATTEMPTS {
                        return Err(GenerationError::wrap("Inference request failed", e));
                    }
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        }

        Err(GenerationError::failed(format!(
            "Model did not produce an image after {MAX_ATTEMPTS} attempts"
        )))
    }

    fn name(&self) -> &'static str {
        "warmup"
    }
}
