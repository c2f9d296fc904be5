//! Remote face-preserving img2img generator.
//!
//! Issues exactly one blocking call per job — the service manages its own
//! internal retries, so any transport or service-reported error here is
//! terminal. The input is normalized to the model's dimension constraints
//! before upload, and the response may carry the result inline (a `data:`
//! URI) or as a URL that is fetched afterwards.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::imageops::FilterType;
use image::ImageFormat;
use styleforge_core::styles::StylePreset;

use crate::base::{png_data_uri, validate_input, GenerationError, ImageGenerator};
use crate::progress::{report, ProgressSender};

/// Face-preserving style-transfer model.
pub const MODEL_ID: &str = "lucataco/ip-adapter-faceid-sdxl";

/// Longest side the remote model accepts.
const MAX_DIM: u32 = 1024;

/// Dimensions must be a multiple of this.
const DIM_MULTIPLE: u32 = 8;

/// Smallest side the remote model accepts.
const MIN_DIM: u32 = 256;

const NEGATIVE_PROMPT: &str = "blurry, bad quality, ugly, deformed, disfigured, low quality, \
     pixelated, bad anatomy, bad hands, missing fingers, extra fingers, mutated, cartoon, \
     anime, illustration, painting, drawing, sketch";

/// Configuration for the synchronous generation service.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Prediction endpoint URL.
    pub endpoint: String,
    /// Bearer token. Required.
    pub api_token: String,
    /// Per-request timeout (the call blocks for the whole generation).
    pub request_timeout: Duration,
}

impl SyncConfig {
    pub fn new(api_token: impl Into<String>) -> Self {
        Self {
            endpoint: format!("https://api.replicate.com/v1/models/{MODEL_ID}/predictions"),
            api_token: api_token.into(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Where the service put the generated image.
#[derive(Debug, PartialEq)]
enum OutputRef {
    /// Bytes delivered inline as a `data:` URI.
    Inline(Vec<u8>),
    /// Dereferenceable URL to the bytes.
    Url(String),
}

/// Generator backed by a synchronous remote generation service.
#[derive(Debug)]
pub struct SynchronousGenerator {
    config: SyncConfig,
    client: reqwest::Client,
}

impl SynchronousGenerator {
    /// Fails if no API token is configured.
    pub fn new(config: SyncConfig) -> Result<Self, GenerationError> {
        if config.api_token.trim().is_empty() {
            return Err(GenerationError::Config(
                "synchronous generator requires an API token (REPLICATE_API_TOKEN)".into(),
            ));
        }
        Ok(Self {
            config,
            client: reqwest::Client::new(),
        })
    }

    fn build_prompt(style: &StylePreset) -> String {
        format!(
            "professional portrait photo of a person, photorealistic, high quality, \
             detailed, studio lighting, {}",
            style.prompt
        )
    }

    /// Normalize the input to the model's constraints and PNG-encode it.
    fn prepare_input(input_path: &Path) -> Result<Vec<u8>, GenerationError> {
        let img = image::open(input_path)
            .map_err(|e| GenerationError::wrap("Could not read input image", e))?;

        let (width, height) = (img.width(), img.height());
        let (target_w, target_h) = normalize_dimensions(width, height);
        let img = if (target_w, target_h) != (width, height) {
            img.resize_exact(target_w, target_h, FilterType::Lanczos3)
        } else {
            img
        };

        let mut png = Vec::new();
        img.to_rgb8()
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .map_err(|e| GenerationError::wrap("Could not encode input image", e))?;
        Ok(png)
    }

    async fn fetch_url(&self, url: &str) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .client
            .get(url)
            .timeout(self.config.request_timeout)
            .send()
            .await
            .map_err(|e| GenerationError::wrap("Could not download generated image", e))?;

        if !response.status().is_success() {
            return Err(GenerationError::failed(format!(
                "Result download failed with status {}",
                response.status().as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GenerationError::wrap("Could not read generated image", e))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl ImageGenerator for SynchronousGenerator {
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
            "input": {
                "image": image_uri,
                "prompt": prompt,
                "negative_prompt": NEGATIVE_PROMPT,
                "num_outputs": 1,
                "num_inference_steps": 30,
                "guidance_scale": 6.0,
                "ip_adapter_scale": 0.8,
                "scheduler": "EulerDiscreteScheduler",
            },
        });
        report(progress, 40);

        let response = self
            .client
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_token)
            .header("Prefer", "wait")
            .timeout(self.config.request_timeout)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GenerationError::wrap("Generation service request failed", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(GenerationError::failed(format!(
                "Generation service error ({}): {body}",
                status.as_u16()
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::wrap("Could not parse generation response", e))?;
        report(progress, 80);

        if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
            return Err(GenerationError::failed(format!(
                "Generation service reported an error: {message}"
            )));
        }

        let bytes = match extract_output(value.get("output").unwrap_or(&serde_json::Value::Null))? {
            OutputRef::Inline(bytes) => bytes,
            OutputRef::Url(url) => self.fetch_url(&url).await?,
        };
        report(progress, 90);

        tokio::fs::write(output_path, &bytes)
            .await
            .map_err(|e| GenerationError::wrap("Could not save generated image", e))?;
        report(progress, 100);

        Ok(output_path.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "synchronous"
    }
}

/// Fit `(width, height)` to the model's constraints: longest side capped
/// at [`MAX_DIM`], each side rounded down to a multiple of [`DIM_MULTIPLE`]
/// and floored at [`MIN_DIM`].
pub fn normalize_dimensions(width: u32, height: u32) -> (u32, u32) {
    let longest = width.max(height).max(1);
    let (w, h) = if longest > MAX_DIM {
        let scale = MAX_DIM as f64 / longest as f64;
        (
            (width as f64 * scale).round() as u32,
            (height as f64 * scale).round() as u32,
        )
    } else {
        (width, height)
    };

    let snap = |d: u32| ((d / DIM_MULTIPLE) * DIM_MULTIPLE).max(MIN_DIM);
    (snap(w), snap(h))
}

/// Pull the first usable output reference out of the service response.
fn extract_output(output: &serde_json::Value) -> Result<OutputRef, GenerationError> {
    let first = match output {
        serde_json::Value::String(s) => s.as_str(),
        serde_json::Value::Array(items) => items
            .first()
            .and_then(|v| v.as_str())
            .ok_or_else(|| GenerationError::failed("No output received from the generation service"))?,
        _ => {
            return Err(GenerationError::failed(
                "No output received from the generation service",
            ))
        }
    };

    if first.starts_with("data:") {
        let encoded = first
            .split_once(',')
            .map(|(_, b)| b)
            .ok_or_else(|| GenerationError::failed("Malformed data URI in service output"))?;
        let bytes = STANDARD
            .decode(encoded)
            .map_err(|e| GenerationError::wrap("Malformed base64 in service output", e))?;
        Ok(OutputRef::Inline(bytes))
    } else {
        Ok(OutputRef::Url(first.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_channel;
    use crate::testserver::{png_fixture, ScriptedServer};
    use assert_matches::assert_matches;
    use styleforge_core::styles::StyleRegistry;

    fn config(endpoint: String) -> SyncConfig {
        SyncConfig {
            endpoint,
            request_timeout: Duration::from_secs(5),
            ..SyncConfig::new("test-token")
        }
    }

    fn style() -> StylePreset {
        StyleRegistry::with_defaults()
            .get("classic-tuxedo")
            .unwrap()
            .clone()
    }

    // -- normalize_dimensions -----------------------------------------------

    #[test]
    fn small_inputs_keep_multiple_of_eight() {
        assert_eq!(normalize_dimensions(800, 600), (800, 600));
        assert_eq!(normalize_dimensions(801, 601), (800, 600));
    }

    #[test]
    fn oversized_inputs_scaled_to_cap() {
        let (w, h) = normalize_dimensions(2048, 1024);
        assert_eq!(w, 1024);
        assert_eq!(h, 512);
        assert_eq!(w % DIM_MULTIPLE, 0);
        assert_eq!(h % DIM_MULTIPLE, 0);
    }

    #[test]
    fn oversized_portrait_preserves_aspect() {
        let (w, h) = normalize_dimensions(1000, 4000);
        assert_eq!(h, 1024);
        assert_eq!(w, 256);
    }

    #[test]
    fn tiny_inputs_floored() {
        assert_eq!(normalize_dimensions(100, 100), (MIN_DIM, MIN_DIM));
    }

    #[test]
    fn cap_is_a_valid_multiple() {
        assert_eq!(MAX_DIM % DIM_MULTIPLE, 0);
        assert_eq!(MIN_DIM % DIM_MULTIPLE, 0);
    }

    // -- extract_output ------------------------------------------------------

    #[test]
    fn url_string_output() {
        let out = extract_output(&serde_json::json!("https://cdn.example/result.png")).unwrap();
        assert_eq!(out, OutputRef::Url("https://cdn.example/result.png".into()));
    }

    #[test]
    fn first_of_array_output() {
        let out =
            extract_output(&serde_json::json!(["https://cdn.example/a.png", "b.png"])).unwrap();
        assert_eq!(out, OutputRef::Url("https://cdn.example/a.png".into()));
    }

    #[test]
    fn inline_data_uri_decoded() {
        let uri = png_data_uri(b"image-bytes");
        let out = extract_output(&serde_json::json!(uri)).unwrap();
        assert_eq!(out, OutputRef::Inline(b"image-bytes".to_vec()));
    }

    #[test]
    fn null_output_rejected() {
        assert_matches!(
            extract_output(&serde_json::Value::Null),
            Err(GenerationError::Failed { .. })
        );
    }

    #[test]
    fn empty_array_rejected() {
        assert_matches!(
            extract_output(&serde_json::json!([])),
            Err(GenerationError::Failed { .. })
        );
    }

    // -- construction --------------------------------------------------------

    #[test]
    fn missing_token_rejected_at_construction() {
        let result = SynchronousGenerator::new(SyncConfig::new("  "));
        assert_matches!(result, Err(GenerationError::Config(_)));
    }

    // -- full generate against a scripted service ---------------------------

    #[tokio::test]
    async fn inline_output_written_to_output_path() {
        let result_png = png_fixture();
        let body = serde_json::json!({
            "status": "succeeded",
            "error": null,
            "output": [png_data_uri(&result_png)],
        });
        let server = ScriptedServer::start(vec![(
            200,
            "application/json",
            serde_json::to_vec(&body).unwrap(),
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        std::fs::write(&input, png_fixture()).unwrap();
        let out = dir.path().join("out.png");

        let generator = SynchronousGenerator::new(config(server.url())).unwrap();
        let (tx, _rx) = progress_channel();
        generator.generate(&input, &style(), &out, &tx).await.unwrap();

        assert_eq!(std::fs::read(&out).unwrap(), result_png);
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn service_reported_error_is_terminal() {
        let body = serde_json::json!({"status": "failed", "error": "NSFW content detected"});
        let server = ScriptedServer::start(vec![(
            200,
            "application/json",
            serde_json::to_vec(&body).unwrap(),
        )])
        .await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        std::fs::write(&input, png_fixture()).unwrap();

        let generator = SynchronousGenerator::new(config(server.url())).unwrap();
        let (tx, _rx) = progress_channel();
        let err = generator
            .generate(&input, &style(), &dir.path().join("out.png"), &tx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("NSFW"), "got: {err}");
        // No retry loop: a single attempt only.
        assert_eq!(server.hits(), 1);
    }

    #[tokio::test]
    async fn http_error_is_terminal_without_retry() {
        let server =
            ScriptedServer::start(vec![(402, "application/json", b"{}".to_vec())]).await;

        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.png");
        std::fs::write(&input, png_fixture()).unwrap();

        let generator = SynchronousGenerator::new(config(server.url())).unwrap();
        let (tx, _rx) = progress_channel();
        let err = generator
            .generate(&input, &style(), &dir.path().join("out.png"), &tx)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("402"), "got: {err}");
        assert_eq!(server.hits(), 1);
    }
}
