//! Deterministic local generator.
//!
//! Applies a fixed, style-parameterized transform — color overlay blend,
//! contrast and saturation adjustment, and a label band — with no network
//! dependency. With simulated delay disabled the output is a pure function
//! of input bytes + style, byte-for-byte reproducible. Used for offline
//! testing and as the default when no remote credentials are configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use styleforge_core::styles::StylePreset;

use crate::base::{validate_input, GenerationError, ImageGenerator};
use crate::progress::{report, ProgressSender};

/// Number of equal progress steps emitted while simulating latency.
const DELAY_STEPS: u32 = 5;

/// Per-style visual effect parameters.
#[derive(Debug, Clone, Copy)]
pub struct StyleEffect {
    /// Overlay color blended over the whole frame.
    pub overlay: [u8; 3],
    /// Overlay blend opacity in `0.0..=1.0`.
    pub opacity: f32,
    /// Contrast multiplier (1.0 = unchanged).
    pub contrast: f32,
    /// Saturation multiplier (1.0 = unchanged).
    pub saturation: f32,
    /// Accent color for the label band.
    pub label: [u8; 3],
}

/// Effect applied for styles without a dedicated entry.
const DEFAULT_EFFECT: StyleEffect = StyleEffect {
    overlay: [128, 0, 255],
    opacity: 0.1,
    contrast: 1.1,
    saturation: 1.0,
    label: [128, 0, 255],
};

/// Look up the effect parameters for a style id.
pub fn effect_for(style_id: &str) -> StyleEffect {
    match style_id {
        "classic-tuxedo" => StyleEffect {
            overlay: [20, 20, 30],
            opacity: 0.15,
            contrast: 1.2,
            saturation: 0.8,
            label: [255, 215, 0],
        },
        "streetwear" => StyleEffect {
            overlay: [255, 100, 50],
            opacity: 0.1,
            contrast: 1.15,
            saturation: 1.3,
            label: [255, 100, 50],
        },
        "techwear" => StyleEffect {
            overlay: [30, 30, 35],
            opacity: 0.2,
            contrast: 1.3,
            saturation: 0.7,
            label: [100, 200, 255],
        },
        "old-money" => StyleEffect {
            overlay: [180, 150, 100],
            opacity: 0.1,
            contrast: 1.1,
            saturation: 0.9,
            label: [180, 150, 100],
        },
        "minimalist" => StyleEffect {
            overlay: [200, 200, 200],
            opacity: 0.15,
            contrast: 1.1,
            saturation: 0.5,
            label: [150, 150, 150],
        },
        "cyberpunk" => StyleEffect {
            overlay: [255, 0, 150],
            opacity: 0.15,
            contrast: 1.4,
            saturation: 1.5,
            label: [255, 0, 255],
        },
        "crypto-bro" => StyleEffect {
            overlay: [0, 200, 100],
            opacity: 0.1,
            contrast: 1.2,
            saturation: 1.1,
            label: [0, 255, 100],
        },
        _ => DEFAULT_EFFECT,
    }
}

/// Deterministic stub generator.
#[derive(Debug)]
pub struct StubGenerator {
    simulate_delay: bool,
    delay: Duration,
}

impl StubGenerator {
    pub fn new(simulate_delay: bool, delay: Duration) -> Self {
        Self {
            simulate_delay,
            delay,
        }
    }

    /// Stub with latency simulation disabled (pure transform).
    pub fn instant() -> Self {
        Self::new(false, Duration::ZERO)
    }
}

#[async_trait]
impl ImageGenerator for StubGenerator {
    async fn generate(
        &self,
        input_path: &Path,
        style: &StylePreset,
        output_path: &Path,
        progress: &ProgressSender,
    ) -> Result<PathBuf, GenerationError> {
        validate_input(input_path)?;
        report(progress, 10);

        let effect = effect_for(&style.id);

        let mut img = image::open(input_path)
            .map_err(|e| GenerationError::wrap("Stub generation failed: could not read input image", e))?
            .to_rgb8();
        report(progress, 20);

        if self.simulate_delay {
            let step_delay = self.delay / DELAY_STEPS;
            for i in 0..DELAY_STEPS {
                tokio::time::sleep(step_delay).await;
                report(progress, (20 + (i + 1) * 50 / DELAY_STEPS) as u8);
            }
        }

        blend_overlay(&mut img, effect.overlay, effect.opacity);
        report(progress, 75);

        if effect.contrast != 1.0 {
            adjust_contrast(&mut img, effect.contrast);
        }
        if effect.saturation != 1.0 {
            adjust_saturation(&mut img, effect.saturation);
        }
        report(progress, 85);

        draw_label_band(&mut img, effect.label);
        report(progress, 95);

        img.save_with_format(output_path, ImageFormat::Png)
            .map_err(|e| GenerationError::wrap("Stub generation failed: could not save output", e))?;
        report(progress, 100);

        Ok(output_path.to_path_buf())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

fn mix(a: u8, b: u8, t: f32) -> u8 {
    (a as f32 * (1.0 - t) + b as f32 * t).round().clamp(0.0, 255.0) as u8
}

/// Blend a flat color over the whole frame.
fn blend_overlay(img: &mut RgbImage, color: [u8; 3], opacity: f32) {
    for Rgb(px) in img.pixels_mut() {
        for c in 0..3 {
            px[c] = mix(px[c], color[c], opacity);
        }
    }
}

/// Scale contrast around mid-gray.
fn adjust_contrast(img: &mut RgbImage, factor: f32) {
    for Rgb(px) in img.pixels_mut() {
        for c in 0..3 {
            let v = (px[c] as f32 / 255.0 - 0.5) * factor + 0.5;
            px[c] = (v * 255.0).round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Move each channel toward (or away from) the pixel's luma.
fn adjust_saturation(img: &mut RgbImage, factor: f32) {
    for Rgb(px) in img.pixels_mut() {
        let luma = 0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32;
        for c in 0..3 {
            let v = luma + (px[c] as f32 - luma) * factor;
            px[c] = v.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Draw the style label band: a dark pill near the bottom edge with an
/// accent stripe in the style's label color. Integer geometry only, so
/// the band is reproducible for a given frame size.
fn draw_label_band(img: &mut RgbImage, label: [u8; 3]) {
    let (w, h) = img.dimensions();
    if w < 16 || h < 16 {
        return;
    }

    let band_h = (h / 12).clamp(12, 48);
    let band_w = w * 3 / 5;
    let x0 = (w - band_w) / 2;
    let y1 = h - (h / 20).min(h - band_h);
    let y0 = y1 - band_h;

    for y in y0..y1 {
        for x in x0..x0 + band_w {
            let px = img.get_pixel_mut(x, y);
            for c in 0..3 {
                px.0[c] = mix(px.0[c], 8, 0.8);
            }
        }
    }

    let stripe_h = (band_h / 6).max(2);
    for y in (y1 - stripe_h)..y1 {
        for x in x0..x0 + band_w {
            img.put_pixel(x, y, Rgb(label));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::progress_channel;
    use styleforge_core::styles::StyleRegistry;

    fn write_test_image(dir: &Path) -> PathBuf {
        let img = RgbImage::from_fn(64, 48, |x, y| {
            Rgb([(x * 4) as u8, (y * 5) as u8, ((x + y) * 2) as u8])
        });
        let path = dir.join("in.png");
        img.save_with_format(&path, ImageFormat::Png).unwrap();
        path
    }

    fn classic_tuxedo() -> StylePreset {
        StyleRegistry::with_defaults()
            .get("classic-tuxedo")
            .unwrap()
            .clone()
    }

    #[tokio::test]
    async fn output_is_byte_for_byte_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_image(dir.path());
        let style = classic_tuxedo();
        let generator = StubGenerator::instant();

        let out_a = dir.path().join("a.png");
        let out_b = dir.path().join("b.png");
        let (tx, _rx) = progress_channel();

        generator.generate(&input, &style, &out_a, &tx).await.unwrap();
        generator.generate(&input, &style, &out_b, &tx).await.unwrap();

        let a = std::fs::read(&out_a).unwrap();
        let b = std::fs::read(&out_b).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_styles_produce_different_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_image(dir.path());
        let registry = StyleRegistry::with_defaults();
        let generator = StubGenerator::instant();
        let (tx, _rx) = progress_channel();

        let out_a = dir.path().join("tuxedo.png");
        let out_b = dir.path().join("cyberpunk.png");
        generator
            .generate(&input, registry.get("classic-tuxedo").unwrap(), &out_a, &tx)
            .await
            .unwrap();
        generator
            .generate(&input, registry.get("cyberpunk").unwrap(), &out_b, &tx)
            .await
            .unwrap();

        assert_ne!(std::fs::read(out_a).unwrap(), std::fs::read(out_b).unwrap());
    }

    #[tokio::test]
    async fn progress_is_non_decreasing_and_reaches_100() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_image(dir.path());
        let generator = StubGenerator::new(true, Duration::from_millis(10));
        let (tx, mut rx) = progress_channel();

        generator
            .generate(&input, &classic_tuxedo(), &dir.path().join("out.png"), &tx)
            .await
            .unwrap();
        drop(tx);

        let mut seen = Vec::new();
        while let Some(p) = rx.recv().await {
            seen.push(p);
        }
        assert!(seen.windows(2).all(|w| w[0] <= w[1]), "milestones {seen:?}");
        assert_eq!(*seen.last().unwrap(), 100);
        assert!(seen.len() >= DELAY_STEPS as usize + 3);
    }

    #[tokio::test]
    async fn missing_input_is_precondition_error() {
        let dir = tempfile::tempdir().unwrap();
        let generator = StubGenerator::instant();
        let (tx, _rx) = progress_channel();

        let err = generator
            .generate(
                &dir.path().join("missing.png"),
                &classic_tuxedo(),
                &dir.path().join("out.png"),
                &tx,
            )
            .await
            .unwrap_err();
        assert!(err.is_precondition());
    }

    #[tokio::test]
    async fn unknown_style_falls_back_to_default_effect() {
        let dir = tempfile::tempdir().unwrap();
        let input = write_test_image(dir.path());
        let generator = StubGenerator::instant();
        let (tx, _rx) = progress_channel();

        let style = StylePreset {
            id: "not-registered".into(),
            name: "Not Registered".into(),
            description: "no dedicated effect".into(),
            prompt: "whatever".into(),
            thumbnail: None,
        };
        let out = dir.path().join("out.png");
        generator.generate(&input, &style, &out, &tx).await.unwrap();
        assert!(out.is_file());
    }

    #[test]
    fn effect_table_covers_default_styles() {
        for id in [
            "classic-tuxedo",
            "streetwear",
            "techwear",
            "old-money",
            "minimalist",
            "cyberpunk",
            "crypto-bro",
        ] {
            let effect = effect_for(id);
            assert!(effect.opacity > 0.0 && effect.opacity <= 1.0);
        }
    }
}
