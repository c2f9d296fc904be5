//! Style preset registry — the central place all available styles are
//! defined.
//!
//! The registry is built once at startup and never mutated afterwards,
//! so it is safe for unsynchronized concurrent reads. Jobs store only a
//! style id; the preset is resolved again at processing time.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// An immutable-per-lookup definition of a named visual style.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylePreset {
    /// Unique style identifier (kebab-case).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Human-readable style description.
    pub description: String,
    /// Generation prompt template appended to the base portrait prompt.
    pub prompt: String,
    /// Thumbnail image URL, if one exists.
    pub thumbnail: Option<String>,
}

/// Registry of available style presets.
#[derive(Debug, Default)]
pub struct StyleRegistry {
    styles: HashMap<String, StylePreset>,
    // Registration order, so listings are stable.
    order: Vec<String>,
}

impl StyleRegistry {
    /// Build a registry preloaded with the default presets.
    pub fn with_defaults() -> Self {
        let mut registry = Self::default();
        for preset in default_presets() {
            registry.register(preset);
        }
        registry
    }

    /// Register a style preset, replacing any existing preset with the
    /// same id.
    pub fn register(&mut self, style: StylePreset) {
        if !self.styles.contains_key(&style.id) {
            self.order.push(style.id.clone());
        }
        self.styles.insert(style.id.clone(), style);
    }

    /// Look up a style preset by id.
    pub fn get(&self, style_id: &str) -> Option<&StylePreset> {
        self.styles.get(style_id)
    }

    /// Whether a style id is registered.
    pub fn exists(&self, style_id: &str) -> bool {
        self.styles.contains_key(style_id)
    }

    /// All registered presets, in registration order.
    pub fn all(&self) -> Vec<&StylePreset> {
        self.order.iter().filter_map(|id| self.styles.get(id)).collect()
    }

    /// All registered style ids, in registration order.
    pub fn ids(&self) -> Vec<&str> {
        self.order.iter().map(String::as_str).collect()
    }
}

fn preset(
    id: &str,
    name: &str,
    description: &str,
    prompt: &str,
) -> StylePreset {
    StylePreset {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        prompt: prompt.to_string(),
        thumbnail: Some(format!("/thumbnails/{id}.jpg")),
    }
}

/// The default style catalog.
fn default_presets() -> Vec<StylePreset> {
    vec![
        preset(
            "classic-tuxedo",
            "Classic Tuxedo",
            "Elegant spy archetype in formal evening wear with sophistication",
            "wearing an elegant black tuxedo with white dress shirt and black bow tie, \
             sophisticated spy aesthetic, formal evening wear, sleek and polished appearance",
        ),
        preset(
            "streetwear",
            "Modern Streetwear",
            "Urban fashion with hoodies, sneakers, and contemporary street style",
            "wearing modern streetwear fashion, oversized hoodie, designer sneakers, \
             urban style, contemporary street fashion, casual cool aesthetic",
        ),
        preset(
            "techwear",
            "Techwear",
            "Functional futuristic clothing with utility and tech aesthetics",
            "wearing techwear fashion, functional futuristic clothing, utility vest, \
             cargo pants with straps, technical fabrics, dark monochrome palette, \
             cyberpunk influenced",
        ),
        preset(
            "old-money",
            "Old Money",
            "Refined preppy aesthetic with timeless elegance",
            "wearing old money style clothing, cashmere sweater draped over shoulders, \
             oxford shirt, tailored chinos, loafers, preppy refined aesthetic, \
             understated luxury",
        ),
        preset(
            "minimalist",
            "Minimalist",
            "Clean, simple, monochrome looks with focus on quality basics",
            "wearing minimalist fashion, clean simple clothing, monochrome palette, \
             quality basics, neutral tones, scandinavian inspired, understated elegance",
        ),
        preset(
            "cyberpunk",
            "Cyberpunk",
            "Neon-accented futuristic fashion with bold tech elements",
            "wearing cyberpunk fashion, neon accented clothing, futuristic tech \
             accessories, LED elements, dark base with bright accent colors, \
             dystopian future aesthetic",
        ),
        preset(
            "crypto-bro",
            "Crypto Bro",
            "Tech founder vibes with hoodies, Patagonia vests, and startup energy",
            "wearing tech startup fashion, grey or black hoodie under Patagonia vest, \
             AirPods, casual expensive sneakers, Apple Watch, confident Silicon Valley \
             tech bro aesthetic, venture capital energy",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_styles_registered() {
        let registry = StyleRegistry::with_defaults();
        assert!(registry.all().len() >= 6);
    }

    #[test]
    fn get_style_by_id() {
        let registry = StyleRegistry::with_defaults();
        let style = registry.get("classic-tuxedo").unwrap();
        assert_eq!(style.id, "classic-tuxedo");
        assert_eq!(style.name, "Classic Tuxedo");
        assert!(!style.prompt.is_empty());
    }

    #[test]
    fn nonexistent_style_is_none() {
        let registry = StyleRegistry::with_defaults();
        assert!(registry.get("nonexistent-style").is_none());
        assert!(!registry.exists("nonexistent"));
    }

    #[test]
    fn known_ids_present() {
        let registry = StyleRegistry::with_defaults();
        let ids = registry.ids();
        for expected in [
            "classic-tuxedo",
            "streetwear",
            "techwear",
            "old-money",
            "minimalist",
            "cyberpunk",
        ] {
            assert!(ids.contains(&expected), "missing style id {expected}");
        }
    }

    #[test]
    fn register_custom_style() {
        let mut registry = StyleRegistry::with_defaults();
        registry.register(StylePreset {
            id: "custom-test".into(),
            name: "Custom Test Style".into(),
            description: "A test style".into(),
            prompt: "test prompt for custom style".into(),
            thumbnail: None,
        });

        assert!(registry.exists("custom-test"));
        assert_eq!(registry.get("custom-test").unwrap().name, "Custom Test Style");
    }

    #[test]
    fn all_styles_have_required_fields() {
        let registry = StyleRegistry::with_defaults();
        for style in registry.all() {
            assert!(!style.id.is_empty());
            assert!(!style.name.is_empty());
            assert!(!style.description.is_empty());
            assert!(!style.prompt.is_empty());
        }
    }

    #[test]
    fn style_ids_are_kebab_case() {
        let registry = StyleRegistry::with_defaults();
        for style in registry.all() {
            assert_eq!(style.id, style.id.to_lowercase());
            assert!(!style.id.contains(' '));
        }
    }

    #[test]
    fn specific_styles_content() {
        let registry = StyleRegistry::with_defaults();

        let tuxedo = registry.get("classic-tuxedo").unwrap();
        assert!(tuxedo.prompt.to_lowercase().contains("tuxedo"));

        let streetwear = registry.get("streetwear").unwrap();
        assert!(streetwear.prompt.to_lowercase().contains("street"));

        let cyberpunk = registry.get("cyberpunk").unwrap();
        let prompt = cyberpunk.prompt.to_lowercase();
        assert!(prompt.contains("neon") || prompt.contains("cyber"));
    }

    #[test]
    fn re_registering_keeps_single_entry() {
        let mut registry = StyleRegistry::with_defaults();
        let count = registry.all().len();
        let replacement = StylePreset {
            name: "Replacement".into(),
            ..registry.get("cyberpunk").unwrap().clone()
        };
        registry.register(replacement);
        assert_eq!(registry.all().len(), count);
        assert_eq!(registry.get("cyberpunk").unwrap().name, "Replacement");
    }
}
