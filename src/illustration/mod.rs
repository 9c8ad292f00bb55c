// src/illustration/mod.rs
//! Optional illustration for the post. Everything here is best effort: a
//! failure means "no image", never an aborted run.

pub mod gemini;
pub mod watermark;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use crate::error::TransportError;

/// Prompt sent to an image generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePrompt {
    pub prompt: String,
    /// Things the image must not contain.
    pub negative: Option<String>,
}

/// Produces exactly one encoded image per call.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &ImagePrompt) -> Result<Vec<u8>, TransportError>;
}

/// An image saved on disk for a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub topic: String,
    pub path: PathBuf,
    pub created_at: NaiveDateTime,
    /// Set once the brand mark has been composited in place.
    pub marked: bool,
}

const STYLES: &[&str] = &[
    "modern editorial illustration",
    "clean isometric 3D render",
    "high-detail photograph with natural light",
    "minimalist flat vector art",
    "cinematic wide-angle scene",
];

const PALETTES: &[&str] = &[
    "deep blues and warm amber accents",
    "soft pastels",
    "earthy greens and sand tones",
    "monochrome with a single teal accent",
    "vibrant but balanced complementary colors",
];

const NEGATIVE: &str = "text, letters, captions, watermarks, logos, signatures, distorted faces";

/// Deterministic prompt for a given style and palette.
pub fn build_prompt(topic: &str, style: &str, palette: &str) -> ImagePrompt {
    ImagePrompt {
        prompt: format!(
            "Create a professional, high-detail image representing '{topic}'. \
             Style: {style}, color palette of {palette}. \
             Suitable for a LinkedIn post: visually striking, uncluttered, clearly about the subject. \
             Bright, natural lighting."
        ),
        negative: Some(NEGATIVE.to_string()),
    }
}

/// Prompt with a randomly picked style and palette.
pub fn random_prompt(topic: &str) -> ImagePrompt {
    let mut rng = rand::rng();
    let style = STYLES.choose(&mut rng).copied().unwrap_or(STYLES[0]);
    let palette = PALETTES.choose(&mut rng).copied().unwrap_or(PALETTES[0]);
    build_prompt(topic, style, palette)
}

/// `"Ocean Life"` at 2025-03-04 05:06:07 → `ocean_life_20250304_050607.png`.
pub fn image_file_name(topic: &str, at: NaiveDateTime) -> String {
    let slug: String = topic
        .trim()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = if slug.is_empty() { "image".to_string() } else { slug };
    format!("{slug}_{}.png", at.format("%Y%m%d_%H%M%S"))
}

pub struct ImageProducer {
    generator: Arc<dyn ImageGenerator>,
    dir: PathBuf,
}

impl ImageProducer {
    pub fn new(generator: Arc<dyn ImageGenerator>, dir: impl Into<PathBuf>) -> Self {
        Self {
            generator,
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Request, validate and save one image. `None` on any failure.
    pub async fn generate(&self, topic: &str, at: NaiveDateTime) -> Option<ImageArtifact> {
        let prompt = random_prompt(topic);
        debug!(topic, prompt = %prompt.prompt, "requesting image");

        let bytes = match self.generator.generate_image(&prompt).await {
            Ok(b) => b,
            Err(e) => {
                warn!(topic, error = %e, "image generation failed, continuing without image");
                return None;
            }
        };

        let path = self.dir.join(image_file_name(topic, at));
        match save_png(&bytes, &path) {
            Ok(()) => {
                info!(topic, path = %path.display(), "image saved");
                Some(ImageArtifact {
                    topic: topic.to_string(),
                    path,
                    created_at: at,
                    marked: false,
                })
            }
            Err(e) => {
                warn!(topic, error = %e, "generated image could not be decoded or saved");
                None
            }
        }
    }
}

/// Decode (whatever the encoding) and store as PNG.
fn save_png(bytes: &[u8], path: &Path) -> anyhow::Result<()> {
    let img = image::load_from_memory(bytes)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
