// src/illustration/watermark.rs
//! Brand mark overlay: bottom-right corner, 20% of the base width, 2% padding.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat};
use tracing::{info, warn};

use super::ImageArtifact;

/// Mark width as a percentage of the base width.
pub const MARK_WIDTH_PERCENT: u64 = 20;
/// Padding from the right/bottom edges as a percentage of width/height.
pub const PADDING_PERCENT: u64 = 2;

/// Where and how large the mark lands on the base image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkPlacement {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
}

impl MarkPlacement {
    /// Integer (floor) geometry. `None` for degenerate sizes.
    pub fn compute(base_w: u32, base_h: u32, mark_w: u32, mark_h: u32) -> Option<Self> {
        if base_w == 0 || base_h == 0 || mark_w == 0 || mark_h == 0 {
            return None;
        }
        let (bw, bh) = (u64::from(base_w), u64::from(base_h));
        let width = bw * MARK_WIDTH_PERCENT / 100;
        if width == 0 {
            return None;
        }
        let height = (u64::from(mark_h) * width / u64::from(mark_w)).max(1);
        let pad_x = bw * PADDING_PERCENT / 100;
        let pad_y = bh * PADDING_PERCENT / 100;

        Some(Self {
            width: width as u32,
            height: u32::try_from(height).ok()?,
            x: bw.saturating_sub(width + pad_x) as u32,
            y: bh.saturating_sub(height + pad_y) as u32,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Applied(MarkPlacement),
    SkippedMissingMark,
    AlreadyMarked,
}

/// Overlay `mark` onto `base` and overwrite `base` in place.
/// A missing mark file is a skip, not an error.
pub fn apply_mark(base: &Path, mark: &Path) -> Result<MarkOutcome> {
    if !mark.is_file() {
        warn!(mark = %mark.display(), "brand mark not found, skipping watermark");
        return Ok(MarkOutcome::SkippedMissingMark);
    }

    let mut canvas = image::open(base)
        .with_context(|| format!("opening base image {}", base.display()))?
        .to_rgba8();
    let logo = image::open(mark)
        .with_context(|| format!("opening brand mark {}", mark.display()))?
        .to_rgba8();

    let placement = MarkPlacement::compute(
        canvas.width(),
        canvas.height(),
        logo.width(),
        logo.height(),
    )
    .ok_or_else(|| anyhow!("base image too small for a brand mark"))?;

    let scaled = imageops::resize(&logo, placement.width, placement.height, FilterType::Lanczos3);
    imageops::overlay(
        &mut canvas,
        &scaled,
        i64::from(placement.x),
        i64::from(placement.y),
    );

    // Keep the file format; alpha is flattened to RGB.
    let format = ImageFormat::from_path(base).unwrap_or(ImageFormat::Png);
    let mut tmp_name = base.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    DynamicImage::ImageRgba8(canvas)
        .to_rgb8()
        .save_with_format(&tmp, format)
        .with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, base).with_context(|| format!("replacing {}", base.display()))?;

    info!(
        base = %base.display(),
        x = placement.x,
        y = placement.y,
        width = placement.width,
        height = placement.height,
        "brand mark applied"
    );
    Ok(MarkOutcome::Applied(placement))
}

/// Apply the mark at most once per artifact.
pub fn mark_artifact(artifact: &mut ImageArtifact, mark: &Path) -> Result<MarkOutcome> {
    if artifact.marked {
        return Ok(MarkOutcome::AlreadyMarked);
    }
    let outcome = apply_mark(&artifact.path, mark)?;
    if matches!(outcome, MarkOutcome::Applied(_)) {
        artifact.marked = true;
    }
    Ok(outcome)
}
