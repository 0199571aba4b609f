// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detectors for printed security features: guilloche line work, microprint,
// the ghost portrait and the machine-readable zone.
//
// All of them look for fine, high-contrast structure in the hinted region.
// Rescanning, photocopying and blurring wash that structure out, which is
// what drives their scores down on reproductions.

use docverify_core::config::CaptureRequirements;
use docverify_core::types::{DetectorId, FailureReason, FeatureResult, SecurityFeatureSpec};
use image::{GrayImage, RgbImage};

use super::analysis::{crop_luma, crop_rgb, mean_std, otsu_threshold};
use super::{DetectionContext, FeatureDetector};

/// Intensity step between neighbours that counts as a printed line edge.
const EDGE_STEP: i16 = 24;
/// Fraction of neighbour pairs crossing a line edge that counts as a full
/// guilloche score.
const GUILLOCHE_DENSITY_FULL: f64 = 0.25;
/// Depth of a one-pixel dark stroke below both horizontal neighbours.
const MICROPRINT_DEPTH: i16 = 30;
/// Fraction of stroke pixels that counts as a full microprint score.
const MICROPRINT_DENSITY_FULL: f64 = 0.15;
/// Rows with more ink than this belong to a text band.
const MRZ_ROW_INK: f64 = 0.08;
/// Below this dynamic range the region is treated as blank.
const MRZ_MIN_RANGE: u8 = 40;

/// Fine interlaced line pattern (guilloche rosettes and borders).
pub struct GuillocheDetector;

impl FeatureDetector for GuillocheDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Guilloche
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let gray = crop_luma(ctx.capture.primary(), ctx.region(feature));
        let density = edge_density(&gray);
        Ok(
            FeatureResult::measured(feature, (density / GUILLOCHE_DENSITY_FULL) as f32)
                .with_diagnostic("edge_density", density),
        )
    }
}

/// Fraction of neighbouring pixel pairs that cross a line edge, in whichever
/// direction the lines run across.
pub(crate) fn edge_density(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let step = |a: u8, b: u8| (a as i16 - b as i16).abs() > EDGE_STEP;

    let mut horizontal = 0u64;
    let mut vertical = 0u64;
    for y in 0..h {
        for x in 0..w {
            let p = gray.get_pixel(x, y).0[0];
            if x + 1 < w && step(p, gray.get_pixel(x + 1, y).0[0]) {
                horizontal += 1;
            }
            if y + 1 < h && step(p, gray.get_pixel(x, y + 1).0[0]) {
                vertical += 1;
            }
        }
    }

    let h_pairs = (w.saturating_sub(1) as u64 * h as u64).max(1) as f64;
    let v_pairs = (w as u64 * h.saturating_sub(1) as u64).max(1) as f64;
    (horizontal as f64 / h_pairs).max(vertical as f64 / v_pairs)
}

/// Microprint: text too small to resolve at ordinary capture resolution.
pub struct MicroprintDetector;

impl FeatureDetector for MicroprintDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Microprint
    }

    fn required_dpi(&self, requirements: &CaptureRequirements) -> u32 {
        requirements.microprint_min_dpi
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let gray = crop_luma(ctx.capture.primary(), ctx.region(feature));
        let density = stroke_density(&gray);
        Ok(
            FeatureResult::measured(feature, (density / MICROPRINT_DENSITY_FULL) as f32)
                .with_diagnostic("stroke_density", density),
        )
    }
}

/// Fraction of pixels that are one-pixel dark strokes: clearly darker than
/// both horizontal neighbours.
pub(crate) fn stroke_density(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 3 || h == 0 {
        return 0.0;
    }
    let mut strokes = 0u64;
    for y in 0..h {
        for x in 1..w - 1 {
            let p = gray.get_pixel(x, y).0[0] as i16;
            let left = gray.get_pixel(x - 1, y).0[0] as i16;
            let right = gray.get_pixel(x + 1, y).0[0] as i16;
            if left - p > MICROPRINT_DEPTH && right - p > MICROPRINT_DEPTH {
                strokes += 1;
            }
        }
    }
    strokes as f64 / ((w - 2) as u64 * h as u64) as f64
}

/// Ghost image: a smaller, grayscale, finely screened copy of the portrait.
///
/// The score multiplies three signatures: the region is neutral gray, it
/// has tonal contrast, and it has fine texture.
pub struct GhostImageDetector;

impl FeatureDetector for GhostImageDetector {
    fn id(&self) -> DetectorId {
        DetectorId::GhostImage
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let region = ctx.region(feature);
        let rgb = crop_rgb(ctx.capture.primary(), region);
        let gray = crop_luma(ctx.capture.primary(), region);

        let grayness = (1.0 - mean_channel_spread(&rgb) / 40.0).clamp(0.0, 1.0);
        let (_, std) = mean_std(&gray);
        let contrast = (std / 30.0).clamp(0.0, 1.0);
        let texture = (mean_horizontal_step(&gray) / 6.0).clamp(0.0, 1.0);

        Ok(
            FeatureResult::measured(feature, (grayness * contrast * texture) as f32)
                .with_diagnostic("grayness", grayness)
                .with_diagnostic("contrast", contrast)
                .with_diagnostic("texture", texture),
        )
    }
}

fn mean_channel_spread(rgb: &RgbImage) -> f64 {
    let n = rgb.width() as usize * rgb.height() as usize;
    if n == 0 {
        return 0.0;
    }
    let total: f64 = rgb
        .pixels()
        .map(|p| {
            let max = p.0.iter().copied().max().unwrap_or(0);
            let min = p.0.iter().copied().min().unwrap_or(0);
            (max - min) as f64
        })
        .sum();
    total / n as f64
}

fn mean_horizontal_step(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    if w < 2 || h == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for y in 0..h {
        for x in 0..w - 1 {
            total += (gray.get_pixel(x, y).0[0] as f64 - gray.get_pixel(x + 1, y).0[0] as f64).abs();
        }
    }
    total / ((w - 1) as u64 * h as u64) as f64
}

/// Machine-readable zone layout: a TD3 passport carries exactly two lines of
/// OCR-B text in its MRZ.
pub struct MrzZoneDetector;

impl FeatureDetector for MrzZoneDetector {
    fn id(&self) -> DetectorId {
        DetectorId::MrzZone
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let gray = crop_luma(ctx.capture.primary(), ctx.region(feature));
        let bands = text_bands(&gray);
        let score = match bands {
            2 => 1.0,
            1 | 3 => 0.5,
            0 => 0.0,
            _ => 0.25,
        };
        Ok(FeatureResult::measured(feature, score).with_diagnostic("line_count", bands as f64))
    }
}

/// Number of horizontal bands of ink rows after Otsu binarisation.
pub(crate) fn text_bands(gray: &GrayImage) -> usize {
    let min = gray.pixels().map(|p| p.0[0]).min().unwrap_or(0);
    let max = gray.pixels().map(|p| p.0[0]).max().unwrap_or(0);
    if max.saturating_sub(min) < MRZ_MIN_RANGE {
        return 0;
    }

    let threshold = otsu_threshold(gray);
    let (w, h) = gray.dimensions();
    let mut bands = 0;
    let mut in_band = false;
    for y in 0..h {
        let ink = (0..w).filter(|&x| gray.get_pixel(x, y).0[0] <= threshold).count();
        let inked = ink as f64 / w.max(1) as f64 > MRZ_ROW_INK;
        if inked && !in_band {
            bands += 1;
        }
        in_band = inked;
    }
    bands
}
