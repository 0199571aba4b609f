// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detectors for features built into the paper rather than printed on it:
// watermarks, embossed seals and security threads.

use docverify_core::types::{DetectorId, FailureReason, FeatureResult, Region, SecurityFeatureSpec};
use image::GrayImage;

use super::analysis::{crop_luma, high_pass};
use super::{DetectionContext, FeatureDetector};

/// Local-mean radius of the watermark high-pass filter.
const WATERMARK_RADIUS: u32 = 4;
/// Fraction of the hinted region added on every side as reference ring.
const WATERMARK_RING: f32 = 0.25;
const EMBOSS_RADIUS: u32 = 3;
/// Deviation from the local mean that counts as a relief highlight or
/// shadow.
const EMBOSS_STEP: f64 = 25.0;
/// Fraction of highlight and shadow pixels that counts as a full score.
const EMBOSS_FRACTION_FULL: f64 = 0.04;
/// Relative darkening of the thread line that counts as a full score.
const THREAD_CONTRAST_FULL: f64 = 0.25;

/// Watermark: a tonal pattern in the paper itself.
///
/// After a high-pass filter, the hinted region must carry clearly more
/// structure than the ring of paper around it.
pub struct WatermarkDetector;

impl FeatureDetector for WatermarkDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Watermark
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let primary = ctx.capture.primary();
        let (w, h) = (primary.width(), primary.height());
        let region = feature.region.unwrap_or(Region::FULL);
        let inner = region.to_pixels(w, h);
        let outer = region.expanded(WATERMARK_RING).to_pixels(w, h);

        let gray = crop_luma(primary, outer);
        let inner_x = inner.x.saturating_sub(outer.x)..inner.right().saturating_sub(outer.x);
        let inner_y = inner.y.saturating_sub(outer.y)..inner.bottom().saturating_sub(outer.y);
        let (pattern, noise) = pattern_energy(&gray, |x, y| inner_x.contains(&x) && inner_y.contains(&y));

        let ratio = (pattern + 1.0) / (noise + 1.0);
        Ok(FeatureResult::measured(feature, ((ratio - 1.0) / 2.0) as f32)
            .with_diagnostic("pattern_energy", pattern)
            .with_diagnostic("noise_floor", noise))
    }
}

/// Mean absolute high-pass response inside and outside the pattern area.
pub(crate) fn pattern_energy(gray: &GrayImage, inside: impl Fn(u32, u32) -> bool) -> (f64, f64) {
    let response = high_pass(gray, WATERMARK_RADIUS);
    let width = gray.width();
    let (mut sum_in, mut n_in, mut sum_out, mut n_out) = (0.0, 0u64, 0.0, 0u64);
    for (i, v) in response.iter().enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        if inside(x, y) {
            sum_in += v.abs();
            n_in += 1;
        } else {
            sum_out += v.abs();
            n_out += 1;
        }
    }
    let mean = |sum: f64, n: u64| if n == 0 { 0.0 } else { sum / n as f64 };
    (mean(sum_in, n_in), mean(sum_out, n_out))
}

/// Embossed seal: raised relief shows as paired highlights and shadows.
pub struct EmbossingDetector;

impl FeatureDetector for EmbossingDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Embossing
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let gray = crop_luma(ctx.capture.primary(), ctx.region(feature));
        let (highlights, shadows) = relief_fractions(&gray);
        Ok(
            FeatureResult::measured(feature, (highlights.min(shadows) / EMBOSS_FRACTION_FULL) as f32)
                .with_diagnostic("highlights", highlights)
                .with_diagnostic("shadows", shadows),
        )
    }
}

pub(crate) fn relief_fractions(gray: &GrayImage) -> (f64, f64) {
    let response = high_pass(gray, EMBOSS_RADIUS);
    if response.is_empty() {
        return (0.0, 0.0);
    }
    let n = response.len() as f64;
    let highlights = response.iter().filter(|v| **v > EMBOSS_STEP).count() as f64 / n;
    let shadows = response.iter().filter(|v| **v < -EMBOSS_STEP).count() as f64 / n;
    (highlights, shadows)
}

/// Security thread: a dark continuous line running the length of the
/// hinted strip.
pub struct SecurityThreadDetector;

impl FeatureDetector for SecurityThreadDetector {
    fn id(&self) -> DetectorId {
        DetectorId::SecurityThread
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let gray = crop_luma(ctx.capture.primary(), ctx.region(feature));
        let (contrast, continuity) = thread_profile(&gray);
        let score = (contrast / THREAD_CONTRAST_FULL).clamp(0.0, 1.0) * continuity;
        Ok(FeatureResult::measured(feature, score as f32)
            .with_diagnostic("contrast", contrast)
            .with_diagnostic("continuity", continuity))
    }
}

/// Contrast of the darkest line across the strip, and the fraction of the
/// strip's length along which that line stays dark.
pub(crate) fn thread_profile(gray: &GrayImage) -> (f64, f64) {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return (0.0, 0.0);
    }
    // The thread runs along the longer side.
    let vertical = h >= w;
    let (across, along) = if vertical { (w, h) } else { (h, w) };
    let pixel = |a: u32, l: u32| {
        if vertical {
            gray.get_pixel(a, l).0[0] as f64
        } else {
            gray.get_pixel(l, a).0[0] as f64
        }
    };

    let profile: Vec<f64> = (0..across)
        .map(|a| (0..along).map(|l| pixel(a, l)).sum::<f64>() / along as f64)
        .collect();

    let mut sorted = profile.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let median = sorted[sorted.len() / 2];
    let (darkest, min) = profile
        .iter()
        .copied()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, median));

    if median <= 0.0 {
        return (0.0, 0.0);
    }
    let contrast = (median - min) / median;
    let midpoint = (median + min) / 2.0;
    let dark_steps = (0..along).filter(|&l| pixel(darkest as u32, l) < midpoint).count();
    (contrast, dark_steps as f64 / along as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    const PAPER: u8 = 232;

    #[test]
    fn striped_watermark_beats_plain_ring() {
        let img = GrayImage::from_fn(80, 80, |x, y| {
            let inside = (16..64).contains(&x) && (16..64).contains(&y);
            Luma([if inside && y % 8 >= 4 { PAPER - 20 } else { PAPER }])
        });
        let inside = |x: u32, y: u32| (16..64).contains(&x) && (16..64).contains(&y);
        let (pattern, noise) = pattern_energy(&img, inside);
        assert!(pattern > 5.0, "pattern {pattern}");
        assert!(noise < pattern);

        let plain = GrayImage::from_pixel(80, 80, Luma([PAPER]));
        assert_eq!(pattern_energy(&plain, inside), (0.0, 0.0));
    }

    #[test]
    fn relief_rings() {
        let seal = GrayImage::from_fn(64, 64, |x, y| {
            let dx = x as f64 - 32.0;
            let dy = y as f64 - 32.0;
            let r = (dx * dx + dy * dy).sqrt() as u32;
            Luma([match r % 8 {
                0 | 1 => 255,
                2 | 3 => 150,
                _ => 210,
            }])
        });
        let (hi, lo) = relief_fractions(&seal);
        assert!(hi > EMBOSS_FRACTION_FULL && lo > EMBOSS_FRACTION_FULL, "{hi} {lo}");
        assert_eq!(relief_fractions(&GrayImage::from_pixel(20, 20, Luma([PAPER]))), (0.0, 0.0));
    }

    #[test]
    fn thread_line() {
        let strip = GrayImage::from_fn(30, 200, |x, _| Luma([if (12..17).contains(&x) { 60 } else { PAPER }]));
        let (contrast, continuity) = thread_profile(&strip);
        assert!(contrast > THREAD_CONTRAST_FULL);
        assert_eq!(continuity, 1.0);

        let plain = GrayImage::from_pixel(30, 200, Luma([PAPER]));
        assert_eq!(thread_profile(&plain), (0.0, 0.0));
    }

    #[test]
    fn horizontal_thread() {
        let strip = GrayImage::from_fn(200, 30, |_, y| Luma([if y == 10 { 50 } else { PAPER }]));
        let (contrast, continuity) = thread_profile(&strip);
        assert!(contrast > 0.7);
        assert_eq!(continuity, 1.0);
    }
}
