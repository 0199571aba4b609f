// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Detectors for optically variable features: holograms (colour shift with
// viewing angle) and UV-reactive inks (visible only under UV light).

use docverify_core::types::{
    DetectorId, FailureReason, FeatureResult, Region, SecurityFeatureSpec,
};
use image::RgbImage;

use super::analysis::{color_distance, crop_rgb, grid_means, percentile};
use super::{DetectionContext, FeatureDetector};

/// Cells per side of the sampling grid laid over a hologram.
const HOLOGRAM_GRID: u32 = 4;
/// Colour spread between cells of one capture that counts as a full score.
const HOLOGRAM_SPREAD_FULL: f64 = 120.0;
/// Mean per-cell colour change between two angles that counts as a full
/// score.
const HOLOGRAM_SHIFT_FULL: f64 = 60.0;
/// Brightness lift over the UV background that counts as a full score.
const UV_LIFT_FULL: f64 = 80.0;

/// Hologram colour shift.
///
/// With a second-angle capture the score is the mean colour change of each
/// sampled cell between the two angles. With one capture it falls back to
/// the colour spread between cells of the hinted region.
pub struct HologramDetector;

impl FeatureDetector for HologramDetector {
    fn id(&self) -> DetectorId {
        DetectorId::Hologram
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let region = feature.region.unwrap_or(Region::FULL);
        let primary = ctx.capture.primary();
        let front = crop_rgb(primary, region.to_pixels(primary.width(), primary.height()));
        let spread = color_spread(&front);

        let result = match ctx.capture.second_angle() {
            Some(angled) => {
                let side = crop_rgb(angled, region.to_pixels(angled.width(), angled.height()));
                let delta = color_shift(&front, &side);
                FeatureResult::measured(feature, (delta / HOLOGRAM_SHIFT_FULL) as f32)
                    .with_diagnostic("color_shift_delta", delta)
            }
            None => FeatureResult::measured(feature, (spread / HOLOGRAM_SPREAD_FULL) as f32),
        };
        Ok(result.with_diagnostic("color_spread", spread))
    }
}

/// Largest colour distance between any two grid cells.
pub(crate) fn color_spread(image: &RgbImage) -> f64 {
    let cells = grid_means(image, HOLOGRAM_GRID);
    let mut spread: f64 = 0.0;
    for (i, a) in cells.iter().enumerate() {
        for b in &cells[i + 1..] {
            spread = spread.max(color_distance(*a, *b));
        }
    }
    spread
}

/// Mean colour distance between corresponding grid cells of two captures.
pub(crate) fn color_shift(front: &RgbImage, side: &RgbImage) -> f64 {
    let a = grid_means(front, HOLOGRAM_GRID);
    let b = grid_means(side, HOLOGRAM_GRID);
    let total: f64 = a.iter().zip(&b).map(|(x, y)| color_distance(*x, *y)).sum();
    total / a.len().max(1) as f64
}

/// UV-reactive ink.
///
/// Needs a UV-illuminated capture. The score is how much brighter the
/// hinted region glows than the UV capture as a whole; without a hint, how
/// far the brightest pixels stand above the median.
pub struct UvReactiveDetector;

impl FeatureDetector for UvReactiveDetector {
    fn id(&self) -> DetectorId {
        DetectorId::UvReactive
    }

    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason> {
        let uv = ctx.capture.uv().ok_or(FailureReason::MissingUvCapture)?;
        let full = uv.to_rgb8();
        let mut glow = brightness(&full);

        let lift = match feature.region {
            Some(region) => {
                let inner = crop_rgb(uv, region.to_pixels(uv.width(), uv.height()));
                mean(&brightness(&inner)) - mean(&glow)
            }
            None => percentile(&mut glow.clone(), 0.95) - percentile(&mut glow, 0.5),
        };

        Ok(FeatureResult::measured(feature, (lift / UV_LIFT_FULL) as f32)
            .with_diagnostic("uv_lift", lift))
    }
}

/// Brightest channel of every pixel: fluorescent inks glow in one channel.
fn brightness(image: &RgbImage) -> Vec<f64> {
    image
        .pixels()
        .map(|p| p.0.iter().copied().max().unwrap_or(0) as f64)
        .collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSet;
    use docverify_core::DocumentRegistry;
    use docverify_core::config::CaptureRequirements;
    use docverify_core::types::{DocumentTypeId, Priority};
    use image::{DynamicImage, Rgb};

    fn feature(detector: DetectorId, region: Option<Region>) -> SecurityFeatureSpec {
        SecurityFeatureSpec {
            name: detector.as_str().into(),
            detector,
            priority: Priority::High,
            region,
        }
    }

    fn rainbow(width: u32, height: u32, offset: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, _| {
            match ((x * 3 / width) + offset) % 3 {
                0 => Rgb([230, 90, 90]),
                1 => Rgb([90, 230, 90]),
                _ => Rgb([90, 90, 230]),
            }
        })
    }

    #[test]
    fn flat_patch_has_no_spread() {
        let flat = RgbImage::from_pixel(40, 40, Rgb([236, 232, 220]));
        assert_eq!(color_spread(&flat), 0.0);
        assert_eq!(color_shift(&flat, &flat), 0.0);
    }

    #[test]
    fn rainbow_patch_spreads_and_shifts() {
        let front = rainbow(48, 48, 0);
        let side = rainbow(48, 48, 1);
        assert!(color_spread(&front) > HOLOGRAM_SPREAD_FULL);
        assert!(color_shift(&front, &side) > HOLOGRAM_SHIFT_FULL);
    }

    #[test]
    fn hologram_uses_second_angle_when_present() {
        let spec = DocumentRegistry::builtin()
            .unwrap()
            .get_spec(DocumentTypeId::NATIONAL_ID)
            .unwrap();
        let requirements = CaptureRequirements::default();
        let capture = CaptureSet::from_image(DynamicImage::ImageRgb8(rainbow(60, 60, 0)))
            .with_second_angle(DynamicImage::ImageRgb8(rainbow(60, 60, 0)));
        let ctx = DetectionContext::new(&capture, &spec, &requirements);

        let result = HologramDetector
            .analyze(&ctx, &feature(DetectorId::Hologram, None))
            .unwrap();
        // Same image from both angles: no shift, whatever the spread.
        assert_eq!(result.score, 0.0);
        assert_eq!(result.diagnostics["color_shift_delta"], 0.0);
        assert!(result.diagnostics["color_spread"] > 0.0);
    }

    #[test]
    fn uv_without_capture_is_not_evaluated() {
        let spec = DocumentRegistry::builtin()
            .unwrap()
            .get_spec(DocumentTypeId::NATIONAL_ID)
            .unwrap();
        let requirements = CaptureRequirements::default();
        let capture = CaptureSet::from_image(DynamicImage::new_rgb8(10, 10));
        let ctx = DetectionContext::new(&capture, &spec, &requirements);

        let err = UvReactiveDetector
            .analyze(&ctx, &feature(DetectorId::UvReactive, None))
            .unwrap_err();
        assert_eq!(err, FailureReason::MissingUvCapture);
    }

    #[test]
    fn uv_glow_in_region() {
        let spec = DocumentRegistry::builtin()
            .unwrap()
            .get_spec(DocumentTypeId::NATIONAL_ID)
            .unwrap();
        let requirements = CaptureRequirements::default();
        let uv = RgbImage::from_fn(100, 100, |x, y| {
            if (25..50).contains(&x) && (25..50).contains(&y) {
                Rgb([80, 220, 255])
            } else {
                Rgb([20, 20, 40])
            }
        });
        let capture = CaptureSet::from_image(DynamicImage::new_rgb8(100, 100))
            .with_uv(DynamicImage::ImageRgb8(uv.clone()));
        let ctx = DetectionContext::new(&capture, &spec, &requirements);

        let glowing = Region::new(0.25, 0.25, 0.25, 0.25);
        let dark = Region::new(0.6, 0.6, 0.25, 0.25);
        let hit = UvReactiveDetector
            .analyze(&ctx, &feature(DetectorId::UvReactive, Some(glowing)))
            .unwrap();
        let miss = UvReactiveDetector
            .analyze(&ctx, &feature(DetectorId::UvReactive, Some(dark)))
            .unwrap();
        assert_eq!(hit.score, 1.0);
        assert_eq!(miss.score, 0.0);
    }
}
