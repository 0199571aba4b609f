// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security-feature detectors.
//
// Every detector implements `FeatureDetector` and is looked up by
// `DetectorId` in a `DetectorRegistry`, so new detectors can be added
// without touching the pipeline. Detectors are independent and read-only:
// each receives the capture and the document spec and returns one
// `FeatureResult`.
//
// A detector that cannot tell (resolution too low, no UV capture) reports a
// failure reason instead of a low score. A low score means "looked, and the
// feature is not there".

pub mod analysis;
pub mod optical;
pub mod print;
pub mod substrate;

use std::collections::BTreeMap;
use std::sync::Arc;

use docverify_core::config::CaptureRequirements;
use docverify_core::types::{
    DetectorId, DocumentTypeSpec, FailureReason, FeatureResult, PixelRegion, Region,
    SecurityFeatureSpec,
};
use tracing::debug;

use crate::capture::CaptureSet;

pub use optical::{HologramDetector, UvReactiveDetector};
pub use print::{GhostImageDetector, GuillocheDetector, MicroprintDetector, MrzZoneDetector};
pub use substrate::{EmbossingDetector, SecurityThreadDetector, WatermarkDetector};

/// Everything a detector may look at for one run.
#[derive(Clone, Copy)]
pub struct DetectionContext<'a> {
    pub capture: &'a CaptureSet,
    pub spec: &'a DocumentTypeSpec,
    pub requirements: &'a CaptureRequirements,
}

impl<'a> DetectionContext<'a> {
    pub fn new(
        capture: &'a CaptureSet,
        spec: &'a DocumentTypeSpec,
        requirements: &'a CaptureRequirements,
    ) -> Self {
        Self {
            capture,
            spec,
            requirements,
        }
    }

    pub fn effective_dpi(&self) -> u32 {
        self.capture.effective_dpi(&self.spec.dimensions)
    }

    /// Fails with `InsufficientResolution` when the primary capture is below
    /// the minimum pixel size or below `required_dpi`.
    pub fn check_resolution(&self, required_dpi: u32) -> Result<(), FailureReason> {
        let primary = self.capture.primary();
        let long = primary.width().max(primary.height());
        let short = primary.width().min(primary.height());
        let actual_dpi = self.effective_dpi();

        if long < self.requirements.min_long_side_px
            || short < self.requirements.min_short_side_px
            || actual_dpi < required_dpi
        {
            return Err(FailureReason::InsufficientResolution {
                required_dpi,
                actual_dpi,
            });
        }
        Ok(())
    }

    /// The feature's hinted region on the primary capture; the whole image
    /// when there is no hint.
    pub fn region(&self, feature: &SecurityFeatureSpec) -> PixelRegion {
        let primary = self.capture.primary();
        feature
            .region
            .unwrap_or(Region::FULL)
            .to_pixels(primary.width(), primary.height())
    }
}

/// One physical security feature analyser.
pub trait FeatureDetector: Send + Sync {
    fn id(&self) -> DetectorId;

    /// Effective resolution below which this detector refuses to guess.
    fn required_dpi(&self, requirements: &CaptureRequirements) -> u32 {
        requirements.min_dpi
    }

    /// Measure the feature. Resolution has already been checked.
    fn analyze(
        &self,
        ctx: &DetectionContext<'_>,
        feature: &SecurityFeatureSpec,
    ) -> Result<FeatureResult, FailureReason>;

    /// Check resolution, then analyse. Never fails: a detector that cannot
    /// run yields an unevaluated result carrying the reason.
    fn detect(&self, ctx: &DetectionContext<'_>, feature: &SecurityFeatureSpec) -> FeatureResult {
        let outcome = ctx
            .check_resolution(self.required_dpi(ctx.requirements))
            .and_then(|()| self.analyze(ctx, feature));

        match outcome {
            Ok(result) => {
                debug!(feature = %feature.name, detector = %self.id(), score = result.score, "Feature measured");
                result
            }
            Err(reason) => {
                debug!(feature = %feature.name, detector = %self.id(), %reason, "Feature not evaluated");
                FeatureResult::unevaluated(feature, reason)
            }
        }
    }
}

/// Detector implementations keyed by identifier.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: BTreeMap<DetectorId, Arc<dyn FeatureDetector>>,
}

impl DetectorRegistry {
    /// An empty registry. Every lookup reports `DetectorUnavailable`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full built-in detector suite.
    pub fn standard() -> Self {
        Self::new()
            .with(Arc::new(HologramDetector))
            .with(Arc::new(WatermarkDetector))
            .with(Arc::new(GhostImageDetector))
            .with(Arc::new(GuillocheDetector))
            .with(Arc::new(MicroprintDetector))
            .with(Arc::new(UvReactiveDetector))
            .with(Arc::new(EmbossingDetector))
            .with(Arc::new(SecurityThreadDetector))
            .with(Arc::new(MrzZoneDetector))
    }

    pub fn with(mut self, detector: Arc<dyn FeatureDetector>) -> Self {
        self.register(detector);
        self
    }

    /// Add or replace the detector for its identifier.
    pub fn register(&mut self, detector: Arc<dyn FeatureDetector>) {
        self.detectors.insert(detector.id(), detector);
    }

    pub fn get(&self, id: DetectorId) -> Option<Arc<dyn FeatureDetector>> {
        self.detectors.get(&id).cloned()
    }

    pub fn ids(&self) -> impl Iterator<Item = DetectorId> + '_ {
        self.detectors.keys().copied()
    }

    /// Run the detector registered for `feature.detector`.
    pub fn detect(&self, ctx: &DetectionContext<'_>, feature: &SecurityFeatureSpec) -> FeatureResult {
        match self.detectors.get(&feature.detector) {
            Some(detector) => detector.detect(ctx, feature),
            None => FeatureResult::unevaluated(
                feature,
                FailureReason::DetectorUnavailable {
                    detail: format!("no detector registered for {}", feature.detector),
                },
            ),
        }
    }

    /// Every feature of the context's template, in template order, one after the
    /// other.
    pub fn detect_all(&self, ctx: &DetectionContext<'_>) -> Vec<FeatureResult> {
        ctx.spec
            .security_features
            .iter()
            .map(|feature| self.detect(ctx, feature))
            .collect()
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.detectors.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_core::DocumentRegistry;
    use docverify_core::types::{DocumentTypeId, Priority};
    use image::{DynamicImage, RgbImage};

    fn id_card(width: u32, height: u32) -> CaptureSet {
        CaptureSet::from_image(DynamicImage::ImageRgb8(RgbImage::new(width, height)))
    }

    fn national_id() -> Arc<DocumentTypeSpec> {
        DocumentRegistry::builtin()
            .unwrap()
            .get_spec(DocumentTypeId::NATIONAL_ID)
            .unwrap()
    }

    #[test]
    fn standard_registry_covers_every_detector() {
        let registry = DetectorRegistry::standard();
        assert_eq!(registry.ids().collect::<Vec<_>>(), DetectorId::ALL.to_vec());
    }

    #[test]
    fn missing_detector_is_unavailable() {
        let spec = national_id();
        let capture = id_card(2022, 1276);
        let requirements = CaptureRequirements::default();
        let ctx = DetectionContext::new(&capture, &spec, &requirements);

        let result = DetectorRegistry::new().detect(&ctx, &spec.security_features[0]);
        assert!(matches!(
            result.failure,
            Some(FailureReason::DetectorUnavailable { .. })
        ));
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn resolution_is_checked_before_analysis() {
        let spec = national_id();
        let capture = id_card(505, 319);
        let requirements = CaptureRequirements::default();
        let ctx = DetectionContext::new(&capture, &spec, &requirements);

        let results = DetectorRegistry::standard().detect_all(&ctx);
        assert_eq!(results.len(), spec.security_features.len());
        for result in results {
            assert!(
                matches!(
                    result.failure,
                    Some(FailureReason::InsufficientResolution { actual_dpi: 150, .. })
                ),
                "{}: {:?}",
                result.feature,
                result.failure
            );
        }
    }

    #[test]
    fn microprint_needs_more_than_the_base_resolution() {
        let spec = national_id();
        let capture = id_card(1011, 638);
        let requirements = CaptureRequirements::default();
        let ctx = DetectionContext::new(&capture, &spec, &requirements);
        assert_eq!(ctx.effective_dpi(), 300);
        assert!(ctx.check_resolution(300).is_ok());

        let feature = SecurityFeatureSpec {
            name: "microprint".into(),
            detector: DetectorId::Microprint,
            priority: Priority::Medium,
            region: None,
        };
        let result = DetectorRegistry::standard().detect(&ctx, &feature);
        assert_eq!(
            result.failure,
            Some(FailureReason::InsufficientResolution {
                required_dpi: 600,
                actual_dpi: 300
            })
        );
    }

    #[test]
    fn region_defaults_to_whole_image() {
        let spec = national_id();
        let capture = id_card(200, 100);
        let requirements = CaptureRequirements::default();
        let ctx = DetectionContext::new(&capture, &spec, &requirements);
        let feature = SecurityFeatureSpec {
            name: "anywhere".into(),
            detector: DetectorId::UvReactive,
            priority: Priority::Low,
            region: None,
        };
        assert_eq!(
            ctx.region(&feature),
            PixelRegion {
                x: 0,
                y: 0,
                width: 200,
                height: 100
            }
        );
    }
}
