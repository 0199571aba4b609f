// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Engine configuration.

use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::Priority;

/// Tunable settings for a verification pipeline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub capture: CaptureRequirements,
    pub scoring: ScoringConfig,
    pub timeouts: TimeoutConfig,
    /// Date treated as "today" by date rules. `None` uses the system clock;
    /// pin it so repeated runs reach the same rule outcomes. The report's
    /// `generated_at` stamp always comes from the wall clock.
    pub reference_date: Option<NaiveDate>,
}

impl EngineConfig {
    /// Load a JSON config file. Keys that are absent keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// The date date-rules should treat as today.
    pub fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

/// Minimum capture quality for reliable detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureRequirements {
    /// Minimum length of the longer image side in pixels.
    pub min_long_side_px: u32,
    /// Minimum length of the shorter image side in pixels.
    pub min_short_side_px: u32,
    /// Minimum effective resolution for any detector.
    pub min_dpi: u32,
    /// Microprint needs magnified detail well beyond ordinary capture.
    pub microprint_min_dpi: u32,
}

impl Default for CaptureRequirements {
    fn default() -> Self {
        Self {
            min_long_side_px: 1000,
            min_short_side_px: 600,
            min_dpi: 300,
            microprint_min_dpi: 600,
        }
    }
}

/// Weights and thresholds that turn individual results into a verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Score at or above which a document is `genuine`.
    pub genuine_threshold: f32,
    /// Score at or above which a document is `suspicious` (else `forged`).
    pub suspicious_threshold: f32,
    /// Feature scores below this count as "feature absent".
    pub presence_threshold: f32,
    pub high_priority_weight: f32,
    pub medium_priority_weight: f32,
    pub low_priority_weight: f32,
    /// Penalty for a failed hard-consistency rule (checksums, MRZ mismatch).
    pub hard_failure_penalty: f32,
    /// Penalty for a failed soft rule (formats, dates, membership).
    pub soft_failure_penalty: f32,
    /// Penalty for a mandatory field read with low confidence.
    pub low_confidence_penalty: f32,
    /// Extraction confidence below which a mandatory field is penalised.
    pub low_confidence_threshold: f32,
    /// Score ceiling applied after any hard failure.
    pub catastrophic_ceiling: f32,
    /// If more than this fraction of feature checks, or of validation
    /// checks, is inconclusive the verdict is forced to `inconclusive`.
    pub max_inconclusive_fraction: f32,
    /// Maximum number of evidence items kept in a report.
    pub evidence_limit: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            genuine_threshold: 0.85,
            suspicious_threshold: 0.5,
            presence_threshold: 0.5,
            high_priority_weight: 0.5,
            medium_priority_weight: 0.3,
            low_priority_weight: 0.15,
            hard_failure_penalty: 0.8,
            soft_failure_penalty: 0.25,
            low_confidence_penalty: 0.05,
            low_confidence_threshold: 0.4,
            catastrophic_ceiling: 0.25,
            max_inconclusive_fraction: 0.4,
            evidence_limit: 8,
        }
    }
}

impl ScoringConfig {
    pub fn tier_weight(&self, priority: Priority) -> f32 {
        match priority {
            Priority::High => self.high_priority_weight,
            Priority::Medium => self.medium_priority_weight,
            Priority::Low => self.low_priority_weight,
        }
    }
}

/// Per-component time budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub extractor_ms: u64,
    pub detector_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            extractor_ms: 30_000,
            detector_ms: 5_000,
        }
    }
}

impl TimeoutConfig {
    pub fn extractor(&self) -> Duration {
        Duration::from_millis(self.extractor_ms)
    }

    pub fn detector(&self) -> Duration {
        Duration::from_millis(self.detector_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_thresholds() {
        let config = EngineConfig::default();
        assert_eq!(config.capture.min_long_side_px, 1000);
        assert_eq!(config.capture.min_short_side_px, 600);
        assert_eq!(config.capture.min_dpi, 300);
        assert_eq!(config.scoring.genuine_threshold, 0.85);
        assert_eq!(config.scoring.suspicious_threshold, 0.5);
    }

    #[test]
    fn high_tier_outweighs_low_tier() {
        let scoring = ScoringConfig::default();
        assert!(scoring.tier_weight(Priority::High) > scoring.tier_weight(Priority::Medium));
        assert!(scoring.tier_weight(Priority::Medium) > scoring.tier_weight(Priority::Low));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let json = r#"{"scoring":{"max_inconclusive_fraction":0.2},"reference_date":"2026-01-31"}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.scoring.max_inconclusive_fraction, 0.2);
        assert_eq!(config.scoring.genuine_threshold, 0.85);
        assert_eq!(config.timeouts.detector_ms, 5_000);
        assert_eq!(
            config.today(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{"timeouts":{"detector_ms":250}}"#).unwrap();
        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.timeouts.detector(), Duration::from_millis(250));
    }
}
