// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Authenticity scorer: folds fields, feature results and validation
// results into one score and verdict.
//
// Penalties add up and the score is `exp(-total)`, so it stays in (0, 1]
// and saturates smoothly. Any failed hard rule caps the score at the
// catastrophic ceiling. Items that could not be evaluated never carry a
// penalty; when too many of them pile up the verdict is `inconclusive`
// whatever the number says.

use chrono::Utc;
use docverify_core::config::ScoringConfig;
use docverify_core::human_errors::{HumanError, humanize_failure};
use docverify_core::types::{
    AuthenticityReport, DocumentTypeSpec, Evidence, EvidenceSource, ExtractedField, FeatureResult,
    Outcome, RuleSeverity, ValidationResult, Verdict,
};
use tracing::{debug, instrument};

/// Turns pipeline results into an [`AuthenticityReport`].
#[derive(Debug, Clone, Default)]
pub struct AuthenticityScorer {
    config: ScoringConfig,
}

impl AuthenticityScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    #[instrument(skip_all, fields(document_type = %spec.id))]
    pub fn score(
        &self,
        spec: &DocumentTypeSpec,
        capture_digest: String,
        fields: Vec<ExtractedField>,
        features: Vec<FeatureResult>,
        validations: Vec<ValidationResult>,
    ) -> AuthenticityReport {
        let mut evidence = Vec::new();
        evidence.extend(validations.iter().filter_map(|v| self.validation_evidence(v)));
        evidence.extend(features.iter().filter_map(|f| self.feature_evidence(f)));
        evidence.extend(
            fields
                .iter()
                .filter(|f| spec.field(&f.name).is_some_and(|s| s.mandatory))
                .filter_map(|f| self.field_evidence(f)),
        );

        let total: f32 = evidence.iter().map(|e| e.penalty).sum();
        let mut score = (-total).exp();
        if validations.iter().any(ValidationResult::is_hard_failure) {
            score = score.min(self.config.catastrophic_ceiling);
        }
        let score = score.clamp(0.0, 1.0);

        let verdict = if self.insufficient_evidence(&features, &validations) {
            Verdict::Inconclusive
        } else {
            self.verdict_for(score)
        };
        debug!(total_penalty = total, score, %verdict, "Scored");

        // Stable sort keeps declaration order among equal penalties.
        evidence.sort_by(|a, b| b.penalty.total_cmp(&a.penalty));
        evidence.truncate(self.config.evidence_limit);

        let advice = advice(&fields, &features);

        AuthenticityReport {
            document_type: spec.id.clone(),
            capture_digest,
            fields,
            features,
            validations,
            score,
            verdict,
            evidence,
            advice,
            generated_at: Utc::now(),
        }
    }

    pub fn verdict_for(&self, score: f32) -> Verdict {
        if score >= self.config.genuine_threshold {
            Verdict::Genuine
        } else if score >= self.config.suspicious_threshold {
            Verdict::Suspicious
        } else {
            Verdict::Forged
        }
    }

    /// Feature checks and validation checks are counted separately.
    fn insufficient_evidence(&self, features: &[FeatureResult], validations: &[ValidationResult]) -> bool {
        let limit = self.config.max_inconclusive_fraction;
        let unevaluated = features.iter().filter(|f| !f.is_evaluated()).count();
        let inconclusive = validations
            .iter()
            .filter(|v| v.outcome == Outcome::Inconclusive)
            .count();
        fraction(unevaluated, features.len()) > limit || fraction(inconclusive, validations.len()) > limit
    }

    fn validation_evidence(&self, v: &ValidationResult) -> Option<Evidence> {
        let penalty = match (v.outcome, v.severity) {
            (Outcome::Pass, _) => return None,
            (Outcome::Inconclusive, _) => 0.0,
            (Outcome::Fail, RuleSeverity::Hard) => self.config.hard_failure_penalty,
            (Outcome::Fail, RuleSeverity::Soft) => self.config.soft_failure_penalty,
        };
        let state = if v.outcome == Outcome::Fail { "failed" } else { "inconclusive" };
        Some(Evidence {
            source: EvidenceSource::Validation(v.rule_id.clone()),
            penalty,
            summary: format!("{} {state}: {}", v.rule_id, v.reason),
        })
    }

    fn feature_evidence(&self, f: &FeatureResult) -> Option<Evidence> {
        let threshold = self.config.presence_threshold;
        if let Some(reason) = &f.failure {
            return Some(Evidence {
                source: EvidenceSource::Feature(f.feature.clone()),
                penalty: 0.0,
                summary: format!("{} not evaluated: {reason}", f.feature),
            });
        }
        if f.score >= threshold || threshold <= 0.0 {
            return None;
        }
        let shortfall = (threshold - f.score) / threshold;
        Some(Evidence {
            source: EvidenceSource::Feature(f.feature.clone()),
            penalty: self.config.tier_weight(f.priority) * shortfall,
            summary: format!(
                "{} scored {:.2}, below the {threshold:.2} presence threshold",
                f.feature, f.score
            ),
        })
    }

    fn field_evidence(&self, f: &ExtractedField) -> Option<Evidence> {
        (f.is_present() && f.confidence < self.config.low_confidence_threshold).then(|| Evidence {
            source: EvidenceSource::Field(f.name.clone()),
            penalty: self.config.low_confidence_penalty,
            summary: format!("{} read with low confidence ({:.2})", f.name, f.confidence),
        })
    }
}

fn fraction(count: usize, total: usize) -> f32 {
    if total == 0 { 0.0 } else { count as f32 / total as f32 }
}

/// Operator guidance for everything that could not be checked, one entry
/// per distinct message.
fn advice(fields: &[ExtractedField], features: &[FeatureResult]) -> Vec<HumanError> {
    let reasons = features
        .iter()
        .filter_map(|f| f.failure.as_ref())
        .chain(
            fields
                .iter()
                .filter_map(|f| f.failure.as_ref())
                .filter(|r| r.is_capture_gap()),
        );

    let mut advice: Vec<HumanError> = Vec::new();
    for reason in reasons {
        let human = humanize_failure(reason);
        if !advice.iter().any(|a| a.message == human.message) {
            advice.push(human);
        }
    }
    advice
}

#[cfg(test)]
mod tests {
    use super::*;
    use docverify_core::DocumentRegistry;
    use docverify_core::types::{DocumentTypeId, FailureReason, FieldSource, RuleCategory};
    use std::sync::Arc;

    fn spec() -> Arc<DocumentTypeSpec> {
        DocumentRegistry::builtin()
            .unwrap()
            .get_spec(DocumentTypeId::NATIONAL_ID)
            .unwrap()
    }

    fn features(spec: &DocumentTypeSpec, score: f32) -> Vec<FeatureResult> {
        spec.security_features
            .iter()
            .map(|f| FeatureResult::measured(f, score))
            .collect()
    }

    fn rule(id: &str, severity: RuleSeverity, outcome: Outcome) -> ValidationResult {
        ValidationResult {
            rule_id: id.into(),
            category: RuleCategory::Format,
            severity,
            outcome,
            reason: "test".into(),
        }
    }

    fn passing(n: usize) -> Vec<ValidationResult> {
        (0..n)
            .map(|i| rule(&format!("rule_{i}"), RuleSeverity::Soft, Outcome::Pass))
            .collect()
    }

    #[test]
    fn clean_run_is_genuine() {
        let spec = spec();
        let report = AuthenticityScorer::default().score(
            &spec,
            "digest".into(),
            Vec::new(),
            features(&spec, 0.9),
            passing(10),
        );
        assert_eq!(report.score, 1.0);
        assert_eq!(report.verdict, Verdict::Genuine);
        assert!(report.evidence.is_empty());
        assert!(report.advice.is_empty());
    }

    #[test]
    fn soft_failure_makes_suspicious() {
        let spec = spec();
        let mut validations = passing(10);
        validations.push(rule("id_number_format", RuleSeverity::Soft, Outcome::Fail));
        let report =
            AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), features(&spec, 0.9), validations);
        assert!((report.score - (-0.25f32).exp()).abs() < 1e-6);
        assert_eq!(report.verdict, Verdict::Suspicious);
        assert_eq!(
            report.evidence[0].source,
            EvidenceSource::Validation("id_number_format".into())
        );
    }

    #[test]
    fn hard_failure_floors_score() {
        let spec = spec();
        let mut validations = passing(20);
        validations.push(rule("mrz_composite_check", RuleSeverity::Hard, Outcome::Fail));
        let report =
            AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), features(&spec, 1.0), validations);
        assert!(report.score <= 0.25);
        assert_eq!(report.verdict, Verdict::Forged);
    }

    #[test]
    fn missing_features_weigh_by_tier() {
        let spec = spec();
        let scorer = AuthenticityScorer::default();
        let mut high = features(&spec, 0.9);
        high[0].score = 0.0; // hologram, high priority
        let mut low = features(&spec, 0.9);
        low[4].score = 0.0; // uv_reactive, low priority

        let high = scorer.score(&spec, String::new(), Vec::new(), high, passing(5));
        let low = scorer.score(&spec, String::new(), Vec::new(), low, passing(5));
        assert!(high.score < low.score);
        assert!((high.evidence[0].penalty - 0.5).abs() < 1e-6);
        assert!((low.evidence[0].penalty - 0.15).abs() < 1e-6);
    }

    #[test]
    fn unevaluated_features_force_inconclusive() {
        let spec = spec();
        let results: Vec<FeatureResult> = spec
            .security_features
            .iter()
            .map(|f| {
                FeatureResult::unevaluated(
                    f,
                    FailureReason::InsufficientResolution {
                        required_dpi: 300,
                        actual_dpi: 150,
                    },
                )
            })
            .collect();
        let report = AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), results, passing(10));
        assert_eq!(report.score, 1.0);
        assert_eq!(report.verdict, Verdict::Inconclusive);
        assert_eq!(report.advice.len(), 1);
        assert!(report.evidence.iter().all(|e| e.penalty == 0.0));
    }

    #[test]
    fn one_missing_capture_does_not_force_inconclusive() {
        let spec = spec();
        let mut results = features(&spec, 0.9);
        results[4] = FeatureResult::unevaluated(&spec.security_features[4], FailureReason::MissingUvCapture);
        let report = AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), results, passing(10));
        assert_eq!(report.verdict, Verdict::Genuine);
        assert_eq!(report.advice.len(), 1);
    }

    #[test]
    fn many_inconclusive_rules_force_inconclusive() {
        let spec = spec();
        let mut validations = passing(4);
        for i in 0..4 {
            validations.push(rule(&format!("unread_{i}"), RuleSeverity::Soft, Outcome::Inconclusive));
        }
        let report =
            AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), features(&spec, 0.9), validations);
        assert_eq!(report.verdict, Verdict::Inconclusive);
    }

    #[test]
    fn low_confidence_mandatory_field() {
        let spec = spec();
        let field = ExtractedField {
            name: "id_number".into(),
            raw: "12345678".into(),
            normalized: Some("12345678".into()),
            confidence: 0.2,
            location: None,
            source: Some(FieldSource::Ocr),
            failure: None,
        };
        let report =
            AuthenticityScorer::default().score(&spec, String::new(), vec![field], features(&spec, 0.9), passing(5));
        assert_eq!(report.evidence.len(), 1);
        assert_eq!(report.evidence[0].source, EvidenceSource::Field("id_number".into()));
        assert!((report.score - (-0.05f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn evidence_is_ordered_and_limited() {
        let spec = spec();
        let mut validations = Vec::new();
        for i in 0..12 {
            validations.push(rule(&format!("soft_{i}"), RuleSeverity::Soft, Outcome::Fail));
        }
        validations.push(rule("hard", RuleSeverity::Hard, Outcome::Fail));
        let report =
            AuthenticityScorer::default().score(&spec, String::new(), Vec::new(), features(&spec, 0.9), validations);
        assert_eq!(report.evidence.len(), 8);
        assert_eq!(report.evidence[0].source, EvidenceSource::Validation("hard".into()));
        assert!(report.evidence.windows(2).all(|w| w[0].penalty >= w[1].penalty));
    }
}
