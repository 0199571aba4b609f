// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for document verification: the declarative document type
// specs loaded by the registry, and the immutable results produced by each
// pipeline stage.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::human_errors::HumanError;

// ---------------------------------------------------------------------------
// Document type specs
// ---------------------------------------------------------------------------

/// Identifier of a registered document type (e.g. `"national_id"`).
///
/// Deliberately a string rather than an enum: new document types are added
/// as templates, not as code.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTypeId(pub String);

impl DocumentTypeId {
    pub const NATIONAL_ID: &'static str = "national_id";
    pub const KCSE_CERTIFICATE: &'static str = "kcse_certificate";
    pub const PASSPORT: &'static str = "passport";
    pub const DRIVING_LICENSE: &'static str = "driving_license";
    pub const BIRTH_CERTIFICATE: &'static str = "birth_certificate";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Physical size of a document in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width_mm: f32,
    pub height_mm: f32,
}

impl Dimensions {
    /// Length of the longer side in millimetres.
    pub fn long_side_mm(&self) -> f32 {
        self.width_mm.max(self.height_mm)
    }
}

/// A rectangle expressed as fractions of the image size, so the same hint
/// applies at every capture resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    /// The whole image.
    pub const FULL: Region = Region {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert to pixel coordinates for an image of the given size. The
    /// result is clamped to the image and is never empty.
    pub fn to_pixels(&self, img_width: u32, img_height: u32) -> PixelRegion {
        let clamp01 = |v: f32| v.clamp(0.0, 1.0);
        let x0 = (clamp01(self.x) * img_width as f32).floor() as u32;
        let y0 = (clamp01(self.y) * img_height as f32).floor() as u32;
        let x1 = (clamp01(self.x + self.width) * img_width as f32).ceil() as u32;
        let y1 = (clamp01(self.y + self.height) * img_height as f32).ceil() as u32;

        let x0 = x0.min(img_width.saturating_sub(1));
        let y0 = y0.min(img_height.saturating_sub(1));
        PixelRegion {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0).max(1),
            height: y1.saturating_sub(y0).max(1),
        }
    }

    /// Grow the region by `fraction` of its own size on every side.
    pub fn expanded(&self, fraction: f32) -> Region {
        let dx = self.width * fraction;
        let dy = self.height * fraction;
        Region {
            x: self.x - dx,
            y: self.y - dy,
            width: self.width + 2.0 * dx,
            height: self.height + 2.0 * dy,
        }
    }
}

/// A rectangle in image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRegion {
    pub fn right(&self) -> u32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> u32 {
        self.y + self.height
    }

    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }

    pub fn contains_point(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Smallest region covering both `self` and `other`.
    pub fn union(&self, other: &PixelRegion) -> PixelRegion {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        PixelRegion {
            x,
            y,
            width: self.right().max(other.right()) - x,
            height: self.bottom().max(other.bottom()) - y,
        }
    }
}

/// How a field's value should be interpreted once extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SemanticType {
    Date,
    Enum,
    FreeText,
    NumericCode,
    /// Examination subject results, normalised to `SUBJECT=GRADE;...`.
    GradeList,
}

/// Character-set hint used while cleaning up OCR output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Charset {
    Digits,
    Upper,
    Alphanumeric,
    Date,
    #[default]
    Any,
}

/// An element of an ICAO 9303 TD3 machine-readable zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrzElement {
    Line1,
    Line2,
    DocumentCode,
    IssuingState,
    Surname,
    GivenNames,
    DocumentNumber,
    Nationality,
    BirthDate,
    Sex,
    ExpiryDate,
    PersonalNumber,
}

/// A check digit carried by a TD3 machine-readable zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MrzCheck {
    DocumentNumber,
    BirthDate,
    ExpiryDate,
    PersonalNumber,
    Composite,
}

impl MrzCheck {
    pub const ALL: [MrzCheck; 5] = [
        MrzCheck::DocumentNumber,
        MrzCheck::BirthDate,
        MrzCheck::ExpiryDate,
        MrzCheck::PersonalNumber,
        MrzCheck::Composite,
    ];
}

/// Where a field's value can come from, tried in template order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// Free-form OCR anchored on the field's printed label.
    Ocr,
    /// Decoded machine-readable zone.
    Mrz(MrzElement),
    /// Key inside a QR/barcode payload.
    Qr(String),
}

fn default_sources() -> Vec<FieldSource> {
    vec![FieldSource::Ocr]
}

/// One expected data field on a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    /// Anchored regex the raw value is expected to match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    pub semantic: SemanticType,
    #[serde(default)]
    pub mandatory: bool,
    /// Printed label preceding the value (e.g. `"ID NUMBER"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub charset: Charset,
    #[serde(default = "default_sources")]
    pub sources: Vec<FieldSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

/// Identifier of a security-feature detector implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorId {
    Hologram,
    Watermark,
    GhostImage,
    Guilloche,
    Microprint,
    UvReactive,
    Embossing,
    SecurityThread,
    MrzZone,
}

impl DetectorId {
    pub const ALL: [DetectorId; 9] = [
        DetectorId::Hologram,
        DetectorId::Watermark,
        DetectorId::GhostImage,
        DetectorId::Guilloche,
        DetectorId::Microprint,
        DetectorId::UvReactive,
        DetectorId::Embossing,
        DetectorId::SecurityThread,
        DetectorId::MrzZone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hologram => "hologram",
            Self::Watermark => "watermark",
            Self::GhostImage => "ghost_image",
            Self::Guilloche => "guilloche",
            Self::Microprint => "microprint",
            Self::UvReactive => "uv_reactive",
            Self::Embossing => "embossing",
            Self::SecurityThread => "security_thread",
            Self::MrzZone => "mrz_zone",
        }
    }
}

impl std::fmt::Display for DetectorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detection priority tier from the feature priority matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// One physical security feature expected on a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityFeatureSpec {
    pub name: String,
    pub detector: DetectorId,
    pub priority: Priority,
    /// Where the feature is printed. Detectors search the whole image when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
}

/// Whether a failing rule is a hard consistency signal or a soft format one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSeverity {
    Hard,
    #[default]
    Soft,
}

/// Broad family a rule belongs to, used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    Presence,
    Format,
    Date,
    Consistency,
    Checksum,
    Membership,
}

fn default_mrz_line1() -> String {
    "mrz_line_1".into()
}

fn default_mrz_line2() -> String {
    "mrz_line_2".into()
}

fn default_grade_tolerance() -> f32 {
    1.0
}

/// The rule families the validation engine knows how to evaluate. Every
/// document type composes its ruleset from these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RuleKind {
    /// The field matches its `FieldSpec::format` regex.
    Format { field: String },
    /// The field parses to a real calendar date.
    ValidDate { field: String },
    /// The holder is at least `years` old today.
    MinimumAge { field: String, years: u32 },
    /// `earlier` falls before `later` (or on the same day when
    /// `allow_equal`).
    DateOrder {
        earlier: String,
        later: String,
        #[serde(default)]
        allow_equal: bool,
    },
    /// The date is not after today.
    NotInFuture { field: String },
    /// A four-digit year within `[min, max]` (`max` defaults to this year).
    YearRange {
        field: String,
        min: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i32>,
    },
    /// Value is one of an enumerated set.
    OneOf { field: String, values: Vec<String> },
    /// A grade list contains every listed entry.
    RequiredEntries { field: String, entries: Vec<String> },
    /// Declared mean grade agrees with the subject grades.
    MeanGrade {
        mean_field: String,
        grades_field: String,
        #[serde(default = "default_grade_tolerance")]
        tolerance: f32,
    },
    /// School-code/candidate encoding of an examination index number.
    IndexNumber {
        field: String,
        school_code_digits: usize,
        candidate_digits: usize,
    },
    /// Luhn mod-10 check over the digits of a serial number.
    Mod10Checksum { field: String },
    /// An ICAO check digit in the machine-readable zone.
    MrzCheckDigit {
        check: MrzCheck,
        #[serde(default = "default_mrz_line1")]
        line1_field: String,
        #[serde(default = "default_mrz_line2")]
        line2_field: String,
    },
    /// A printed field equals the value encoded in the machine-readable zone.
    MrzMatch {
        element: MrzElement,
        field: String,
        #[serde(default = "default_mrz_line1")]
        line1_field: String,
        #[serde(default = "default_mrz_line2")]
        line2_field: String,
    },
}

impl RuleKind {
    pub fn category(&self) -> RuleCategory {
        match self {
            Self::Format { .. } => RuleCategory::Format,
            Self::ValidDate { .. }
            | Self::MinimumAge { .. }
            | Self::DateOrder { .. }
            | Self::NotInFuture { .. }
            | Self::YearRange { .. } => RuleCategory::Date,
            Self::OneOf { .. } | Self::RequiredEntries { .. } => RuleCategory::Membership,
            Self::MeanGrade { .. } | Self::IndexNumber { .. } | Self::MrzMatch { .. } => {
                RuleCategory::Consistency
            }
            Self::Mod10Checksum { .. } | Self::MrzCheckDigit { .. } => RuleCategory::Checksum,
        }
    }

    /// Names of every field the rule reads.
    pub fn referenced_fields(&self) -> Vec<&str> {
        match self {
            Self::Format { field }
            | Self::ValidDate { field }
            | Self::MinimumAge { field, .. }
            | Self::NotInFuture { field }
            | Self::YearRange { field, .. }
            | Self::OneOf { field, .. }
            | Self::RequiredEntries { field, .. }
            | Self::IndexNumber { field, .. }
            | Self::Mod10Checksum { field } => vec![field.as_str()],
            Self::DateOrder { earlier, later, .. } => vec![earlier.as_str(), later.as_str()],
            Self::MeanGrade {
                mean_field,
                grades_field,
                ..
            } => vec![mean_field.as_str(), grades_field.as_str()],
            Self::MrzCheckDigit {
                line1_field,
                line2_field,
                ..
            } => vec![line1_field.as_str(), line2_field.as_str()],
            Self::MrzMatch {
                field,
                line1_field,
                line2_field,
                ..
            } => vec![field.as_str(), line1_field.as_str(), line2_field.as_str()],
        }
    }
}

/// A named, declaratively configured validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationRule {
    pub id: String,
    #[serde(default)]
    pub severity: RuleSeverity,
    #[serde(flatten)]
    pub kind: RuleKind,
}

/// Everything the pipeline knows about one kind of document. Loaded once by
/// the registry and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentTypeSpec {
    #[serde(rename = "document_type")]
    pub id: DocumentTypeId,
    pub display_name: String,
    pub dimensions: Dimensions,
    pub fields: Vec<FieldSpec>,
    pub security_features: Vec<SecurityFeatureSpec>,
    pub validation_rules: Vec<ValidationRule>,
    #[serde(default)]
    pub forgery_indicators: Vec<String>,
}

impl DocumentTypeSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn mandatory_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.mandatory)
    }

    /// Whether any field is sourced from the machine-readable zone.
    pub fn uses_mrz(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.sources.iter().any(|s| matches!(s, FieldSource::Mrz(_))))
    }

    /// Whether any field is sourced from a QR/barcode payload.
    pub fn uses_qr(&self) -> bool {
        self.fields
            .iter()
            .any(|f| f.sources.iter().any(|s| matches!(s, FieldSource::Qr(_))))
    }
}

// ---------------------------------------------------------------------------
// Pipeline results
// ---------------------------------------------------------------------------

/// Why a field or feature could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum FailureReason {
    /// The extractor could not run (OCR backend error, decoder error).
    ExtractionFailure { detail: String },
    /// Extraction ran but the field was not present in the recognised text.
    FieldNotFound,
    /// No detector implementation or backing hardware signal.
    DetectorUnavailable { detail: String },
    InsufficientResolution { required_dpi: u32, actual_dpi: u32 },
    #[serde(rename = "MissingUVCapture")]
    MissingUvCapture,
    MissingSecondCapture,
    Timeout { detail: String },
}

impl FailureReason {
    /// Reasons caused by missing capture equipment or engine trouble rather
    /// than by anything observed on the document itself.
    pub fn is_capture_gap(&self) -> bool {
        !matches!(self, Self::FieldNotFound)
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExtractionFailure { detail } => write!(f, "extraction failure: {detail}"),
            Self::FieldNotFound => f.write_str("field not found"),
            Self::DetectorUnavailable { detail } => write!(f, "detector unavailable: {detail}"),
            Self::InsufficientResolution {
                required_dpi,
                actual_dpi,
            } => write!(
                f,
                "insufficient resolution ({actual_dpi} DPI, {required_dpi} DPI required)"
            ),
            Self::MissingUvCapture => f.write_str("no UV-illuminated capture supplied"),
            Self::MissingSecondCapture => f.write_str("no second-angle capture supplied"),
            Self::Timeout { detail } => write!(f, "timed out: {detail}"),
        }
    }
}

/// A field value as read from the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedField {
    pub name: String,
    pub raw: String,
    pub normalized: Option<String>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
    pub location: Option<PixelRegion>,
    /// The source that produced the value, if any did.
    pub source: Option<FieldSource>,
    pub failure: Option<FailureReason>,
}

impl ExtractedField {
    /// Placeholder for a field that could not be read. Keeps the field set
    /// complete so gaps stay visible.
    pub fn missing(name: impl Into<String>, reason: FailureReason) -> Self {
        Self {
            name: name.into(),
            raw: String::new(),
            normalized: None,
            confidence: 0.0,
            location: None,
            source: None,
            failure: Some(reason),
        }
    }

    /// True when a usable value was extracted.
    pub fn is_present(&self) -> bool {
        self.failure.is_none() && !self.raw.trim().is_empty() && self.confidence > 0.0
    }

    /// Normalised value when available, raw value otherwise.
    pub fn value(&self) -> &str {
        self.normalized.as_deref().unwrap_or(&self.raw)
    }
}

/// Outcome of one feature detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureResult {
    pub feature: String,
    pub detector: DetectorId,
    pub priority: Priority,
    /// Presence score in `[0, 1]`; `0.0` when the detector could not run.
    pub score: f32,
    /// Detector-specific measurements (e.g. `color_shift_delta`).
    pub diagnostics: BTreeMap<String, f64>,
    pub failure: Option<FailureReason>,
}

impl FeatureResult {
    pub fn measured(spec: &SecurityFeatureSpec, score: f32) -> Self {
        Self {
            feature: spec.name.clone(),
            detector: spec.detector,
            priority: spec.priority,
            score: score.clamp(0.0, 1.0),
            diagnostics: BTreeMap::new(),
            failure: None,
        }
    }

    pub fn unevaluated(spec: &SecurityFeatureSpec, reason: FailureReason) -> Self {
        Self {
            feature: spec.name.clone(),
            detector: spec.detector,
            priority: spec.priority,
            score: 0.0,
            diagnostics: BTreeMap::new(),
            failure: Some(reason),
        }
    }

    pub fn with_diagnostic(mut self, key: &str, value: f64) -> Self {
        self.diagnostics.insert(key.to_owned(), value);
        self
    }

    pub fn is_evaluated(&self) -> bool {
        self.failure.is_none()
    }
}

/// Result of one validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pass,
    Fail,
    Inconclusive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub rule_id: String,
    pub category: RuleCategory,
    pub severity: RuleSeverity,
    pub outcome: Outcome,
    pub reason: String,
}

impl ValidationResult {
    pub fn is_hard_failure(&self) -> bool {
        self.outcome == Outcome::Fail && self.severity == RuleSeverity::Hard
    }
}

/// Categorical authenticity conclusion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Genuine,
    Suspicious,
    Forged,
    Inconclusive,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Genuine => "genuine",
            Self::Suspicious => "suspicious",
            Self::Forged => "forged",
            Self::Inconclusive => "inconclusive",
        };
        f.write_str(s)
    }
}

/// What an evidence item refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum EvidenceSource {
    Validation(String),
    Feature(String),
    Field(String),
}

/// One item that influenced the verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub source: EvidenceSource,
    /// Score penalty contributed (zero for inconclusive items).
    pub penalty: f32,
    pub summary: String,
}

/// The pipeline's sole output. Built once per run and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthenticityReport {
    pub document_type: DocumentTypeId,
    /// SHA-256 of the primary capture.
    pub capture_digest: String,
    pub fields: Vec<ExtractedField>,
    pub features: Vec<FeatureResult>,
    pub validations: Vec<ValidationResult>,
    /// Authenticity score in `[0, 1]`.
    pub score: f32,
    pub verdict: Verdict,
    /// Most influential items first.
    pub evidence: Vec<Evidence>,
    /// Recapture or follow-up guidance for the operator.
    pub advice: Vec<HumanError>,
    pub generated_at: DateTime<Utc>,
}

impl AuthenticityReport {
    pub fn field(&self, name: &str) -> Option<&ExtractedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn feature(&self, name: &str) -> Option<&FeatureResult> {
        self.features.iter().find(|f| f.feature == name)
    }

    pub fn validation(&self, rule_id: &str) -> Option<&ValidationResult> {
        self.validations.iter().find(|v| v.rule_id == rule_id)
    }

    /// Serialise for a reporting layer.
    pub fn to_json(&self) -> crate::error::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
