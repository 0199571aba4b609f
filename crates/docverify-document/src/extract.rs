// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Field extractor: turns a capture into one `ExtractedField` per field the
// document type declares.
//
// Structured decoders (machine-readable zone, QR payload) run once per
// capture, before free-form OCR is consulted. Each field then tries its
// sources in template order and keeps the first value found. Formats are
// only used as hints here; whether a value complies is the validation
// engine's business. A field that cannot be read is still emitted, with an
// empty value, zero confidence and the reason attached.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use chrono::NaiveDate;
use docverify_core::types::{
    Charset, DocumentTypeSpec, ExtractedField, FailureReason, FieldSource, FieldSpec, MrzElement,
    PixelRegion, SemanticType,
};
use regex::Regex;
use tracing::{debug, instrument, warn};

use crate::capture::CaptureSet;
use crate::image::processor::ImageProcessor;
use crate::mrz::Td3;
use crate::scan::{CodeReader, NoCodeReader, TextLine, TextRecognizer, parse_code_payload};

/// Confidence of a value read from a decoded QR payload.
const CODE_CONFIDENCE: f32 = 0.99;
/// Confidence lost for every character changed by charset repair.
const REPAIR_PENALTY: f32 = 0.05;
/// Extracted values never report less than this.
const MIN_CONFIDENCE: f32 = 0.05;

const DATE_FORMATS: [&str; 7] = [
    "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d %b %Y", "%d %B %Y", "%d%b%Y",
];

/// `SUBJECT GRADE`, optionally with a leading subject code, a separator and
/// a trailing remark such as `(PLAIN)`.
static GRADE_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\d{3}\s+)?([A-Z][A-Z &/.\-]*?[A-Z])\s*[:\-]?\s+(A-|A|B\+|B-|B|C\+|C-|C|D\+|D-|D|E)(?:\s*\([A-Z ]*\))?$",
    )
    .expect("static regex")
});

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("static regex"));

/// Value found for one field from one source.
#[derive(Debug)]
struct Candidate {
    raw: String,
    normalized: Option<String>,
    confidence: f32,
    location: Option<PixelRegion>,
    source: FieldSource,
}

impl Candidate {
    fn into_field(self, name: &str) -> ExtractedField {
        ExtractedField {
            name: name.to_owned(),
            raw: self.raw,
            normalized: self.normalized,
            confidence: self.confidence.clamp(MIN_CONFIDENCE, 1.0),
            location: self.location,
            source: Some(self.source),
            failure: None,
        }
    }
}

/// Decoder outputs shared by every field of one run.
struct Decoded {
    ocr: Result<Vec<TextLine>, FailureReason>,
    mrz: Option<(Td3, f32)>,
    code: Result<BTreeMap<String, String>, FailureReason>,
    width: u32,
    height: u32,
}

/// Reads declared fields from a capture.
pub struct FieldExtractor {
    recognizer: Arc<dyn TextRecognizer>,
    code_reader: Arc<dyn CodeReader>,
    reference_date: Option<NaiveDate>,
}

impl FieldExtractor {
    pub fn new(recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            recognizer,
            code_reader: Arc::new(NoCodeReader),
            reference_date: None,
        }
    }

    pub fn with_code_reader(mut self, reader: Arc<dyn CodeReader>) -> Self {
        self.code_reader = reader;
        self
    }

    /// Date used to place two-digit MRZ birth years in a century.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// One `ExtractedField` per field in `spec`, in template order. Never fails:
    /// unreadable fields carry their failure reason instead.
    #[instrument(skip_all, fields(document_type = %spec.id, recognizer = self.recognizer.name()))]
    pub fn extract(&self, capture: &CaptureSet, spec: &DocumentTypeSpec) -> Vec<ExtractedField> {
        let decoded = self.decode(capture, spec);

        let fields: Vec<ExtractedField> = spec
            .fields
            .iter()
            .map(|field| self.extract_field(field, spec, &decoded))
            .collect();

        let present = fields.iter().filter(|f| f.is_present()).count();
        debug!(present, total = fields.len(), "Field extraction complete");
        fields
    }

    fn decode(&self, capture: &CaptureSet, spec: &DocumentTypeSpec) -> Decoded {
        let primary = capture.primary();
        let needs_ocr = spec.uses_mrz()
            || spec
                .fields
                .iter()
                .any(|f| f.sources.contains(&FieldSource::Ocr));

        let ocr = if needs_ocr {
            self.recognize(primary)
        } else {
            Ok(Vec::new())
        };

        let mrz = match (&ocr, spec.uses_mrz()) {
            (Ok(lines), true) => {
                let found = Td3::find_in_lines(lines);
                if found.is_none() {
                    debug!("No machine-readable zone found in OCR output");
                }
                found
            }
            _ => None,
        };

        let code = if spec.uses_qr() {
            match self.code_reader.read(primary) {
                Ok(Some(payload)) => Ok(parse_code_payload(&payload)),
                Ok(None) => Ok(BTreeMap::new()),
                Err(err) => {
                    warn!(error = %err, "Code reader failed");
                    Err(err.to_failure_reason())
                }
            }
        } else {
            Ok(BTreeMap::new())
        };

        Decoded {
            ocr,
            mrz,
            code,
            width: primary.width(),
            height: primary.height(),
        }
    }

    /// Run OCR on the prepared primary capture and map line locations back
    /// to primary-capture coordinates.
    fn recognize(&self, primary: &image::DynamicImage) -> Result<Vec<TextLine>, FailureReason> {
        let prepared = ImageProcessor::from_dynamic(primary.clone())
            .prepare_for_ocr()
            .into_dynamic();
        let scale = primary.width() as f32 / prepared.width().max(1) as f32;

        match self.recognizer.recognize(&prepared) {
            Ok(lines) => Ok(lines
                .into_iter()
                .map(|mut line| {
                    line.location = line.location.map(|r| scale_region(r, scale));
                    line
                })
                .collect()),
            Err(err) => {
                warn!(error = %err, "Text recognition failed");
                Err(err.to_failure_reason())
            }
        }
    }

    fn extract_field(
        &self,
        field: &FieldSpec,
        spec: &DocumentTypeSpec,
        decoded: &Decoded,
    ) -> ExtractedField {
        let mut failure = None;
        for source in &field.sources {
            match self.from_source(source, field, spec, decoded) {
                Ok(Some(candidate)) => {
                    debug!(field = %field.name, source = ?candidate.source, "Field read");
                    return candidate.into_field(&field.name);
                }
                Ok(None) => {}
                Err(reason) => {
                    failure.get_or_insert(reason);
                }
            }
        }
        let reason = failure.unwrap_or(FailureReason::FieldNotFound);
        debug!(field = %field.name, %reason, "Field not read");
        ExtractedField::missing(&field.name, reason)
    }

    fn from_source(
        &self,
        source: &FieldSource,
        field: &FieldSpec,
        spec: &DocumentTypeSpec,
        decoded: &Decoded,
    ) -> Result<Option<Candidate>, FailureReason> {
        match source {
            FieldSource::Ocr => {
                let lines = decoded.ocr.as_ref().map_err(Clone::clone)?;
                let region = field
                    .region
                    .map(|r| r.to_pixels(decoded.width, decoded.height));
                let lines: Vec<&TextLine> = lines
                    .iter()
                    .filter(|line| in_region(line, region.as_ref()))
                    .collect();
                let other_labels = other_labels(spec, field);

                if field.semantic == SemanticType::GradeList {
                    return Ok(grade_list(&lines, &other_labels));
                }
                let Some(label) = field.label.as_deref() else {
                    return Ok(None);
                };
                Ok(labelled_value(&lines, &label.to_uppercase(), &other_labels)
                    .map(|(text, confidence, location)| ocr_candidate(field, &text, confidence, location)))
            }

            FieldSource::Mrz(element) => {
                decoded.ocr.as_ref().map_err(Clone::clone)?;
                let Some((td3, confidence)) = &decoded.mrz else {
                    return Ok(None);
                };
                let raw = td3.value(*element);
                if raw.is_empty() {
                    return Ok(None);
                }
                let normalized = match element {
                    MrzElement::BirthDate | MrzElement::ExpiryDate => {
                        td3.normalized(*element, self.reference_date())
                    }
                    _ => normalize(field.semantic, &raw),
                };
                Ok(Some(Candidate {
                    raw,
                    normalized,
                    confidence: *confidence,
                    location: None,
                    source: source.clone(),
                }))
            }

            FieldSource::Qr(key) => {
                let payload = decoded.code.as_ref().map_err(Clone::clone)?;
                let Some(value) = payload.get(&key.to_lowercase()).filter(|v| !v.is_empty())
                else {
                    return Ok(None);
                };
                Ok(Some(Candidate {
                    raw: value.clone(),
                    normalized: normalize(field.semantic, value),
                    confidence: CODE_CONFIDENCE,
                    location: None,
                    source: source.clone(),
                }))
            }
        }
    }

    fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

fn ocr_candidate(
    field: &FieldSpec,
    text: &str,
    confidence: f32,
    location: Option<PixelRegion>,
) -> Candidate {
    let (raw, repairs) = repair_charset(text, field.charset);
    Candidate {
        normalized: normalize(field.semantic, &raw),
        confidence: confidence - REPAIR_PENALTY * repairs as f32,
        raw,
        location,
        source: FieldSource::Ocr,
    }
}

fn scale_region(region: PixelRegion, scale: f32) -> PixelRegion {
    PixelRegion {
        x: (region.x as f32 * scale).round() as u32,
        y: (region.y as f32 * scale).round() as u32,
        width: ((region.width as f32 * scale).round() as u32).max(1),
        height: ((region.height as f32 * scale).round() as u32).max(1),
    }
}

/// Lines without a location are kept; located lines must have their centre
/// inside the hinted region.
fn in_region(line: &TextLine, region: Option<&PixelRegion>) -> bool {
    match (region, line.location) {
        (Some(region), Some(location)) => {
            let (cx, cy) = location.center();
            region.contains_point(cx, cy)
        }
        _ => true,
    }
}

fn other_labels(spec: &DocumentTypeSpec, field: &FieldSpec) -> Vec<String> {
    spec.fields
        .iter()
        .filter(|f| f.name != field.name)
        .filter_map(|f| f.label.as_deref())
        .map(str::to_uppercase)
        .collect()
}

fn is_word_char(c: Option<char>) -> bool {
    c.is_some_and(char::is_alphanumeric)
}

/// Byte spans where `label` occurs in `text` as whole words.
fn label_spans(text: &str, label: &str) -> Vec<(usize, usize)> {
    if label.is_empty() {
        return Vec::new();
    }
    text.match_indices(label)
        .map(|(start, m)| (start, start + m.len()))
        .filter(|&(start, end)| {
            !is_word_char(text[..start].chars().next_back()) && !is_word_char(text[end..].chars().next())
        })
        .collect()
}

/// End of the first whole-word occurrence of `label` that is not part of a
/// longer label belonging to another field.
fn find_label(text: &str, label: &str, other_labels: &[String]) -> Option<usize> {
    let shadowing: Vec<(usize, usize)> = other_labels
        .iter()
        .filter(|other| other.len() > label.len() && other.contains(label))
        .flat_map(|other| label_spans(text, other))
        .collect();

    label_spans(text, label)
        .into_iter()
        .find(|&(start, end)| !shadowing.iter().any(|&(s, e)| s <= start && end <= e))
        .map(|(_, end)| end)
}

fn contains_any_label(text: &str, labels: &[String]) -> bool {
    labels.iter().any(|l| !label_spans(text, l).is_empty())
}

/// Cut `value` where another field's label starts (two fields printed on
/// one line).
fn cut_at_labels<'a>(value: &'a str, labels: &[String]) -> &'a str {
    let cut = labels
        .iter()
        .filter_map(|l| label_spans(value, l).first().map(|&(start, _)| start))
        .min()
        .unwrap_or(value.len());
    value[..cut].trim_end()
}

fn trim_separators(s: &str) -> &str {
    s.trim_start_matches(|c: char| c == ':' || c == '-' || c == '.' || c.is_whitespace())
        .trim_end()
}

/// The value printed after `label`, or on the line below when the label
/// stands alone.
fn labelled_value(
    lines: &[&TextLine],
    label: &str,
    other_labels: &[String],
) -> Option<(String, f32, Option<PixelRegion>)> {
    for (i, line) in lines.iter().enumerate() {
        let upper = line.text.to_uppercase();
        let Some(end) = find_label(&upper, label, other_labels) else {
            continue;
        };

        let rest = cut_at_labels(trim_separators(&upper[end..]), other_labels);
        if !rest.is_empty() {
            return Some((rest.to_owned(), line.confidence, line.location));
        }

        if let Some(next) = lines.get(i + 1) {
            let next_upper = next.text.to_uppercase();
            if !contains_any_label(&next_upper, other_labels) && !next_upper.trim().is_empty() {
                return Some((next_upper.trim().to_owned(), next.confidence, next.location));
            }
        }
    }
    None
}

/// Collect `SUBJECT GRADE` lines into `SUBJECT=GRADE;...`. Lines carrying
/// another field's label (e.g. `MEAN GRADE`) are skipped.
fn grade_list(lines: &[&TextLine], other_labels: &[String]) -> Option<Candidate> {
    let mut entries = Vec::new();
    let mut confidence = 0.0;
    let mut location: Option<PixelRegion> = None;

    for line in lines {
        let upper = line.text.to_uppercase();
        let upper = upper.trim();
        if contains_any_label(upper, other_labels) {
            continue;
        }
        let Some(caps) = GRADE_LINE.captures(upper) else {
            continue;
        };
        let subject = WHITESPACE.replace_all(&caps[1], " ").into_owned();
        entries.push((subject, caps[2].to_owned()));
        confidence += line.confidence;
        if let Some(loc) = line.location {
            location = Some(location.map_or(loc, |acc| acc.union(&loc)));
        }
    }

    if entries.is_empty() {
        return None;
    }
    let count = entries.len() as f32;
    let raw = entries
        .iter()
        .map(|(s, g)| format!("{s} {g}"))
        .collect::<Vec<_>>()
        .join("; ");
    let normalized = entries
        .iter()
        .map(|(s, g)| format!("{s}={g}"))
        .collect::<Vec<_>>()
        .join(";");

    Some(Candidate {
        raw,
        normalized: Some(normalized),
        confidence: confidence / count,
        location,
        source: FieldSource::Ocr,
    })
}

/// Undo the usual OCR confusions for the expected character set. Returns
/// the repaired text and the number of characters changed.
pub fn repair_charset(text: &str, charset: Charset) -> (String, usize) {
    let to_digit = |c: char| match c {
        'O' | 'Q' | 'D' => Some('0'),
        'I' | 'L' | '|' => Some('1'),
        'Z' => Some('2'),
        'S' => Some('5'),
        'G' => Some('6'),
        'B' => Some('8'),
        _ => None,
    };
    let to_letter = |c: char| match c {
        '0' => Some('O'),
        '1' => Some('I'),
        '5' => Some('S'),
        '8' => Some('B'),
        _ => None,
    };

    let mut changes = 0;
    let repaired = match charset {
        Charset::Digits => text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| match to_digit(c) {
                Some(d) => {
                    changes += 1;
                    d
                }
                None => c,
            })
            .collect(),
        // Month names ("12 AUG 1974") must keep their letters.
        Charset::Date if !has_letter_run(text, 3) => text
            .chars()
            .map(|c| match to_digit(c) {
                Some(d) => {
                    changes += 1;
                    d
                }
                None => c,
            })
            .collect(),
        Charset::Upper => text
            .split(' ')
            .map(|word| {
                if word.chars().any(|c| c.is_ascii_alphabetic()) {
                    word.chars()
                        .map(|c| match to_letter(c) {
                            Some(l) => {
                                changes += 1;
                                l
                            }
                            None => c,
                        })
                        .collect::<String>()
                } else {
                    word.to_owned()
                }
            })
            .collect::<Vec<_>>()
            .join(" "),
        _ => text.to_owned(),
    };
    (repaired.trim().to_owned(), changes)
}

fn has_letter_run(text: &str, len: usize) -> bool {
    let mut run = 0;
    for c in text.chars() {
        if c.is_alphabetic() {
            run += 1;
            if run >= len {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

/// Normalised form of a value by semantic type.
pub fn normalize(semantic: SemanticType, value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    match semantic {
        SemanticType::Date => parse_date(value).map(|d| d.format("%Y-%m-%d").to_string()),
        SemanticType::NumericCode => Some(value.chars().filter(|c| !c.is_whitespace()).collect()),
        SemanticType::Enum | SemanticType::FreeText | SemanticType::GradeList => {
            Some(WHITESPACE.replace_all(&value.to_uppercase(), " ").into_owned())
        }
    }
}

/// Parse a printed date in any of the common layouts.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}
