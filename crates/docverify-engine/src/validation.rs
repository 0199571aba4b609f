// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Validation engine: checks extracted fields against a document type's
// rules.
//
// Output order is fixed: one presence check per mandatory field (in field
// order), then one result per rule (in rule order). A rule whose input
// could not be read is inconclusive, never failed; a rule over an optional
// field the document does not carry passes as not applicable.

use chrono::{Datelike, NaiveDate};
use docverify_core::types::{
    DocumentTypeSpec, ExtractedField, FailureReason, FieldSource, MrzCheck, MrzElement, Outcome,
    RuleCategory, RuleKind, RuleSeverity, ValidationResult, ValidationRule,
};
use docverify_document::mrz::{CheckResult, Td3};
use regex::Regex;
use tracing::{debug, instrument};

use crate::grades::{MeanGradeCheck, check_mean_grade, grade_for_points, parse_grade_list};

type Verdict = (Outcome, String);

fn pass(reason: impl Into<String>) -> Verdict {
    (Outcome::Pass, reason.into())
}

fn fail(reason: impl Into<String>) -> Verdict {
    (Outcome::Fail, reason.into())
}

fn inconclusive(reason: impl Into<String>) -> Verdict {
    (Outcome::Inconclusive, reason.into())
}

/// Applies a document type's rules to extracted fields.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    today: NaiveDate,
}

impl Validator {
    /// `today` anchors age, future-date and year-range rules.
    pub fn new(today: NaiveDate) -> Self {
        Self { today }
    }

    #[instrument(skip_all, fields(document_type = %spec.id))]
    pub fn validate(&self, fields: &[ExtractedField], spec: &DocumentTypeSpec) -> Vec<ValidationResult> {
        let mut results: Vec<ValidationResult> = spec
            .mandatory_fields()
            .map(|field| {
                let (outcome, reason) = presence(fields.iter().find(|f| f.name == field.name), &field.name);
                ValidationResult {
                    rule_id: format!("{}_present", field.name),
                    category: RuleCategory::Presence,
                    severity: RuleSeverity::Soft,
                    outcome,
                    reason,
                }
            })
            .collect();

        for rule in &spec.validation_rules {
            let (outcome, reason) = self.apply(rule, fields, spec);
            debug!(rule = %rule.id, ?outcome, %reason, "Rule evaluated");
            results.push(ValidationResult {
                rule_id: rule.id.clone(),
                category: rule.kind.category(),
                severity: rule.severity,
                outcome,
                reason,
            });
        }
        results
    }

    fn apply(&self, rule: &ValidationRule, fields: &[ExtractedField], spec: &DocumentTypeSpec) -> Verdict {
        let mut inputs = Vec::new();
        for name in rule.kind.referenced_fields() {
            let field = fields.iter().find(|f| f.name == name);
            match field {
                Some(f) if f.is_present() => inputs.push(f),
                _ => {
                    let optional = spec.field(name).is_some_and(|s| !s.mandatory);
                    let not_printed = field.is_none_or(|f| f.failure == Some(FailureReason::FieldNotFound));
                    return if optional && not_printed {
                        pass(format!("optional field '{name}' not present; rule not applicable"))
                    } else {
                        inconclusive(format!("input field '{name}' unavailable"))
                    };
                }
            }
        }

        match &rule.kind {
            RuleKind::Format { field } => {
                let Some(pattern) = spec.field(field).and_then(|f| f.format.as_deref()) else {
                    return inconclusive(format!("field '{field}' declares no format"));
                };
                check_format(inputs[0], pattern)
            }
            RuleKind::ValidDate { .. } => match date_of(inputs[0]) {
                Some(date) => pass(format!("{date} is a valid date")),
                None => fail(format!("'{}' is not a valid date", inputs[0].raw)),
            },
            RuleKind::MinimumAge { years, .. } => {
                let Some(born) = date_of(inputs[0]) else {
                    return inconclusive("date of birth is not a valid date");
                };
                let age = age_on(born, self.today);
                if age >= *years as i32 {
                    pass(format!("holder is {age} years old"))
                } else {
                    fail(format!("holder is {age} years old, at least {years} required"))
                }
            }
            RuleKind::DateOrder {
                earlier,
                later,
                allow_equal,
            } => {
                let (Some(a), Some(b)) = (date_of(inputs[0]), date_of(inputs[1])) else {
                    return inconclusive("one of the dates is not a valid date");
                };
                if a < b || (*allow_equal && a == b) {
                    pass(format!("{earlier} {a} precedes {later} {b}"))
                } else {
                    fail(format!("{earlier} {a} does not precede {later} {b}"))
                }
            }
            RuleKind::NotInFuture { field } => match date_of(inputs[0]) {
                Some(date) if date <= self.today => pass(format!("{field} {date} is not in the future")),
                Some(date) => fail(format!("{field} {date} is after {}", self.today)),
                None => inconclusive(format!("{field} is not a valid date")),
            },
            RuleKind::YearRange { min, max, .. } => {
                let max = max.unwrap_or_else(|| self.today.year());
                match inputs[0].value().trim().parse::<i32>() {
                    Ok(year) if (*min..=max).contains(&year) => pass(format!("{year} within {min}..={max}")),
                    Ok(year) => fail(format!("{year} outside {min}..={max}")),
                    Err(_) => fail(format!("'{}' is not a year", inputs[0].raw)),
                }
            }
            RuleKind::OneOf { values, .. } => {
                let value = inputs[0].value().trim().to_uppercase();
                if values.iter().any(|v| v.eq_ignore_ascii_case(&value)) {
                    pass(format!("'{value}' is allowed"))
                } else {
                    fail(format!("'{value}' is not one of {}", values.join(", ")))
                }
            }
            RuleKind::RequiredEntries { entries, .. } => {
                let present: Vec<String> = parse_grade_list(inputs[0].value())
                    .into_iter()
                    .map(|(subject, _)| subject)
                    .collect();
                let missing: Vec<&str> = entries
                    .iter()
                    .filter(|e| !present.iter().any(|p| p.eq_ignore_ascii_case(e)))
                    .map(String::as_str)
                    .collect();
                if missing.is_empty() {
                    pass("all required entries present")
                } else {
                    fail(format!("missing {}", missing.join(", ")))
                }
            }
            RuleKind::MeanGrade { tolerance, .. } => {
                match check_mean_grade(inputs[0].value(), inputs[1].value(), *tolerance) {
                    MeanGradeCheck::Consistent { computed } => {
                        pass(format!("declared {} agrees with subject mean {computed:.2}", inputs[0].value()))
                    }
                    MeanGradeCheck::Inconsistent { declared, computed } => fail(format!(
                        "declared mean grade {} ({declared} points) but subjects average {} ({computed:.2} points)",
                        inputs[0].value(),
                        grade_for_points(computed)
                    )),
                    MeanGradeCheck::Unreadable => inconclusive("grades could not be interpreted"),
                }
            }
            RuleKind::IndexNumber {
                school_code_digits,
                candidate_digits,
                ..
            } => check_index_number(inputs[0].value(), *school_code_digits, *candidate_digits),
            RuleKind::Mod10Checksum { .. } => {
                let digits: Vec<u32> = inputs[0].value().chars().filter_map(|c| c.to_digit(10)).collect();
                if digits.len() < 2 {
                    fail(format!("'{}' has too few digits for a checksum", inputs[0].raw))
                } else if luhn_valid(&digits) {
                    pass("mod-10 checksum valid")
                } else {
                    fail(format!("mod-10 checksum of '{}' does not verify", inputs[0].raw))
                }
            }
            RuleKind::MrzCheckDigit { check, .. } => match Td3::parse(&inputs[0].raw, &inputs[1].raw) {
                Ok(td3) => match td3.verify(*check) {
                    CheckResult::Valid => pass(format!("{} check digit valid", check_name(*check))),
                    CheckResult::Invalid { expected, found } => fail(format!(
                        "{} check digit is '{found}', expected {expected}",
                        check_name(*check)
                    )),
                },
                Err(err) => fail(format!("machine-readable zone unreadable: {err}")),
            },
            RuleKind::MrzMatch { element, field, .. } => {
                let printed = inputs[0];
                if matches!(printed.source, Some(FieldSource::Mrz(_))) {
                    return inconclusive(format!("'{field}' was only readable from the MRZ"));
                }
                match Td3::parse(&inputs[1].raw, &inputs[2].raw) {
                    Ok(td3) => self.check_mrz_match(&td3, *element, printed),
                    Err(err) => inconclusive(format!("machine-readable zone unreadable: {err}")),
                }
            }
        }
    }

    fn check_mrz_match(&self, td3: &Td3, element: MrzElement, printed: &ExtractedField) -> Verdict {
        let Some(encoded) = td3.normalized(element, self.today) else {
            return fail(format!("MRZ {element:?} is not a valid date"));
        };
        let encoded = comparable(&encoded);
        let printed_value = comparable(printed.value());

        // The MRZ truncates long names.
        let truncated_name = matches!(element, MrzElement::Surname | MrzElement::GivenNames)
            && !encoded.is_empty()
            && printed_value.starts_with(&encoded);

        if printed_value == encoded || truncated_name {
            pass(format!("printed '{printed_value}' matches MRZ"))
        } else {
            fail(format!("printed '{printed_value}' but MRZ encodes '{encoded}'"))
        }
    }
}

/// A mandatory field the extractor could not find or read is an extraction
/// gap, not evidence against the document.
fn presence(field: Option<&ExtractedField>, name: &str) -> Verdict {
    match field {
        Some(f) if f.is_present() => pass(format!("'{name}' present")),
        Some(ExtractedField {
            failure: Some(FailureReason::FieldNotFound),
            ..
        }) => inconclusive(format!("mandatory field '{name}' not located on the capture")),
        Some(ExtractedField {
            failure: Some(reason),
            ..
        }) => inconclusive(format!("'{name}' could not be read: {reason}")),
        _ => fail(format!("mandatory field '{name}' missing from extraction output")),
    }
}

fn check_format(field: &ExtractedField, pattern: &str) -> Verdict {
    let raw = field.raw.trim();
    match Regex::new(pattern) {
        Ok(re) if re.is_match(raw) => pass(format!("'{raw}' matches {pattern}")),
        Ok(_) => fail(format!("'{raw}' does not match {pattern}")),
        Err(err) => inconclusive(format!("format {pattern} is not a valid pattern: {err}")),
    }
}

fn date_of(field: &ExtractedField) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(field.value().trim(), "%Y-%m-%d").ok()
}

/// Whole years between `born` and `on`.
pub fn age_on(born: NaiveDate, on: NaiveDate) -> i32 {
    let mut age = on.year() - born.year();
    if (on.month(), on.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    age
}

/// Luhn mod-10 over a digit sequence, rightmost digit being the check
/// digit.
pub fn luhn_valid(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| {
            if i % 2 == 1 {
                let doubled = d * 2;
                if doubled > 9 { doubled - 9 } else { doubled }
            } else {
                d
            }
        })
        .sum();
    sum % 10 == 0
}

fn check_index_number(value: &str, school_digits: usize, candidate_digits: usize) -> Verdict {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() != school_digits + candidate_digits || !digits.chars().all(|c| c.is_ascii_digit()) {
        return fail(format!(
            "'{value}' is not {school_digits} school-code digits followed by {candidate_digits} candidate digits"
        ));
    }
    let (school, candidate) = digits.split_at(school_digits);
    if school.chars().all(|c| c == '0') {
        return fail(format!("school code {school} is not assigned"));
    }
    if candidate.chars().all(|c| c == '0') {
        return fail(format!("candidate number {candidate} is not assigned"));
    }
    pass(format!("school {school}, candidate {candidate}"))
}

/// Comparable form, as the MRZ writes it: uppercase, with hyphens, spaces
/// and fillers as single word breaks. Apostrophes and other punctuation are
/// dropped, since ICAO 9303 omits them ("O'NEIL" is encoded `ONEIL`).
fn comparable(value: &str) -> String {
    let mapped: String = value
        .to_uppercase()
        .chars()
        .filter_map(|c| match c {
            '-' | '<' => Some(' '),
            c if c.is_whitespace() => Some(' '),
            c if c.is_alphanumeric() => Some(c),
            _ => None,
        })
        .collect();
    mapped.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn check_name(check: MrzCheck) -> &'static str {
    match check {
        MrzCheck::DocumentNumber => "document number",
        MrzCheck::BirthDate => "birth date",
        MrzCheck::ExpiryDate => "expiry date",
        MrzCheck::PersonalNumber => "personal number",
        MrzCheck::Composite => "composite",
    }
}
