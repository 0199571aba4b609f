// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ICAO 9303 TD3 machine-readable zone (passport data page).
//
// Two lines of 44 characters drawn from `A-Z`, `0-9` and the filler `<`.
//
// Line 1: `P` + type, issuing state (3), then the name field: surname and
// given names separated by `<<`, words separated by `<`, padded with `<`.
//
// Line 2:
//
// | cols  | content                        |
// |-------|--------------------------------|
// | 0-8   | document number                |
// | 9     | check digit                    |
// | 10-12 | nationality                    |
// | 13-18 | birth date YYMMDD              |
// | 19    | check digit                    |
// | 20    | sex (`M`, `F`, `<`)            |
// | 21-26 | expiry date YYMMDD             |
// | 27    | check digit                    |
// | 28-41 | personal number                |
// | 42    | check digit                    |
// | 43    | composite check over 0-9, 13-19, 21-42 |

use std::ops::Range;

use chrono::NaiveDate;
use docverify_core::error::VerifyError;
use docverify_core::types::{MrzCheck, MrzElement};
use thiserror::Error;

use crate::scan::TextLine;

pub const TD3_LINE_LEN: usize = 44;

const WEIGHTS: [u32; 3] = [7, 3, 1];

const DOCUMENT_NUMBER: Range<usize> = 0..9;
const NATIONALITY: Range<usize> = 10..13;
const BIRTH_DATE: Range<usize> = 13..19;
const SEX: usize = 20;
const EXPIRY_DATE: Range<usize> = 21..27;
const PERSONAL_NUMBER: Range<usize> = 28..42;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MrzError {
    #[error("MRZ line {line} has {len} characters, expected {TD3_LINE_LEN}")]
    Length { line: u8, len: usize },

    #[error("MRZ line {line} has invalid character {ch:?} at column {col}")]
    InvalidCharacter { line: u8, ch: char, col: usize },

    #[error("MRZ line 1 does not carry a passport document code")]
    NotPassport,
}

impl From<MrzError> for VerifyError {
    fn from(err: MrzError) -> Self {
        VerifyError::ExtractionFailure {
            field: "mrz".into(),
            detail: err.to_string(),
        }
    }
}

/// Result of recomputing one check digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Valid,
    Invalid { expected: u32, found: char },
}

/// Numeric value of an MRZ character: digits are themselves, `A`-`Z` are
/// 10-35, the filler is 0.
pub fn char_value(c: char) -> Option<u32> {
    match c {
        '0'..='9' => c.to_digit(10),
        'A'..='Z' => Some(c as u32 - 'A' as u32 + 10),
        '<' => Some(0),
        _ => None,
    }
}

/// ICAO 9303 check digit: weighted sum with repeating weights 7, 3, 1,
/// modulo 10. `None` if `data` contains a character outside the MRZ set.
pub fn check_digit(data: &str) -> Option<u32> {
    data.chars()
        .zip(WEIGHTS.iter().cycle())
        .try_fold(0u32, |acc, (c, w)| Some(acc + char_value(c)? * w))
        .map(|sum| sum % 10)
}

/// A parsed TD3 machine-readable zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Td3 {
    line1: String,
    line2: String,
}

impl Td3 {
    /// Parse two exact 44-character lines.
    pub fn parse(line1: &str, line2: &str) -> Result<Self, MrzError> {
        validate_line(line1, 1)?;
        validate_line(line2, 2)?;
        if !line1.starts_with('P') {
            return Err(MrzError::NotPassport);
        }
        Ok(Self {
            line1: line1.to_owned(),
            line2: line2.to_owned(),
        })
    }

    /// Locate the two MRZ lines among OCR output.
    ///
    /// Candidate lines have spaces removed, are made uppercase, must consist
    /// only of MRZ characters and be at least 40 long; short candidates are
    /// padded with fillers. Returns the zone and the lower of the two line
    /// confidences.
    pub fn find_in_lines(lines: &[TextLine]) -> Option<(Self, f32)> {
        let candidates: Vec<(String, f32)> = lines
            .iter()
            .filter_map(|line| {
                let compact: String = line
                    .text
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_uppercase();
                let valid = compact.len() >= 40
                    && compact.len() <= TD3_LINE_LEN + 2
                    && compact.chars().all(|c| char_value(c).is_some());
                valid.then(|| (pad_line(&compact), line.confidence))
            })
            .collect();

        candidates.windows(2).find_map(|pair| {
            let (l1, c1) = &pair[0];
            let (l2, c2) = &pair[1];
            Td3::parse(l1, l2).ok().map(|td3| (td3, c1.min(*c2)))
        })
    }

    pub fn line1(&self) -> &str {
        &self.line1
    }

    pub fn line2(&self) -> &str {
        &self.line2
    }

    /// Surname and given names, with fillers turned into spaces.
    fn names(&self) -> (String, String) {
        let field = &self.line1[5..];
        let (surname, given) = field.split_once("<<").unwrap_or((field, ""));
        (filler_to_space(surname), filler_to_space(given))
    }

    /// Element value with fillers removed (names keep word spaces). Dates
    /// stay in their YYMMDD form.
    pub fn value(&self, element: MrzElement) -> String {
        match element {
            MrzElement::Line1 => self.line1.clone(),
            MrzElement::Line2 => self.line2.clone(),
            MrzElement::DocumentCode => filler_to_space(&self.line1[0..2]),
            MrzElement::IssuingState => filler_to_space(&self.line1[2..5]),
            MrzElement::Surname => self.names().0,
            MrzElement::GivenNames => self.names().1,
            MrzElement::DocumentNumber => filler_to_space(&self.line2[DOCUMENT_NUMBER]),
            MrzElement::Nationality => filler_to_space(&self.line2[NATIONALITY]),
            MrzElement::BirthDate => self.line2[BIRTH_DATE].to_owned(),
            MrzElement::Sex => match &self.line2[SEX..=SEX] {
                "<" => "X".to_owned(),
                s => s.to_owned(),
            },
            MrzElement::ExpiryDate => self.line2[EXPIRY_DATE].to_owned(),
            MrzElement::PersonalNumber => filler_to_space(&self.line2[PERSONAL_NUMBER]),
        }
    }

    /// Element value in the form printed fields are normalised to: dates as
    /// ISO-8601, everything else as [`value`](Self::value). Birth years
    /// after `reference`'s two-digit year belong to the previous century;
    /// expiry years are always 20YY. `None` for an impossible date.
    pub fn normalized(&self, element: MrzElement, reference: NaiveDate) -> Option<String> {
        use chrono::Datelike;
        match element {
            MrzElement::BirthDate => {
                let pivot = (reference.year() % 100) as u32;
                yymmdd_to_iso(&self.line2[BIRTH_DATE], |yy| {
                    if yy > pivot { 1900 + yy } else { 2000 + yy }
                })
            }
            MrzElement::ExpiryDate => yymmdd_to_iso(&self.line2[EXPIRY_DATE], |yy| 2000 + yy),
            other => Some(self.value(other)),
        }
    }

    /// The digits a check covers and the check character printed for it.
    pub fn check_input(&self, check: MrzCheck) -> (String, char) {
        let l2 = &self.line2;
        let at = |i: usize| l2.as_bytes()[i] as char;
        match check {
            MrzCheck::DocumentNumber => (l2[DOCUMENT_NUMBER].to_owned(), at(9)),
            MrzCheck::BirthDate => (l2[BIRTH_DATE].to_owned(), at(19)),
            MrzCheck::ExpiryDate => (l2[EXPIRY_DATE].to_owned(), at(27)),
            MrzCheck::PersonalNumber => (l2[PERSONAL_NUMBER].to_owned(), at(42)),
            MrzCheck::Composite => {
                let data = format!("{}{}{}", &l2[0..10], &l2[13..20], &l2[21..43]);
                (data, at(43))
            }
        }
    }

    /// Recompute one check digit and compare it with the printed one. A
    /// filler in the check position reads as 0.
    pub fn verify(&self, check: MrzCheck) -> CheckResult {
        let (data, found) = self.check_input(check);
        // Lines were validated on parse, so every character has a value.
        let expected = check_digit(&data).unwrap_or(u32::MAX);
        let printed = match found {
            '<' => Some(0),
            c => c.to_digit(10),
        };
        if printed == Some(expected) {
            CheckResult::Valid
        } else {
            CheckResult::Invalid { expected, found }
        }
    }
}

fn validate_line(line: &str, number: u8) -> Result<(), MrzError> {
    if let Some((col, ch)) = line.chars().enumerate().find(|(_, c)| char_value(*c).is_none()) {
        return Err(MrzError::InvalidCharacter {
            line: number,
            ch,
            col,
        });
    }
    if line.len() != TD3_LINE_LEN {
        return Err(MrzError::Length {
            line: number,
            len: line.len(),
        });
    }
    Ok(())
}

fn pad_line(line: &str) -> String {
    let mut padded: String = line.chars().take(TD3_LINE_LEN).collect();
    while padded.len() < TD3_LINE_LEN {
        padded.push('<');
    }
    padded
}

fn filler_to_space(s: &str) -> String {
    s.split('<')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn yymmdd_to_iso(digits: &str, century: impl Fn(u32) -> u32) -> Option<String> {
    if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let yy: u32 = digits[0..2].parse().ok()?;
    let mm: u32 = digits[2..4].parse().ok()?;
    let dd: u32 = digits[4..6].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(century(yy) as i32, mm, dd)?;
    Some(date.format("%Y-%m-%d").to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Specimen from ICAO Doc 9303 part 4.
    const L1: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<";
    const L2: &str = "L898902C36UTO7408122F1204159ZE184226B<<<<<10";

    fn reference() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 1).unwrap()
    }

    #[test]
    fn check_digit_known_values() {
        assert_eq!(check_digit("L898902C3"), Some(6));
        assert_eq!(check_digit("740812"), Some(2));
        assert_eq!(check_digit("120415"), Some(9));
        assert_eq!(check_digit("ZE184226B<<<<<"), Some(1));
        assert_eq!(check_digit("abc"), None);
    }

    #[test]
    fn icao_specimen_verifies() {
        let td3 = Td3::parse(L1, L2).unwrap();
        for check in MrzCheck::ALL {
            assert_eq!(td3.verify(check), CheckResult::Valid, "{check:?}");
        }
    }

    #[test]
    fn icao_specimen_elements() {
        let td3 = Td3::parse(L1, L2).unwrap();
        assert_eq!(td3.value(MrzElement::Surname), "ERIKSSON");
        assert_eq!(td3.value(MrzElement::GivenNames), "ANNA MARIA");
        assert_eq!(td3.value(MrzElement::IssuingState), "UTO");
        assert_eq!(td3.value(MrzElement::DocumentNumber), "L898902C3");
        assert_eq!(td3.value(MrzElement::Nationality), "UTO");
        assert_eq!(td3.value(MrzElement::Sex), "F");
        assert_eq!(td3.value(MrzElement::PersonalNumber), "ZE184226B");
        assert_eq!(
            td3.normalized(MrzElement::BirthDate, reference()).as_deref(),
            Some("1974-08-12")
        );
        assert_eq!(
            td3.normalized(MrzElement::ExpiryDate, reference()).as_deref(),
            Some("2012-04-15")
        );
    }

    #[test]
    fn mutated_birth_date_fails_its_check_and_composite() {
        let mutated = L2.replacen("740812", "740813", 1);
        let td3 = Td3::parse(L1, &mutated).unwrap();
        assert!(matches!(td3.verify(MrzCheck::BirthDate), CheckResult::Invalid { .. }));
        assert!(matches!(td3.verify(MrzCheck::Composite), CheckResult::Invalid { .. }));
        assert_eq!(td3.verify(MrzCheck::DocumentNumber), CheckResult::Valid);
        assert_eq!(td3.verify(MrzCheck::ExpiryDate), CheckResult::Valid);
    }

    #[test]
    fn rejects_wrong_length_and_characters() {
        assert_eq!(
            Td3::parse(&L1[..40], L2),
            Err(MrzError::Length { line: 1, len: 40 })
        );
        let bad = L2.replacen('L', "l", 1);
        assert!(matches!(
            Td3::parse(L1, &bad),
            Err(MrzError::InvalidCharacter { line: 2, col: 0, .. })
        ));
        let visa = L1.replacen('P', "V", 1);
        assert_eq!(Td3::parse(&visa, L2), Err(MrzError::NotPassport));
    }

    #[test]
    fn finds_zone_in_ocr_output() {
        let lines = vec![
            TextLine::new("PASSPORT NO L898902C3", 0.9),
            TextLine::new("P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<", 0.8),
            TextLine::new("L898902C36 UTO7408122F1204159ZE184226B<<<<<10", 0.7),
        ];
        let (td3, confidence) = Td3::find_in_lines(&lines).unwrap();
        assert_eq!(td3.line1(), L1);
        assert_eq!(td3.line2(), L2);
        assert_eq!(confidence, 0.7);
    }

    #[test]
    fn impossible_date_normalises_to_none() {
        let mutated = L2.replacen("740812", "741332", 1);
        let td3 = Td3::parse(L1, &mutated).unwrap();
        assert_eq!(td3.normalized(MrzElement::BirthDate, reference()), None);
    }
}
