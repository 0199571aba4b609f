// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text recognition capability.
//
// The extractor asks a `TextRecognizer` for the lines of text on a prepared
// capture. The `ocrs` engine implements it when the `ocr` feature is on;
// `TranscriptRecognizer` replays text already recognised by an external OCR
// service; `UnavailableRecognizer` is used when neither exists.

use docverify_core::error::{Result, VerifyError};
use docverify_core::types::PixelRegion;
use image::DynamicImage;
use serde::{Deserialize, Serialize};

/// Confidence assigned to transcript lines that carry none of their own.
const TRANSCRIPT_CONFIDENCE: f32 = 0.95;

/// One line of recognised text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextLine {
    pub text: String,
    /// Bounding box in primary-capture pixel coordinates, when known.
    pub location: Option<PixelRegion>,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f32,
}

impl TextLine {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            location: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    pub fn at(mut self, location: PixelRegion) -> Self {
        self.location = Some(location);
        self
    }
}

impl std::fmt::Display for TextLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// Produces lines of text from an image.
pub trait TextRecognizer: Send + Sync {
    /// Recognise every line of text in `image`. Lines are returned in
    /// reading order. Locations refer to `image`, which has the same aspect
    /// ratio as the primary capture but may be rescaled.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<TextLine>>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Replays text recognised elsewhere. The image is ignored.
#[derive(Debug, Clone, Default)]
pub struct TranscriptRecognizer {
    lines: Vec<TextLine>,
}

impl TranscriptRecognizer {
    pub fn new(lines: Vec<TextLine>) -> Self {
        Self { lines }
    }

    /// One `TextLine` per non-blank line of `text`.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| TextLine::new(l, TRANSCRIPT_CONFIDENCE))
            .collect();
        Self { lines }
    }
}

impl TextRecognizer for TranscriptRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<TextLine>> {
        Ok(self.lines.clone())
    }

    fn name(&self) -> &str {
        "transcript"
    }
}

/// Recognizer used when no OCR backend is configured.
pub struct UnavailableRecognizer;

impl TextRecognizer for UnavailableRecognizer {
    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<TextLine>> {
        tracing::warn!("TextRecognizer::recognize called with no OCR backend");
        Err(VerifyError::OcrError(
            "no text recognition backend configured".into(),
        ))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}
