// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docverify-document: Everything that looks at pixels.
//
// Provides capture decoding and fingerprinting, OCR preprocessing, text and
// code recognition capabilities, the ICAO 9303 TD3 machine-readable zone
// parser, the field extractor, and the security-feature detector suite.

pub mod capture;
pub mod detect;
pub mod extract;
pub mod image;
pub mod integrity;
pub mod mrz;
pub mod scan;

#[cfg(any(test, feature = "synthetic"))]
pub mod synth;

pub use capture::CaptureSet;
pub use detect::{DetectionContext, DetectorRegistry, FeatureDetector};
pub use extract::FieldExtractor;
pub use image::processor::ImageProcessor;
pub use mrz::Td3;
pub use scan::{CodeReader, TextLine, TextRecognizer, TranscriptRecognizer};

#[cfg(feature = "ocr")]
pub use scan::ocr::OcrEngine;
