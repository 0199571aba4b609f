// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Recognition capabilities: text recognition (OCR) and QR/barcode payload
// reading. Backends plug in behind traits so the extractor never depends on a
// particular engine.

pub mod code;
pub mod recognizer;

#[cfg(feature = "ocr")]
pub mod ocr;

pub use code::{CodeReader, NoCodeReader, StaticCodeReader, parse_code_payload};
pub use recognizer::{TextLine, TextRecognizer, TranscriptRecognizer, UnavailableRecognizer};

#[cfg(feature = "ocr")]
pub use ocr::OcrEngine;
