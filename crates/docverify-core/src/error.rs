// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for docverify.

use thiserror::Error;

use crate::types::FailureReason;

/// Top-level error type for all docverify operations.
#[derive(Debug, Error)]
pub enum VerifyError {
    // -- Fatal to a run --
    #[error("unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error("image could not be decoded: {0}")]
    ImageDecode(String),

    // -- Registry --
    #[error("invalid document template: {0}")]
    InvalidTemplate(String),

    // -- Extraction --
    #[error("OCR failed: {0}")]
    OcrError(String),

    #[error("code reader failed: {0}")]
    CodeReader(String),

    #[error("extraction of field `{field}` failed: {detail}")]
    ExtractionFailure { field: String, detail: String },

    // -- Detection --
    #[error("detector unavailable: {0}")]
    DetectorUnavailable(String),

    #[error("insufficient resolution: {actual_dpi} DPI, {required_dpi} DPI required")]
    InsufficientResolution { required_dpi: u32, actual_dpi: u32 },

    #[error("timed out: {0}")]
    Timeout(String),

    // -- Storage / persistence --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl VerifyError {
    /// Only an unknown document type or an unreadable primary image abort a
    /// run; everything else degrades the report instead.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::UnknownDocumentType(_) | Self::ImageDecode(_))
    }

    /// Convert a non-fatal error into the annotation stored on a field or
    /// feature result.
    pub fn to_failure_reason(&self) -> FailureReason {
        match self {
            Self::InsufficientResolution {
                required_dpi,
                actual_dpi,
            } => FailureReason::InsufficientResolution {
                required_dpi: *required_dpi,
                actual_dpi: *actual_dpi,
            },
            Self::Timeout(detail) => FailureReason::Timeout {
                detail: detail.clone(),
            },
            Self::DetectorUnavailable(detail) => FailureReason::DetectorUnavailable {
                detail: detail.clone(),
            },
            Self::ExtractionFailure { detail, .. } => FailureReason::ExtractionFailure {
                detail: detail.clone(),
            },
            other => FailureReason::ExtractionFailure {
                detail: other.to_string(),
            },
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, VerifyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_type_and_decode_errors_are_fatal() {
        assert!(VerifyError::UnknownDocumentType("x".into()).is_fatal());
        assert!(VerifyError::ImageDecode("corrupt".into()).is_fatal());
        assert!(!VerifyError::OcrError("model".into()).is_fatal());
        assert!(!VerifyError::Timeout("hologram".into()).is_fatal());
        assert!(
            !VerifyError::InsufficientResolution {
                required_dpi: 300,
                actual_dpi: 120
            }
            .is_fatal()
        );
    }

    #[test]
    fn resolution_error_keeps_its_numbers() {
        let reason = VerifyError::InsufficientResolution {
            required_dpi: 600,
            actual_dpi: 310,
        }
        .to_failure_reason();
        assert_eq!(
            reason,
            FailureReason::InsufficientResolution {
                required_dpi: 600,
                actual_dpi: 310
            }
        );
    }

    #[test]
    fn ocr_error_becomes_extraction_failure() {
        let reason = VerifyError::OcrError("no backend".into()).to_failure_reason();
        match reason {
            FailureReason::ExtractionFailure { detail } => assert!(detail.contains("no backend")),
            other => panic!("unexpected reason: {other:?}"),
        }
    }
}
