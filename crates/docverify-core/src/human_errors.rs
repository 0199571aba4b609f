// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable guidance for the operator at the counter.
//
// Every technical failure is mapped to plain English with a clear next step
// (usually "capture the document again, differently"). The taxonomy uses
// three severity levels that drive how a reporting layer presents them.

use serde::{Deserialize, Serialize};

use crate::error::VerifyError;
use crate::types::FailureReason;

/// Severity of a problem from the operator's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Engine hiccup such as a timeout. Running again may help.
    Transient,
    /// The operator must do something: recapture, add UV light, hold still.
    ActionRequired,
    /// Cannot be fixed by retrying or recapturing.
    Permanent,
}

/// A plain-English message with an actionable suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HumanError {
    /// Plain English summary (shown as a heading).
    pub message: String,
    /// What the operator should try (shown as body text).
    pub suggestion: String,
    /// Whether simply re-running the pipeline may succeed.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a pipeline error into operator guidance.
pub fn humanize_error(err: &VerifyError) -> HumanError {
    match err {
        VerifyError::UnknownDocumentType(kind) => HumanError {
            message: "This kind of document isn't supported.".into(),
            suggestion: format!(
                "Choose one of the supported document types and try again. (Requested: {kind})"
            ),
            retriable: false,
            severity: Severity::Permanent,
        },

        VerifyError::ImageDecode(detail) => HumanError {
            message: "The photo could not be opened.".into(),
            suggestion: format!(
                "Take the photo again and save it as JPEG or PNG. ({detail})"
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        VerifyError::InvalidTemplate(detail) => HumanError {
            message: "The document template is broken.".into(),
            suggestion: format!("Ask an administrator to fix the template. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        VerifyError::OcrError(detail) | VerifyError::CodeReader(detail) => HumanError {
            message: "The text on the document could not be read.".into(),
            suggestion: format!(
                "Check that the text recognition models are installed, then try again. ({detail})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        VerifyError::Io(io_err) => HumanError {
            message: "A file could not be read.".into(),
            suggestion: format!("Check the file exists and is readable. ({io_err})"),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        VerifyError::Serialization(detail) => HumanError {
            message: "The report could not be written.".into(),
            suggestion: format!("This is a bug; please report it. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        other => humanize_failure(&other.to_failure_reason()),
    }
}

/// Convert a per-item failure annotation into operator guidance.
pub fn humanize_failure(reason: &FailureReason) -> HumanError {
    match reason {
        FailureReason::ExtractionFailure { detail } => HumanError {
            message: "Some printed details could not be read.".into(),
            suggestion: format!(
                "Photograph the document flat, in even light, with all text in focus. ({detail})"
            ),
            retriable: true,
            severity: Severity::Transient,
        },

        FailureReason::FieldNotFound => HumanError {
            message: "An expected detail is missing from the document.".into(),
            suggestion: "Make sure the whole document is in the photo and nothing covers it."
                .into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FailureReason::DetectorUnavailable { detail } => HumanError {
            message: "One security check is not available on this system.".into(),
            suggestion: format!("The check was skipped and did not count against the document. ({detail})"),
            retriable: false,
            severity: Severity::Permanent,
        },

        FailureReason::InsufficientResolution {
            required_dpi,
            actual_dpi,
        } => HumanError {
            message: "The photo is not sharp enough for some security checks.".into(),
            suggestion: format!(
                "Move the camera closer or use a scanner at {required_dpi} DPI or more (this photo is about {actual_dpi} DPI)."
            ),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FailureReason::MissingUvCapture => HumanError {
            message: "No ultraviolet photo was supplied.".into(),
            suggestion: "If a UV lamp is available, add a photo taken under UV light to check the fluorescent features.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FailureReason::MissingSecondCapture => HumanError {
            message: "Only one viewing angle was supplied.".into(),
            suggestion: "Add a second photo tilted by about 30 degrees so colour-shifting features can be compared.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        FailureReason::Timeout { detail } => HumanError {
            message: "A check took too long and was skipped.".into(),
            suggestion: format!("Try again; a smaller photo may help. ({detail})"),
            retriable: true,
            severity: Severity::Transient,
        },
    }
}
