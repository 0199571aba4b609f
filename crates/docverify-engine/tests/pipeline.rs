// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end runs of the verification pipeline on synthetic specimens.

mod common;

use std::sync::Arc;

use docverify_core::types::{DocumentTypeId, FailureReason, FieldSource, Outcome, Verdict};
use docverify_document::synth::ForgerySimulator;

use common::*;

#[tokio::test]
async fn genuine_national_id_is_genuine() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 600).capture());
    let report = pipeline(&national_id_text("12345678"))
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    for feature in &report.features {
        assert!(feature.is_evaluated(), "{} not evaluated: {:?}", feature.feature, feature.failure);
        assert!(feature.score >= 0.5, "{} scored {}", feature.feature, feature.score);
    }
    for v in &report.validations {
        assert_eq!(v.outcome, Outcome::Pass, "{}: {}", v.rule_id, v.reason);
    }
    assert!(report.score >= 0.85, "score {}", report.score);
    assert_eq!(report.verdict, Verdict::Genuine);
    assert!(report.advice.is_empty());
    assert_eq!(report.document_type.as_str(), DocumentTypeId::NATIONAL_ID);
}

#[tokio::test]
async fn genuine_passport_is_genuine() {
    let capture = Arc::new(render(DocumentTypeId::PASSPORT, 600).capture());
    let report = pipeline(&passport_text())
        .verify(capture, DocumentTypeId::PASSPORT)
        .await
        .unwrap();

    for v in &report.validations {
        assert_eq!(v.outcome, Outcome::Pass, "{}: {}", v.rule_id, v.reason);
    }
    assert_eq!(report.feature("mrz_zone").unwrap().diagnostics["line_count"], 2.0);
    assert_eq!(report.verdict, Verdict::Genuine, "score {}", report.score);
}

#[tokio::test]
async fn runs_are_repeatable() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 600).capture());
    let pipeline = pipeline(&national_id_text("12345678"));

    let first = pipeline
        .verify(Arc::clone(&capture), DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();
    let second = pipeline
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    assert_eq!(first.fields, second.fields);
    assert_eq!(first.validations, second.validations);
    assert_eq!(first.features, second.features);
    assert_eq!(first.verdict, second.verdict);
    assert_eq!(first.capture_digest, second.capture_digest);
}

#[tokio::test]
async fn seven_digit_id_number_is_flagged() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 600).capture());
    let report = pipeline(&national_id_text("1234567"))
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    let rule = report.validation("id_number_format").unwrap();
    assert_eq!(rule.outcome, Outcome::Fail);
    assert!(rule.reason.contains(r"^\d{8}$"), "{}", rule.reason);
    assert!(report.score < 0.85);
    assert!(matches!(report.verdict, Verdict::Suspicious | Verdict::Forged));
    assert!(report.evidence.iter().any(|e| e.summary.contains("id_number_format")));
}

#[tokio::test]
async fn unlocated_mandatory_field_is_not_held_against_the_document() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 600).capture());
    let transcript: String = national_id_text("12345678")
        .lines()
        .filter(|line| !line.contains("SERIAL NUMBER"))
        .collect::<Vec<_>>()
        .join("\n");
    let report = pipeline(&transcript)
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    let field = report.field("serial_number").unwrap();
    assert_eq!(field.failure, Some(FailureReason::FieldNotFound));
    assert_eq!(field.confidence, 0.0);
    assert_eq!(
        report.validation("serial_number_present").unwrap().outcome,
        Outcome::Inconclusive
    );
    assert_eq!(
        report.validation("serial_number_format").unwrap().outcome,
        Outcome::Inconclusive
    );
    assert_eq!(report.verdict, Verdict::Genuine, "score {}", report.score);
}

#[tokio::test]
async fn missing_uv_capture_is_not_held_against_the_document() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 600).without_uv());
    let report = pipeline(&national_id_text("12345678"))
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    let uv = report.feature("uv_reactive").unwrap();
    assert_eq!(uv.failure, Some(FailureReason::MissingUvCapture));
    assert_eq!(uv.score, 0.0);
    assert_ne!(report.verdict, Verdict::Forged);
    assert!(report.advice.iter().any(|a| a.message.contains("ultraviolet")));
}

#[tokio::test]
async fn low_resolution_capture_is_inconclusive() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 150).capture());
    let report = pipeline(&national_id_text("12345678"))
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    assert!(report.features.iter().all(|f| matches!(
        f.failure,
        Some(FailureReason::InsufficientResolution { .. })
    )));
    assert_eq!(report.verdict, Verdict::Inconclusive);
}

#[tokio::test]
async fn recaptured_copy_is_not_genuine() {
    let spec = spec(DocumentTypeId::NATIONAL_ID);
    let mut specimen = render(DocumentTypeId::NATIONAL_ID, 600);
    ForgerySimulator::new(&spec).recapture(&mut specimen, 3.0);

    let report = pipeline(&national_id_text("12345678"))
        .verify(Arc::new(specimen.capture()), DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    assert!(report.feature("microprint").unwrap().score < 0.5);
    assert_ne!(report.verdict, Verdict::Genuine, "score {}", report.score);
}

#[tokio::test]
async fn removed_hologram_costs_the_most() {
    let spec = spec(DocumentTypeId::NATIONAL_ID);
    let mut specimen = render(DocumentTypeId::NATIONAL_ID, 600);
    assert!(ForgerySimulator::new(&spec).remove_feature(&mut specimen, "hologram"));

    let report = pipeline(&national_id_text("12345678"))
        .verify(Arc::new(specimen.capture()), DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    assert_eq!(report.feature("hologram").unwrap().score, 0.0);
    assert!(report.evidence[0].summary.starts_with("hologram"));
    assert_ne!(report.verdict, Verdict::Genuine);
}

#[tokio::test]
async fn kcse_mean_grade_must_match_subjects() {
    let capture = Arc::new(render(DocumentTypeId::KCSE_CERTIFICATE, 300).capture());

    let forged = pipeline_with_qr(&kcse_text("A"), KCSE_PAYLOAD)
        .verify(Arc::clone(&capture), DocumentTypeId::KCSE_CERTIFICATE)
        .await
        .unwrap();
    let rule = forged.validation("mean_grade_consistent").unwrap();
    assert_eq!(rule.outcome, Outcome::Fail, "{}", rule.reason);
    assert!(forged.score <= 0.25);
    assert_ne!(forged.verdict, Verdict::Genuine);

    let honest = pipeline_with_qr(&kcse_text("C"), KCSE_PAYLOAD)
        .verify(capture, DocumentTypeId::KCSE_CERTIFICATE)
        .await
        .unwrap();
    assert_eq!(
        honest.validation("mean_grade_consistent").unwrap().outcome,
        Outcome::Pass
    );
    assert_eq!(
        honest.field("index_number").unwrap().source,
        Some(FieldSource::Qr("index".into()))
    );
    // 300 DPI is below what microprint needs.
    assert!(matches!(
        honest.feature("microprint").unwrap().failure,
        Some(FailureReason::InsufficientResolution { required_dpi: 600, .. })
    ));
}

#[tokio::test]
async fn unknown_document_type_is_an_error() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 150).capture());
    let err = pipeline("")
        .verify(capture, "library_card")
        .await
        .unwrap_err();
    assert!(err.is_fatal());
    assert!(err.to_string().contains("library_card"));
}

#[tokio::test]
async fn report_serialises_for_a_reporting_layer() {
    let capture = Arc::new(render(DocumentTypeId::NATIONAL_ID, 150).capture());
    let report = pipeline(&national_id_text("12345678"))
        .verify(capture, DocumentTypeId::NATIONAL_ID)
        .await
        .unwrap();

    let json = report.to_json().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["verdict"], "inconclusive");
    assert_eq!(value["fields"].as_array().unwrap().len(), 8);
    assert!(value["capture_digest"].as_str().unwrap().len() == 64);
}

#[tokio::test]
async fn every_document_type_reports_a_complete_field_set() {
    let pipeline = pipeline("");
    for id in pipeline.registry().list_supported() {
        let spec = spec(id.as_str());
        assert!(spec.mandatory_fields().next().is_some());

        let capture = Arc::new(render(id.as_str(), 100).primary_only());
        let report = pipeline.verify(capture, id.as_str()).await.unwrap();

        let names: Vec<&str> = report.fields.iter().map(|f| f.name.as_str()).collect();
        let expected: Vec<&str> = spec.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, expected, "{id}");
        assert_eq!(report.features.len(), spec.security_features.len());
        assert_eq!(report.verdict, Verdict::Inconclusive, "{id}");
    }
}
