// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the docverify-engine integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Once};

use chrono::NaiveDate;
use docverify_core::types::DocumentTypeSpec;
use docverify_core::{DocumentRegistry, EngineConfig};
use docverify_document::scan::{StaticCodeReader, TranscriptRecognizer};
use docverify_document::synth::{Specimen, SpecimenRenderer, compose_td3_line2};
use docverify_engine::VerificationPipeline;

static TRACING: Once = Once::new();

/// Route engine logs to the test harness. `RUST_LOG=debug` shows detector
/// scores and rule outcomes.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 15).unwrap()
}

/// Fixed reference date and budgets generous enough for unoptimised
/// builds working on 600 DPI specimens.
pub fn config() -> EngineConfig {
    let mut config = EngineConfig {
        reference_date: Some(today()),
        ..EngineConfig::default()
    };
    config.timeouts.extractor_ms = 300_000;
    config.timeouts.detector_ms = 300_000;
    config
}

pub fn registry() -> Arc<DocumentRegistry> {
    Arc::new(DocumentRegistry::builtin().unwrap())
}

pub fn spec(id: &str) -> Arc<DocumentTypeSpec> {
    registry().get_spec(id).unwrap()
}

pub fn render(id: &str, dpi: u32) -> Specimen {
    SpecimenRenderer::new(dpi).render(&spec(id))
}

/// Pipeline whose OCR "reads" the given transcript.
pub fn pipeline(transcript: &str) -> VerificationPipeline {
    init_tracing();
    VerificationPipeline::new(registry(), Arc::new(TranscriptRecognizer::from_text(transcript)))
        .with_config(config())
}

pub fn pipeline_with_qr(transcript: &str, payload: &str) -> VerificationPipeline {
    pipeline(transcript).with_code_reader(Arc::new(StaticCodeReader::new(payload)))
}

pub fn national_id_text(id_number: &str) -> String {
    format!(
        "REPUBLIC OF KENYA\n\
         SERIAL NUMBER: 204518833\n\
         ID NUMBER: {id_number}\n\
         FULL NAMES\n\
         AMINA NJERI WANJIKU\n\
         DATE OF BIRTH 12.03.1990 SEX FEMALE\n\
         DISTRICT OF BIRTH NAKURU\n\
         DATE OF ISSUE: 05.06.2015"
    )
}

pub fn passport_mrz() -> (String, String) {
    let line1 = format!("{:<<44}", "P<KENWANJIRU<<GRACE<AKINYI");
    let line2 = compose_td3_line2("AK012345", "KEN", "880714", 'F', "300301", "");
    (line1, line2)
}

pub fn passport_text() -> String {
    let (line1, line2) = passport_mrz();
    format!(
        "REPUBLIC OF KENYA\n\
         PASSPORT NO AK012345\n\
         SURNAME WANJIRU\n\
         GIVEN NAMES GRACE AKINYI\n\
         NATIONALITY KEN\n\
         DATE OF BIRTH 14.07.1988\n\
         SEX F\n\
         PLACE OF BIRTH NAIROBI\n\
         DATE OF ISSUE 02.03.2020\n\
         DATE OF EXPIRY 01.03.2030\n\
         AUTHORITY REGISTRAR GENERAL\n\
         {line1}\n\
         {line2}"
    )
}

pub const KCSE_PAYLOAD: &str = "name:BRIAN OTIENO|index:12345678001|year:2023|serial:2023/000017";

pub fn kcse_text(mean_grade: &str) -> String {
    format!(
        "KENYA NATIONAL EXAMINATIONS COUNCIL\n\
         ENGLISH C\n\
         KISWAHILI C+\n\
         MATHEMATICS C-\n\
         BIOLOGY C\n\
         CHEMISTRY C\n\
         HISTORY C\n\
         BUSINESS STUDIES C\n\
         MEAN GRADE {mean_grade}"
    )
}
