// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Verification pipeline: one capture plus a declared document type in, one
// authenticity report out.
//
// Field extraction and every feature detector run concurrently as blocking
// tasks, each under its own time budget. A component that overruns or
// panics is recorded as a failure on its own result; its siblings still
// count. Validation and scoring run once all of them have reported.
//
// A run touches no shared mutable state. The registry, detectors and
// configuration are read-only `Arc`s, so one pipeline can serve many
// concurrent runs.

use std::sync::Arc;
use std::time::{Duration, Instant};

use docverify_core::error::Result;
use docverify_core::types::{AuthenticityReport, DocumentTypeSpec, ExtractedField, FailureReason, FeatureResult};
use docverify_core::{DocumentRegistry, EngineConfig};
use docverify_document::{CaptureSet, CodeReader, DetectionContext, DetectorRegistry, FieldExtractor, TextRecognizer};
use tokio::task::{self, JoinHandle};
use tracing::{info, instrument, warn};

use crate::scoring::AuthenticityScorer;
use crate::validation::Validator;

/// Why a blocking component produced no result.
enum Stopped {
    TimedOut(Duration),
    Crashed(String),
}

impl Stopped {
    fn into_reason(self, component: &str, on_crash: fn(String) -> FailureReason) -> FailureReason {
        match self {
            Self::TimedOut(budget) => FailureReason::Timeout {
                detail: format!("{component} exceeded {} ms", budget.as_millis()),
            },
            Self::Crashed(detail) => on_crash(format!("{component}: {detail}")),
        }
    }
}

/// Run `work` on the blocking pool with a time budget. The budget is
/// measured from the moment the task is spawned.
fn spawn_bounded<T, F>(budget: Duration, work: F) -> JoinHandle<std::result::Result<T, Stopped>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::spawn(async move {
        match tokio::time::timeout(budget, task::spawn_blocking(work)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(join)) => Err(Stopped::Crashed(join.to_string())),
            Err(_) => Err(Stopped::TimedOut(budget)),
        }
    })
}

async fn settle<T>(handle: JoinHandle<std::result::Result<T, Stopped>>) -> std::result::Result<T, Stopped> {
    handle.await.unwrap_or_else(|join| Err(Stopped::Crashed(join.to_string())))
}

/// The detection-and-validation pipeline.
#[derive(Clone)]
pub struct VerificationPipeline {
    registry: Arc<DocumentRegistry>,
    recognizer: Arc<dyn TextRecognizer>,
    code_reader: Option<Arc<dyn CodeReader>>,
    detectors: Arc<DetectorRegistry>,
    config: Arc<EngineConfig>,
}

impl VerificationPipeline {
    /// Pipeline with the standard detector suite, default configuration and
    /// no QR/barcode reader.
    pub fn new(registry: Arc<DocumentRegistry>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            registry,
            recognizer,
            code_reader: None,
            detectors: Arc::new(DetectorRegistry::standard()),
            config: Arc::new(EngineConfig::default()),
        }
    }

    pub fn with_code_reader(mut self, reader: Arc<dyn CodeReader>) -> Self {
        self.code_reader = Some(reader);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_detectors(mut self, detectors: DetectorRegistry) -> Self {
        self.detectors = Arc::new(detectors);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &DocumentRegistry {
        &self.registry
    }

    /// Decode the primary capture from encoded bytes, then verify it.
    pub async fn verify_bytes(&self, primary: &[u8], document_type: &str) -> Result<AuthenticityReport> {
        let capture = CaptureSet::from_bytes(primary)?;
        self.verify(Arc::new(capture), document_type).await
    }

    /// Verify one capture set against a declared document type.
    ///
    /// Only an unknown document type is an error here; every other problem
    /// ends up annotated inside the report.
    #[instrument(skip_all, fields(document_type = %document_type, digest = %capture.digest()))]
    pub async fn verify(&self, capture: Arc<CaptureSet>, document_type: &str) -> Result<AuthenticityReport> {
        let spec = self.registry.get_spec(document_type)?;
        let started = Instant::now();
        let today = self.config.today();
        info!(
            features = spec.security_features.len(),
            fields = spec.fields.len(),
            "Verification started"
        );

        let extraction = {
            let mut extractor = FieldExtractor::new(Arc::clone(&self.recognizer)).with_reference_date(today);
            if let Some(reader) = &self.code_reader {
                extractor = extractor.with_code_reader(Arc::clone(reader));
            }
            let (capture, spec) = (Arc::clone(&capture), Arc::clone(&spec));
            spawn_bounded(self.config.timeouts.extractor(), move || extractor.extract(&capture, &spec))
        };

        let detections: Vec<_> = spec
            .security_features
            .iter()
            .map(|feature| {
                let capture = Arc::clone(&capture);
                let spec = Arc::clone(&spec);
                let detectors = Arc::clone(&self.detectors);
                let config = Arc::clone(&self.config);
                let feature = feature.clone();
                spawn_bounded(self.config.timeouts.detector(), move || {
                    let ctx = DetectionContext::new(&capture, &spec, &config.capture);
                    detectors.detect(&ctx, &feature)
                })
            })
            .collect();

        let fields = match settle(extraction).await {
            Ok(fields) => fields,
            Err(stopped) => {
                let reason = stopped.into_reason("field extraction", |detail| FailureReason::ExtractionFailure { detail });
                warn!(%reason, "Field extraction did not finish");
                unread_fields(&spec, &reason)
            }
        };

        let mut features = Vec::with_capacity(detections.len());
        for (feature, handle) in spec.security_features.iter().zip(detections) {
            let result = match settle(handle).await {
                Ok(result) => result,
                Err(stopped) => {
                    let reason = stopped.into_reason(feature.detector.as_str(), |detail| {
                        FailureReason::DetectorUnavailable { detail }
                    });
                    warn!(feature = %feature.name, %reason, "Detector did not finish");
                    FeatureResult::unevaluated(feature, reason)
                }
            };
            features.push(result);
        }

        let validations = Validator::new(today).validate(&fields, &spec);
        let report = AuthenticityScorer::new(self.config.scoring.clone()).score(
            &spec,
            capture.digest().to_owned(),
            fields,
            features,
            validations,
        );

        info!(
            score = report.score,
            verdict = %report.verdict,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Verification finished"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for VerificationPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VerificationPipeline")
            .field("document_types", &self.registry.list_supported())
            .field("detectors", &self.detectors)
            .field("code_reader", &self.code_reader.is_some())
            .field("config", &self.config)
            .finish()
    }
}

/// The complete field set with every field marked unread.
fn unread_fields(spec: &DocumentTypeSpec, reason: &FailureReason) -> Vec<ExtractedField> {
    spec.fields
        .iter()
        .map(|field| ExtractedField::missing(field.name.clone(), reason.clone()))
        .collect()
}
