// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docverify-engine: turning extracted fields and feature measurements into
// a verdict.
//
// Provides the rule-driven validation engine, KCSE grade arithmetic, the
// authenticity scorer, and the async pipeline that runs extraction and
// detection concurrently under per-component time budgets.

pub mod grades;
pub mod pipeline;
pub mod scoring;
pub mod validation;

pub use pipeline::VerificationPipeline;
pub use scoring::AuthenticityScorer;
pub use validation::Validator;
