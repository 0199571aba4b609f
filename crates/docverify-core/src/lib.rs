// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// docverify: Core types, error definitions, configuration, and the document
// type registry shared across all crates.

pub mod config;
pub mod error;
pub mod human_errors;
pub mod registry;
pub mod types;

pub use config::EngineConfig;
pub use error::VerifyError;
pub use registry::DocumentRegistry;
pub use types::*;
