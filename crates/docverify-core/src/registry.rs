// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document type registry.
//
// Templates are JSON files describing the fields, security features, and
// validation rules of one document type. The built-in set is compiled into
// the binary; deployments can load their own directory instead. Every
// template is checked on load so a broken template fails at start-up, not in
// the middle of a verification run.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{Result, VerifyError};
use crate::types::{
    DocumentTypeId, DocumentTypeSpec, SecurityFeatureSpec, SemanticType, ValidationRule,
};

const BUILTIN_TEMPLATES: [(&str, &str); 5] = [
    (
        "national_id.json",
        include_str!("../templates/national_id.json"),
    ),
    (
        "kcse_certificate.json",
        include_str!("../templates/kcse_certificate.json"),
    ),
    ("passport.json", include_str!("../templates/passport.json")),
    (
        "driving_license.json",
        include_str!("../templates/driving_license.json"),
    ),
    (
        "birth_certificate.json",
        include_str!("../templates/birth_certificate.json"),
    ),
];

/// Immutable map from document type id to its spec.
///
/// Specs are handed out as `Arc`s so concurrent runs share one copy.
#[derive(Debug, Clone, Default)]
pub struct DocumentRegistry {
    specs: BTreeMap<DocumentTypeId, Arc<DocumentTypeSpec>>,
}

impl DocumentRegistry {
    /// Registry holding the templates shipped with the crate.
    pub fn builtin() -> Result<Self> {
        let specs = BUILTIN_TEMPLATES
            .iter()
            .map(|(name, json)| {
                parse_template(json).map_err(|e| {
                    VerifyError::InvalidTemplate(format!("{name}: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_specs(specs)
    }

    /// Load every `*.json` template in `dir`.
    ///
    /// Files that fail to parse or validate are skipped with a warning so one
    /// bad template does not take the others down. An unreadable directory is
    /// an error.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();

        let mut specs = Vec::with_capacity(paths.len());
        for path in &paths {
            let loaded = std::fs::read_to_string(path)
                .map_err(VerifyError::from)
                .and_then(|json| parse_template(&json));
            match loaded {
                Ok(spec) => {
                    debug!(path = %path.display(), document_type = %spec.id, "Template loaded");
                    specs.push(spec);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping template"),
            }
        }

        info!(dir = %dir.display(), count = specs.len(), "Templates loaded");
        Self::from_specs(specs)
    }

    /// Build a registry from already-parsed specs. Each spec is validated; a
    /// repeated document type id is rejected.
    pub fn from_specs(specs: impl IntoIterator<Item = DocumentTypeSpec>) -> Result<Self> {
        let mut map = BTreeMap::new();
        for spec in specs {
            validate_spec(&spec)?;
            let id = spec.id.clone();
            if map.insert(id.clone(), Arc::new(spec)).is_some() {
                return Err(VerifyError::InvalidTemplate(format!(
                    "document type `{id}` is defined twice"
                )));
            }
        }
        Ok(Self { specs: map })
    }

    /// Look up a spec by id.
    pub fn get_spec(&self, id: &str) -> Result<Arc<DocumentTypeSpec>> {
        self.specs
            .get(&DocumentTypeId::new(id))
            .cloned()
            .ok_or_else(|| VerifyError::UnknownDocumentType(id.to_owned()))
    }

    /// Ids of every registered document type, sorted.
    pub fn list_supported(&self) -> Vec<DocumentTypeId> {
        self.specs.keys().cloned().collect()
    }

    pub fn security_features(&self, id: &str) -> Result<Vec<SecurityFeatureSpec>> {
        Ok(self.get_spec(id)?.security_features.clone())
    }

    pub fn forgery_indicators(&self, id: &str) -> Result<Vec<String>> {
        Ok(self.get_spec(id)?.forgery_indicators.clone())
    }

    pub fn validation_rules(&self, id: &str) -> Result<Vec<ValidationRule>> {
        Ok(self.get_spec(id)?.validation_rules.clone())
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}

/// Parse and validate a single JSON template.
pub fn parse_template(json: &str) -> Result<DocumentTypeSpec> {
    let spec: DocumentTypeSpec = serde_json::from_str(json)
        .map_err(|e| VerifyError::InvalidTemplate(e.to_string()))?;
    validate_spec(&spec)?;
    Ok(spec)
}

/// Structural checks a template must pass before it is used.
pub fn validate_spec(spec: &DocumentTypeSpec) -> Result<()> {
    let invalid = |msg: String| -> Result<()> {
        Err(VerifyError::InvalidTemplate(format!("{}: {msg}", spec.id)))
    };

    if spec.id.as_str().is_empty() {
        return invalid("empty document type id".into());
    }
    if spec.dimensions.width_mm <= 0.0 || spec.dimensions.height_mm <= 0.0 {
        return invalid("dimensions must be positive".into());
    }

    let mut names = HashSet::new();
    for field in &spec.fields {
        if !names.insert(field.name.as_str()) {
            return invalid(format!("field `{}` is declared twice", field.name));
        }
        if field.sources.is_empty() {
            return invalid(format!("field `{}` has no sources", field.name));
        }
        if let Some(pattern) = &field.format {
            if let Err(e) = Regex::new(pattern) {
                return invalid(format!("field `{}` has a bad format: {e}", field.name));
            }
        }
        if field.semantic == SemanticType::GradeList && field.format.is_some() {
            return invalid(format!("grade list `{}` cannot carry a format", field.name));
        }
    }
    if spec.mandatory_fields().next().is_none() {
        return invalid("at least one field must be mandatory".into());
    }

    let mut rule_ids = HashSet::new();
    for rule in &spec.validation_rules {
        if !rule_ids.insert(rule.id.as_str()) {
            return invalid(format!("rule `{}` is declared twice", rule.id));
        }
        for field in rule.kind.referenced_fields() {
            if !names.contains(field) {
                return invalid(format!(
                    "rule `{}` references undeclared field `{field}`",
                    rule.id
                ));
            }
        }
        if let crate::types::RuleKind::Format { field } = &rule.kind {
            if spec.field(field).is_some_and(|f| f.format.is_none()) {
                return invalid(format!(
                    "rule `{}` checks the format of `{field}`, which declares none",
                    rule.id
                ));
            }
        }
    }

    let mut feature_names = HashSet::new();
    for feature in &spec.security_features {
        if !feature_names.insert(feature.name.as_str()) {
            return invalid(format!("feature `{}` is declared twice", feature.name));
        }
    }

    Ok(())
}
