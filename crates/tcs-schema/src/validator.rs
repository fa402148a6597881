//! # Document Validator
//!
//! Composes the structural collaborator and the semantic checks into one
//! [`ValidationReport`].
//!
//! `is_valid` is true iff there are no errors. Errors come from the
//! structural pass, the version re-check, and document construction.
//! Completeness and date-coverage findings are warnings and never affect
//! `is_valid`; callers decide whether to treat them as fatal.

use serde::Serialize;
use serde_json::Value;

use tcs_core::{Document, OrganisationVersion, TcsError};

use crate::semantic::{self, CompletenessReport, CoverageFinding};
use crate::structural::{SchemaValidationError, StructuralCheck};

/// Which semantic checks to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticChecks {
    pub versions: bool,
    pub completeness: bool,
    pub date_coverage: bool,
}

impl Default for SemanticChecks {
    fn default() -> Self {
        Self {
            versions: true,
            completeness: true,
            date_coverage: true,
        }
    }
}

/// Where an issue came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Structural,
    Compatibility,
    /// Document construction failed.
    Invalid,
    Completeness,
    Gap,
    Overlap,
}

/// One error or warning.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub kind: IssueKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub message: String,
}

impl std::fmt::Display for Issue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{path}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Outcome of [`Validator::validate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    /// True iff `errors` is empty. Besides structural violations this
    /// counts cross-axis version incompatibilities and document
    /// construction failures, which the bundled schemas cannot express, so
    /// a document can pass every schema layer and still be invalid.
    /// Warnings never affect it.
    pub is_valid: bool,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<CompletenessReport>,
    pub coverage: Vec<CoverageFinding>,
}

/// Runs the configured passes over a document value.
pub struct Validator<'a> {
    structural: Option<&'a dyn StructuralCheck>,
    checks: SemanticChecks,
}

impl Default for Validator<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Validator<'a> {
    /// Semantic checks only.
    pub fn new() -> Self {
        Self {
            structural: None,
            checks: SemanticChecks::default(),
        }
    }

    pub fn with_structural(mut self, structural: &'a dyn StructuralCheck) -> Self {
        self.structural = Some(structural);
        self
    }

    pub fn with_checks(mut self, checks: SemanticChecks) -> Self {
        self.checks = checks;
        self
    }

    /// Validate `document`. `organisation` overrides the root version the
    /// structural pass keys on; by default the declared one is used.
    ///
    /// # Errors
    ///
    /// Only operational failures of the structural collaborator (missing
    /// schema, unreadable schema directory). Violations are reported in
    /// the returned [`ValidationReport`].
    pub fn validate(
        &self,
        document: &Value,
        organisation: Option<OrganisationVersion>,
    ) -> Result<ValidationReport, SchemaValidationError> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if let Some(structural) = self.structural {
            let declared = document
                .get("schema_version")
                .and_then(Value::as_str)
                .and_then(|v| v.parse::<OrganisationVersion>().ok());
            match organisation.or(declared) {
                Some(version) => {
                    errors.extend(structural.check(document, version)?.into_iter().map(|e| Issue {
                        kind: IssueKind::Structural,
                        path: Some(e.path.to_string()),
                        message: e.message,
                    }));
                }
                None => errors.push(Issue {
                    kind: IssueKind::Structural,
                    path: Some("schema_version".into()),
                    message: "no known reporting organisation schema_version to validate against"
                        .into(),
                }),
            }
        }

        if self.checks.versions {
            errors.extend(semantic::check_versions(document).into_iter().map(|e| Issue {
                kind: IssueKind::Compatibility,
                path: e.path.as_ref().map(ToString::to_string),
                message: e.to_string(),
            }));
        }

        let parsed = match Document::from_value(document.clone()) {
            Ok(doc) => Some(doc),
            Err(e) => {
                // Compatibility failures are already reported by the version check.
                let duplicate = self.checks.versions && matches!(e, TcsError::Compatibility(_));
                if !duplicate {
                    errors.push(Issue {
                        kind: IssueKind::Invalid,
                        path: e.path().map(ToString::to_string),
                        message: e.to_string(),
                    });
                }
                None
            }
        };

        let mut completeness = None;
        let mut coverage = Vec::new();
        if let Some(doc) = &parsed {
            if self.checks.completeness {
                let report = semantic::completeness(doc);
                for r in &report.reports {
                    if !r.missing.is_empty() {
                        let names: Vec<&str> = r.missing.iter().map(|c| c.as_str()).collect();
                        warnings.push(Issue {
                            kind: IssueKind::Completeness,
                            path: Some(format!("emissions_reports[{}].tech_carbon_standard", r.report)),
                            message: format!(
                                "{:.1}% of known fields reported; no data for {}",
                                r.percent,
                                names.join(", ")
                            ),
                        });
                    }
                }
                completeness = Some(report);
            }
            if self.checks.date_coverage {
                coverage = semantic::date_coverage(doc);
                warnings.extend(coverage.iter().map(|finding| Issue {
                    kind: match finding {
                        CoverageFinding::Gap { .. } => IssueKind::Gap,
                        CoverageFinding::Overlap { .. } => IssueKind::Overlap,
                    },
                    path: None,
                    message: finding.to_string(),
                }));
            }
        }

        tracing::info!(
            errors = errors.len(),
            warnings = warnings.len(),
            "validation finished"
        );
        Ok(ValidationReport {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            completeness,
            coverage,
        })
    }
}
