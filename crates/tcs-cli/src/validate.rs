//! # Validate Subcommand
//!
//! Checks a document against the bundled JSON schemas, then runs the
//! semantic checks (version compatibility, document construction,
//! completeness, date coverage).
//!
//! Errors make the document invalid (exit 1). Warnings are printed but only
//! fail the command under `--strict`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use tcs_core::OrganisationVersion;
use tcs_schema::{SchemaValidator, ValidationReport, Validator};

use crate::config::CliConfig;
use crate::{EXIT_OK, EXIT_REJECTED};

/// Arguments for the `tcs validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Document to validate (`.json`, `.yaml`, `.yml`, or `-` for stdin).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Check against this reporting organisation schema version instead of
    /// the one the document declares.
    #[arg(long, value_name = "V")]
    pub schema_version: Option<OrganisationVersion>,

    /// Directory holding the `*.schema.json` files.
    #[arg(long, value_name = "DIR")]
    pub schema_dir: Option<PathBuf>,

    /// Treat warnings (incomplete categories, gaps, overlaps) as failures.
    #[arg(long)]
    pub strict: bool,

    /// Print the full report as JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Execute the validate subcommand.
///
/// Returns exit code: 0 on success, 1 on validation failure. Operational
/// failures are returned as `Err`.
pub fn run_validate(args: &ValidateArgs, config: &CliConfig) -> Result<u8> {
    let content = crate::read_input(&args.file)?;
    let document = match crate::parse_input(&args.file, &content) {
        Ok(value) => value,
        Err(reason) => {
            println!("FAIL: {}: {reason}", args.file.display());
            return Ok(EXIT_REJECTED);
        }
    };

    let schema_dir = config.schema_dir_or(args.schema_dir.as_deref());
    let schemas = load_schemas(&schema_dir)?;
    let report = validate_value(&document, &schemas, args.schema_version)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", render(&args.file, &report));
    }
    Ok(exit_code(&report, args.strict))
}

/// Load the schema registry, with context for the operator.
pub fn load_schemas(schema_dir: &Path) -> Result<SchemaValidator> {
    let schemas = SchemaValidator::new(schema_dir)
        .with_context(|| format!("failed to load JSON schemas from {}", schema_dir.display()))?;
    tracing::info!(schema_count = schemas.schema_count(), "loaded schema registry");
    Ok(schemas)
}

/// Run every pass over `document`.
pub fn validate_value(
    document: &Value,
    schemas: &SchemaValidator,
    schema_version: Option<OrganisationVersion>,
) -> Result<ValidationReport> {
    Validator::new()
        .with_structural(schemas)
        .validate(document, schema_version)
        .context("structural validation could not run")
}

/// `1` when the report has errors, or warnings under `strict`.
pub fn exit_code(report: &ValidationReport, strict: bool) -> u8 {
    if !report.is_valid || (strict && !report.warnings.is_empty()) {
        EXIT_REJECTED
    } else {
        EXIT_OK
    }
}

/// Human-readable rendering of a report.
pub fn render(file: &Path, report: &ValidationReport) -> String {
    let mut out = String::new();
    let verdict = if report.is_valid { "PASS" } else { "FAIL" };
    out.push_str(&format!("{verdict}: {}\n", file.display()));
    for error in &report.errors {
        out.push_str(&format!("  ERROR: {error}\n"));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  WARN: {warning}\n"));
    }
    if let Some(completeness) = &report.completeness {
        out.push_str(&format!(
            "Completeness: {:.1}% across {} report(s)\n",
            completeness.overall_percent,
            completeness.reports.len()
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tcs_schema::{Issue, IssueKind};

    fn report(errors: usize, warnings: usize) -> ValidationReport {
        let issue = |kind| Issue {
            kind,
            path: None,
            message: "x".into(),
        };
        ValidationReport {
            is_valid: errors == 0,
            errors: (0..errors).map(|_| issue(IssueKind::Structural)).collect(),
            warnings: (0..warnings).map(|_| issue(IssueKind::Gap)).collect(),
            completeness: None,
            coverage: Vec::new(),
        }
    }

    #[test]
    fn warnings_only_fail_when_strict() {
        assert_eq!(exit_code(&report(0, 0), true), EXIT_OK);
        assert_eq!(exit_code(&report(0, 2), false), EXIT_OK);
        assert_eq!(exit_code(&report(0, 2), true), EXIT_REJECTED);
        assert_eq!(exit_code(&report(1, 0), false), EXIT_REJECTED);
    }

    #[test]
    fn render_lists_errors_and_warnings() {
        let text = render(Path::new("doc.json"), &report(1, 1));
        assert!(text.starts_with("FAIL: doc.json"));
        assert!(text.contains("ERROR: x"));
        assert!(text.contains("WARN: x"));
    }

    #[test]
    fn missing_schema_dir_is_operational() {
        assert!(load_schemas(Path::new("/nonexistent/schemas")).is_err());
    }
}
