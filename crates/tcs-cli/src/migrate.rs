//! # Migrate Subcommand
//!
//! Moves a document forward to newer schema versions and writes the result.
//! The change log goes to standard error, one line per change, so the
//! migrated document can be piped from standard output.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Result;
use clap::Args;
use serde_json::Value;

use tcs_core::{Document, OrganisationVersion, ReportVersion, TcsVersion, VersionAxis, VersionTriple};
use tcs_state::{MigrationEngine, MigrationRequest};

use crate::config::CliConfig;
use crate::{EXIT_OK, EXIT_REJECTED};

/// Target given to `--to-version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The latest version on every axis.
    Latest,
    /// A reporting organisation version; other axes follow their own flags.
    Organisation(OrganisationVersion),
}

impl FromStr for Target {
    type Err = tcs_core::UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "latest" {
            return Ok(Self::Latest);
        }
        s.parse().map(Self::Organisation)
    }
}

/// A caller-supplied value for a field a step adds, `AXIS:PATH=VALUE`.
#[derive(Debug, Clone, PartialEq)]
pub struct Supplied {
    pub axis: VersionAxis,
    pub path: String,
    pub value: Value,
}

impl FromStr for Supplied {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (target, raw) = s
            .split_once('=')
            .ok_or_else(|| format!("expected AXIS:PATH=VALUE, got {s:?}"))?;
        let (axis, path) = target
            .split_once(':')
            .filter(|(_, path)| !path.is_empty())
            .ok_or_else(|| format!("expected AXIS:PATH=VALUE, got {s:?}"))?;
        let axis = [
            VersionAxis::Organisation,
            VersionAxis::Report,
            VersionAxis::TechCarbonStandard,
        ]
        .into_iter()
        .find(|a| a.slug() == axis || a.slug().replace('-', "_") == axis || axis == short(*a))
        .ok_or_else(|| format!("unknown axis {axis:?}"))?;
        // Bare words are taken as strings.
        let value =
            serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        Ok(Self {
            axis,
            path: path.to_string(),
            value,
        })
    }
}

fn short(axis: VersionAxis) -> &'static str {
    match axis {
        VersionAxis::Organisation => "organisation",
        VersionAxis::Report => "report",
        VersionAxis::TechCarbonStandard => "category",
    }
}

/// Arguments for the `tcs migrate` subcommand.
#[derive(Args, Debug)]
pub struct MigrateArgs {
    /// Document to migrate (`.json`, `.yaml`, `.yml`, or `-` for stdin).
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// Target reporting organisation version, or `latest` for the latest
    /// version on every axis. Defaults to the configured default versions.
    #[arg(long, value_name = "V")]
    pub to_version: Option<Target>,

    /// Target emissions report version for every report.
    #[arg(long, value_name = "R")]
    pub report_version: Option<ReportVersion>,

    /// Target tech carbon standard (category) version for every report.
    #[arg(long, value_name = "C")]
    pub category_version: Option<TcsVersion>,

    /// Value for a field a migration step adds, e.g.
    /// `report:reporting_unit=Group`. Repeatable.
    #[arg(long, value_name = "AXIS:PATH=VALUE")]
    pub supply: Vec<Supplied>,

    /// Write the migrated document here instead of standard output.
    #[arg(long, short, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Assemble the engine request from the flags, falling back to `defaults`
/// when no target is named.
pub fn build_request(args: &MigrateArgs, defaults: VersionTriple) -> MigrationRequest {
    let mut request = match args.to_version {
        Some(Target::Latest) => MigrationRequest::latest(),
        Some(Target::Organisation(version)) => MigrationRequest::to(version),
        None => MigrationRequest::to_triple(defaults),
    };
    if let Some(version) = args.report_version {
        request = request.with_report_version(version);
    }
    if let Some(version) = args.category_version {
        request = request.with_tcs_version(version);
    }
    for supplied in &args.supply {
        request = request.supply(supplied.axis, supplied.path.clone(), supplied.value.clone());
    }
    request
}

/// Execute the migrate subcommand.
pub fn run_migrate(args: &MigrateArgs, config: &CliConfig) -> Result<u8> {
    let content = crate::read_input(&args.file)?;
    let document = match crate::parse_input(&args.file, &content)
        .and_then(|value| Document::from_value(value).map_err(|e| e.to_string()))
    {
        Ok(doc) => doc,
        Err(reason) => {
            eprintln!("FAIL: {}: {reason}", args.file.display());
            return Ok(EXIT_REJECTED);
        }
    };

    let registry = config.registry()?;
    let request = build_request(args, registry.defaults());
    let outcome = match MigrationEngine::new().migrate(&document, &request) {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("FAIL: {}: {e}", args.file.display());
            return Ok(EXIT_REJECTED);
        }
    };

    for change in &outcome.changes {
        eprintln!("{change}");
    }
    crate::write_output(args.output.as_deref(), &outcome.document.to_json()?)?;
    tracing::info!(
        changes = outcome.changes.len(),
        to = %outcome.document.version(),
        "migration written"
    );
    Ok(EXIT_OK)
}
