//! # Schema Migration Engine
//!
//! Rewrites a [`Document`] forward from one version triple to another.
//!
//! ## Step graph
//!
//! Each axis has a chain of adjacent steps. A step declares the fields it
//! renames, adds (with a default, or left absent when there is none) and
//! removes. A multi-hop request composes the unique chain of steps
//! between the two versions; there are no backward steps.
//!
//! | Axis | Step | Changes |
//! |------|------|---------|
//! | organisation | 0.0.1 → 0.1.0 | add `description` |
//! | organisation | 0.1.0 → 0.1.1 | add `open_corporates_url` |
//! | organisation | 0.1.1 → 0.1.2 | add `country` |
//! | report | 0.0.1 → 0.0.2 | add `reporting_unit` |
//! | report | 0.0.2 → 0.0.3 | add `disclosures` |
//! | category | 0.0.1 → 0.0.2 | rename `cloud_services` → `cloud`; add `software` |
//! | category | 0.0.2 → 0.1.0 | rename `onsite_employee_hardware` → `employee_devices`; add direct `method` (default `location_based`), `foundation_models`, `downstream_infrastructure`; remove `offsite_employee_hardware` |
//!
//! ## Invariants
//!
//! - Within a step, renames run first, then additions, then removals.
//! - An addition at a nested path applies only where its parent exists,
//!   except that a caller-supplied `block.field` value creates its block.
//! - Every caller-supplied value must land somewhere, or the migration
//!   fails with [`MigrationError::UnusedSupplied`].
//! - Members no step mentions are carried through unchanged.
//! - The source document is never touched. The result is re-validated
//!   through the document model; on any failure no document is returned.

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Map, Value};
use thiserror::Error;

use tcs_core::{
    CompatibilityError, Document, OrganisationVersion, ReportVersion, SchemaVersion, TcsError,
    TcsVersion, VersionAxis, VersionRegistry, VersionTriple,
};

// ─── Step graph ──────────────────────────────────────────────────────

/// Value given to a field added by a step when the caller supplies none.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddedDefault {
    /// No default; the field stays absent.
    Absent,
    /// A JSON string default.
    Value(&'static str),
}

/// One declared change within a step. Paths are dotted and relative to the
/// object the axis versions: `organisation`, a report, or a report's
/// `tech_carbon_standard`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldChange {
    Added {
        path: &'static str,
        default: AddedDefault,
    },
    Renamed {
        from: &'static str,
        to: &'static str,
    },
    Removed {
        path: &'static str,
    },
}

/// Versions that have a step table to their successor.
trait Steps: SchemaVersion {
    /// Changes applied when moving from `self` to `self.next()`.
    fn changes_to_next(self) -> &'static [FieldChange];
}

impl Steps for OrganisationVersion {
    fn changes_to_next(self) -> &'static [FieldChange] {
        match self {
            Self::V0_0_1 => &[FieldChange::Added {
                path: "description",
                default: AddedDefault::Absent,
            }],
            Self::V0_1_0 => &[FieldChange::Added {
                path: "open_corporates_url",
                default: AddedDefault::Absent,
            }],
            Self::V0_1_1 => &[FieldChange::Added {
                path: "country",
                default: AddedDefault::Absent,
            }],
            Self::V0_1_2 => &[],
        }
    }
}

impl Steps for ReportVersion {
    fn changes_to_next(self) -> &'static [FieldChange] {
        match self {
            Self::V0_0_1 => &[FieldChange::Added {
                path: "reporting_unit",
                default: AddedDefault::Absent,
            }],
            Self::V0_0_2 => &[FieldChange::Added {
                path: "disclosures",
                default: AddedDefault::Absent,
            }],
            Self::V0_0_3 => &[],
        }
    }
}

impl Steps for TcsVersion {
    fn changes_to_next(self) -> &'static [FieldChange] {
        match self {
            Self::V0_0_1 => &[
                FieldChange::Renamed {
                    from: "indirect_emissions.cloud_services",
                    to: "indirect_emissions.cloud",
                },
                FieldChange::Added {
                    path: "upstream_emissions.software",
                    default: AddedDefault::Absent,
                },
            ],
            Self::V0_0_2 => &[
                FieldChange::Renamed {
                    from: "direct_emissions.onsite_employee_hardware",
                    to: "direct_emissions.employee_devices",
                },
                FieldChange::Added {
                    path: "direct_emissions.employee_devices.method",
                    default: AddedDefault::Value("location_based"),
                },
                FieldChange::Added {
                    path: "direct_emissions.networking.method",
                    default: AddedDefault::Value("location_based"),
                },
                FieldChange::Added {
                    path: "direct_emissions.servers.method",
                    default: AddedDefault::Value("location_based"),
                },
                FieldChange::Added {
                    path: "upstream_emissions.foundation_models",
                    default: AddedDefault::Absent,
                },
                FieldChange::Added {
                    path: "downstream_emissions.downstream_infrastructure",
                    default: AddedDefault::Absent,
                },
                FieldChange::Removed {
                    path: "indirect_emissions.offsite_employee_hardware",
                },
            ],
            Self::V0_1_0 => &[],
        }
    }
}

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by [`MigrationEngine::migrate`]. Migration is
/// all-or-nothing: no variant carries a partial document.
#[derive(Error, Debug)]
pub enum MigrationError {
    /// The target version is not reachable from the source version.
    #[error("no migration path for {axis} schema from {from} to {to}: {to} is unreachable")]
    NoPath {
        axis: VersionAxis,
        from: String,
        to: String,
    },

    /// The migrated versions do not form a triple in the matrix.
    #[error("migrated report {report} would be incompatible: {source}")]
    Incompatible {
        report: usize,
        #[source]
        source: CompatibilityError,
    },

    /// The rewritten document failed validation.
    #[error("migrated document is invalid: {0}")]
    InvalidResult(#[source] TcsError),

    /// The source document could not be encoded for rewriting.
    #[error("failed to encode document for migration: {0}")]
    Encode(#[from] serde_json::Error),

    /// A caller-supplied value matched no addition on any step walked.
    #[error("supplied {axis} value for {path} was not used by any migration step")]
    UnusedSupplied { axis: VersionAxis, path: String },

    /// The encoded document did not have the expected shape.
    #[error("unexpected document shape at {0}")]
    Shape(String),
}

// ─── Change log ──────────────────────────────────────────────────────

/// What a single log entry did.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// The axis's `schema_version` moved to the step's target.
    VersionBumped,
    Renamed { from: String, to: String },
    AddedDefault { path: String, value: Value },
    AddedSupplied { path: String, value: Value },
    /// The field was dropped together with its value.
    Removed { path: String, dropped: Value },
}

/// One audited change, attributed to an axis step.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    /// Report index, or `None` for the organisation axis.
    pub report: Option<usize>,
    pub axis: VersionAxis,
    pub from: &'static str,
    pub to: &'static str,
    pub change: Change,
}

impl fmt::Display for ChangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.report {
            Some(i) => write!(f, "emissions_reports[{i}] ")?,
            None => f.write_str("document ")?,
        }
        write!(f, "{} {} -> {}: ", self.axis, self.from, self.to)?;
        match &self.change {
            Change::VersionBumped => write!(f, "schema_version set to {}", self.to),
            Change::Renamed { from, to } => write!(f, "renamed {from} to {to}"),
            Change::AddedDefault { path, value } => write!(f, "added {path} = {value} (default)"),
            Change::AddedSupplied { path, value } => {
                write!(f, "added {path} = {value} (supplied)")
            }
            Change::Removed { path, dropped } => write!(f, "removed {path} (dropped {dropped})"),
        }
    }
}

// ─── Request / outcome ───────────────────────────────────────────────

/// Where to migrate a document to.
#[derive(Debug, Clone, PartialEq)]
pub struct MigrationRequest {
    pub organisation: OrganisationVersion,
    /// Target report version; `None` keeps each report's own version.
    pub report: Option<ReportVersion>,
    /// Target category version; `None` keeps each report's own version.
    pub tech_carbon_standard: Option<TcsVersion>,
    supplied: BTreeMap<(VersionAxis, String), Value>,
}

impl MigrationRequest {
    /// Migrate the organisation axis only.
    pub fn to(organisation: OrganisationVersion) -> Self {
        Self {
            organisation,
            report: None,
            tech_carbon_standard: None,
            supplied: BTreeMap::new(),
        }
    }

    /// Migrate every axis of every report to `triple`.
    pub fn to_triple(triple: VersionTriple) -> Self {
        Self {
            organisation: triple.organisation,
            report: Some(triple.report),
            tech_carbon_standard: Some(triple.tech_carbon_standard),
            supplied: BTreeMap::new(),
        }
    }

    /// Migrate everything to the latest triple.
    pub fn latest() -> Self {
        Self::to_triple(VersionRegistry::latest_triple())
    }

    pub fn with_report_version(mut self, version: ReportVersion) -> Self {
        self.report = Some(version);
        self
    }

    pub fn with_tcs_version(mut self, version: TcsVersion) -> Self {
        self.tech_carbon_standard = Some(version);
        self
    }

    /// Supply a value for a field added on `axis`, overriding any default.
    /// Applies to every report for the report and category axes. The value
    /// must be used at least once during [`MigrationEngine::migrate`].
    pub fn supply(mut self, axis: VersionAxis, path: impl Into<String>, value: Value) -> Self {
        self.supplied.insert((axis, path.into()), value);
        self
    }

    fn supplied(&self, axis: VersionAxis, path: &str) -> Option<&Value> {
        self.supplied.get(&(axis, path.to_string()))
    }
}

/// A migrated document plus its change log.
#[derive(Debug, Clone)]
pub struct MigrationOutcome {
    pub document: Document,
    pub changes: Vec<ChangeRecord>,
}

// ─── Engine ──────────────────────────────────────────────────────────

/// Stateless driver for the step graph.
#[derive(Debug, Clone, Copy, Default)]
pub struct MigrationEngine;

impl MigrationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Migrate `document` as described by `request`.
    ///
    /// # Errors
    ///
    /// - [`MigrationError::NoPath`] for a backward request on any axis.
    /// - [`MigrationError::Incompatible`] if a report's migrated triple is
    ///   not in the matrix.
    /// - [`MigrationError::UnusedSupplied`] if a supplied value names no
    ///   field added by the steps walked.
    /// - [`MigrationError::InvalidResult`] if the rewritten document fails
    ///   validation.
    pub fn migrate(
        &self,
        document: &Document,
        request: &MigrationRequest,
    ) -> Result<MigrationOutcome, MigrationError> {
        let mut root = match document.to_value()? {
            Value::Object(map) => map,
            _ => return Err(MigrationError::Shape("(root)".into())),
        };
        let mut changes = Vec::new();

        let organisation = object_at(&mut root, "organisation", "organisation")?;
        migrate_axis(
            organisation,
            document.version(),
            request.organisation,
            None,
            request,
            &mut changes,
        )?;
        root.insert(
            "schema_version".into(),
            Value::String(request.organisation.as_str().into()),
        );

        let reports = match root.get_mut("emissions_reports") {
            Some(Value::Array(reports)) => reports,
            _ => return Err(MigrationError::Shape("emissions_reports".into())),
        };
        for (i, original) in document.reports().iter().enumerate() {
            let report_path = format!("emissions_reports[{i}]");
            let report = reports
                .get_mut(i)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| MigrationError::Shape(report_path.clone()))?;

            let report_target = request.report.unwrap_or(original.version());
            let tcs_source = original.tech_carbon_standard().version();
            let tcs_target = request.tech_carbon_standard.unwrap_or(tcs_source);

            VersionRegistry::assert_compatible(request.organisation, report_target, tcs_target)
                .map_err(|source| MigrationError::Incompatible { report: i, source })?;

            migrate_axis(report, original.version(), report_target, Some(i), request, &mut changes)?;
            report.insert(
                "schema_version".into(),
                Value::String(report_target.as_str().into()),
            );

            let payload = object_at(
                report,
                "tech_carbon_standard",
                &format!("{report_path}.tech_carbon_standard"),
            )?;
            migrate_axis(payload, tcs_source, tcs_target, Some(i), request, &mut changes)?;
            payload.insert(
                "schema_version".into(),
                Value::String(tcs_target.as_str().into()),
            );
        }

        if let Some((axis, path)) = request
            .supplied
            .keys()
            .find(|(axis, path)| !supplied_was_applied(&changes, *axis, path))
        {
            return Err(MigrationError::UnusedSupplied {
                axis: *axis,
                path: path.clone(),
            });
        }

        let document = Document::from_value(Value::Object(root)).map_err(MigrationError::InvalidResult)?;
        tracing::info!(
            changes = changes.len(),
            version = %document.version(),
            "document migrated"
        );
        Ok(MigrationOutcome { document, changes })
    }
}

fn supplied_was_applied(changes: &[ChangeRecord], axis: VersionAxis, path: &str) -> bool {
    changes.iter().any(|c| {
        c.axis == axis && matches!(&c.change, Change::AddedSupplied { path: p, .. } if p == path)
    })
}

fn object_at<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a mut Map<String, Value>, MigrationError> {
    parent
        .get_mut(key)
        .and_then(Value::as_object_mut)
        .ok_or_else(|| MigrationError::Shape(path.to_string()))
}

/// The forward chain of adjacent steps from `from` to `to`.
fn hops<V: SchemaVersion>(from: V, to: V) -> Result<Vec<(V, V)>, MigrationError> {
    let no_path = || MigrationError::NoPath {
        axis: V::AXIS,
        from: from.to_string(),
        to: to.to_string(),
    };
    if to < from {
        return Err(no_path());
    }
    let mut chain = Vec::new();
    let mut current = from;
    while current < to {
        let next = current.next().ok_or_else(no_path)?;
        chain.push((current, next));
        current = next;
    }
    Ok(chain)
}

fn migrate_axis<V: Steps>(
    target: &mut Map<String, Value>,
    from: V,
    to: V,
    report: Option<usize>,
    request: &MigrationRequest,
    log: &mut Vec<ChangeRecord>,
) -> Result<(), MigrationError> {
    for (step_from, step_to) in hops(from, to)? {
        let record = |change| ChangeRecord {
            report,
            axis: V::AXIS,
            from: step_from.as_str(),
            to: step_to.as_str(),
            change,
        };
        let applied = apply_step(target, step_from.changes_to_next(), |path| {
            request.supplied(V::AXIS, path).cloned()
        });
        tracing::debug!(
            axis = %V::AXIS,
            from = %step_from,
            to = %step_to,
            report = ?report,
            changes = applied.len(),
            "migration step applied"
        );
        log.push(record(Change::VersionBumped));
        log.extend(applied.into_iter().map(record));
    }
    Ok(())
}

fn apply_step(
    target: &mut Map<String, Value>,
    changes: &[FieldChange],
    supplied: impl Fn(&str) -> Option<Value>,
) -> Vec<Change> {
    let mut applied = Vec::new();

    for change in changes {
        if let FieldChange::Renamed { from, to } = change {
            let Some(value) = parent_mut(target, *from).and_then(|(p, leaf)| p.remove(leaf)) else {
                continue;
            };
            if let Some((parent, leaf)) = parent_mut(target, *to) {
                parent.insert(leaf.to_string(), value);
                applied.push(Change::Renamed {
                    from: (*from).to_string(),
                    to: (*to).to_string(),
                });
            }
        }
    }

    for change in changes {
        if let FieldChange::Added { path, default } = change {
            let from_caller = supplied(*path);
            if from_caller.is_some() {
                insert_missing_block(target, path);
            }
            let Some((parent, leaf)) = parent_mut(target, *path) else {
                continue;
            };
            if parent.contains_key(leaf) {
                continue;
            }
            let (value, from_caller) = match (from_caller, default) {
                (Some(value), _) => (value, true),
                (None, AddedDefault::Value(s)) => (Value::String((*s).to_string()), false),
                (None, AddedDefault::Absent) => continue,
            };
            parent.insert(leaf.to_string(), value.clone());
            let path = (*path).to_string();
            applied.push(if from_caller {
                Change::AddedSupplied { path, value }
            } else {
                Change::AddedDefault { path, value }
            });
        }
    }

    for change in changes {
        if let FieldChange::Removed { path } = change {
            if let Some(dropped) = parent_mut(target, *path).and_then(|(p, leaf)| p.remove(leaf)) {
                tracing::warn!(path = *path, dropped = %dropped, "field removed by migration");
                applied.push(Change::Removed {
                    path: (*path).to_string(),
                    dropped,
                });
            }
        }
    }

    applied
}

/// Create the block a supplied `block.field` value lands in when the
/// source never reported that block. Deeper paths are left alone.
fn insert_missing_block(target: &mut Map<String, Value>, path: &str) {
    if let Some((block, leaf)) = path.split_once('.') {
        if !leaf.contains('.') && !target.contains_key(block) {
            target.insert(block.to_string(), Value::Object(Map::new()));
        }
    }
}

/// The object holding the last segment of a dotted path, if every
/// intermediate object exists.
fn parent_mut<'m, 'p>(
    root: &'m mut Map<String, Value>,
    path: &'p str,
) -> Option<(&'m mut Map<String, Value>, &'p str)> {
    let (parents, leaf) = match path.rsplit_once('.') {
        Some((parents, leaf)) => (Some(parents), leaf),
        None => (None, path),
    };
    let mut current = root;
    if let Some(parents) = parents {
        for segment in parents.split('.') {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
    }
    Some((current, leaf))
}
