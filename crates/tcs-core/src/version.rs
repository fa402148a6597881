//! # Schema Versions — Compatibility Registry
//!
//! A document is three nested, independently versioned schemas:
//!
//! | Axis | Wire location |
//! |------|---------------|
//! | Reporting organisation | top-level `schema_version` |
//! | Emissions report | `emissions_reports[i].schema_version` |
//! | Tech Carbon Standard | `emissions_reports[i].tech_carbon_standard.schema_version` |
//!
//! Which versions may be nested inside which is a product decision, so the
//! matrix below is written out by hand rather than derived from the schema
//! files. Every `match` is exhaustive: adding a version forces its
//! compatibility row to be written.
//!
//! ## Invariants
//!
//! - The matrix is monotone: a newer version on an axis accepts at least the
//!   versions its predecessor accepted on the next axis.
//! - [`VersionRegistry`] holds no mutable state; every query is a pure lookup.
//! - Default versions are an explicit value held by the registry, never a
//!   process-wide constant.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CompatibilityError, UnknownVersion};

/// Unversioned router schema that dispatches on the root `schema_version`.
pub const ROUTER_SCHEMA_URL: &str = "https://techcarbonstandard.org/schemas/index.json";

const SCHEMA_BASE_URL: &str = "https://techcarbonstandard.org/schemas";

/// The three independently versioned schema axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionAxis {
    /// Root document envelope.
    Organisation,
    /// Per-report envelope.
    Report,
    /// Emissions category payload.
    TechCarbonStandard,
}

impl VersionAxis {
    /// Path segment used in schema URLs and schema file names.
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Organisation => "reporting-organisation",
            Self::Report => "emissions-report",
            Self::TechCarbonStandard => "tech-carbon-standard",
        }
    }

    /// Canonical `$id` of the schema for `version` on this axis.
    pub fn schema_url(&self, version: &str) -> String {
        format!("{SCHEMA_BASE_URL}/{}/{version}/schema.json", self.slug())
    }
}

impl fmt::Display for VersionAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Organisation => "reporting organisation",
            Self::Report => "emissions report",
            Self::TechCarbonStandard => "tech carbon standard",
        };
        f.write_str(s)
    }
}

/// Behaviour shared by the three version enums.
pub trait SchemaVersion:
    Copy + Ord + fmt::Debug + fmt::Display + FromStr<Err = UnknownVersion> + 'static
{
    /// The axis this version type belongs to.
    const AXIS: VersionAxis;

    /// Every version on the axis, oldest first.
    fn all() -> &'static [Self];

    /// The wire string, e.g. `"0.1.2"`.
    fn as_str(&self) -> &'static str;

    /// The newest version on the axis.
    fn latest() -> Self {
        let all = Self::all();
        all[all.len() - 1]
    }

    /// The adjacent successor, if any.
    fn next(self) -> Option<Self> {
        let all = Self::all();
        let position = all.iter().position(|v| *v == self)?;
        all.get(position + 1).copied()
    }
}

macro_rules! schema_version {
    (
        $(#[$meta:meta])*
        $name:ident, $axis:expr, [$($variant:ident => $wire:literal),+ $(,)?]
    ) => {
        $(#[$meta])*
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[doc = concat!("Schema version `", $wire, "`.")]
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// Every version on this axis, oldest first.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl SchemaVersion for $name {
            const AXIS: VersionAxis = $axis;

            fn all() -> &'static [Self] {
                Self::ALL
            }

            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVersion;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    other => Err(UnknownVersion {
                        axis: $axis,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

schema_version!(
    /// Reporting Organisation schema version (root document envelope).
    OrganisationVersion,
    VersionAxis::Organisation,
    [V0_0_1 => "0.0.1", V0_1_0 => "0.1.0", V0_1_1 => "0.1.1", V0_1_2 => "0.1.2"]
);

schema_version!(
    /// Emissions Report schema version (one per report).
    ReportVersion,
    VersionAxis::Report,
    [V0_0_1 => "0.0.1", V0_0_2 => "0.0.2", V0_0_3 => "0.0.3"]
);

schema_version!(
    /// Tech Carbon Standard schema version (emissions category payload).
    TcsVersion,
    VersionAxis::TechCarbonStandard,
    [V0_0_1 => "0.0.1", V0_0_2 => "0.0.2", V0_1_0 => "0.1.0"]
);

/// A full (organisation, report, category) version combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VersionTriple {
    /// Root document schema version.
    pub organisation: OrganisationVersion,
    /// Report envelope schema version.
    pub report: ReportVersion,
    /// Category payload schema version.
    pub tech_carbon_standard: TcsVersion,
}

impl VersionTriple {
    /// Assemble a triple without checking it. Use
    /// [`VersionRegistry::assert_triple`] to check.
    pub fn new(
        organisation: OrganisationVersion,
        report: ReportVersion,
        tech_carbon_standard: TcsVersion,
    ) -> Self {
        Self {
            organisation,
            report,
            tech_carbon_standard,
        }
    }
}

impl fmt::Display for VersionTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "organisation {} / report {} / tech carbon standard {}",
            self.organisation, self.report, self.tech_carbon_standard
        )
    }
}

/// The version compatibility matrix plus the default triple used when a
/// caller does not name versions explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionRegistry {
    defaults: VersionTriple,
}

impl Default for VersionRegistry {
    fn default() -> Self {
        Self {
            defaults: Self::latest_triple(),
        }
    }
}

impl VersionRegistry {
    /// A registry whose defaults are `defaults`.
    ///
    /// # Errors
    ///
    /// Rejects a default triple that is not in the matrix.
    pub fn with_defaults(defaults: VersionTriple) -> Result<Self, CompatibilityError> {
        Self::assert_triple(&defaults)?;
        Ok(Self { defaults })
    }

    /// The default triple for new documents and reports.
    pub fn defaults(&self) -> VersionTriple {
        self.defaults
    }

    /// Report versions that may appear inside a document of `organisation`.
    pub fn allowed_report_versions(organisation: OrganisationVersion) -> &'static [ReportVersion] {
        use ReportVersion as R;
        match organisation {
            OrganisationVersion::V0_1_2 => &[R::V0_0_1, R::V0_0_2, R::V0_0_3],
            OrganisationVersion::V0_1_1 => &[R::V0_0_1, R::V0_0_2, R::V0_0_3],
            OrganisationVersion::V0_1_0 => &[R::V0_0_1, R::V0_0_2],
            OrganisationVersion::V0_0_1 => &[R::V0_0_1],
        }
    }

    /// Category versions that may appear inside a report of `report`.
    pub fn allowed_tcs_versions(report: ReportVersion) -> &'static [TcsVersion] {
        use TcsVersion as T;
        match report {
            ReportVersion::V0_0_3 => &[T::V0_0_1, T::V0_0_2, T::V0_1_0],
            ReportVersion::V0_0_2 => &[T::V0_0_1, T::V0_0_2],
            ReportVersion::V0_0_1 => &[T::V0_0_1],
        }
    }

    /// Whether a report of version `report` may sit inside `organisation`.
    pub fn report_compatible(organisation: OrganisationVersion, report: ReportVersion) -> bool {
        Self::allowed_report_versions(organisation).contains(&report)
    }

    /// Whether a category payload of version `tcs` may sit inside `report`.
    pub fn tcs_compatible(report: ReportVersion, tcs: TcsVersion) -> bool {
        Self::allowed_tcs_versions(report).contains(&tcs)
    }

    /// Whether the full triple appears in the matrix.
    pub fn compatible(
        organisation: OrganisationVersion,
        report: ReportVersion,
        tcs: TcsVersion,
    ) -> bool {
        Self::report_compatible(organisation, report) && Self::tcs_compatible(report, tcs)
    }

    /// Check the report axis against the organisation axis.
    pub fn assert_report_compatible(
        organisation: OrganisationVersion,
        report: ReportVersion,
    ) -> Result<(), CompatibilityError> {
        if Self::report_compatible(organisation, report) {
            return Ok(());
        }
        Err(CompatibilityError {
            axis: VersionAxis::Report,
            version: report.to_string(),
            against_axis: VersionAxis::Organisation,
            against_version: organisation.to_string(),
            path: None,
        })
    }

    /// Check the category axis against the report axis.
    pub fn assert_tcs_compatible(
        report: ReportVersion,
        tcs: TcsVersion,
    ) -> Result<(), CompatibilityError> {
        if Self::tcs_compatible(report, tcs) {
            return Ok(());
        }
        Err(CompatibilityError {
            axis: VersionAxis::TechCarbonStandard,
            version: tcs.to_string(),
            against_axis: VersionAxis::Report,
            against_version: report.to_string(),
            path: None,
        })
    }

    /// Check a full triple, naming the first axis that fails.
    pub fn assert_compatible(
        organisation: OrganisationVersion,
        report: ReportVersion,
        tcs: TcsVersion,
    ) -> Result<(), CompatibilityError> {
        Self::assert_report_compatible(organisation, report)?;
        Self::assert_tcs_compatible(report, tcs)
    }

    /// [`assert_compatible`](Self::assert_compatible) for a [`VersionTriple`].
    pub fn assert_triple(triple: &VersionTriple) -> Result<(), CompatibilityError> {
        Self::assert_compatible(triple.organisation, triple.report, triple.tech_carbon_standard)
    }

    /// The newest version on every axis. Always in the matrix.
    pub fn latest_triple() -> VersionTriple {
        VersionTriple::new(
            OrganisationVersion::latest(),
            ReportVersion::latest(),
            TcsVersion::latest(),
        )
    }

    /// Every triple in the matrix, ordered by organisation, report, category.
    pub fn all_triples() -> Vec<VersionTriple> {
        let mut triples = Vec::new();
        for &organisation in OrganisationVersion::ALL {
            for &report in Self::allowed_report_versions(organisation) {
                for &tcs in Self::allowed_tcs_versions(report) {
                    triples.push(VersionTriple::new(organisation, report, tcs));
                }
            }
        }
        triples
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_wire_strings() {
        let org: Vec<&str> = OrganisationVersion::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(org, ["0.0.1", "0.1.0", "0.1.1", "0.1.2"]);
        let report: Vec<&str> = ReportVersion::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(report, ["0.0.1", "0.0.2", "0.0.3"]);
        let tcs: Vec<&str> = TcsVersion::ALL.iter().map(|v| v.as_str()).collect();
        assert_eq!(tcs, ["0.0.1", "0.0.2", "0.1.0"]);
    }

    #[test]
    fn test_from_str_roundtrip_and_rejection() {
        for v in OrganisationVersion::ALL {
            assert_eq!(v.as_str().parse::<OrganisationVersion>().unwrap(), *v);
        }
        let err = "0.2.0".parse::<TcsVersion>().unwrap_err();
        assert_eq!(err.axis, VersionAxis::TechCarbonStandard);
        assert_eq!(err.value, "0.2.0");
    }

    #[test]
    fn test_serde_uses_wire_string() {
        let json = serde_json::to_string(&ReportVersion::V0_0_2).unwrap();
        assert_eq!(json, "\"0.0.2\"");
        let parsed: TcsVersion = serde_json::from_str("\"0.1.0\"").unwrap();
        assert_eq!(parsed, TcsVersion::V0_1_0);
    }

    #[test]
    fn test_latest_and_next() {
        assert_eq!(OrganisationVersion::latest(), OrganisationVersion::V0_1_2);
        assert_eq!(ReportVersion::latest(), ReportVersion::V0_0_3);
        assert_eq!(TcsVersion::latest(), TcsVersion::V0_1_0);
        assert_eq!(TcsVersion::V0_0_2.next(), Some(TcsVersion::V0_1_0));
        assert_eq!(TcsVersion::V0_1_0.next(), None);
    }

    #[test]
    fn test_organisation_matrix_rows() {
        use ReportVersion as R;
        assert_eq!(
            VersionRegistry::allowed_report_versions(OrganisationVersion::V0_1_0),
            &[R::V0_0_1, R::V0_0_2]
        );
        assert_eq!(
            VersionRegistry::allowed_report_versions(OrganisationVersion::V0_0_1),
            &[R::V0_0_1]
        );
        assert!(!VersionRegistry::report_compatible(OrganisationVersion::V0_1_0, R::V0_0_3));
        assert!(VersionRegistry::report_compatible(OrganisationVersion::V0_1_1, R::V0_0_3));
    }

    #[test]
    fn test_report_matrix_rows() {
        assert!(VersionRegistry::tcs_compatible(ReportVersion::V0_0_3, TcsVersion::V0_1_0));
        assert!(!VersionRegistry::tcs_compatible(ReportVersion::V0_0_2, TcsVersion::V0_1_0));
        assert!(!VersionRegistry::tcs_compatible(ReportVersion::V0_0_1, TcsVersion::V0_0_2));
    }

    #[test]
    fn test_matrix_is_monotone() {
        for pair in OrganisationVersion::ALL.windows(2) {
            let older = VersionRegistry::allowed_report_versions(pair[0]);
            let newer = VersionRegistry::allowed_report_versions(pair[1]);
            assert!(older.iter().all(|v| newer.contains(v)), "{} -> {}", pair[0], pair[1]);
        }
        for pair in ReportVersion::ALL.windows(2) {
            let older = VersionRegistry::allowed_tcs_versions(pair[0]);
            let newer = VersionRegistry::allowed_tcs_versions(pair[1]);
            assert!(older.iter().all(|v| newer.contains(v)), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_assert_compatible_names_failing_axis() {
        let err = VersionRegistry::assert_compatible(
            OrganisationVersion::V0_0_1,
            ReportVersion::V0_0_2,
            TcsVersion::V0_0_1,
        )
        .unwrap_err();
        assert_eq!(err.axis, VersionAxis::Report);

        let err = VersionRegistry::assert_compatible(
            OrganisationVersion::V0_1_2,
            ReportVersion::V0_0_2,
            TcsVersion::V0_1_0,
        )
        .unwrap_err();
        assert_eq!(err.axis, VersionAxis::TechCarbonStandard);
        assert_eq!(err.against_version, "0.0.2");
    }

    #[test]
    fn test_latest_triple_is_compatible_and_maximal() {
        let latest = VersionRegistry::latest_triple();
        assert!(VersionRegistry::assert_triple(&latest).is_ok());
        assert_eq!(VersionRegistry::all_triples().iter().max(), Some(&latest));
    }

    #[test]
    fn test_all_triples_count() {
        // 0.1.2: 1+2+3, 0.1.1: 1+2+3, 0.1.0: 1+2, 0.0.1: 1
        assert_eq!(VersionRegistry::all_triples().len(), 6 + 6 + 3 + 1);
    }

    #[test]
    fn test_with_defaults_rejects_incompatible_triple() {
        let bad = VersionTriple::new(
            OrganisationVersion::V0_1_0,
            ReportVersion::V0_0_3,
            TcsVersion::V0_1_0,
        );
        assert!(VersionRegistry::with_defaults(bad).is_err());
        let good = VersionTriple::new(
            OrganisationVersion::V0_1_0,
            ReportVersion::V0_0_2,
            TcsVersion::V0_0_2,
        );
        assert_eq!(VersionRegistry::with_defaults(good).unwrap().defaults(), good);
        assert_eq!(VersionRegistry::default().defaults(), VersionRegistry::latest_triple());
    }

    #[test]
    fn test_schema_url() {
        assert_eq!(
            VersionAxis::Organisation.schema_url("0.1.2"),
            "https://techcarbonstandard.org/schemas/reporting-organisation/0.1.2/schema.json"
        );
    }
}
