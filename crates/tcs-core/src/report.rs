//! # Emissions Report
//!
//! One reporting period's worth of emissions for an organisation: the
//! period itself, how the figures were verified, supporting disclosures,
//! and the versioned category payload.
//!
//! ## Invariants
//!
//! - `to_date >= from_date`. A single-day period is allowed.
//! - An independently verified report names its auditor.
//! - The category payload version is allowed by the report version.
//! - `reporting_unit` needs report schema `0.0.2`, `disclosures` `0.0.3`.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::category::TechCarbonStandard;
use crate::error::{TcsError, ValidationError, ViolationKind};
use crate::path::FieldPath;
use crate::totals::EmissionsTotals;
use crate::version::{ReportVersion, VersionRegistry};

/// Inclusive date range covered by a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ReportingPeriod {
    from_date: NaiveDate,
    to_date: NaiveDate,
}

impl ReportingPeriod {
    /// # Errors
    ///
    /// [`ViolationKind::DateOrder`] at `to_date` when `to < from`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, ValidationError> {
        if to < from {
            return Err(ValidationError::new(
                FieldPath::of("to_date"),
                ViolationKind::DateOrder,
                format!("to_date {to} is before from_date {from}"),
            ));
        }
        Ok(Self {
            from_date: from,
            to_date: to,
        })
    }

    /// First day of the period.
    pub fn from_date(&self) -> NaiveDate {
        self.from_date
    }

    /// Last day of the period, inclusive.
    pub fn to_date(&self) -> NaiveDate {
        self.to_date
    }

    /// Number of calendar days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to_date - self.from_date).num_days() + 1
    }

    /// The day after the period ends.
    pub fn day_after(&self) -> Option<NaiveDate> {
        self.to_date.checked_add_signed(Duration::days(1))
    }
}

/// How the report's figures were checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verification {
    SelfReported,
    IndependentlyVerified,
}

impl Verification {
    pub const ALL: &'static [Verification] = &[Self::SelfReported, Self::IndependentlyVerified];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfReported => "self_reported",
            Self::IndependentlyVerified => "independently_verified",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|v| v.as_str() == s)
    }
}

/// Kind of a supporting document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    Report,
    Methodology,
    Other,
}

impl DocType {
    pub const ALL: &'static [DocType] = &[Self::Report, Self::Methodology, Self::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Report => "report",
            Self::Methodology => "methodology",
            Self::Other => "other",
        }
    }

    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|d| d.as_str() == s)
    }
}

/// A link to a published supporting document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Disclosure {
    url: Url,
    doc_type: DocType,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
}

impl Disclosure {
    /// # Errors
    ///
    /// [`ViolationKind::Malformed`] at `url` when the link does not parse.
    pub fn new(
        url: &str,
        doc_type: DocType,
        description: Option<String>,
    ) -> Result<Self, ValidationError> {
        let url = Url::parse(url).map_err(|e| {
            ValidationError::new(
                FieldPath::of("url"),
                ViolationKind::Malformed,
                format!("invalid URL {url:?}: {e}"),
            )
        })?;
        Ok(Self {
            url,
            doc_type,
            description,
        })
    }

    /// Where the document is published.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// What kind of document the link points at.
    pub fn doc_type(&self) -> DocType {
        self.doc_type
    }

    /// Short caption for the link, if given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Everything needed to construct an [`EmissionsReport`].
#[derive(Debug, Clone)]
pub struct EmissionsReportFields {
    pub version: ReportVersion,
    pub reporting_unit: Option<String>,
    pub period: ReportingPeriod,
    pub verification: Verification,
    pub auditor_link: Option<Url>,
    pub disclosures: Vec<Disclosure>,
    pub tech_carbon_standard: TechCarbonStandard,
}

/// A validated emissions report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmissionsReport {
    schema_version: ReportVersion,
    #[serde(skip_serializing_if = "Option::is_none")]
    reporting_unit: Option<String>,
    #[serde(flatten)]
    period: ReportingPeriod,
    verification: Verification,
    #[serde(skip_serializing_if = "Option::is_none")]
    auditor_link: Option<Url>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    disclosures: Vec<Disclosure>,
    tech_carbon_standard: TechCarbonStandard,
}

impl EmissionsReport {
    /// Validate and assemble a report. Error paths are relative to the
    /// report object.
    ///
    /// # Errors
    ///
    /// - [`TcsError::Compatibility`] if the payload version is not allowed
    ///   by the report version.
    /// - [`TcsError::Validation`] for a member the report version does not
    ///   define, or a missing auditor link on a verified report.
    pub fn new(fields: EmissionsReportFields) -> Result<Self, TcsError> {
        let version = fields.version;
        VersionRegistry::assert_tcs_compatible(version, fields.tech_carbon_standard.version())
            .map_err(|e| e.under(&FieldPath::of("tech_carbon_standard").field("schema_version")))?;

        if fields.reporting_unit.is_some() && version < ReportVersion::V0_0_2 {
            return Err(not_in_version("reporting_unit", ReportVersion::V0_0_2, version).into());
        }
        if !fields.disclosures.is_empty() && version < ReportVersion::V0_0_3 {
            return Err(not_in_version("disclosures", ReportVersion::V0_0_3, version).into());
        }
        if fields.verification == Verification::IndependentlyVerified
            && fields.auditor_link.is_none()
        {
            return Err(ValidationError::new(
                FieldPath::of("auditor_link"),
                ViolationKind::ConditionalRequired,
                "auditor_link is required when verification is independently_verified",
            )
            .into());
        }

        Ok(Self {
            schema_version: version,
            reporting_unit: fields.reporting_unit,
            period: fields.period,
            verification: fields.verification,
            auditor_link: fields.auditor_link,
            disclosures: fields.disclosures,
            tech_carbon_standard: fields.tech_carbon_standard,
        })
    }

    /// The report schema version this report was validated against.
    pub fn version(&self) -> ReportVersion {
        self.schema_version
    }

    /// Business unit the figures cover, if narrower than the organisation.
    pub fn reporting_unit(&self) -> Option<&str> {
        self.reporting_unit.as_deref()
    }

    /// The inclusive date range reported on.
    pub fn period(&self) -> &ReportingPeriod {
        &self.period
    }

    /// Whether the figures are self-reported or independently verified.
    pub fn verification(&self) -> Verification {
        self.verification
    }

    /// Link to the auditor's statement; present on every verified report.
    pub fn auditor_link(&self) -> Option<&Url> {
        self.auditor_link.as_ref()
    }

    /// Supporting documents, in wire order.
    pub fn disclosures(&self) -> &[Disclosure] {
        &self.disclosures
    }

    /// The versioned category payload.
    pub fn tech_carbon_standard(&self) -> &TechCarbonStandard {
        &self.tech_carbon_standard
    }

    /// Per-category sums over known entries.
    pub fn totals(&self) -> EmissionsTotals {
        EmissionsTotals::from_payload(&self.tech_carbon_standard)
    }
}

fn not_in_version(field: &str, since: ReportVersion, declared: ReportVersion) -> ValidationError {
    ValidationError::new(
        FieldPath::of(field),
        ViolationKind::NotInVersion,
        format!("{field} requires emissions report schema {since} or later, report declares {declared}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::{TcsVersion, VersionAxis};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_period_day_after() {
        let period = ReportingPeriod::new(date("2024-02-01"), date("2024-02-28")).unwrap();
        assert_eq!(period.day_after(), Some(date("2024-02-29")));
        assert_eq!(period.days(), 28);
        let end = ReportingPeriod::new(NaiveDate::MAX, NaiveDate::MAX).unwrap();
        assert_eq!(end.day_after(), None);
    }

    fn fields(version: ReportVersion, tcs: TcsVersion) -> EmissionsReportFields {
        EmissionsReportFields {
            version,
            reporting_unit: None,
            period: ReportingPeriod::new(date("2023-01-01"), date("2023-12-31")).unwrap(),
            verification: Verification::SelfReported,
            auditor_link: None,
            disclosures: Vec::new(),
            tech_carbon_standard: TechCarbonStandard::empty(tcs),
        }
    }

    #[test]
    fn test_period_order() {
        let err = ReportingPeriod::new(date("2024-01-02"), date("2024-01-01")).unwrap_err();
        assert_eq!(err.kind, ViolationKind::DateOrder);
        let single = ReportingPeriod::new(date("2024-01-01"), date("2024-01-01")).unwrap();
        assert_eq!(single.days(), 1);
    }

    #[test]
    fn test_verified_requires_auditor() {
        let mut f = fields(ReportVersion::V0_0_3, TcsVersion::V0_1_0);
        f.verification = Verification::IndependentlyVerified;
        match EmissionsReport::new(f.clone()).unwrap_err() {
            TcsError::Validation(e) => {
                assert_eq!(e.kind, ViolationKind::ConditionalRequired);
                assert_eq!(e.path.to_string(), "auditor_link");
            }
            other => panic!("unexpected error: {other}"),
        }
        f.auditor_link = Some(Url::parse("https://auditor.example/report").unwrap());
        assert!(EmissionsReport::new(f).is_ok());
    }

    #[test]
    fn test_incompatible_payload_names_path() {
        let f = fields(ReportVersion::V0_0_1, TcsVersion::V0_0_2);
        match EmissionsReport::new(f).unwrap_err() {
            TcsError::Compatibility(e) => {
                assert_eq!(e.axis, VersionAxis::TechCarbonStandard);
                assert_eq!(
                    e.path.unwrap().to_string(),
                    "tech_carbon_standard.schema_version"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_reporting_unit_gated() {
        let mut f = fields(ReportVersion::V0_0_1, TcsVersion::V0_0_1);
        f.reporting_unit = Some("EMEA".into());
        assert!(EmissionsReport::new(f.clone()).is_err());
        f.version = ReportVersion::V0_0_2;
        assert!(EmissionsReport::new(f).is_ok());
    }

    #[test]
    fn test_serialized_dates_are_flat() {
        let report = EmissionsReport::new(fields(ReportVersion::V0_0_2, TcsVersion::V0_0_2)).unwrap();
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["from_date"], "2023-01-01");
        assert_eq!(value["to_date"], "2023-12-31");
        assert_eq!(value["verification"], "self_reported");
        assert!(value.get("disclosures").is_none());
        assert!(value.get("auditor_link").is_none());
    }
}
