//! # Document
//!
//! The root of the wire format:
//!
//! ```json
//! {
//!   "schema_version": "0.1.2",
//!   "organisation": { "name": "Acme" },
//!   "emissions_reports": [ ... ]
//! }
//! ```
//!
//! A `Document` can only be obtained through [`Document::new`] or the
//! parsing entry points, all of which enforce the full version triple of
//! every report and every construction-time invariant below it. Values are
//! never mutated in place: a migrated or rebuilt document is a new value.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{ParseError, TcsError};
use crate::organisation::Organisation;
use crate::path::FieldPath;
use crate::report::EmissionsReport;
use crate::totals::EmissionsTotals;
use crate::version::{OrganisationVersion, VersionRegistry, VersionTriple};
use crate::wire;

/// A validated emissions reporting document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    schema_version: OrganisationVersion,
    organisation: Organisation,
    emissions_reports: Vec<EmissionsReport>,
}

impl Document {
    /// Assemble a document. Reports keep their insertion order; a document
    /// with no reports is valid.
    ///
    /// # Errors
    ///
    /// - [`TcsError::Validation`] at `organisation.*` when the organisation
    ///   uses a member `version` does not define.
    /// - [`TcsError::Compatibility`] at `emissions_reports[i].schema_version`
    ///   for the first report whose version `version` does not allow.
    pub fn new(
        version: OrganisationVersion,
        organisation: Organisation,
        reports: Vec<EmissionsReport>,
    ) -> Result<Self, TcsError> {
        organisation
            .check_version(version)
            .map_err(|e| e.under(&FieldPath::of("organisation")))?;

        for (i, report) in reports.iter().enumerate() {
            VersionRegistry::assert_report_compatible(version, report.version()).map_err(|e| {
                e.under(
                    &FieldPath::of("emissions_reports")
                        .index(i)
                        .field("schema_version"),
                )
            })?;
        }

        Ok(Self {
            schema_version: version,
            organisation,
            emissions_reports: reports,
        })
    }

    /// Parse UTF-8 JSON text.
    pub fn from_json(text: &str) -> Result<Self, TcsError> {
        let value: Value = serde_json::from_str(text).map_err(ParseError::Json)?;
        Self::from_value(value)
    }

    /// Parse an already-decoded JSON value.
    pub fn from_value(value: Value) -> Result<Self, TcsError> {
        wire::parse_document(value)
    }

    /// Pretty-printed JSON. Absent optional members are omitted.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    pub fn version(&self) -> OrganisationVersion {
        self.schema_version
    }

    pub fn organisation(&self) -> &Organisation {
        &self.organisation
    }

    pub fn reports(&self) -> &[EmissionsReport] {
        &self.emissions_reports
    }

    /// The version triple of each report, in report order.
    pub fn version_triples(&self) -> Vec<VersionTriple> {
        self.emissions_reports
            .iter()
            .map(|r| {
                VersionTriple::new(
                    self.schema_version,
                    r.version(),
                    r.tech_carbon_standard().version(),
                )
            })
            .collect()
    }

    /// Sums across all reports.
    pub fn totals(&self) -> EmissionsTotals {
        self.emissions_reports.iter().map(EmissionsReport::totals).sum()
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ViolationKind;
    use crate::version::VersionAxis;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "schema_version": "0.1.2",
            "organisation": {"name": "Acme", "country": "GB"},
            "emissions_reports": [{
                "schema_version": "0.0.3",
                "reporting_unit": "Group",
                "from_date": "2023-01-01",
                "to_date": "2023-12-31",
                "verification": "independently_verified",
                "auditor_link": "https://auditor.example/acme-2023",
                "disclosures": [{"url": "https://acme.example/esg.pdf", "doc_type": "report"}],
                "tech_carbon_standard": {
                    "schema_version": "0.1.0",
                    "upstream_emissions": {"software": {"emissions": 12.5}},
                    "direct_emissions": {
                        "servers": {"emissions": 100.0, "method": "market_based"},
                        "generators": {"emissions": 4.0, "notes": "diesel backup"}
                    },
                    "indirect_emissions": {"cloud": {"emissions": 40.0}, "quantum": {"emissions": 9}}
                }
            }]
        })
    }

    #[test]
    fn test_parse_and_reserialize() {
        let doc = Document::from_value(sample()).unwrap();
        assert_eq!(doc.reports().len(), 1);
        assert_eq!(doc.to_value().unwrap(), sample());
        let again = Document::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn test_totals_ignore_extensions() {
        let doc = Document::from_value(sample()).unwrap();
        let totals = doc.totals();
        assert_eq!(totals.upstream, 12.5);
        assert_eq!(totals.direct, 104.0);
        assert_eq!(totals.indirect, 40.0);
        assert_eq!(totals.total(), 156.5);
    }

    #[test]
    fn test_negative_entry_path() {
        let mut v = sample();
        v["emissions_reports"][0]["tech_carbon_standard"]["direct_emissions"]["servers"]["emissions"] =
            json!(-1.0);
        let err = Document::from_value(v).unwrap_err();
        assert_eq!(
            err.path().unwrap().to_string(),
            "emissions_reports[0].tech_carbon_standard.direct_emissions.servers.emissions"
        );
        match err {
            TcsError::Validation(e) => assert_eq!(e.kind, ViolationKind::Negative),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_incompatible_report_version() {
        let mut v = sample();
        v["schema_version"] = json!("0.1.0");
        v["organisation"] = json!({"name": "Acme"});
        match Document::from_value(v).unwrap_err() {
            TcsError::Compatibility(e) => {
                assert_eq!(e.axis, VersionAxis::Report);
                assert_eq!(e.against_version, "0.1.0");
                assert_eq!(
                    e.path.unwrap().to_string(),
                    "emissions_reports[0].schema_version"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_field_from_other_version_rejected() {
        let mut v = sample();
        v["emissions_reports"][0]["tech_carbon_standard"]["indirect_emissions"]
            ["offsite_employee_hardware"] = json!({"emissions": 1.0});
        let err = Document::from_value(v).unwrap_err();
        assert_eq!(
            err.path().unwrap().to_string(),
            "emissions_reports[0].tech_carbon_standard.indirect_emissions.offsite_employee_hardware"
        );
    }

    #[test]
    fn test_field_in_wrong_block_rejected() {
        let mut v = sample();
        v["emissions_reports"][0]["tech_carbon_standard"]["upstream_emissions"]["servers"] =
            json!({"emissions": 500.0});
        let err = Document::from_value(v).unwrap_err();
        assert_eq!(
            err.path().unwrap().to_string(),
            "emissions_reports[0].tech_carbon_standard.upstream_emissions.servers"
        );
        match err {
            TcsError::Validation(e) => assert_eq!(e.kind, ViolationKind::Misplaced),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_version_string() {
        let mut v = sample();
        v["emissions_reports"][0]["tech_carbon_standard"]["schema_version"] = json!("9.9.9");
        match Document::from_value(v).unwrap_err() {
            TcsError::Parse(ParseError::UnknownVersion { axis, path, .. }) => {
                assert_eq!(axis, VersionAxis::TechCarbonStandard);
                assert_eq!(
                    path.to_string(),
                    "emissions_reports[0].tech_carbon_standard.schema_version"
                );
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_date_and_bad_json() {
        let mut v = sample();
        v["emissions_reports"][0]["from_date"] = json!("01/01/2023");
        assert!(matches!(
            Document::from_value(v).unwrap_err(),
            TcsError::Parse(ParseError::Shape { .. })
        ));
        assert!(matches!(
            Document::from_json("{not json").unwrap_err(),
            TcsError::Parse(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_empty_report_list_allowed() {
        let org = Organisation::new("Acme").unwrap();
        let doc = Document::new(OrganisationVersion::V0_0_1, org, Vec::new()).unwrap();
        assert_eq!(doc.totals().total(), 0.0);
        assert!(doc.version_triples().is_empty());
    }

    #[test]
    fn test_serde_deserialize_routes_through_validation() {
        let mut v = sample();
        v["organisation"]["name"] = json!("");
        assert!(serde_json::from_value::<Document>(v).is_err());
        assert!(serde_json::from_value::<Document>(sample()).is_ok());
    }
}
