//! Date coverage findings, compatibility closure across the builder and
//! parser, and builder report isolation.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use serde_json::json;

use tcs_core::{
    CategoryField, Document, Emissions, Organisation, OrganisationVersion, ReportVersion,
    ReportingPeriod, SchemaVersion, TcsError, TcsVersion, Verification, VersionRegistry,
    VersionTriple,
};
use tcs_schema::{date_coverage, CoverageFinding, IssueKind, Validator};
use tcs_state::{BuilderError, DocumentBuilder};

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn document_with_periods(periods: &[(&str, &str)]) -> Document {
    let mut builder = DocumentBuilder::new(&VersionRegistry::default());
    builder.set_organisation(Organisation::new("Acme").unwrap());
    for (from, to) in periods {
        builder
            .open_report(
                ReportingPeriod::new(date(from), date(to)).unwrap(),
                Verification::SelfReported,
            )
            .unwrap();
    }
    builder.build().unwrap()
}

#[test]
fn gap_between_years() {
    let doc = document_with_periods(&[("2023-01-01", "2023-12-31"), ("2024-02-01", "2024-12-31")]);
    assert_eq!(
        date_coverage(&doc),
        vec![CoverageFinding::Gap {
            after: 0,
            before: 1,
            from: date("2024-01-01"),
            to: date("2024-01-31"),
        }]
    );
}

#[test]
fn overlap_between_years() {
    let doc = document_with_periods(&[("2023-01-01", "2023-12-31"), ("2023-10-01", "2024-09-30")]);
    assert_eq!(
        date_coverage(&doc),
        vec![CoverageFinding::Overlap {
            first: 0,
            second: 1,
            from: date("2023-10-01"),
            to: date("2023-12-31"),
        }]
    );
}

#[test]
fn contiguous_years_have_no_findings() {
    let doc = document_with_periods(&[("2023-01-01", "2023-12-31"), ("2024-01-01", "2024-12-31")]);
    assert!(date_coverage(&doc).is_empty());
}

#[test]
fn report_order_does_not_matter() {
    let doc = document_with_periods(&[("2024-02-01", "2024-12-31"), ("2023-01-01", "2023-12-31")]);
    assert_eq!(
        date_coverage(&doc),
        vec![CoverageFinding::Gap {
            after: 1,
            before: 0,
            from: date("2024-01-01"),
            to: date("2024-01-31"),
        }]
    );
}

#[test]
fn coverage_findings_never_invalidate() {
    let doc = document_with_periods(&[("2023-01-01", "2023-12-31"), ("2023-10-01", "2024-09-30")]);
    let report = Validator::new()
        .validate(&doc.to_value().unwrap(), None)
        .unwrap();
    assert!(report.is_valid);
    assert!(report.warnings.iter().any(|w| w.kind == IssueKind::Overlap));
    assert_eq!(report.coverage.len(), 1);
}

fn wire_document(triple: VersionTriple) -> serde_json::Value {
    json!({
        "schema_version": triple.organisation.as_str(),
        "organisation": {"name": "Acme"},
        "emissions_reports": [{
            "schema_version": triple.report.as_str(),
            "from_date": "2023-01-01",
            "to_date": "2023-12-31",
            "verification": "self_reported",
            "tech_carbon_standard": {"schema_version": triple.tech_carbon_standard.as_str()}
        }]
    })
}

#[test]
fn compatibility_closure_over_every_triple() {
    let matrix = VersionRegistry::all_triples();
    for &organisation in OrganisationVersion::all() {
        for &report in ReportVersion::all() {
            for &tcs in TcsVersion::all() {
                let triple = VersionTriple::new(organisation, report, tcs);
                let in_matrix = matrix.contains(&triple);

                let parsed = Document::from_value(wire_document(triple));
                match (&parsed, in_matrix) {
                    (Ok(_), true) => {}
                    (Err(TcsError::Compatibility(_)), false) => {}
                    other => panic!("{triple}: {other:?}"),
                }

                // The builder agrees with the parser.
                let mut builder = DocumentBuilder::new(&VersionRegistry::default());
                builder
                    .set_organisation_version(organisation)
                    .set_organisation(Organisation::new("Acme").unwrap());
                builder
                    .open_report(
                        ReportingPeriod::new(date("2023-01-01"), date("2023-12-31")).unwrap(),
                        Verification::SelfReported,
                    )
                    .unwrap()
                    .set_report_versions(report, tcs)
                    .unwrap();
                let built = builder.build();
                match (&built, in_matrix) {
                    (Ok(_), true) => {}
                    (Err(BuilderError::Invalid(TcsError::Compatibility(_))), false) => {}
                    other => panic!("{triple}: {other:?}"),
                }
            }
        }
    }
}

proptest! {
    /// Data set on report A before B is opened stays on A; data set after
    /// stays on B.
    #[test]
    fn finalise_on_open_isolates_reports(
        a in 0u32..10_000,
        b in 0u32..10_000,
        start in 0u64..3_000,
        len in 0u64..400,
    ) {
        let from = date("2015-01-01") + Days::new(start);
        let to = from + Days::new(len);
        let next_from = to + Days::new(1);
        let next_to = next_from + Days::new(len);

        let mut builder = DocumentBuilder::new(&VersionRegistry::default());
        builder.set_organisation(Organisation::new("Acme").unwrap());
        builder
            .open_report(ReportingPeriod::new(from, to).unwrap(), Verification::SelfReported)
            .unwrap()
            .set_upstream([(CategoryField::Software, Emissions::new(f64::from(a)).unwrap().into())])
            .unwrap();
        builder
            .open_report(ReportingPeriod::new(next_from, next_to).unwrap(), Verification::SelfReported)
            .unwrap()
            .set_upstream([(CategoryField::Software, Emissions::new(f64::from(b)).unwrap().into())])
            .unwrap();
        let doc = builder.build().unwrap();

        prop_assert_eq!(doc.reports()[0].totals().upstream, f64::from(a));
        prop_assert_eq!(doc.reports()[1].totals().upstream, f64::from(b));
        prop_assert!(date_coverage(&doc).is_empty());
    }
}
