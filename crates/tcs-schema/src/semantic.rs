//! # Semantic Checks
//!
//! Cross-field and cross-report rules a schema cannot express. Each check
//! is independent and can be run on its own.
//!
//! - [`check_versions`]: every report's version triple is in the matrix.
//!   Works on the raw value so documents written against an older matrix
//!   are still caught.
//! - [`completeness`]: fraction of each block's known fields that carry a
//!   value, and which blocks are missing entirely.
//! - [`date_coverage`]: gaps and overlaps between reporting periods.
//!
//! Completeness and coverage are advisory findings returned as data.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use serde_json::Value;

use tcs_core::{
    Category, CompatibilityError, Document, FieldPath, OrganisationVersion, ReportVersion,
    ReportingPeriod, TcsVersion, VersionRegistry,
};

// ─── Version compatibility ───────────────────────────────────────────

/// Check the declared versions of every report against the matrix.
///
/// Version strings that are missing or unknown are skipped here; the
/// structural pass and document parsing report them.
pub fn check_versions(document: &Value) -> Vec<CompatibilityError> {
    let Some(organisation) = declared::<OrganisationVersion>(document) else {
        return Vec::new();
    };
    let reports = document
        .get("emissions_reports")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut errors = Vec::new();
    for (i, report) in reports.iter().enumerate() {
        let report_path = FieldPath::of("emissions_reports").index(i);
        let Some(report_version) = declared::<ReportVersion>(report) else {
            continue;
        };
        if let Err(e) = VersionRegistry::assert_report_compatible(organisation, report_version) {
            errors.push(e.under(&report_path.field("schema_version")));
        }
        let tcs = report
            .get("tech_carbon_standard")
            .and_then(declared::<TcsVersion>);
        if let Some(tcs) = tcs {
            if let Err(e) = VersionRegistry::assert_tcs_compatible(report_version, tcs) {
                errors.push(e.under(
                    &report_path
                        .field("tech_carbon_standard")
                        .field("schema_version"),
                ));
            }
        }
    }
    errors
}

fn declared<V: std::str::FromStr>(object: &Value) -> Option<V> {
    object.get("schema_version")?.as_str()?.parse().ok()
}

// ─── Completeness ────────────────────────────────────────────────────

/// Coverage of one category block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCompleteness {
    pub category: Category,
    /// Known fields with a value.
    pub present: usize,
    /// Fields the block's version defines.
    pub known: usize,
}

/// Coverage of one report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportCompleteness {
    pub report: usize,
    pub categories: Vec<CategoryCompleteness>,
    /// Blocks that are absent or hold no known field.
    pub missing: Vec<Category>,
    /// Present known fields as a percentage of all known fields.
    pub percent: f64,
}

/// Coverage of a whole document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    pub reports: Vec<ReportCompleteness>,
    /// Across all reports; `0.0` for a document with no reports.
    pub overall_percent: f64,
}

pub fn completeness(document: &Document) -> CompletenessReport {
    let mut reports = Vec::with_capacity(document.reports().len());
    let (mut present_total, mut known_total) = (0usize, 0usize);

    for (i, report) in document.reports().iter().enumerate() {
        let payload = report.tech_carbon_standard();
        let version = payload.version();
        let mut categories = Vec::with_capacity(Category::ALL.len());
        let mut missing = Vec::new();

        for &category in Category::ALL {
            let known = version.fields(category).len();
            let present = payload.block(category).map_or(0, |b| b.present_count());
            if present == 0 {
                missing.push(category);
            }
            categories.push(CategoryCompleteness {
                category,
                present,
                known,
            });
        }

        let present: usize = categories.iter().map(|c| c.present).sum();
        let known: usize = categories.iter().map(|c| c.known).sum();
        present_total += present;
        known_total += known;
        reports.push(ReportCompleteness {
            report: i,
            categories,
            missing,
            percent: percent(present, known),
        });
    }

    CompletenessReport {
        reports,
        overall_percent: percent(present_total, known_total),
    }
}

fn percent(present: usize, known: usize) -> f64 {
    if known == 0 {
        return 0.0;
    }
    present as f64 * 100.0 / known as f64
}

// ─── Date coverage ───────────────────────────────────────────────────

/// A hole or double-counted span between reporting periods. Report
/// indices refer to the document's order; dates are inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageFinding {
    Gap {
        /// Report whose period precedes the gap.
        after: usize,
        /// Report whose period follows the gap.
        before: usize,
        from: NaiveDate,
        to: NaiveDate,
    },
    Overlap {
        first: usize,
        second: usize,
        from: NaiveDate,
        to: NaiveDate,
    },
}

impl std::fmt::Display for CoverageFinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gap {
                after,
                before,
                from,
                to,
            } => write!(
                f,
                "gap {from}..{to} between emissions_reports[{after}] and emissions_reports[{before}]"
            ),
            Self::Overlap {
                first,
                second,
                from,
                to,
            } => write!(
                f,
                "overlap {from}..{to} between emissions_reports[{first}] and emissions_reports[{second}]"
            ),
        }
    }
}

/// Sort periods by start date and compare each against the frontier: the
/// period with the furthest end date seen so far, not merely the previous
/// period in sort order. A period wholly contained in an earlier one is
/// reported as an overlap with it and does not pull the frontier back, so
/// the next period is not flagged with a false gap. A report that starts
/// on the frontier's day after is contiguous.
pub fn date_coverage(document: &Document) -> Vec<CoverageFinding> {
    let mut order: Vec<(usize, ReportingPeriod)> = document
        .reports()
        .iter()
        .enumerate()
        .map(|(i, r)| (i, *r.period()))
        .collect();
    order.sort_by_key(|&(i, p)| (p.from_date(), p.to_date(), i));

    let mut findings = Vec::new();
    let mut iter = order.into_iter();
    let Some((mut frontier_index, mut frontier)) = iter.next() else {
        return findings;
    };

    for (i, period) in iter {
        let from = period.from_date();
        match frontier.day_after() {
            Some(next) if from > next => {
                findings.push(CoverageFinding::Gap {
                    after: frontier_index,
                    before: i,
                    from: next,
                    to: from - Duration::days(1),
                });
            }
            _ if from <= frontier.to_date() => {
                findings.push(CoverageFinding::Overlap {
                    first: frontier_index,
                    second: i,
                    from,
                    to: frontier.to_date().min(period.to_date()),
                });
            }
            _ => {}
        }
        if period.to_date() > frontier.to_date() {
            frontier = period;
            frontier_index = i;
        }
    }
    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(from: &str, to: &str, tcs: Value) -> Value {
        json!({
            "schema_version": "0.0.3",
            "from_date": from,
            "to_date": to,
            "verification": "self_reported",
            "tech_carbon_standard": tcs
        })
    }

    fn doc(reports: Vec<Value>) -> Document {
        Document::from_value(json!({
            "schema_version": "0.1.2",
            "organisation": {"name": "Acme"},
            "emissions_reports": reports
        }))
        .unwrap()
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn empty_payload() -> Value {
        json!({"schema_version": "0.1.0"})
    }

    #[test]
    fn test_gap_detected() {
        let d = doc(vec![
            report("2023-01-01", "2023-12-31", empty_payload()),
            report("2024-02-01", "2024-12-31", empty_payload()),
        ]);
        assert_eq!(
            date_coverage(&d),
            vec![CoverageFinding::Gap {
                after: 0,
                before: 1,
                from: date("2024-01-01"),
                to: date("2024-01-31"),
            }]
        );
    }

    #[test]
    fn test_overlap_detected() {
        let d = doc(vec![
            report("2023-01-01", "2023-12-31", empty_payload()),
            report("2023-10-01", "2024-09-30", empty_payload()),
        ]);
        assert_eq!(
            date_coverage(&d),
            vec![CoverageFinding::Overlap {
                first: 0,
                second: 1,
                from: date("2023-10-01"),
                to: date("2023-12-31"),
            }]
        );
    }

    #[test]
    fn test_contiguous_and_unsorted_input() {
        let d = doc(vec![
            report("2024-01-01", "2024-12-31", empty_payload()),
            report("2023-01-01", "2023-12-31", empty_payload()),
        ]);
        assert!(date_coverage(&d).is_empty());
    }

    #[test]
    fn test_contained_period_is_overlap_of_inner_span() {
        let d = doc(vec![
            report("2023-01-01", "2023-12-31", empty_payload()),
            report("2023-03-01", "2023-03-31", empty_payload()),
            report("2024-01-01", "2024-06-30", empty_payload()),
        ]);
        let findings = date_coverage(&d);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].to_string(),
            "overlap 2023-03-01..2023-03-31 between emissions_reports[0] and emissions_reports[1]"
        );
    }

    #[test]
    fn test_gap_measured_from_furthest_end_not_previous_period() {
        let d = doc(vec![
            report("2023-01-01", "2023-12-31", empty_payload()),
            report("2023-03-01", "2023-03-31", empty_payload()),
            report("2024-02-01", "2024-06-30", empty_payload()),
        ]);
        let findings = date_coverage(&d);
        assert_eq!(findings.len(), 2);
        assert_eq!(
            findings[1],
            CoverageFinding::Gap {
                after: 0,
                before: 2,
                from: date("2024-01-01"),
                to: date("2024-01-31"),
            }
        );
    }

    #[test]
    fn test_completeness_counts_known_fields() {
        let d = doc(vec![report(
            "2023-01-01",
            "2023-12-31",
            json!({
                "schema_version": "0.1.0",
                "upstream_emissions": {
                    "software": {"emissions": 1},
                    "custom_thing": {"emissions": 99}
                },
                "direct_emissions": {"servers": {"emissions": 0}}
            }),
        )]);
        let report = completeness(&d);
        let r = &report.reports[0];
        assert_eq!(r.categories[0].present, 1);
        assert_eq!(r.categories[0].known, 5);
        assert_eq!(r.missing, vec![Category::Indirect, Category::Downstream]);
        // 2 present of 5 + 4 + 3 + 3 known
        assert!((r.percent - 200.0 / 15.0).abs() < 1e-9);
        assert_eq!(report.overall_percent, r.percent);
    }

    #[test]
    fn test_completeness_of_empty_document() {
        let report = completeness(&doc(Vec::new()));
        assert!(report.reports.is_empty());
        assert_eq!(report.overall_percent, 0.0);
    }

    #[test]
    fn test_version_check_on_raw_value() {
        let value = json!({
            "schema_version": "0.1.0",
            "organisation": {"name": "Acme"},
            "emissions_reports": [
                report("2023-01-01", "2023-12-31", json!({"schema_version": "0.0.1"})),
                {
                    "schema_version": "0.0.2",
                    "tech_carbon_standard": {"schema_version": "0.1.0"}
                }
            ]
        });
        let errors = check_versions(&value);
        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors[0].path.as_ref().unwrap().to_string(),
            "emissions_reports[0].schema_version"
        );
        assert_eq!(
            errors[1].path.as_ref().unwrap().to_string(),
            "emissions_reports[1].tech_carbon_standard.schema_version"
        );
    }
}
