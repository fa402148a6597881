//! # Wire Parsing
//!
//! Turns a `serde_json::Value` into a [`Document`], running every value
//! through the same validated constructors a programmatic caller uses.
//!
//! Envelope shapes are read through private `Raw*` mirrors with
//! `deny_unknown_fields`; category blocks are read as open maps because
//! names no version defines are kept as extensions. Every error is rooted
//! at the document so callers see
//! `emissions_reports[0].tech_carbon_standard.direct_emissions.servers.emissions`.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::category::{Category, CategoryBlock, CategoryField, TechCarbonStandard};
use crate::document::Document;
use crate::emissions::{AccountingMethod, CategoryEntry, Emissions, Scope2Emissions};
use crate::error::{ParseError, TcsError, ValidationError, ViolationKind};
use crate::organisation::{CountryCode, Organisation};
use crate::path::FieldPath;
use crate::report::{
    DocType, Disclosure, EmissionsReport, EmissionsReportFields, ReportingPeriod, Verification,
};
use crate::version::{OrganisationVersion, ReportVersion, TcsVersion};

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocument {
    schema_version: String,
    organisation: Value,
    emissions_reports: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOrganisation {
    name: String,
    description: Option<String>,
    open_corporates_url: Option<String>,
    country: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawReport {
    schema_version: String,
    reporting_unit: Option<String>,
    from_date: String,
    to_date: String,
    verification: Verification,
    auditor_link: Option<String>,
    #[serde(default)]
    disclosures: Vec<RawDisclosure>,
    tech_carbon_standard: RawPayload,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDisclosure {
    url: String,
    doc_type: DocType,
    description: Option<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPayload {
    schema_version: String,
    upstream_emissions: Option<Map<String, Value>>,
    direct_emissions: Option<Map<String, Value>>,
    indirect_emissions: Option<Map<String, Value>>,
    downstream_emissions: Option<Map<String, Value>>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEntry {
    emissions: f64,
    notes: Option<String>,
    method: Option<AccountingMethod>,
}

/// Parse and validate a whole document.
pub(crate) fn parse_document(value: Value) -> Result<Document, TcsError> {
    let raw: RawDocument = shaped(value, &FieldPath::root())?;
    let version: OrganisationVersion = version_at(&raw.schema_version, &FieldPath::of("schema_version"))?;

    let org_path = FieldPath::of("organisation");
    let organisation = parse_organisation(raw.organisation, &org_path)?;

    let mut reports = Vec::with_capacity(raw.emissions_reports.len());
    for (i, report) in raw.emissions_reports.into_iter().enumerate() {
        let path = FieldPath::of("emissions_reports").index(i);
        reports.push(parse_report(report).map_err(|e| e.under(&path))?);
    }

    Document::new(version, organisation, reports)
}

fn parse_organisation(value: Value, path: &FieldPath) -> Result<Organisation, TcsError> {
    let raw: RawOrganisation = shaped(value, path)?;
    let build = || -> Result<Organisation, ValidationError> {
        let mut org = Organisation::new(raw.name)?;
        if let Some(description) = raw.description {
            org = org.with_description(description);
        }
        if let Some(url) = &raw.open_corporates_url {
            org = org.with_open_corporates_url(url)?;
        }
        if let Some(country) = &raw.country {
            org = org.with_country(CountryCode::new(country)?);
        }
        Ok(org)
    };
    build().map_err(|e| TcsError::from(e.under(path)))
}

/// Paths in errors are relative to the report.
fn parse_report(value: Value) -> Result<EmissionsReport, TcsError> {
    let raw: RawReport = shaped(value, &FieldPath::root())?;
    let version: ReportVersion = version_at(&raw.schema_version, &FieldPath::of("schema_version"))?;

    let from = date_at(&raw.from_date, "from_date")?;
    let to = date_at(&raw.to_date, "to_date")?;
    let period = ReportingPeriod::new(from, to)?;

    let auditor_link = raw
        .auditor_link
        .as_deref()
        .map(|link| {
            Url::parse(link).map_err(|e| {
                ValidationError::new(
                    FieldPath::of("auditor_link"),
                    ViolationKind::Malformed,
                    format!("invalid URL {link:?}: {e}"),
                )
            })
        })
        .transpose()?;

    let mut disclosures = Vec::with_capacity(raw.disclosures.len());
    for (j, d) in raw.disclosures.into_iter().enumerate() {
        let disclosure = Disclosure::new(&d.url, d.doc_type, d.description)
            .map_err(|e| e.under(&FieldPath::of("disclosures").index(j)))?;
        disclosures.push(disclosure);
    }

    let payload_path = FieldPath::of("tech_carbon_standard");
    let tech_carbon_standard =
        parse_payload(raw.tech_carbon_standard).map_err(|e| e.under(&payload_path))?;

    EmissionsReport::new(EmissionsReportFields {
        version,
        reporting_unit: raw.reporting_unit,
        period,
        verification: raw.verification,
        auditor_link,
        disclosures,
        tech_carbon_standard,
    })
}

fn parse_payload(raw: RawPayload) -> Result<TechCarbonStandard, TcsError> {
    let version: TcsVersion = version_at(&raw.schema_version, &FieldPath::of("schema_version"))?;
    let members = [
        (Category::Upstream, raw.upstream_emissions),
        (Category::Direct, raw.direct_emissions),
        (Category::Indirect, raw.indirect_emissions),
        (Category::Downstream, raw.downstream_emissions),
    ];
    let mut blocks = Vec::new();
    for (category, member) in members {
        if let Some(map) = member {
            let path = FieldPath::of(category.as_str());
            blocks.push(parse_block(category, version, map).map_err(|e| e.under(&path))?);
        }
    }
    Ok(TechCarbonStandard::new(version, blocks)?)
}

fn parse_block(
    category: Category,
    version: TcsVersion,
    map: Map<String, Value>,
) -> Result<CategoryBlock, TcsError> {
    let mut entries = Vec::new();
    let mut extensions = BTreeMap::new();
    for (name, value) in map {
        match CategoryField::from_name(category, &name) {
            Some(field) => {
                let path = FieldPath::of(&name);
                let raw: RawEntry = shaped(value, &path)?;
                let mut emissions = Emissions::new(raw.emissions).map_err(|e| e.under(&path))?;
                if let Some(notes) = raw.notes {
                    emissions = emissions.with_notes(notes);
                }
                let entry = match raw.method {
                    Some(method) => CategoryEntry::Scope2(Scope2Emissions::new(emissions, Some(method))),
                    None => CategoryEntry::Standard(emissions),
                };
                entries.push((field, entry));
            }
            None => {
                extensions.insert(name, value);
            }
        }
    }
    Ok(CategoryBlock::with_extensions(category, version, entries, extensions)?)
}

fn shaped<T: DeserializeOwned>(value: Value, path: &FieldPath) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| ParseError::Shape {
        path: path.clone(),
        message: e.to_string(),
    })
}

fn version_at<V>(raw: &str, path: &FieldPath) -> Result<V, ParseError>
where
    V: FromStr<Err = crate::error::UnknownVersion>,
{
    V::from_str(raw).map_err(|e| ParseError::UnknownVersion {
        axis: e.axis,
        value: e.value,
        path: path.clone(),
    })
}

fn date_at(raw: &str, field: &str) -> Result<NaiveDate, ParseError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| ParseError::Shape {
        path: FieldPath::of(field),
        message: format!("expected a YYYY-MM-DD date, got {raw:?}: {e}"),
    })
}
