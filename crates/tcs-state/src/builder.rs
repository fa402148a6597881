//! # Document Builder
//!
//! Assembles a [`Document`] incrementally, across several reports, without
//! restating the nested structure for each one.
//!
//! ## States
//!
//! ```text
//! empty → organisation set → (report open → report finalised)* → built
//! ```
//!
//! The open report lives in a [`ReportCursor`]. Setters mutate only the
//! open report's pending fields. The pending report is validated when it
//! is finalised: when the next report is opened or when [`DocumentBuilder::build`]
//! runs. Errors for report *N* therefore surface at `open_report` for
//! report *N+1* or at `build()`, not at the setter that caused them.
//!
//! If finalisation fails the pending report is discarded, no new report is
//! opened, and reports finalised earlier are kept.

use std::collections::BTreeMap;

use thiserror::Error;
use url::Url;

use tcs_core::{
    Category, CategoryBlock, CategoryEntry, CategoryField, Disclosure, Document, EmissionsReport,
    EmissionsReportFields, FieldPath, Organisation, OrganisationVersion, ReportVersion,
    ReportingPeriod, TcsError, TcsVersion, TechCarbonStandard, ValidationError, Verification,
    VersionRegistry, VersionTriple, ViolationKind,
};

// ─── Errors ──────────────────────────────────────────────────────────

/// Errors raised by [`DocumentBuilder`].
#[derive(Error, Debug)]
pub enum BuilderError {
    /// A report-level setter was called with no report open.
    #[error("{operation} requires an open report; call open_report first")]
    NoOpenReport {
        /// The setter that was called.
        operation: &'static str,
    },

    /// `build()` was called before an organisation was set.
    #[error("an organisation must be set before build")]
    MissingOrganisation,

    /// A pending report or the document failed validation.
    #[error(transparent)]
    Invalid(#[from] TcsError),
}

// ─── Cursor ──────────────────────────────────────────────────────────

/// Fields of a report that has been opened but not yet validated.
#[derive(Debug)]
struct PendingReport {
    version: ReportVersion,
    tcs_version: TcsVersion,
    period: ReportingPeriod,
    verification: Verification,
    reporting_unit: Option<String>,
    auditor_link: Option<Url>,
    disclosures: Vec<Disclosure>,
    blocks: BTreeMap<Category, Vec<(CategoryField, CategoryEntry)>>,
}

impl PendingReport {
    /// Validate into a report. Paths are relative to the report.
    fn finish(self) -> Result<EmissionsReport, TcsError> {
        let payload_path = FieldPath::of("tech_carbon_standard");
        let mut blocks = Vec::with_capacity(self.blocks.len());
        for (category, entries) in self.blocks {
            let block = CategoryBlock::new(category, self.tcs_version, entries)
                .map_err(|e| e.under(&payload_path.field(category.as_str())))?;
            blocks.push(block);
        }
        let tech_carbon_standard = TechCarbonStandard::new(self.tcs_version, blocks)
            .map_err(|e| e.under(&payload_path))?;

        EmissionsReport::new(EmissionsReportFields {
            version: self.version,
            reporting_unit: self.reporting_unit,
            period: self.period,
            verification: self.verification,
            auditor_link: self.auditor_link,
            disclosures: self.disclosures,
            tech_carbon_standard,
        })
    }
}

/// Whether a report is currently being staged.
#[derive(Debug)]
enum ReportCursor {
    NoOpenReport,
    Open(Box<PendingReport>),
}

// ─── Builder ─────────────────────────────────────────────────────────

/// Single-owner staging area for a [`Document`].
///
/// ```
/// use chrono::NaiveDate;
/// use tcs_core::{CategoryField, Emissions, Organisation, ReportingPeriod, Verification, VersionRegistry};
/// use tcs_state::DocumentBuilder;
///
/// let mut builder = DocumentBuilder::new(&VersionRegistry::default());
/// builder.set_organisation(Organisation::new("Acme").unwrap());
/// let period = ReportingPeriod::new(
///     NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
///     NaiveDate::from_ymd_opt(2023, 12, 31).unwrap(),
/// )
/// .unwrap();
/// builder
///     .open_report(period, Verification::SelfReported)
///     .unwrap()
///     .set_upstream([(CategoryField::Software, Emissions::new(12.0).unwrap().into())])
///     .unwrap();
/// let document = builder.build().unwrap();
/// assert_eq!(document.reports().len(), 1);
/// ```
#[derive(Debug)]
pub struct DocumentBuilder {
    defaults: VersionTriple,
    organisation_version: OrganisationVersion,
    organisation: Option<Organisation>,
    reports: Vec<EmissionsReport>,
    cursor: ReportCursor,
}

impl DocumentBuilder {
    /// A builder whose new reports start at `registry`'s default versions.
    pub fn new(registry: &VersionRegistry) -> Self {
        let defaults = registry.defaults();
        Self {
            defaults,
            organisation_version: defaults.organisation,
            organisation: None,
            reports: Vec::new(),
            cursor: ReportCursor::NoOpenReport,
        }
    }

    /// Override the root schema version.
    pub fn set_organisation_version(&mut self, version: OrganisationVersion) -> &mut Self {
        self.organisation_version = version;
        self
    }

    /// Record the organisation. May be called again to replace it.
    pub fn set_organisation(&mut self, organisation: Organisation) -> &mut Self {
        self.organisation = Some(organisation);
        self
    }

    /// Open a new report, finalising the currently open one first.
    ///
    /// # Errors
    ///
    /// [`BuilderError::Invalid`] if the previously open report fails
    /// validation. The error path is rooted at the document.
    pub fn open_report(
        &mut self,
        period: ReportingPeriod,
        verification: Verification,
    ) -> Result<&mut Self, BuilderError> {
        self.finalise_open_report()?;
        self.cursor = ReportCursor::Open(Box::new(PendingReport {
            version: self.defaults.report,
            tcs_version: self.defaults.tech_carbon_standard,
            period,
            verification,
            reporting_unit: None,
            auditor_link: None,
            disclosures: Vec::new(),
            blocks: BTreeMap::new(),
        }));
        tracing::debug!(index = self.reports.len(), "report opened");
        Ok(self)
    }

    /// Override the report and category payload versions of the open report.
    pub fn set_report_versions(
        &mut self,
        report: ReportVersion,
        tech_carbon_standard: TcsVersion,
    ) -> Result<&mut Self, BuilderError> {
        let pending = self.pending("set_report_versions")?;
        pending.version = report;
        pending.tcs_version = tech_carbon_standard;
        Ok(self)
    }

    pub fn set_reporting_unit(&mut self, unit: impl Into<String>) -> Result<&mut Self, BuilderError> {
        self.pending("set_reporting_unit")?.reporting_unit = Some(unit.into());
        Ok(self)
    }

    /// Link the auditor's statement.
    ///
    /// # Errors
    ///
    /// Besides [`BuilderError::NoOpenReport`], fails immediately when `link`
    /// is not a URL.
    pub fn set_auditor_link(&mut self, link: &str) -> Result<&mut Self, BuilderError> {
        let index = self.reports.len();
        let pending = self.pending("set_auditor_link")?;
        let url = Url::parse(link).map_err(|e| {
            TcsError::from(ValidationError::new(
                FieldPath::of("emissions_reports").index(index).field("auditor_link"),
                ViolationKind::Malformed,
                format!("invalid URL {link:?}: {e}"),
            ))
        })?;
        pending.auditor_link = Some(url);
        Ok(self)
    }

    pub fn set_upstream(
        &mut self,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<&mut Self, BuilderError> {
        self.set_block(Category::Upstream, "set_upstream", entries)
    }

    pub fn set_direct(
        &mut self,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<&mut Self, BuilderError> {
        self.set_block(Category::Direct, "set_direct", entries)
    }

    pub fn set_indirect(
        &mut self,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<&mut Self, BuilderError> {
        self.set_block(Category::Indirect, "set_indirect", entries)
    }

    pub fn set_downstream(
        &mut self,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<&mut Self, BuilderError> {
        self.set_block(Category::Downstream, "set_downstream", entries)
    }

    pub fn add_disclosure(&mut self, disclosure: Disclosure) -> Result<&mut Self, BuilderError> {
        self.pending("add_disclosure")?.disclosures.push(disclosure);
        Ok(self)
    }

    /// Whether a report is currently open.
    pub fn has_open_report(&self) -> bool {
        matches!(self.cursor, ReportCursor::Open(_))
    }

    /// Number of reports already finalised.
    pub fn finalised_reports(&self) -> usize {
        self.reports.len()
    }

    /// Finalise any open report and assemble the document.
    ///
    /// # Errors
    ///
    /// [`BuilderError::MissingOrganisation`] if no organisation was set,
    /// [`BuilderError::Invalid`] if the open report or the document fails
    /// validation.
    pub fn build(mut self) -> Result<Document, BuilderError> {
        self.finalise_open_report()?;
        let organisation = self.organisation.ok_or(BuilderError::MissingOrganisation)?;
        let document = Document::new(self.organisation_version, organisation, self.reports)?;
        tracing::info!(
            reports = document.reports().len(),
            version = %document.version(),
            "document built"
        );
        Ok(document)
    }

    /// Replaces the whole block; entries are validated at finalisation.
    fn set_block(
        &mut self,
        category: Category,
        operation: &'static str,
        entries: impl IntoIterator<Item = (CategoryField, CategoryEntry)>,
    ) -> Result<&mut Self, BuilderError> {
        let pending = self.pending(operation)?;
        pending.blocks.insert(category, entries.into_iter().collect());
        Ok(self)
    }

    fn pending(&mut self, operation: &'static str) -> Result<&mut PendingReport, BuilderError> {
        match &mut self.cursor {
            ReportCursor::Open(pending) => Ok(&mut **pending),
            ReportCursor::NoOpenReport => Err(BuilderError::NoOpenReport { operation }),
        }
    }

    fn finalise_open_report(&mut self) -> Result<(), BuilderError> {
        let ReportCursor::Open(pending) =
            std::mem::replace(&mut self.cursor, ReportCursor::NoOpenReport)
        else {
            return Ok(());
        };
        let index = self.reports.len();
        let report = pending
            .finish()
            .map_err(|e| e.under(&FieldPath::of("emissions_reports").index(index)))?;
        tracing::debug!(
            index,
            from = %report.period().from_date(),
            to = %report.period().to_date(),
            "report finalised"
        );
        self.reports.push(report);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tcs_core::Emissions;

    fn period(from: &str, to: &str) -> ReportingPeriod {
        ReportingPeriod::new(
            NaiveDate::parse_from_str(from, "%Y-%m-%d").unwrap(),
            NaiveDate::parse_from_str(to, "%Y-%m-%d").unwrap(),
        )
        .unwrap()
    }

    fn entry(amount: f64) -> CategoryEntry {
        Emissions::new(amount).unwrap().into()
    }

    fn builder() -> DocumentBuilder {
        let mut b = DocumentBuilder::new(&VersionRegistry::default());
        b.set_organisation(Organisation::new("Acme").unwrap());
        b
    }

    #[test]
    fn test_setter_without_open_report() {
        let mut b = builder();
        let err = b.set_upstream([(CategoryField::Software, entry(1.0))]).unwrap_err();
        assert!(matches!(err, BuilderError::NoOpenReport { operation: "set_upstream" }));
        assert!(matches!(
            b.add_disclosure(
                Disclosure::new("https://acme.example/r.pdf", tcs_core::DocType::Report, None).unwrap()
            ),
            Err(BuilderError::NoOpenReport { .. })
        ));
    }

    #[test]
    fn test_build_requires_organisation() {
        let b = DocumentBuilder::new(&VersionRegistry::default());
        assert!(matches!(b.build(), Err(BuilderError::MissingOrganisation)));
    }

    #[test]
    fn test_finalise_on_open_isolates_reports() {
        let mut b = builder();
        b.open_report(period("2023-01-01", "2023-12-31"), Verification::SelfReported)
            .unwrap()
            .set_upstream([(CategoryField::Software, entry(10.0))])
            .unwrap();
        b.open_report(period("2024-01-01", "2024-12-31"), Verification::SelfReported)
            .unwrap()
            .set_upstream([(CategoryField::Software, entry(99.0))])
            .unwrap();
        assert_eq!(b.finalised_reports(), 1);
        let doc = b.build().unwrap();
        assert_eq!(doc.reports()[0].totals().upstream, 10.0);
        assert_eq!(doc.reports()[1].totals().upstream, 99.0);
    }

    #[test]
    fn test_invalid_report_surfaces_at_next_open() {
        let mut b = builder();
        b.open_report(period("2023-01-01", "2023-12-31"), Verification::IndependentlyVerified)
            .unwrap();
        let err = b
            .open_report(period("2024-01-01", "2024-12-31"), Verification::SelfReported)
            .unwrap_err();
        match err {
            BuilderError::Invalid(e) => {
                assert_eq!(e.path().unwrap().to_string(), "emissions_reports[0].auditor_link")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!b.has_open_report());
        assert_eq!(b.finalised_reports(), 0);
    }

    #[test]
    fn test_block_errors_are_rooted() {
        let mut b = builder();
        b.open_report(period("2023-01-01", "2023-12-31"), Verification::SelfReported)
            .unwrap()
            .set_report_versions(ReportVersion::V0_0_2, TcsVersion::V0_0_1)
            .unwrap()
            .set_upstream([(CategoryField::FoundationModels, entry(1.0))])
            .unwrap();
        let err = b.build().unwrap_err();
        match err {
            BuilderError::Invalid(e) => assert_eq!(
                e.path().unwrap().to_string(),
                "emissions_reports[0].tech_carbon_standard.upstream_emissions.foundation_models"
            ),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_defaults_flow_into_reports() {
        use tcs_core::{OrganisationVersion as O, ReportVersion as R, TcsVersion as T};
        let registry =
            VersionRegistry::with_defaults(VersionTriple::new(O::V0_1_0, R::V0_0_2, T::V0_0_2)).unwrap();
        let mut b = DocumentBuilder::new(&registry);
        b.set_organisation(Organisation::new("Acme").unwrap());
        b.open_report(period("2023-01-01", "2023-12-31"), Verification::SelfReported)
            .unwrap();
        let doc = b.build().unwrap();
        assert_eq!(
            doc.version_triples(),
            vec![VersionTriple::new(O::V0_1_0, R::V0_0_2, T::V0_0_2)]
        );
    }

    #[test]
    fn test_organisation_can_be_replaced() {
        let mut b = builder();
        b.set_organisation(Organisation::new("Acme Renamed").unwrap());
        assert_eq!(b.build().unwrap().organisation().name(), "Acme Renamed");
    }
}
