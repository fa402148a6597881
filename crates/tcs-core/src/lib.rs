//! # tcs-core — Technology Carbon Standard Document Model
//!
//! Foundational types for emissions reporting documents that conform to
//! three nested, independently versioned schemas.
//!
//! ## Modules
//!
//! - [`version`]: the three version axes, the fixed compatibility matrix
//!   and the [`VersionRegistry`] that carries default versions.
//! - [`path`]: [`FieldPath`], the location notation used by every error.
//! - [`error`]: the error hierarchy.
//! - [`emissions`], [`category`]: emissions figures and the versioned
//!   category blocks that hold them.
//! - [`organisation`], [`report`], [`document`]: the envelopes.
//! - [`totals`]: per-category sums.
//!
//! ## Invariants
//!
//! Every value is validated by its constructor and immutable afterwards.
//! An invalid combination fails construction with a field-path-scoped
//! error; it is never representable. In particular a [`Document`] always
//! carries version triples that appear in the compatibility matrix.
//!
//! ## Crate Policy
//!
//! - No I/O. Callers hand in JSON text or values and get JSON back.
//! - No process-wide defaults: default versions live in a
//!   [`VersionRegistry`] value passed explicitly.

pub mod category;
pub mod document;
pub mod emissions;
pub mod error;
pub mod organisation;
pub mod path;
pub mod report;
pub mod totals;
pub mod version;
mod wire;

pub use category::{Category, CategoryBlock, CategoryField, TechCarbonStandard};
pub use document::Document;
pub use emissions::{AccountingMethod, CategoryEntry, Emissions, Scope2Emissions};
pub use error::{
    CompatibilityError, ParseError, TcsError, UnknownVersion, ValidationError, ViolationKind,
};
pub use organisation::{CountryCode, Organisation};
pub use path::{FieldPath, Segment};
pub use report::{
    DocType, Disclosure, EmissionsReport, EmissionsReportFields, ReportingPeriod, Verification,
};
pub use totals::EmissionsTotals;
pub use version::{
    OrganisationVersion, ReportVersion, SchemaVersion, TcsVersion, VersionAxis, VersionRegistry,
    VersionTriple, ROUTER_SCHEMA_URL,
};
