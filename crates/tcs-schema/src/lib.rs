//! # tcs-schema — Document Validation
//!
//! Two independent passes over an emissions reporting document.
//!
//! ## Structural (`structural`)
//!
//! [`StructuralCheck`] is the seam for JSON Schema conformance.
//! [`SchemaValidator`] implements it with the `jsonschema` crate over the
//! bundled `schemas/` directory, validating each layer against the
//! version it declares and collecting every violation with its path.
//!
//! ## Semantic (`semantic`)
//!
//! Rules a schema cannot express: version compatibility across layers,
//! completeness of the category blocks, and gaps or overlaps between
//! reporting periods.
//!
//! ## Composition (`validator`)
//!
//! [`Validator`] runs the configured passes and returns a
//! [`ValidationReport`]. Semantic findings are warnings and never make a
//! document invalid.

pub mod semantic;
pub mod structural;
pub mod validator;

pub use semantic::{
    check_versions, completeness, date_coverage, CategoryCompleteness, CompletenessReport,
    CoverageFinding, ReportCompleteness,
};
pub use structural::{
    parse_document_text, SchemaValidationError, SchemaValidator, StructuralCheck, StructuralError,
};
pub use validator::{Issue, IssueKind, SemanticChecks, ValidationReport, Validator};
