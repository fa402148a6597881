//! # Error Types — Structured Error Hierarchy
//!
//! Every failure the document model can produce, built with `thiserror`.
//!
//! ## Design
//!
//! - Construction failures carry the [`FieldPath`] of the offending field,
//!   a [`ViolationKind`] callers can match on, and a human-readable message.
//! - Version mismatches name the axis that failed and the version it was
//!   checked against.
//! - Malformed input fails fast with a [`ParseError`]; nothing is partially
//!   recovered.

use std::fmt;

use thiserror::Error;

use crate::path::FieldPath;
use crate::version::VersionAxis;

/// Top-level error type for the document model.
#[derive(Error, Debug)]
pub enum TcsError {
    /// A hard invariant was violated while constructing a value.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A version triple is not in the compatibility matrix.
    #[error("compatibility error: {0}")]
    Compatibility(#[from] CompatibilityError),

    /// Input text could not be turned into a document.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
}

impl TcsError {
    /// The field path the error points at, when it has one.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Self::Validation(e) => Some(&e.path),
            Self::Compatibility(e) => e.path.as_ref(),
            Self::Parse(ParseError::UnknownVersion { path, .. })
            | Self::Parse(ParseError::Shape { path, .. }) => Some(path),
            Self::Parse(ParseError::Json(_)) => None,
        }
    }

    /// Re-root any path carried by this error under `prefix`.
    pub fn under(self, prefix: &FieldPath) -> Self {
        match self {
            Self::Validation(e) => Self::Validation(e.under(prefix)),
            Self::Compatibility(e) => Self::Compatibility(e.under(prefix)),
            Self::Parse(e) => Self::Parse(e.under(prefix)),
        }
    }
}

/// Classification of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationKind {
    /// A required field is missing or empty.
    Required,
    /// An emissions amount is below zero.
    Negative,
    /// An emissions amount is NaN or infinite.
    NonFinite,
    /// A period ends before it starts.
    DateOrder,
    /// A field required by the value of another field is missing.
    ConditionalRequired,
    /// The field exists in the schema family but not in the declared version.
    NotInVersion,
    /// The field appears under the wrong category or scope.
    Misplaced,
    /// The value is syntactically invalid (URL, country code, duplicate block).
    Malformed,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Required => "required",
            Self::Negative => "negative",
            Self::NonFinite => "non-finite",
            Self::DateOrder => "date-order",
            Self::ConditionalRequired => "conditional-required",
            Self::NotInVersion => "not-in-version",
            Self::Misplaced => "misplaced",
            Self::Malformed => "malformed",
        };
        f.write_str(s)
    }
}

/// A hard invariant violation found while constructing a value.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{path}: {message}")]
pub struct ValidationError {
    /// Location of the offending field.
    pub path: FieldPath,
    /// What kind of invariant failed.
    pub kind: ViolationKind,
    /// Human-readable description.
    pub message: String,
}

impl ValidationError {
    /// Create a new validation error.
    pub fn new(path: FieldPath, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Re-root the error path under `prefix`.
    pub fn under(mut self, prefix: &FieldPath) -> Self {
        self.path = self.path.prefixed(prefix);
        self
    }
}

/// A version that is not compatible with the version of the enclosing axis.
///
/// `axis`/`version` name the offending side; `against_axis`/`against_version`
/// name the version it was checked against.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error(
    "{axis} schema version {version} is not compatible with {against_axis} schema version {against_version}{}",
    at_suffix(.path)
)]
pub struct CompatibilityError {
    /// Axis whose version is not allowed.
    pub axis: VersionAxis,
    /// The offending version.
    pub version: String,
    /// Axis of the enclosing version.
    pub against_axis: VersionAxis,
    /// The enclosing version.
    pub against_version: String,
    /// Where the offending version was declared, if known.
    pub path: Option<FieldPath>,
}

impl CompatibilityError {
    /// Attach or re-root the location of the offending version.
    pub fn under(mut self, prefix: &FieldPath) -> Self {
        self.path = Some(match self.path {
            Some(path) => path.prefixed(prefix),
            None => prefix.clone(),
        });
        self
    }
}

fn at_suffix(path: &Option<FieldPath>) -> String {
    path.as_ref().map(|p| format!(" (at {p})")).unwrap_or_default()
}

/// A version string that names no known version on its axis.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown {axis} schema version {value:?}")]
pub struct UnknownVersion {
    /// Axis the string was parsed for.
    pub axis: VersionAxis,
    /// The rejected string.
    pub value: String,
}

/// Input text or JSON could not be read as a document.
#[derive(Error, Debug)]
pub enum ParseError {
    /// The text is not JSON, or its shape does not match the wire format.
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),

    /// A `schema_version` names no known version.
    #[error("unknown {axis} schema version {value:?} at {path}")]
    UnknownVersion {
        /// Axis the version belongs to.
        axis: VersionAxis,
        /// The rejected string.
        value: String,
        /// Location of the `schema_version` member.
        path: FieldPath,
    },

    /// A member has the wrong shape (not an object, bad date literal, ...).
    #[error("{path}: {message}")]
    Shape {
        /// Location of the member.
        path: FieldPath,
        /// What was expected.
        message: String,
    },
}

impl ParseError {
    /// Re-root any carried path under `prefix`.
    pub fn under(self, prefix: &FieldPath) -> Self {
        match self {
            Self::UnknownVersion { axis, value, path } => Self::UnknownVersion {
                axis,
                value,
                path: path.prefixed(prefix),
            },
            Self::Shape { path, message } => Self::Shape {
                path: path.prefixed(prefix),
                message,
            },
            other => other,
        }
    }
}
