//! # Reporting Organisation
//!
//! The organisation a document reports for. Which optional members are
//! allowed depends on the root `schema_version`; that check lives in
//! [`Organisation::check_version`] and is run by [`crate::Document::new`].

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::error::{ValidationError, ViolationKind};
use crate::path::FieldPath;
use crate::version::OrganisationVersion;

/// ISO 3166-1 alpha-2 country code, e.g. `GB`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct CountryCode(String);

impl CountryCode {
    /// Accepts exactly two ASCII uppercase letters.
    pub fn new(code: &str) -> Result<Self, ValidationError> {
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_uppercase()) {
            return Ok(Self(code.to_string()));
        }
        Err(ValidationError::new(
            FieldPath::of("country"),
            ViolationKind::Malformed,
            format!("country must be an ISO 3166-1 alpha-2 code, got {code:?}"),
        ))
    }

    /// The two-letter code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The reporting organisation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Organisation {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    open_corporates_url: Option<Url>,
    #[serde(skip_serializing_if = "Option::is_none")]
    country: Option<CountryCode>,
}

impl Organisation {
    /// An organisation with only a name.
    ///
    /// # Errors
    ///
    /// [`ViolationKind::Required`] if `name` is empty or whitespace.
    pub fn new(name: impl Into<String>) -> Result<Self, ValidationError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(ValidationError::new(
                FieldPath::of("name"),
                ViolationKind::Required,
                "organisation name must not be empty",
            ));
        }
        Ok(Self {
            name,
            description: None,
            open_corporates_url: None,
            country: None,
        })
    }

    /// Attach a free-text description. Needs organisation schema `0.1.0`.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Attach an OpenCorporates registry link.
    ///
    /// # Errors
    ///
    /// [`ViolationKind::Malformed`] if `url` does not parse.
    pub fn with_open_corporates_url(mut self, url: &str) -> Result<Self, ValidationError> {
        let parsed = Url::parse(url).map_err(|e| {
            ValidationError::new(
                FieldPath::of("open_corporates_url"),
                ViolationKind::Malformed,
                format!("invalid URL {url:?}: {e}"),
            )
        })?;
        self.open_corporates_url = Some(parsed);
        Ok(self)
    }

    /// Attach the country of registration. Needs organisation schema `0.1.2`.
    pub fn with_country(mut self, country: CountryCode) -> Self {
        self.country = Some(country);
        self
    }

    /// The legal or trading name; never blank.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-text description, if given.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// OpenCorporates register entry, if given.
    pub fn open_corporates_url(&self) -> Option<&Url> {
        self.open_corporates_url.as_ref()
    }

    /// ISO 3166-1 alpha-2 country of registration, if given.
    pub fn country(&self) -> Option<&CountryCode> {
        self.country.as_ref()
    }

    /// Reject members the organisation schema `version` does not define.
    /// Paths are relative to the organisation object.
    pub fn check_version(&self, version: OrganisationVersion) -> Result<(), ValidationError> {
        let gated: [(&str, bool, OrganisationVersion); 3] = [
            ("description", self.description.is_some(), OrganisationVersion::V0_1_0),
            (
                "open_corporates_url",
                self.open_corporates_url.is_some(),
                OrganisationVersion::V0_1_1,
            ),
            ("country", self.country.is_some(), OrganisationVersion::V0_1_2),
        ];
        for (field, present, since) in gated {
            if present && version < since {
                return Err(ValidationError::new(
                    FieldPath::of(field),
                    ViolationKind::NotInVersion,
                    format!("{field} requires reporting organisation schema {since} or later, document declares {version}"),
                ));
            }
        }
        Ok(())
    }
}
