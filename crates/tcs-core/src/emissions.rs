//! # Emissions Figures
//!
//! A single already-quantified emissions figure in kgCO2e, optionally
//! annotated, and its Scope-2 variant which may also record how the figure
//! was accounted for.
//!
//! ## Invariants
//!
//! - The amount is finite and `>= 0`. Zero is a real figure ("explicitly
//!   nothing was emitted"), distinct from an absent entry ("not reported").

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ViolationKind};
use crate::path::FieldPath;

/// An emissions figure in kgCO2e.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Emissions {
    #[serde(rename = "emissions")]
    amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
}

impl Emissions {
    /// Create a figure of `amount` kgCO2e.
    ///
    /// # Errors
    ///
    /// Fails with [`ViolationKind::Negative`] for amounts below zero and
    /// [`ViolationKind::NonFinite`] for NaN or infinities. The error path
    /// is `emissions`, relative to the entry.
    pub fn new(amount: f64) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::new(
                FieldPath::of("emissions"),
                ViolationKind::NonFinite,
                format!("emissions must be a finite number, got {amount}"),
            ));
        }
        if amount < 0.0 {
            return Err(ValidationError::new(
                FieldPath::of("emissions"),
                ViolationKind::Negative,
                format!("emissions must be >= 0 kgCO2e, got {amount}"),
            ));
        }
        Ok(Self { amount, notes: None })
    }

    /// Attach free-text notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// The amount in kgCO2e.
    pub fn amount(&self) -> f64 {
        self.amount
    }

    /// Free-text notes, if any.
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }
}

/// How a Scope-2 figure was accounted for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountingMethod {
    /// Grid-average emission factors for the location of consumption.
    LocationBased,
    /// Factors from contractual instruments (PPAs, certificates).
    MarketBased,
    /// A mixture of location- and market-based figures.
    MixedMethods,
    /// Any other method; describe it in the notes.
    Other,
}

impl AccountingMethod {
    /// Every method, in wire order.
    pub const ALL: &'static [AccountingMethod] = &[
        Self::LocationBased,
        Self::MarketBased,
        Self::MixedMethods,
        Self::Other,
    ];

    /// The wire string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LocationBased => "location_based",
            Self::MarketBased => "market_based",
            Self::MixedMethods => "mixed_methods",
            Self::Other => "other",
        }
    }

    /// Parse a wire string.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|m| m.as_str() == s)
    }
}

impl std::fmt::Display for AccountingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A Scope-2 emissions figure: an [`Emissions`] plus an optional method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scope2Emissions {
    #[serde(flatten)]
    emissions: Emissions,
    #[serde(skip_serializing_if = "Option::is_none")]
    method: Option<AccountingMethod>,
}

impl Scope2Emissions {
    /// Wrap a figure with an optional accounting method.
    pub fn new(emissions: Emissions, method: Option<AccountingMethod>) -> Self {
        Self { emissions, method }
    }

    /// The underlying figure.
    pub fn emissions(&self) -> &Emissions {
        &self.emissions
    }

    /// The accounting method, if recorded.
    pub fn method(&self) -> Option<AccountingMethod> {
        self.method
    }
}

/// One entry in a category block.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CategoryEntry {
    /// A figure for a Scope-1 or Scope-3 source.
    Standard(Emissions),
    /// A figure for a Scope-2 source.
    Scope2(Scope2Emissions),
}

impl CategoryEntry {
    /// The underlying figure regardless of scope.
    pub fn emissions(&self) -> &Emissions {
        match self {
            Self::Standard(e) => e,
            Self::Scope2(s) => s.emissions(),
        }
    }

    /// The amount in kgCO2e.
    pub fn amount(&self) -> f64 {
        self.emissions().amount()
    }

    /// The accounting method; always `None` for standard entries.
    pub fn method(&self) -> Option<AccountingMethod> {
        match self {
            Self::Standard(_) => None,
            Self::Scope2(s) => s.method(),
        }
    }
}

impl From<Emissions> for CategoryEntry {
    fn from(e: Emissions) -> Self {
        Self::Standard(e)
    }
}

impl From<Scope2Emissions> for CategoryEntry {
    fn from(s: Scope2Emissions) -> Self {
        Self::Scope2(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_is_allowed() {
        assert_eq!(Emissions::new(0.0).unwrap().amount(), 0.0);
    }

    #[test]
    fn test_negative_rejected_with_path() {
        let err = Emissions::new(-0.5).unwrap_err();
        assert_eq!(err.kind, ViolationKind::Negative);
        assert_eq!(err.path.to_string(), "emissions");
    }

    #[test]
    fn test_non_finite_rejected() {
        assert_eq!(Emissions::new(f64::NAN).unwrap_err().kind, ViolationKind::NonFinite);
        assert_eq!(
            Emissions::new(f64::INFINITY).unwrap_err().kind,
            ViolationKind::NonFinite
        );
    }

    #[test]
    fn test_serialize_omits_absent_notes() {
        let e = Emissions::new(12.5).unwrap();
        assert_eq!(serde_json::to_value(&e).unwrap(), serde_json::json!({"emissions": 12.5}));
        let e = e.with_notes("metered");
        assert_eq!(
            serde_json::to_value(&e).unwrap(),
            serde_json::json!({"emissions": 12.5, "notes": "metered"})
        );
    }

    #[test]
    fn test_scope2_serializes_flat() {
        let s = Scope2Emissions::new(
            Emissions::new(3.0).unwrap(),
            Some(AccountingMethod::MarketBased),
        );
        let entry = CategoryEntry::from(s);
        assert_eq!(
            serde_json::to_value(&entry).unwrap(),
            serde_json::json!({"emissions": 3.0, "method": "market_based"})
        );
    }

    #[test]
    fn test_method_wire_strings() {
        for m in AccountingMethod::ALL {
            assert_eq!(AccountingMethod::from_wire(m.as_str()), Some(*m));
        }
        assert_eq!(AccountingMethod::from_wire("guesswork"), None);
    }
}
