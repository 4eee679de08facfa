//! CEP normalization.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical Brazilian postal code: exactly 8 ASCII digits.
///
/// Built through [`Cep::parse`], which strips every non-digit character
/// from the raw input. Input that does not leave exactly 8 digits has no
/// `Cep` representation and is excluded from resolution.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cep(String);

impl Cep {
    /// Normalize a raw postal-code string.
    ///
    /// Returns `None` when stripping non-digits does not leave exactly
    /// 8 digits. Malformed input is a normal, expected outcome, not an
    /// error.
    pub fn parse(raw: &str) -> Option<Self> {
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() == 8 {
            Some(Self(digits))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored key that is not already in canonical 8-digit form.
#[derive(Debug, Error)]
#[error("not a canonical 8-digit CEP: {0:?}")]
pub struct InvalidCep(String);

// Deserialization accepts only canonical keys. Cache keys are written in
// canonical form, so anything else means the store was edited or damaged.
impl TryFrom<String> for Cep {
    type Error = InvalidCep;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() == 8 && value.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(value))
        } else {
            Err(InvalidCep(value))
        }
    }
}

impl From<Cep> for String {
    fn from(cep: Cep) -> Self {
        cep.0
    }
}
