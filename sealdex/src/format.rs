//! Output shapes for encrypted search terms.
//!
//! A scalar term can ask for its result as the structured value (default), as
//! a composite literal that drops straight into a relational query, or as an
//! escaped composite literal for embedding inside another JSON document.
//!
//! ```text
//! composite literal:          ("{\"i\":{...},\"v\":2,...}")
//! escaped composite literal:  "(\"{\\\"i\\\":{...},...}\")"
//! ```

use serde::{Deserialize, Serialize};

use crate::encrypted::EncryptedValue;
use crate::error::Error;

/// Requested output shape of a scalar term.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnType {
    /// Structured encrypted value
    #[default]
    #[serde(rename = "eql")]
    Eql,
    /// `(` + JSON string of the JSON encoding + `)`
    #[serde(rename = "composite-literal")]
    CompositeLiteral,
    /// Composite literal encoded once more as a JSON string
    #[serde(rename = "escaped-composite-literal")]
    EscapedCompositeLiteral,
}

/// One result of a query-term batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SearchTerm {
    /// The term's value was `null`
    Null,
    /// Structured encrypted value
    Encrypted(EncryptedValue),
    /// Composite literal or its escaped form
    Literal(String),
}

impl SearchTerm {
    /// Returns `true` for [`SearchTerm::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns the structured value, if this is one.
    #[must_use]
    pub const fn as_encrypted(&self) -> Option<&EncryptedValue> {
        match self {
            Self::Encrypted(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the literal string, if this is one.
    #[must_use]
    pub fn as_literal(&self) -> Option<&str> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }
}

/// Encodes a value as a composite literal: `("<json>")`.
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be encoded.
pub fn to_composite_literal(value: &EncryptedValue) -> Result<String, Error> {
    let json = serde_json::to_string(value)?;
    let quoted = serde_json::to_string(&json)?;
    Ok(format!("({quoted})"))
}

/// Encodes a value as a composite literal wrapped in one more JSON string.
///
/// # Errors
///
/// Returns `Error::Serialization` if the value cannot be encoded.
pub fn to_escaped_composite_literal(value: &EncryptedValue) -> Result<String, Error> {
    Ok(serde_json::to_string(&to_composite_literal(value)?)?)
}

/// Shapes an encrypted value according to the requested return type.
///
/// # Errors
///
/// Returns `Error::Serialization` if a literal cannot be encoded.
pub fn format_search_term(
    value: EncryptedValue,
    return_type: ReturnType,
) -> Result<SearchTerm, Error> {
    match return_type {
        ReturnType::Eql => Ok(SearchTerm::Encrypted(value)),
        ReturnType::CompositeLiteral => to_composite_literal(&value).map(SearchTerm::Literal),
        ReturnType::EscapedCompositeLiteral => {
            to_escaped_composite_literal(&value).map(SearchTerm::Literal)
        }
    }
}
