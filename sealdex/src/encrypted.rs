//! Encrypted values as produced by the cryptographic backend.
//!
//! Wire format (absent fields are omitted):
//!
//! ```text
//! {"i": {"t": table, "c": column}, "v": 2, "k": "ct" | "sv" | "s",
//!  "c": ciphertext, "hm": unique term, "ob": [order blocks], "bf": [bloom bits],
//!  "s": selector, "sv": [{"s": selector, "t": term, "c": ciphertext}]}
//! ```

use serde::{Deserialize, Serialize};

/// Version written into every encrypted value.
pub const ENCRYPTED_VALUE_VERSION: u32 = 2;

/// Origin of an encrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Identifier {
    /// Table name
    #[serde(rename = "t")]
    pub table: String,
    /// Column path
    #[serde(rename = "c")]
    pub column: String,
}

/// Which cryptographic artifact a value carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Ciphertext, optionally with scalar index terms
    #[serde(rename = "ct")]
    Ciphertext,
    /// Structural vector of a JSON document or containment query
    #[serde(rename = "sv")]
    SteVec,
    /// Encrypted JSON-Path selector
    #[serde(rename = "s")]
    Selector,
}

/// One entry of a structural vector.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SteVecEntry {
    /// Encrypted selector of the node
    #[serde(rename = "s")]
    pub selector: String,
    /// Encrypted term of a leaf value
    #[serde(rename = "t", default, skip_serializing_if = "Option::is_none")]
    pub term: Option<String>,
    /// Ciphertext of a leaf value (stored documents only)
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
}

/// A value returned by the backend's encryption primitives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    /// Origin table and column
    #[serde(rename = "i")]
    pub identifier: Identifier,
    /// Format version
    #[serde(rename = "v")]
    pub version: u32,
    /// Artifact kind
    #[serde(rename = "k")]
    pub kind: ArtifactKind,
    /// Ciphertext
    #[serde(rename = "c", default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
    /// Equality term
    #[serde(rename = "hm", default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<String>,
    /// Order-and-range blocks
    #[serde(rename = "ob", default, skip_serializing_if = "Option::is_none")]
    pub ore: Option<Vec<String>>,
    /// Bloom filter bit positions
    #[serde(rename = "bf", default, skip_serializing_if = "Option::is_none")]
    pub bloom: Option<Vec<u32>>,
    /// Selector
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    /// Structural vector
    #[serde(rename = "sv", default, skip_serializing_if = "Option::is_none")]
    pub ste_vec: Option<Vec<SteVecEntry>>,
}

impl EncryptedValue {
    /// Creates an empty value of the given kind for a table column.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            identifier: Identifier { table: table.into(), column: column.into() },
            version: ENCRYPTED_VALUE_VERSION,
            kind,
            ciphertext: None,
            unique: None,
            ore: None,
            bloom: None,
            selector: None,
            ste_vec: None,
        }
    }

    /// Returns the table this value belongs to.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.identifier.table
    }

    /// Returns the column this value belongs to.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.identifier.column
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_keys() {
        let mut value = EncryptedValue::new("users", "email", ArtifactKind::Ciphertext);
        value.ciphertext = Some("abc".into());
        value.unique = Some("00ff".into());

        assert_eq!(
            serde_json::to_value(&value).unwrap(),
            json!({"i": {"t": "users", "c": "email"}, "v": 2, "k": "ct", "c": "abc", "hm": "00ff"})
        );
    }

    #[test]
    fn test_ste_vec_entry_omits_missing_parts() {
        let entry = SteVecEntry { selector: "aa".into(), term: None, ciphertext: None };
        assert_eq!(serde_json::to_value(&entry).unwrap(), json!({"s": "aa"}));
    }

    #[test]
    fn test_parse_selector_value() {
        let value: EncryptedValue = serde_json::from_value(json!({
            "i": {"t": "users", "c": "profile"}, "v": 2, "k": "s", "s": "1234"
        }))
        .unwrap();

        assert_eq!(value.kind, ArtifactKind::Selector);
        assert_eq!(value.selector.as_deref(), Some("1234"));
        assert_eq!(value.column(), "profile");
    }
}
