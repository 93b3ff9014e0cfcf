//! Keyed HMAC terms for equality, selectors and structural vectors.
//!
//! An indexer holds one derived key per (column, index type). Terms are
//! `HMAC-SHA256(key, input)[..16]`, hex encoded, so equal inputs under the
//! same key always produce the same term.

use hmac::{Hmac, Mac};
use sealdex::schema::TokenFilter;
use secrecy::{ExposeSecret, SecretVec};
use serde_json::Value;
use sha2::Sha256;

use crate::context::IndexContext;
use crate::error::Error;
use crate::kdf::derive_index_key;

type HmacSha256 = Hmac<Sha256>;

/// Standard blind index output size (16 bytes).
pub const BLIND_INDEX_SIZE: usize = 16;

/// HMAC keyed with one index's derived key.
pub struct BlindIndexer {
    key: SecretVec<u8>,
}

impl BlindIndexer {
    /// Derives the indexer for an index context.
    ///
    /// # Errors
    ///
    /// Returns `Error::KeyDerivation` if the key cannot be derived.
    pub fn derive(root: &SecretVec<u8>, context: &IndexContext) -> Result<Self, Error> {
        Ok(Self { key: derive_index_key(root, context)? })
    }

    /// Raw 16-byte MAC over the given parts.
    ///
    /// Parts are length-prefixed so `["ab", "c"]` and `["a", "bc"]` differ.
    ///
    /// # Errors
    ///
    /// Returns `Error::IndexGenerationFailed` if the key is rejected.
    pub fn mac(&self, parts: &[&[u8]]) -> Result<[u8; BLIND_INDEX_SIZE], Error> {
        let mut mac = HmacSha256::new_from_slice(self.key.expose_secret())
            .map_err(|e| Error::IndexGenerationFailed(format!("Invalid index key: {e}")))?;
        for part in parts {
            mac.update(&(part.len() as u64).to_be_bytes());
            mac.update(part);
        }

        let bytes = mac.finalize().into_bytes();
        let mut out = [0u8; BLIND_INDEX_SIZE];
        out.copy_from_slice(&bytes[..BLIND_INDEX_SIZE]);
        Ok(out)
    }

    /// Hex-encoded term over the given parts.
    ///
    /// # Errors
    ///
    /// See [`BlindIndexer::mac`].
    pub fn term(&self, parts: &[&[u8]]) -> Result<String, Error> {
        self.mac(parts).map(hex::encode)
    }

    /// Equality term of a plaintext after applying token filters.
    ///
    /// # Errors
    ///
    /// See [`BlindIndexer::mac`].
    pub fn unique(&self, plaintext: &Value, filters: &[TokenFilter]) -> Result<String, Error> {
        let canonical = canonical_text(plaintext);
        let filtered = filters.iter().fold(canonical, |text, filter| filter.apply(&text));
        self.term(&[filtered.as_bytes()])
    }

    /// Selector term, scoped by the column's structured-json prefix.
    ///
    /// # Errors
    ///
    /// See [`BlindIndexer::mac`].
    pub fn selector(&self, prefix: &str, selector: &str) -> Result<String, Error> {
        self.term(&[prefix.as_bytes(), selector.as_bytes()])
    }

    /// Term of a JSON leaf value inside a structural vector.
    ///
    /// # Errors
    ///
    /// See [`BlindIndexer::mac`].
    pub fn leaf(&self, prefix: &str, leaf: &Value) -> Result<String, Error> {
        self.term(&[prefix.as_bytes(), leaf.to_string().as_bytes()])
    }
}

/// Text form of a scalar: strings unquoted, everything else as JSON.
#[must_use]
pub fn canonical_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
