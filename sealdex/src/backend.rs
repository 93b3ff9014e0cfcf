//! Boundary to the cryptographic backend.
//!
//! The backend owns keys and primitives. Sealdex only ever calls it in bulk:
//! every method takes a whole list of items so key derivation and other
//! setup can be amortized across the batch. Implementations must return one
//! result per item, in item order.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::encrypted::EncryptedValue;
use crate::error::BackendError;
use crate::query::{IndexType, QueryOp};

/// Item for [`CryptoBackend::bulk_encrypt`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptPayload {
    /// Plaintext, never `null`
    pub plaintext: Value,
    /// Column path
    pub column: String,
    /// Table name
    pub table: String,
}

/// Item for [`CryptoBackend::bulk_encrypt_query`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryPayload {
    /// Plaintext, selector string or JSON document, never `null`
    pub plaintext: Value,
    /// Column path
    pub column: String,
    /// Table name
    pub table: String,
    /// Index the query targets
    pub index_type: IndexType,
    /// Operation within the index
    pub query_op: QueryOp,
}

/// Caller-supplied metadata forwarded to the backend for auditing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditMetadata(Map<String, Value>);

impl AuditMetadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the entries.
    #[must_use]
    pub const fn entries(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for AuditMetadata {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Bulk cryptographic primitives the engine depends on.
///
/// Implementations must be thread-safe (`Send + Sync`).
#[async_trait]
pub trait CryptoBackend: Send + Sync {
    /// Encrypts values for storage, indexing each according to its column
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if any item fails; no partial results.
    async fn bulk_encrypt(
        &self,
        items: Vec<EncryptPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError>;

    /// Encrypts query terms for an explicit index type and operation.
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if any item fails; no partial results.
    async fn bulk_encrypt_query(
        &self,
        items: Vec<QueryPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError>;

    /// Decrypts values produced by [`CryptoBackend::bulk_encrypt`].
    ///
    /// # Errors
    ///
    /// Returns a `BackendError` if any item fails; no partial results.
    async fn bulk_decrypt(
        &self,
        items: Vec<EncryptedValue>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<Value>, BackendError>;
}
