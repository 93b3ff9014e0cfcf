//! Encryption client: the application-facing entry point.
//!
//! The client pairs a backend with the configuration it was initialized
//! with. Every operation validates table and column names against that
//! configuration, keeps `null` plaintexts away from the backend, and
//! forwards the client's audit metadata with each call.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use crate::backend::{AuditMetadata, CryptoBackend, EncryptPayload};
use crate::encrypted::EncryptedValue;
use crate::engine;
use crate::error::{BackendError, Error};
use crate::format::SearchTerm;
use crate::query::QueryTerm;
use crate::schema::EncryptConfig;

/// Plaintext item of a bulk encryption, with an optional caller id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkPlaintext {
    /// Caller-defined identifier, returned unchanged
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Value to encrypt; `null` stays `null`
    pub plaintext: Value,
}

/// Result item of a bulk encryption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkEncrypted {
    /// Identifier of the matching input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Encrypted value, `None` for a `null` plaintext
    pub data: Option<EncryptedValue>,
}

/// Result item of a bulk decryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkDecrypted {
    /// Identifier of the matching input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Decrypted plaintext
    pub data: Value,
}

/// Application-facing client over a cryptographic backend.
///
/// # Example
///
/// ```rust,ignore
/// use sealdex::prelude::*;
///
/// let users = TableSchema::new("users").column(EncryptedColumn::new("email").equality());
/// let config = build_config([&users])?;
/// let client = EncryptionClient::new(backend, config);
///
/// let term = ScalarTerm::new("alice@example.com", "users", "email")
///     .with_index_type(IndexType::Unique);
/// let encrypted = client.encrypt_query(term).await?;
/// ```
pub struct EncryptionClient<B: CryptoBackend> {
    backend: Arc<B>,
    config: Arc<EncryptConfig>,
    metadata: Option<AuditMetadata>,
}

impl<B: CryptoBackend> EncryptionClient<B> {
    /// Creates a client.
    pub fn new(backend: B, config: EncryptConfig) -> Self {
        Self::from_shared(Arc::new(backend), Arc::new(config))
    }

    /// Creates a client over a shared backend and configuration.
    pub const fn from_shared(backend: Arc<B>, config: Arc<EncryptConfig>) -> Self {
        Self { backend, config, metadata: None }
    }

    /// Attaches audit metadata to every subsequent call.
    #[must_use]
    pub fn with_audit(mut self, metadata: AuditMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EncryptConfig {
        &self.config
    }

    /// Returns the backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Encrypts one value for storage. A `null` plaintext yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTable` / `Error::UnknownColumn` for columns
    /// missing from the configuration, or `Error::Backend` on backend failure.
    pub async fn encrypt(
        &self,
        plaintext: Value,
        table: &str,
        column: &str,
    ) -> Result<Option<EncryptedValue>, Error> {
        let item = BulkPlaintext { id: None, plaintext };
        let mut results = self.bulk_encrypt(vec![item], table, column).await?;
        Ok(results.pop().and_then(|r| r.data))
    }

    /// Encrypts many values of one column in a single backend call.
    ///
    /// `null` plaintexts are not sent and come back as `data: None` at their
    /// original position.
    ///
    /// # Errors
    ///
    /// See [`EncryptionClient::encrypt`].
    #[instrument(skip_all, fields(table = %table, column = %column, items = plaintexts.len()))]
    pub async fn bulk_encrypt(
        &self,
        plaintexts: Vec<BulkPlaintext>,
        table: &str,
        column: &str,
    ) -> Result<Vec<BulkEncrypted>, Error> {
        self.config.column(table, column)?;

        let payloads: Vec<EncryptPayload> = plaintexts
            .iter()
            .filter(|item| !item.plaintext.is_null())
            .map(|item| EncryptPayload {
                plaintext: item.plaintext.clone(),
                column: column.to_string(),
                table: table.to_string(),
            })
            .collect();

        let encrypted = if payloads.is_empty() {
            Vec::new()
        } else {
            let sent = payloads.len();
            debug!(items = sent, "dispatching bulk_encrypt");
            let encrypted = self.backend.bulk_encrypt(payloads, self.metadata.as_ref()).await?;
            expect_len(sent, encrypted.len())?;
            encrypted
        };

        let mut encrypted = encrypted.into_iter();
        Ok(plaintexts
            .into_iter()
            .map(|item| BulkEncrypted {
                data: if item.plaintext.is_null() { None } else { encrypted.next() },
                id: item.id,
            })
            .collect())
    }

    /// Decrypts one value.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` if decryption fails.
    pub async fn decrypt(&self, value: EncryptedValue) -> Result<Value, Error> {
        let item = BulkEncrypted { id: None, data: Some(value) };
        let mut results = self.bulk_decrypt(vec![item]).await?;
        Ok(results.pop().map_or(Value::Null, |r| r.data))
    }

    /// Decrypts many values in a single backend call.
    ///
    /// Items without data decrypt to `null` without reaching the backend.
    ///
    /// # Errors
    ///
    /// Returns `Error::Backend` if any item fails.
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn bulk_decrypt(&self, items: Vec<BulkEncrypted>) -> Result<Vec<BulkDecrypted>, Error> {
        let values: Vec<EncryptedValue> = items.iter().filter_map(|i| i.data.clone()).collect();

        let decrypted = if values.is_empty() {
            Vec::new()
        } else {
            let sent = values.len();
            debug!(items = sent, "dispatching bulk_decrypt");
            let decrypted = self.backend.bulk_decrypt(values, self.metadata.as_ref()).await?;
            expect_len(sent, decrypted.len())?;
            decrypted
        };

        let mut decrypted = decrypted.into_iter();
        Ok(items
            .into_iter()
            .map(|item| BulkDecrypted {
                data: if item.data.is_some() {
                    decrypted.next().unwrap_or(Value::Null)
                } else {
                    Value::Null
                },
                id: item.id,
            })
            .collect())
    }

    /// Encrypts a single query term.
    ///
    /// # Errors
    ///
    /// See [`engine::encrypt_query_terms`].
    pub async fn encrypt_query(&self, term: impl Into<QueryTerm>) -> Result<SearchTerm, Error> {
        engine::encrypt_query(&*self.backend, &self.config, term.into(), self.metadata.as_ref())
            .await
    }

    /// Encrypts a batch of query terms, preserving order.
    ///
    /// # Errors
    ///
    /// See [`engine::encrypt_query_terms`].
    pub async fn encrypt_query_terms(&self, terms: &[QueryTerm]) -> Result<Vec<SearchTerm>, Error> {
        engine::encrypt_query_terms(&*self.backend, &self.config, terms, self.metadata.as_ref())
            .await
    }
}

impl<B: CryptoBackend> Clone for EncryptionClient<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
            metadata: self.metadata.clone(),
        }
    }
}

fn expect_len(sent: usize, received: usize) -> Result<(), Error> {
    if sent == received {
        Ok(())
    } else {
        Err(Error::Backend(BackendError::new(format!(
            "backend returned {received} results for {sent} items"
        ))))
    }
}
