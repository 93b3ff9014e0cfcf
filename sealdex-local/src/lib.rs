//! In-process cryptographic backend for Sealdex.
//!
//! Implements [`CryptoBackend`] with envelope AEAD encryption and keyed index
//! terms, so the whole query-term pipeline runs without an external key
//! service. Suitable for development and testing; the order index leaks
//! plaintext order by construction.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealdex::prelude::*;
//! use sealdex_local::{LocalBackend, StaticKeyProvider};
//!
//! let config = build_config([&users])?;
//! let backend = LocalBackend::new(config.clone(), StaticKeyProvider::generate("kek_v1"));
//! let client = EncryptionClient::new(backend, config);
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod blind_index;
pub mod bloom;
pub mod context;
pub mod error;
pub mod header;
pub mod kdf;
pub mod key_provider;
pub mod ore;
pub mod ste_vec;
pub mod vault;

use std::collections::hash_map::{Entry, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sealdex::backend::{AuditMetadata, CryptoBackend, EncryptPayload, QueryPayload};
use sealdex::encrypted::{ArtifactKind, EncryptedValue};
use sealdex::error::BackendError;
use sealdex::query::{IndexType, QueryOp};
use sealdex::schema::{ColumnConfig, DataType, EncryptConfig, SteVecIndex};
use secrecy::SecretVec;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::blind_index::{canonical_text, BlindIndexer};
use crate::bloom::{tokenize, tokenize_query, BloomFilter};
use crate::context::{ColumnScope, IndexContext};
pub use crate::error::{Error, KeyProviderError};
pub use crate::key_provider::{KeyProvider, StaticKeyProvider};
use crate::ore::OreEncoder;
use crate::ste_vec::SteVecEncoder;
pub use crate::vault::CipherMode;
use crate::vault::Vault;

/// Local implementation of the cryptographic backend.
pub struct LocalBackend<P: KeyProvider> {
    config: Arc<EncryptConfig>,
    provider: Arc<P>,
    vault: Vault<P>,
    tenant_id: Option<String>,
}

impl<P: KeyProvider> LocalBackend<P> {
    /// Creates a backend for a configuration.
    pub fn new(config: EncryptConfig, provider: P) -> Self {
        let provider = Arc::new(provider);
        Self {
            config: Arc::new(config),
            vault: Vault::from_shared(Arc::clone(&provider), CipherMode::default()),
            provider,
            tenant_id: None,
        }
    }

    /// Selects the AEAD cipher for new ciphertexts.
    #[must_use]
    pub fn with_cipher_mode(mut self, cipher_mode: CipherMode) -> Self {
        self.vault = Vault::from_shared(Arc::clone(&self.provider), cipher_mode);
        self
    }

    /// Scopes every key and ciphertext to a tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &EncryptConfig {
        &self.config
    }

    fn scope(&self, table: &str, column: &str) -> ColumnScope {
        let scope = ColumnScope::new(table, column);
        match &self.tenant_id {
            Some(tenant) => scope.with_tenant(tenant.clone()),
            None => scope,
        }
    }

    fn index_keys(&self) -> Result<IndexKeys, Error> {
        Ok(IndexKeys { root: self.provider.index_root_key()?, cache: HashMap::new() })
    }

    fn encrypt_batch(&self, items: &[EncryptPayload]) -> Result<Vec<EncryptedValue>, Error> {
        let mut keys = self.index_keys()?;
        items.iter().map(|item| self.encrypt_one(item, &mut keys)).collect()
    }

    fn encrypt_one(
        &self,
        item: &EncryptPayload,
        keys: &mut IndexKeys,
    ) -> Result<EncryptedValue, Error> {
        let column = self.config.column(&item.table, &item.column)?;
        check_plaintext(&item.plaintext, column.cast_as, &item.table, &item.column)?;

        let scope = self.scope(&item.table, &item.column);
        let context = scope.encryption();
        let sealed = self.vault.encrypt(&item.plaintext, column.cast_as, &context)?;

        let mut value = EncryptedValue::new(&item.table, &item.column, ArtifactKind::Ciphertext);
        value.ciphertext = Some(STANDARD.encode(sealed));

        let indexes = &column.indexes;
        if let Some(unique) = &indexes.unique {
            let indexer = keys.indexer(scope.index(IndexType::Unique))?;
            value.unique = Some(indexer.unique(&item.plaintext, &unique.token_filters)?);
        }
        if indexes.ore.is_some() {
            let encoder = OreEncoder::derive(keys.indexer(scope.index(IndexType::Ore))?)?;
            value.ore = encoder.encode(&item.plaintext, column.cast_as);
        }
        if let Some(options) = &indexes.match_index {
            let indexer = keys.indexer(scope.index(IndexType::Match))?;
            let tokens = tokenize(&canonical_text(&item.plaintext), options);
            value.bloom = Some(BloomFilter::new(indexer, options).bits(tokens)?);
        }
        if let Some(ste_vec) = &indexes.ste_vec {
            let prefix = prefix(ste_vec, &item.table, &item.column);
            let encoder = SteVecEncoder::new(keys.indexer(scope.index(IndexType::SteVec))?, &prefix);
            let entries = encoder.document(&item.plaintext, |leaf| {
                let sealed = self.vault.encrypt(leaf, DataType::Json, &context)?;
                Ok(STANDARD.encode(sealed))
            })?;
            value.kind = ArtifactKind::SteVec;
            value.ste_vec = Some(entries);
        }

        trace!(table = %item.table, column = %item.column, "encrypted value");
        Ok(value)
    }

    fn query_batch(&self, items: &[QueryPayload]) -> Result<Vec<EncryptedValue>, Error> {
        let mut keys = self.index_keys()?;
        items.iter().map(|item| self.query_one(item, &mut keys)).collect()
    }

    fn query_one(&self, item: &QueryPayload, keys: &mut IndexKeys) -> Result<EncryptedValue, Error> {
        let column = self.config.column(&item.table, &item.column)?;
        let scope = self.scope(&item.table, &item.column);
        let not_configured = || Error::IndexNotConfigured {
            table: item.table.clone(),
            column: item.column.clone(),
            index: item.index_type,
        };

        let mut value = EncryptedValue::new(&item.table, &item.column, ArtifactKind::Ciphertext);
        match item.index_type {
            IndexType::Unique => {
                let unique = column.indexes.unique.as_ref().ok_or_else(not_configured)?;
                check_plaintext(&item.plaintext, column.cast_as, &item.table, &item.column)?;
                let indexer = keys.indexer(scope.index(IndexType::Unique))?;
                value.unique = Some(indexer.unique(&item.plaintext, &unique.token_filters)?);
            }
            IndexType::Ore => {
                column.indexes.ore.as_ref().ok_or_else(not_configured)?;
                check_plaintext(&item.plaintext, column.cast_as, &item.table, &item.column)?;
                let encoder = OreEncoder::derive(keys.indexer(scope.index(IndexType::Ore))?)?;
                let blocks = encoder
                    .encode(&item.plaintext, column.cast_as)
                    .ok_or_else(|| invalid_plaintext(column, &item.table, &item.column))?;
                value.ore = Some(blocks);
            }
            IndexType::Match => {
                let options = column.indexes.match_index.as_ref().ok_or_else(not_configured)?;
                let indexer = keys.indexer(scope.index(IndexType::Match))?;
                let tokens = tokenize_query(&canonical_text(&item.plaintext), options);
                value.bloom = Some(BloomFilter::new(indexer, options).bits(tokens)?);
            }
            IndexType::SteVec => {
                let ste_vec = column.indexes.ste_vec.as_ref().ok_or_else(not_configured)?;
                let prefix = prefix(ste_vec, &item.table, &item.column);
                let encoder =
                    SteVecEncoder::new(keys.indexer(scope.index(IndexType::SteVec))?, &prefix);
                match item.query_op {
                    QueryOp::Selector => {
                        let selector = item.plaintext.as_str().ok_or_else(|| {
                            Error::InvalidPlaintext {
                                table: item.table.clone(),
                                column: item.column.clone(),
                                expected: DataType::String,
                            }
                        })?;
                        value.kind = ArtifactKind::Selector;
                        value.selector = Some(encoder.selector(selector)?);
                    }
                    QueryOp::Default => {
                        value.kind = ArtifactKind::SteVec;
                        value.ste_vec = Some(encoder.query(&item.plaintext)?);
                    }
                }
            }
        }

        Ok(value)
    }

    fn decrypt_batch(&self, items: &[EncryptedValue]) -> Result<Vec<Value>, Error> {
        items
            .iter()
            .map(|item| {
                let encoded = item.ciphertext.as_deref().ok_or_else(|| Error::MissingCiphertext {
                    table: item.table().to_string(),
                    column: item.column().to_string(),
                })?;
                let sealed = STANDARD.decode(encoded).map_err(|e| Error::Encoding(e.to_string()))?;
                let context = self.scope(item.table(), item.column()).encryption();
                self.vault.decrypt(&sealed, &context)
            })
            .collect()
    }
}

#[async_trait]
impl<P: KeyProvider> CryptoBackend for LocalBackend<P> {
    async fn bulk_encrypt(
        &self,
        items: Vec<EncryptPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError> {
        debug!(items = items.len(), audited = metadata.is_some(), "local bulk_encrypt");
        self.encrypt_batch(&items).map_err(report)
    }

    async fn bulk_encrypt_query(
        &self,
        items: Vec<QueryPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError> {
        debug!(items = items.len(), audited = metadata.is_some(), "local bulk_encrypt_query");
        self.query_batch(&items).map_err(report)
    }

    async fn bulk_decrypt(
        &self,
        items: Vec<EncryptedValue>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<Value>, BackendError> {
        debug!(items = items.len(), audited = metadata.is_some(), "local bulk_decrypt");
        self.decrypt_batch(&items).map_err(report)
    }
}

/// Index keys derived for one batch, one per (column, index type).
struct IndexKeys {
    root: SecretVec<u8>,
    cache: HashMap<IndexContext, BlindIndexer>,
}

impl IndexKeys {
    fn indexer(&mut self, context: IndexContext) -> Result<&BlindIndexer, Error> {
        match self.cache.entry(context) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let indexer = BlindIndexer::derive(&self.root, entry.key())?;
                Ok(entry.insert(indexer))
            }
        }
    }
}

fn prefix(index: &SteVecIndex, table: &str, column: &str) -> String {
    index.prefix.clone().unwrap_or_else(|| format!("{table}/{column}"))
}

fn report(err: Error) -> BackendError {
    warn!(code = err.code(), error = %err, "local backend batch failed");
    err.into()
}

fn invalid_plaintext(column: &ColumnConfig, table: &str, name: &str) -> Error {
    Error::InvalidPlaintext {
        table: table.to_string(),
        column: name.to_string(),
        expected: column.cast_as,
    }
}

fn check_plaintext(value: &Value, cast_as: DataType, table: &str, column: &str) -> Result<(), Error> {
    let valid = match cast_as {
        DataType::String | DataType::Timestamp => value.is_string(),
        DataType::Integer => value.is_i64(),
        DataType::Number => value.is_number(),
        DataType::Boolean => value.is_boolean(),
        DataType::Json => true,
    };
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidPlaintext {
            table: table.to_string(),
            column: column.to_string(),
            expected: cast_as,
        })
    }
}
