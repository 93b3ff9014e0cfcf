//! Key provider abstraction and an in-memory implementation.

use std::collections::HashMap;

use chacha20poly1305::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng, Payload},
    ChaCha20Poly1305, Nonce,
};
use secrecy::{ExposeSecret, SecretVec};

use crate::error::KeyProviderError;
use crate::kdf::generate_dek;

const WRAP_NONCE_SIZE: usize = 12;

/// Supplies the keys the local backend encrypts and indexes with.
///
/// Implementations must be thread-safe (`Send + Sync`) to support
/// concurrent batches.
pub trait KeyProvider: Send + Sync {
    /// Returns the identifier of the KEK new DEKs are wrapped with.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::NoActiveKek` if no KEK is configured.
    fn current_kek_id(&self) -> Result<String, KeyProviderError>;

    /// Wraps (encrypts) a Data Encryption Key (DEK) with the specified KEK.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::WrapFailed` if wrapping fails.
    fn wrap_dek(&self, kek_id: &str, dek: &[u8]) -> Result<Vec<u8>, KeyProviderError>;

    /// Unwraps (decrypts) a Data Encryption Key (DEK) using the specified KEK.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::UnwrapFailed` if unwrapping fails.
    fn unwrap_dek(
        &self,
        kek_id: &str,
        wrapped_dek: &[u8],
    ) -> Result<SecretVec<u8>, KeyProviderError>;

    /// Returns the root key every index key is derived from.
    ///
    /// # Errors
    ///
    /// Returns `KeyProviderError::IndexKeyUnavailable` if the key cannot be read.
    fn index_root_key(&self) -> Result<SecretVec<u8>, KeyProviderError>;
}

/// Key provider holding its keys in memory.
///
/// DEKs are wrapped with ChaCha20-Poly1305 under the KEK, with the KEK id as
/// associated data. Suitable for development and tests; production setups
/// plug in a provider backed by a key management service.
///
/// # Example
///
/// ```
/// use sealdex_local::key_provider::{KeyProvider, StaticKeyProvider};
///
/// let provider = StaticKeyProvider::generate("kek_v1");
/// assert_eq!(provider.current_kek_id().unwrap(), "kek_v1");
/// ```
pub struct StaticKeyProvider {
    keks: HashMap<String, SecretVec<u8>>,
    current: String,
    index_root: SecretVec<u8>,
}

impl StaticKeyProvider {
    /// Creates a provider from explicit key material.
    #[must_use]
    pub fn new(kek_id: impl Into<String>, kek: [u8; 32], index_root: [u8; 32]) -> Self {
        let current = kek_id.into();
        let mut keks = HashMap::new();
        keks.insert(current.clone(), SecretVec::new(kek.to_vec()));
        Self { keks, current, index_root: SecretVec::new(index_root.to_vec()) }
    }

    /// Creates a provider with random keys.
    #[must_use]
    pub fn generate(kek_id: impl Into<String>) -> Self {
        let current = kek_id.into();
        let mut keks = HashMap::new();
        keks.insert(current.clone(), generate_dek());
        Self { keks, current, index_root: generate_dek() }
    }

    /// Adds a KEK and makes it current. Older KEKs stay available for unwrapping.
    #[must_use]
    pub fn rotate(mut self, kek_id: impl Into<String>, kek: [u8; 32]) -> Self {
        let kek_id = kek_id.into();
        self.keks.insert(kek_id.clone(), SecretVec::new(kek.to_vec()));
        self.current = kek_id;
        self
    }

    fn cipher(&self, kek_id: &str) -> Result<ChaCha20Poly1305, KeyProviderError> {
        let kek =
            self.keks.get(kek_id).ok_or_else(|| KeyProviderError::KekNotFound(kek_id.to_string()))?;
        ChaCha20Poly1305::new_from_slice(kek.expose_secret())
            .map_err(|e| KeyProviderError::WrapFailed(format!("invalid KEK: {e}")))
    }
}

impl KeyProvider for StaticKeyProvider {
    fn current_kek_id(&self) -> Result<String, KeyProviderError> {
        if self.keks.contains_key(&self.current) {
            Ok(self.current.clone())
        } else {
            Err(KeyProviderError::NoActiveKek)
        }
    }

    fn wrap_dek(&self, kek_id: &str, dek: &[u8]) -> Result<Vec<u8>, KeyProviderError> {
        let cipher = self.cipher(kek_id)?;

        let mut nonce_bytes = [0u8; WRAP_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let sealed = cipher
            .encrypt(&Nonce::from(nonce_bytes), Payload { msg: dek, aad: kek_id.as_bytes() })
            .map_err(|e| KeyProviderError::WrapFailed(e.to_string()))?;

        let mut wrapped = Vec::with_capacity(WRAP_NONCE_SIZE + sealed.len());
        wrapped.extend_from_slice(&nonce_bytes);
        wrapped.extend_from_slice(&sealed);
        Ok(wrapped)
    }

    fn unwrap_dek(
        &self,
        kek_id: &str,
        wrapped_dek: &[u8],
    ) -> Result<SecretVec<u8>, KeyProviderError> {
        if wrapped_dek.len() <= WRAP_NONCE_SIZE {
            return Err(KeyProviderError::UnwrapFailed("wrapped DEK truncated".to_string()));
        }
        let (nonce, sealed) = wrapped_dek.split_at(WRAP_NONCE_SIZE);
        let cipher = self.cipher(kek_id)?;

        let dek = cipher
            .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad: kek_id.as_bytes() })
            .map_err(|_| KeyProviderError::UnwrapFailed(format!("authentication failed for {kek_id}")))?;

        Ok(SecretVec::new(dek))
    }

    fn index_root_key(&self) -> Result<SecretVec<u8>, KeyProviderError> {
        Ok(SecretVec::new(self.index_root.expose_secret().clone()))
    }
}
