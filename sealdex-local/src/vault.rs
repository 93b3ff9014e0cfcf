//! Envelope encryption of JSON plaintexts.
//!
//! Every value is sealed under a fresh DEK, which is wrapped with the
//! provider's current KEK and stored in the ciphertext header.

use std::sync::Arc;

use sealdex::schema::DataType;
use secrecy::ExposeSecret;
use serde_json::Value;
use zeroize::Zeroizing;

use crate::context::EncryptionContext;
use crate::error::Error;
use crate::header::{EncryptionHeader, HeaderFlags};
use crate::kdf::generate_dek;
use crate::key_provider::KeyProvider;

/// Nonce size shared by both AEAD ciphers (96 bits).
const NONCE_SIZE: usize = 12;

/// AEAD cipher used for new ciphertexts.
///
/// Decryption reads the cipher from the header, so values sealed under either
/// mode stay readable after switching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CipherMode {
    /// ChaCha20-Poly1305 AEAD cipher (default).
    #[default]
    ChaCha20Poly1305,
    /// AES-256-GCM AEAD cipher.
    Aes256Gcm,
}

/// Vault for encryption and decryption operations.
///
/// # Example
///
/// ```
/// use sealdex::schema::DataType;
/// use sealdex_local::context::ColumnScope;
/// use sealdex_local::key_provider::StaticKeyProvider;
/// use sealdex_local::vault::{CipherMode, Vault};
/// use serde_json::json;
///
/// let vault = Vault::new(StaticKeyProvider::generate("kek_v1"), CipherMode::default());
/// let context = ColumnScope::new("users", "email").encryption();
///
/// let sealed = vault.encrypt(&json!("alice@example.com"), DataType::String, &context).unwrap();
/// let opened = vault.decrypt(&sealed, &context).unwrap();
/// assert_eq!(opened, json!("alice@example.com"));
/// ```
pub struct Vault<P: KeyProvider> {
    provider: Arc<P>,
    cipher_mode: CipherMode,
}

impl<P: KeyProvider> Vault<P> {
    /// Creates a new Vault with the specified key provider and cipher mode.
    pub fn new(provider: P, cipher_mode: CipherMode) -> Self {
        Self::from_shared(Arc::new(provider), cipher_mode)
    }

    /// Creates a Vault over a shared key provider.
    pub const fn from_shared(provider: Arc<P>, cipher_mode: CipherMode) -> Self {
        Self { provider, cipher_mode }
    }

    /// Returns the cipher used for new ciphertexts.
    pub const fn cipher_mode(&self) -> CipherMode {
        self.cipher_mode
    }

    /// Encrypts a JSON plaintext.
    ///
    /// Returns `[header][sealed JSON bytes]`.
    ///
    /// # Errors
    ///
    /// Returns error if key provider operations, sealing or header
    /// serialization fail.
    pub fn encrypt(
        &self,
        plaintext: &Value,
        cast_as: DataType,
        context: &EncryptionContext,
    ) -> Result<Vec<u8>, Error> {
        let message = Zeroizing::new(
            serde_json::to_vec(plaintext).map_err(|e| Error::Encoding(e.to_string()))?,
        );

        let dek = generate_dek();
        let kek_id = self.provider.current_kek_id()?;
        let wrapped_dek = self.provider.wrap_dek(&kek_id, dek.expose_secret())?;

        let mut nonce = [0u8; NONCE_SIZE];
        {
            use chacha20poly1305::aead::{rand_core::RngCore, OsRng};
            OsRng.fill_bytes(&mut nonce);
        }

        let aad = context.to_string();
        let (flags, sealed) = match self.cipher_mode {
            CipherMode::ChaCha20Poly1305 => (
                HeaderFlags::empty(),
                seal_chacha(dek.expose_secret(), &nonce, &message, aad.as_bytes())?,
            ),
            CipherMode::Aes256Gcm => (
                HeaderFlags::empty().with_aes_gcm(),
                seal_gcm(dek.expose_secret(), &nonce, &message, aad.as_bytes())?,
            ),
        };

        let header = EncryptionHeader::new(cast_as, kek_id, wrapped_dek, flags, nonce.to_vec());
        let mut result = header.to_bytes()?;
        result.extend_from_slice(&sealed);

        Ok(result)
    }

    /// Decrypts a ciphertext produced by [`Vault::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `Error::AuthenticationFailed` if the context differs from the
    /// one used for encryption or the data was tampered with.
    pub fn decrypt(&self, ciphertext: &[u8], context: &EncryptionContext) -> Result<Value, Error> {
        let (header, header_len) = EncryptionHeader::from_bytes(ciphertext)?;
        let sealed = &ciphertext[header_len..];

        let dek = self.provider.unwrap_dek(header.kek_id(), header.wrapped_dek())?;
        let nonce: [u8; NONCE_SIZE] = header
            .nonce()
            .try_into()
            .map_err(|_| Error::DecryptionFailed("Invalid nonce size".to_string()))?;

        let aad = context.to_string();
        let message = Zeroizing::new(if header.flags().is_aes_gcm() {
            open_gcm(dek.expose_secret(), &nonce, sealed, aad.as_bytes())?
        } else {
            open_chacha(dek.expose_secret(), &nonce, sealed, aad.as_bytes())?
        });

        serde_json::from_slice(&message).map_err(|e| Error::DecryptionFailed(e.to_string()))
    }
}

impl<P: KeyProvider> Clone for Vault<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider), cipher_mode: self.cipher_mode }
    }
}

fn seal_chacha(key: &[u8], nonce: &[u8; NONCE_SIZE], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
    use chacha20poly1305::aead::{Aead, KeyInit, Payload};
    use chacha20poly1305::{ChaCha20Poly1305, Nonce};

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid DEK: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|e| Error::EncryptionFailed(format!("ChaCha20-Poly1305 encryption failed: {e}")))
}

fn open_chacha(key: &[u8], nonce: &[u8; NONCE_SIZE], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
    use chacha20poly1305::aead::{Aead, KeyInit, Payload};
    use chacha20poly1305::{ChaCha20Poly1305, Nonce};

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid DEK: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| Error::AuthenticationFailed)
}

fn seal_gcm(key: &[u8], nonce: &[u8; NONCE_SIZE], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::EncryptionFailed(format!("Invalid DEK: {e}")))?;
    cipher
        .encrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|e| Error::EncryptionFailed(format!("AES-256-GCM encryption failed: {e}")))
}

fn open_gcm(key: &[u8], nonce: &[u8; NONCE_SIZE], msg: &[u8], aad: &[u8]) -> Result<Vec<u8>, Error> {
    use aes_gcm::aead::{Aead, KeyInit, Payload};
    use aes_gcm::{Aes256Gcm, Nonce};

    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| Error::DecryptionFailed(format!("Invalid DEK: {e}")))?;
    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| Error::AuthenticationFailed)
}
