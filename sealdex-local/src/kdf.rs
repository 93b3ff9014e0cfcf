//! Key generation and HKDF-SHA256 index key derivation.

use crate::context::IndexContext;
use crate::error::Error;
use hkdf::Hkdf;
use secrecy::{ExposeSecret, SecretVec};
use sha2::Sha256;

/// Standard key size in bytes (256 bits).
pub const DEK_SIZE: usize = 32;

/// Salt for index key derivation.
const INDEX_SALT: &[u8] = b"sealdex-index-v1";

/// Derives the key of one index from the provider's index root key.
///
/// The index context (`tenant|table|column|index`) is the HKDF `info`, so
/// every column and index type gets an independent key.
///
/// # Errors
///
/// Returns `Error::KeyDerivation` if the derivation fails.
pub fn derive_index_key(
    root: &SecretVec<u8>,
    context: &IndexContext,
) -> Result<SecretVec<u8>, Error> {
    let hkdf = Hkdf::<Sha256>::new(Some(INDEX_SALT), root.expose_secret());

    let mut key = vec![0u8; DEK_SIZE];
    hkdf.expand(context.to_string().as_bytes(), &mut key).map_err(|_| Error::KeyDerivation)?;

    Ok(SecretVec::new(key))
}

/// Generates a random 32-byte key (DEK, KEK or index root).
#[must_use]
pub fn generate_dek() -> SecretVec<u8> {
    use chacha20poly1305::aead::{rand_core::RngCore, OsRng};

    let mut dek = vec![0u8; DEK_SIZE];
    OsRng.fill_bytes(&mut dek);
    SecretVec::new(dek)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ColumnScope;
    use sealdex::query::IndexType;

    fn root() -> SecretVec<u8> {
        SecretVec::new(vec![1u8; 32])
    }

    #[test]
    fn test_index_key_deterministic() {
        let ctx = ColumnScope::new("users", "email").index(IndexType::Unique);

        let key1 = derive_index_key(&root(), &ctx).expect("derivation failed");
        let key2 = derive_index_key(&root(), &ctx).expect("derivation failed");

        assert_eq!(key1.expose_secret(), key2.expose_secret());
        assert_eq!(key1.expose_secret().len(), DEK_SIZE);
    }

    #[test]
    fn test_index_key_separated_by_column_and_index() {
        let scope = ColumnScope::new("users", "email");
        let unique = derive_index_key(&root(), &scope.index(IndexType::Unique)).unwrap();
        let ore = derive_index_key(&root(), &scope.index(IndexType::Ore)).unwrap();
        let other = derive_index_key(
            &root(),
            &ColumnScope::new("users", "name").index(IndexType::Unique),
        )
        .unwrap();

        assert_ne!(unique.expose_secret(), ore.expose_secret());
        assert_ne!(unique.expose_secret(), other.expose_secret());
    }

    #[test]
    fn test_index_key_separated_by_tenant() {
        let a = ColumnScope::new("users", "email").with_tenant("a").index(IndexType::Unique);
        let b = ColumnScope::new("users", "email").with_tenant("b").index(IndexType::Unique);

        let key_a = derive_index_key(&root(), &a).unwrap();
        let key_b = derive_index_key(&root(), &b).unwrap();

        assert_ne!(key_a.expose_secret(), key_b.expose_secret());
    }

    #[test]
    fn test_generate_dek() {
        let dek1 = generate_dek();
        let dek2 = generate_dek();

        assert_ne!(dek1.expose_secret(), dek2.expose_secret());
        assert_eq!(dek1.expose_secret().len(), DEK_SIZE);
    }
}
