//! Error types for the local backend.

use std::fmt;

use sealdex::error::BackendError;
use sealdex::query::IndexType;
use sealdex::schema::DataType;

/// Main error type for local backend operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encryption operation failed
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    /// Decryption operation failed
    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    /// Authentication tag verification failed (data may be corrupted or tampered)
    #[error("authentication failed: ciphertext may be corrupted or tampered")]
    AuthenticationFailed,

    /// Key provider operation failed
    #[error("key provider error: {0}")]
    KeyProvider(#[from] KeyProviderError),

    /// Encryption header parsing failed
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivation,

    /// Unsupported protocol version
    #[error("unsupported version: {version} (supported: {supported})")]
    UnsupportedVersion {
        /// The version found in the ciphertext
        version: u8,
        /// Supported versions
        supported: String,
    },

    /// Index term generation failed
    #[error("index generation failed: {0}")]
    IndexGenerationFailed(String),

    /// Table or column is missing from the configuration
    #[error("{0}")]
    Config(#[from] sealdex::error::Error),

    /// Plaintext does not match the column's declared type
    #[error("plaintext for {table}.{column} is not a valid {expected:?}")]
    InvalidPlaintext {
        /// Table name
        table: String,
        /// Column path
        column: String,
        /// Declared type
        expected: DataType,
    },

    /// Query targets an index the column does not declare
    #[error("index `{}` is not configured on {table}.{column}", .index.as_str())]
    IndexNotConfigured {
        /// Table name
        table: String,
        /// Column path
        column: String,
        /// Requested index
        index: IndexType,
    },

    /// Stored value carries no ciphertext
    #[error("encrypted value for {table}.{column} has no ciphertext")]
    MissingCiphertext {
        /// Table name
        table: String,
        /// Column path
        column: String,
    },

    /// Base64 or JSON encoding failed
    #[error("encoding error: {0}")]
    Encoding(String),
}

impl Error {
    /// Machine-readable code forwarded to callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EncryptionFailed(_) => "ENCRYPTION_FAILED",
            Self::DecryptionFailed(_) | Self::AuthenticationFailed => "DECRYPTION_FAILED",
            Self::KeyProvider(_) | Self::KeyDerivation => "KEY_UNAVAILABLE",
            Self::InvalidHeader(_) | Self::UnsupportedVersion { .. } => "INVALID_CIPHERTEXT",
            Self::IndexGenerationFailed(_) => "INDEX_FAILED",
            Self::Config(_) => "UNKNOWN_COLUMN",
            Self::InvalidPlaintext { .. } => "INVALID_PLAINTEXT",
            Self::IndexNotConfigured { .. } => "INDEX_NOT_CONFIGURED",
            Self::MissingCiphertext { .. } => "MISSING_CIPHERTEXT",
            Self::Encoding(_) => "ENCODING_FAILED",
        }
    }
}

impl From<Error> for BackendError {
    fn from(err: Error) -> Self {
        Self::new(err.to_string()).with_code(err.code())
    }
}

/// Errors specific to key provider operations.
#[derive(Debug)]
pub enum KeyProviderError {
    /// KEK not found
    KekNotFound(String),

    /// No active KEK configured
    NoActiveKek,

    /// DEK wrapping failed
    WrapFailed(String),

    /// DEK unwrapping failed
    UnwrapFailed(String),

    /// Index root key not available
    IndexKeyUnavailable(String),
}

impl fmt::Display for KeyProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KekNotFound(id) => write!(f, "KEK not found: {id}"),
            Self::NoActiveKek => write!(f, "no active KEK configured"),
            Self::WrapFailed(msg) => write!(f, "DEK wrap failed: {msg}"),
            Self::UnwrapFailed(msg) => write!(f, "DEK unwrap failed: {msg}"),
            Self::IndexKeyUnavailable(msg) => write!(f, "index key not available: {msg}"),
        }
    }
}

impl std::error::Error for KeyProviderError {}
