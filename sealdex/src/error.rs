//! Error types for `Sealdex` operations.

use std::fmt;

/// Main error type for `Sealdex` operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A JSON query targets a column without a structured-json index
    #[error("Column does not have structured-json index configured: {table}.{column}")]
    MissingSteVecIndex {
        /// Table the term targets
        table: String,
        /// Column the term targets
        column: String,
    },

    /// The table is not part of the encryption configuration
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// The column is not configured on the table
    #[error("unknown column: {table}.{column}")]
    UnknownColumn {
        /// Table that was searched
        table: String,
        /// Column that was not found
        column: String,
    },

    /// A containment payload was a bare scalar
    #[error(
        "containment query on {table}.{column} must be a JSON object or array; \
         wrap scalar values, e.g. {{\"value\": 42}}"
    )]
    ScalarContainment {
        /// Table the term targets
        table: String,
        /// Column the term targets
        column: String,
    },

    /// Table schema cannot be flattened into column paths
    #[error("invalid schema for table {table}: {reason}")]
    InvalidSchema {
        /// Table being built
        table: String,
        /// What is wrong with it
        reason: String,
    },

    /// JSON path is empty or contains an empty segment
    #[error("invalid JSON path: {0}")]
    InvalidPath(String),

    /// Query term is internally inconsistent
    #[error("invalid query term: {0}")]
    InvalidTerm(String),

    /// Cryptographic backend reported a failure
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// JSON (de)serialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure reported by a cryptographic backend.
///
/// The message and code are forwarded to the caller unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendError {
    message: String,
    code: Option<String>,
}

impl BackendError {
    /// Creates a backend error with a human-readable message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), code: None }
    }

    /// Attaches a machine-readable error code.
    #[must_use]
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Returns the message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the error code, if the backend supplied one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.code {
            Some(code) => write!(f, "[{code}] {}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for BackendError {}

impl Error {
    /// Returns the backend error code, if this error came from the backend.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Backend(err) => err.code(),
            _ => None,
        }
    }
}
