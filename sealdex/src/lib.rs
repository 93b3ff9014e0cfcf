//! # Sealdex
//!
//! Searchable field-level encryption: a declarative index schema, a batched
//! query-term encryption engine, and the output shapes encrypted terms take
//! inside relational queries.
//!
//! ## Features
//!
//! - Index schema for equality, order-and-range, free-text and structured-json search
//! - Versioned backend configuration with structured-json prefixes filled in
//! - Query terms for scalars, JSON paths and JSON containment
//! - Batched encryption: one backend call per index family, order preserved
//! - Composite-literal output for direct use in SQL
//!
//! ## Example
//!
//! ```rust,ignore
//! use sealdex::prelude::*;
//!
//! let documents = TableSchema::new("documents")
//!     .column(EncryptedColumn::new("title").equality().free_text_search())
//!     .json_column(JsonColumn::new("metadata"));
//! let config = build_config([&documents])?;
//!
//! let client = EncryptionClient::new(backend, config);
//! let terms = vec![
//!     JsonPathTerm::selector(JsonPath::parse("user.email")?, "documents", "metadata").into(),
//!     JsonContainsTerm::new(json!({"role": "admin"}), "documents", "metadata").into(),
//! ];
//! let encrypted = client.encrypt_query_terms(&terms).await?;
//! ```

#![warn(clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod client;
pub mod encrypted;
pub mod engine;
pub mod error;
pub mod format;
pub mod query;
pub mod schema;

pub mod prelude {
    //! Convenience re-exports for common use.
    pub use crate::backend::{AuditMetadata, CryptoBackend, EncryptPayload, QueryPayload};
    pub use crate::client::{BulkDecrypted, BulkEncrypted, BulkPlaintext, EncryptionClient};
    pub use crate::encrypted::{ArtifactKind, EncryptedValue, SteVecEntry};
    pub use crate::engine::{encrypt_query, encrypt_query_terms};
    pub use crate::error::{BackendError, Error};
    pub use crate::format::{ReturnType, SearchTerm};
    pub use crate::query::{
        is_query_term_array, IndexType, JsonContainedByTerm, JsonContainsTerm, JsonPath,
        JsonPathTerm, QueryOp, QueryTerm, ScalarTerm,
    };
    pub use crate::schema::{
        build_config, DataType, EncryptConfig, EncryptedColumn, EncryptedField, JsonColumn,
        TableSchema,
    };
}
