//! Domain separation for ciphertexts and index keys.

use std::fmt;

use sealdex::query::IndexType;

/// Column a value belongs to, optionally scoped to a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnScope {
    tenant_id: Option<String>,
    table: String,
    column: String,
}

impl ColumnScope {
    /// Creates a scope without a tenant.
    #[must_use]
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { tenant_id: None, table: table.into(), column: column.into() }
    }

    /// Sets the tenant ID for multi-tenant applications.
    #[must_use]
    pub fn with_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    /// Returns the tenant ID, if set.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Returns the table name.
    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the column path.
    #[must_use]
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Context for encrypting values of this column.
    #[must_use]
    pub fn encryption(&self) -> EncryptionContext {
        EncryptionContext { scope: self.clone(), version: 1 }
    }

    /// Context for deriving the key of one of this column's indexes.
    #[must_use]
    pub fn index(&self, index: IndexType) -> IndexContext {
        IndexContext { scope: self.clone(), index }
    }
}

impl fmt::Display for ColumnScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}",
            self.tenant_id.as_deref().unwrap_or("default"),
            self.table,
            self.column
        )
    }
}

/// Associated data bound into every ciphertext.
///
/// Rendered as `tenant|table|column|v<version>`; decrypting under a different
/// context fails authentication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionContext {
    scope: ColumnScope,
    version: u32,
}

impl EncryptionContext {
    /// Sets the version for key rotation support.
    #[must_use]
    pub const fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Returns the column scope.
    #[must_use]
    pub const fn scope(&self) -> &ColumnScope {
        &self.scope
    }

    /// Returns the version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }
}

impl fmt::Display for EncryptionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|v{}", self.scope, self.version)
    }
}

/// HKDF info for one index of one column: `tenant|table|column|<index>`.
///
/// Each index type gets its own key, so an equality term and a structural
/// vector term over the same plaintext never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexContext {
    scope: ColumnScope,
    index: IndexType,
}

impl IndexContext {
    /// Returns the column scope.
    #[must_use]
    pub const fn scope(&self) -> &ColumnScope {
        &self.scope
    }

    /// Returns the index type.
    #[must_use]
    pub const fn index(&self) -> IndexType {
        self.index
    }
}

impl fmt::Display for IndexContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.scope, self.index.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encryption_context_display() {
        let ctx = ColumnScope::new("users", "email").with_tenant("tenant_123").encryption();
        assert_eq!(ctx.to_string(), "tenant_123|users|email|v1");
        assert_eq!(ctx.with_version(2).to_string(), "tenant_123|users|email|v2");
    }

    #[test]
    fn test_encryption_context_display_no_tenant() {
        let ctx = ColumnScope::new("users", "email").encryption();
        assert_eq!(ctx.to_string(), "default|users|email|v1");
    }

    #[test]
    fn test_index_context_display() {
        let ctx = ColumnScope::new("documents", "metadata").index(IndexType::SteVec);
        assert_eq!(ctx.to_string(), "default|documents|metadata|ste_vec");
        assert_eq!(ctx.scope().column(), "metadata");
    }

    #[test]
    fn test_index_contexts_differ_per_index() {
        let scope = ColumnScope::new("users", "email");
        assert_ne!(scope.index(IndexType::Unique), scope.index(IndexType::Match));
    }
}
