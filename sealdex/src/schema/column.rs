//! Index definitions for a single encrypted column.
//!
//! A column declares which searchable index types it supports. Scalar columns
//! may combine equality, order-and-range and free-text indexes (or none at
//! all). Structured-JSON columns carry exactly one `ste_vec` index; the
//! builder hands back a separate [`JsonColumn`] type so the two kinds cannot
//! be mixed.

use serde::{Deserialize, Serialize};

/// Plaintext type of an encrypted column, serialized as `cast_as`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 64-bit signed integer
    #[serde(rename = "bigint")]
    Integer,
    /// Boolean
    #[serde(rename = "boolean")]
    Boolean,
    /// Timestamp or date, carried as an ISO-8601 string
    #[serde(rename = "date")]
    Timestamp,
    /// Floating point number
    #[serde(rename = "number")]
    Number,
    /// UTF-8 text
    #[default]
    #[serde(rename = "string")]
    String,
    /// Arbitrary JSON document
    #[serde(rename = "json")]
    Json,
}

/// Filter applied to tokens before they are hashed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TokenFilter {
    /// Lowercase every token
    Downcase,
}

impl TokenFilter {
    /// Applies the filter to a token.
    #[must_use]
    pub fn apply(self, token: &str) -> String {
        match self {
            Self::Downcase => token.to_lowercase(),
        }
    }
}

/// Splits free text into tokens for the match index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Tokenizer {
    /// Split on anything that is not alphanumeric
    Standard,
    /// Sliding window of `token_length` characters
    Ngram {
        /// Characters per token
        token_length: usize,
    },
}

/// Order-and-range index. Enables `<`, `>` and `BETWEEN` comparisons.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OreIndex {}

/// Equality index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueIndex {
    /// Filters applied before hashing
    #[serde(default)]
    pub token_filters: Vec<TokenFilter>,
}

/// Free-text match index backed by a bloom filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchIndex {
    /// Tokenizer used on both stored values and queries
    pub tokenizer: Tokenizer,
    /// Filters applied to each token
    #[serde(default)]
    pub token_filters: Vec<TokenFilter>,
    /// Number of hash functions per token
    pub k: usize,
    /// Bloom filter size in bits
    pub m: usize,
    /// Also index the untokenized value
    #[serde(default)]
    pub include_original: bool,
}

impl Default for MatchIndex {
    fn default() -> Self {
        Self {
            tokenizer: Tokenizer::Ngram { token_length: 3 },
            token_filters: vec![TokenFilter::Downcase],
            k: 6,
            m: 2048,
            include_original: true,
        }
    }
}

/// Structured-JSON index over the paths and leaves of a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteVecIndex {
    /// Domain separation prefix, `"{table}/{column}"` once built
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
}

/// The `indexes` object of a built column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexesConfig {
    /// Order-and-range index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ore: Option<OreIndex>,
    /// Equality index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<UniqueIndex>,
    /// Free-text index
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_index: Option<MatchIndex>,
    /// Structured-JSON index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ste_vec: Option<SteVecIndex>,
}

impl IndexesConfig {
    /// Returns `true` when no index is configured.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.ore.is_none()
            && self.unique.is_none()
            && self.match_index.is_none()
            && self.ste_vec.is_none()
    }
}

/// Built configuration of one column, as consumed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    /// Plaintext type
    pub cast_as: DataType,
    /// Configured indexes
    #[serde(default)]
    pub indexes: IndexesConfig,
}

impl ColumnConfig {
    /// Returns `true` if the column has a structured-json index.
    #[must_use]
    pub const fn has_ste_vec(&self) -> bool {
        self.indexes.ste_vec.is_some()
    }
}

/// A scalar encrypted column and its search capabilities.
///
/// # Example
///
/// ```
/// use sealdex::schema::{DataType, EncryptedColumn};
///
/// let email = EncryptedColumn::new("email")
///     .data_type(DataType::String)
///     .equality()
///     .free_text_search();
/// assert_eq!(email.name(), "email");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedColumn {
    name: String,
    data_type: DataType,
    ore: Option<OreIndex>,
    unique: Option<UniqueIndex>,
    match_index: Option<MatchIndex>,
}

impl EncryptedColumn {
    /// Creates a string column without indexes.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: DataType::default(),
            ore: None,
            unique: None,
            match_index: None,
        }
    }

    /// Sets the plaintext type.
    #[must_use]
    pub const fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Adds an equality index without token filters.
    #[must_use]
    pub fn equality(self) -> Self {
        self.equality_with(Vec::new())
    }

    /// Adds an equality index with the given token filters.
    #[must_use]
    pub fn equality_with(mut self, token_filters: Vec<TokenFilter>) -> Self {
        self.unique = Some(UniqueIndex { token_filters });
        self
    }

    /// Adds an order-and-range index.
    #[must_use]
    pub fn order_and_range(mut self) -> Self {
        self.ore = Some(OreIndex {});
        self
    }

    /// Adds a free-text index with default options.
    #[must_use]
    pub fn free_text_search(self) -> Self {
        self.free_text_search_with(MatchIndex::default())
    }

    /// Adds a free-text index with explicit options.
    #[must_use]
    pub fn free_text_search_with(mut self, options: MatchIndex) -> Self {
        self.match_index = Some(options);
        self
    }

    /// Turns this column into a structured-JSON column.
    ///
    /// Any scalar indexes declared so far are dropped.
    #[must_use]
    pub fn searchable_json(self) -> JsonColumn {
        JsonColumn::new(self.name)
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the backend configuration for this column.
    #[must_use]
    pub fn build(&self) -> ColumnConfig {
        ColumnConfig {
            cast_as: self.data_type,
            indexes: IndexesConfig {
                ore: self.ore.clone(),
                unique: self.unique.clone(),
                match_index: self.match_index.clone(),
                ste_vec: None,
            },
        }
    }
}

/// A JSON column with a structured-JSON index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonColumn {
    name: String,
    prefix: Option<String>,
}

impl JsonColumn {
    /// Creates a JSON column whose prefix is derived when the table is built.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), prefix: None }
    }

    /// Sets an explicit index prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Returns the column name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the backend configuration for this column.
    #[must_use]
    pub fn build(&self) -> ColumnConfig {
        ColumnConfig {
            cast_as: DataType::Json,
            indexes: IndexesConfig {
                ste_vec: Some(SteVecIndex { prefix: self.prefix.clone() }),
                ..IndexesConfig::default()
            },
        }
    }
}

/// A bare encrypted value: stored encrypted, never searched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedField {
    name: String,
    data_type: DataType,
}

impl EncryptedField {
    /// Creates a string field.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), data_type: DataType::default() }
    }

    /// Sets the plaintext type.
    #[must_use]
    pub const fn data_type(mut self, data_type: DataType) -> Self {
        self.data_type = data_type;
        self
    }

    /// Returns the field name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the backend configuration for this field.
    #[must_use]
    pub fn build(&self) -> ColumnConfig {
        ColumnConfig { cast_as: self.data_type, indexes: IndexesConfig::default() }
    }
}
