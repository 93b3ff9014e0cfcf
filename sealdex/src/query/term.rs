//! Query terms: one predicate of a batch, classified into a closed set of
//! variants.
//!
//! Terms arriving as JSON are classified once, while deserializing, by the
//! presence of their keys in this order: `path`, `contains`, `containedBy`,
//! `value`. A key counts as present even when its value is `null`, so
//! `"path": null` is rejected as a malformed path instead of falling through
//! to a scalar. The engine only ever sees the resulting [`QueryTerm`] variant.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::path::JsonPath;
use crate::format::ReturnType;

/// Cryptographic query capability a term targets.
///
/// Deserialization also accepts the query-type names used by application
/// code (`equality`, `orderAndRange`, `freeTextSearch`, `searchableJson`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexType {
    /// Order-and-range
    #[serde(rename = "ore", alias = "orderAndRange")]
    Ore,
    /// Equality
    #[serde(rename = "unique", alias = "equality")]
    Unique,
    /// Free-text
    #[serde(rename = "match", alias = "freeTextSearch")]
    Match,
    /// Structured-JSON
    #[serde(rename = "ste_vec", alias = "searchableJson")]
    SteVec,
}

impl IndexType {
    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ore => "ore",
            Self::Unique => "unique",
            Self::Match => "match",
            Self::SteVec => "ste_vec",
        }
    }
}

/// Operation discriminator for structured-JSON queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOp {
    /// Encrypt the value itself (containment, path plus value, scalar terms)
    #[default]
    #[serde(rename = "default")]
    Default,
    /// Encrypt a JSON-Path selector only
    #[serde(rename = "ste_vec_selector", alias = "selector")]
    Selector,
}

/// Scalar term: equality, range, free-text or JSON query on one value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalarTerm {
    /// Plaintext; `null` propagates to a `null` result
    pub value: Value,
    /// Target column path
    pub column: String,
    /// Target table
    pub table: String,
    /// Explicit index type; inferred from the column when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_type: Option<IndexType>,
    /// Explicit operation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_op: Option<QueryOp>,
    /// Output shape
    #[serde(skip_serializing_if = "Option::is_none")]
    pub return_type: Option<ReturnType>,
}

impl ScalarTerm {
    /// Creates a term whose index type is inferred from the column.
    #[must_use]
    pub fn new(value: impl Into<Value>, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            column: column.into(),
            table: table.into(),
            index_type: None,
            query_op: None,
            return_type: None,
        }
    }

    /// Selects the index type explicitly.
    #[must_use]
    pub const fn with_index_type(mut self, index_type: IndexType) -> Self {
        self.index_type = Some(index_type);
        self
    }

    /// Selects the operation explicitly.
    #[must_use]
    pub const fn with_query_op(mut self, query_op: QueryOp) -> Self {
        self.query_op = Some(query_op);
        self
    }

    /// Selects the output shape.
    #[must_use]
    pub const fn with_return_type(mut self, return_type: ReturnType) -> Self {
        self.return_type = Some(return_type);
        self
    }
}

/// Path term on a structured-JSON column.
///
/// With a value it matches documents holding that value at the path; without
/// one it is a selector-only query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonPathTerm {
    /// Location within the document
    pub path: JsonPath,
    /// Value expected at the path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Target column path
    pub column: String,
    /// Target table
    pub table: String,
}

impl JsonPathTerm {
    /// Creates a selector-only term.
    #[must_use]
    pub fn selector(path: JsonPath, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { path, value: None, column: column.into(), table: table.into() }
    }

    /// Creates a path-plus-value term.
    #[must_use]
    pub fn with_value(
        path: JsonPath,
        value: impl Into<Value>,
        table: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        Self { path, value: Some(value.into()), column: column.into(), table: table.into() }
    }
}

/// Containment term: the stored document contains this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonContainsTerm {
    /// JSON object or array
    pub contains: Value,
    /// Target column path
    pub column: String,
    /// Target table
    pub table: String,
}

impl JsonContainsTerm {
    /// Creates a containment term.
    #[must_use]
    pub fn new(contains: Value, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { contains, column: column.into(), table: table.into() }
    }
}

/// Inverse containment term: the stored document is contained by this shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsonContainedByTerm {
    /// JSON object or array
    pub contained_by: Value,
    /// Target column path
    pub column: String,
    /// Target table
    pub table: String,
}

impl JsonContainedByTerm {
    /// Creates an inverse containment term.
    #[must_use]
    pub fn new(contained_by: Value, table: impl Into<String>, column: impl Into<String>) -> Self {
        Self { contained_by, column: column.into(), table: table.into() }
    }
}

/// Variant tag of a [`QueryTerm`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermKind {
    /// [`ScalarTerm`]
    Scalar,
    /// [`JsonPathTerm`]
    JsonPath,
    /// [`JsonContainsTerm`]
    JsonContains,
    /// [`JsonContainedByTerm`]
    JsonContainedBy,
}

/// One predicate submitted in a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryTerm {
    /// Scalar value query
    Scalar(ScalarTerm),
    /// JSON path query
    JsonPath(JsonPathTerm),
    /// JSON containment query
    JsonContains(JsonContainsTerm),
    /// JSON inverse containment query
    JsonContainedBy(JsonContainedByTerm),
}

impl QueryTerm {
    /// Returns the variant tag.
    #[must_use]
    pub const fn kind(&self) -> TermKind {
        match self {
            Self::Scalar(_) => TermKind::Scalar,
            Self::JsonPath(_) => TermKind::JsonPath,
            Self::JsonContains(_) => TermKind::JsonContains,
            Self::JsonContainedBy(_) => TermKind::JsonContainedBy,
        }
    }

    /// Returns the target table.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Scalar(t) => &t.table,
            Self::JsonPath(t) => &t.table,
            Self::JsonContains(t) => &t.table,
            Self::JsonContainedBy(t) => &t.table,
        }
    }

    /// Returns the target column.
    #[must_use]
    pub fn column(&self) -> &str {
        match self {
            Self::Scalar(t) => &t.column,
            Self::JsonPath(t) => &t.column,
            Self::JsonContains(t) => &t.column,
            Self::JsonContainedBy(t) => &t.column,
        }
    }
}

impl From<ScalarTerm> for QueryTerm {
    fn from(term: ScalarTerm) -> Self {
        Self::Scalar(term)
    }
}

impl From<JsonPathTerm> for QueryTerm {
    fn from(term: JsonPathTerm) -> Self {
        Self::JsonPath(term)
    }
}

impl From<JsonContainsTerm> for QueryTerm {
    fn from(term: JsonContainsTerm) -> Self {
        Self::JsonContains(term)
    }
}

impl From<JsonContainedByTerm> for QueryTerm {
    fn from(term: JsonContainedByTerm) -> Self {
        Self::JsonContainedBy(term)
    }
}

// Distinguishes `"key": null` (Some(Null)) from a missing key (None).
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTerm {
    #[serde(default, deserialize_with = "present")]
    path: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    contains: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    contained_by: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    value: Option<Value>,
    column: String,
    table: String,
    #[serde(default, alias = "queryType")]
    index_type: Option<IndexType>,
    #[serde(default)]
    query_op: Option<QueryOp>,
    #[serde(default)]
    return_type: Option<ReturnType>,
}

impl RawTerm {
    fn classify(self) -> Result<QueryTerm, String> {
        let Self {
            path,
            contains,
            contained_by,
            value,
            column,
            table,
            index_type,
            query_op,
            return_type,
        } = self;

        if let Some(path) = path {
            let path: JsonPath =
                serde_json::from_value(path).map_err(|e| format!("invalid `path`: {e}"))?;
            return Ok(QueryTerm::JsonPath(JsonPathTerm { path, value, column, table }));
        }
        if let Some(contains) = contains {
            return Ok(QueryTerm::JsonContains(JsonContainsTerm { contains, column, table }));
        }
        if let Some(contained_by) = contained_by {
            return Ok(QueryTerm::JsonContainedBy(JsonContainedByTerm {
                contained_by,
                column,
                table,
            }));
        }
        value
            .map(|value| {
                QueryTerm::Scalar(ScalarTerm {
                    value,
                    column,
                    table,
                    index_type,
                    query_op,
                    return_type,
                })
            })
            .ok_or_else(|| {
                "query term must carry one of `path`, `contains`, `containedBy` or `value`"
                    .to_string()
            })
    }
}

impl<'de> Deserialize<'de> for QueryTerm {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        RawTerm::deserialize(deserializer)?.classify().map_err(serde::de::Error::custom)
    }
}

/// Returns `true` if a list holds query terms rather than bare plaintexts.
///
/// Only the first element is inspected: it must be an object with a
/// `column` or `table` key.
#[must_use]
pub fn is_query_term_array(values: &[Value]) -> bool {
    values
        .first()
        .and_then(Value::as_object)
        .is_some_and(|first| first.contains_key("column") || first.contains_key("table"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> QueryTerm {
        serde_json::from_value(value).expect("term should classify")
    }

    #[test]
    fn test_scalar_term() {
        let term = parse(json!({
            "value": "alice@example.com",
            "table": "users",
            "column": "email",
            "indexType": "unique",
            "returnType": "composite-literal"
        }));

        let QueryTerm::Scalar(scalar) = term else { panic!("expected scalar") };
        assert_eq!(scalar.index_type, Some(IndexType::Unique));
        assert_eq!(scalar.return_type, Some(ReturnType::CompositeLiteral));
    }

    #[test]
    fn test_null_value_is_scalar() {
        let term = parse(json!({"value": null, "table": "users", "column": "email"}));
        assert_eq!(term.kind(), TermKind::Scalar);
        let QueryTerm::Scalar(scalar) = term else { unreachable!() };
        assert!(scalar.value.is_null());
    }

    #[test]
    fn test_null_path_rejected_not_scalar() {
        let result = serde_json::from_value::<QueryTerm>(json!({
            "path": null,
            "value": 1,
            "table": "users",
            "column": "profile"
        }));

        let err = result.unwrap_err().to_string();
        assert!(err.contains("invalid `path`"), "{err}");
    }

    #[test]
    fn test_query_type_alias() {
        let term = parse(json!({
            "value": "$.user.email",
            "table": "users",
            "column": "profile",
            "queryType": "searchableJson"
        }));
        let QueryTerm::Scalar(scalar) = term else { panic!("expected scalar") };
        assert_eq!(scalar.index_type, Some(IndexType::SteVec));
    }

    #[test]
    fn test_path_wins_over_value() {
        let term = parse(json!({
            "path": "user.role",
            "value": "admin",
            "contains": {"a": 1},
            "table": "users",
            "column": "profile"
        }));

        let QueryTerm::JsonPath(path) = term else { panic!("expected path term") };
        assert_eq!(path.value, Some(json!("admin")));
        assert_eq!(path.path.to_selector(), "$.user.role");
    }

    #[test]
    fn test_contains_wins_over_contained_by() {
        let term = parse(json!({
            "contains": {"a": 1},
            "containedBy": {"b": 2},
            "table": "t",
            "column": "c"
        }));
        assert_eq!(term.kind(), TermKind::JsonContains);
    }

    #[test]
    fn test_contained_by() {
        let term = parse(json!({"containedBy": [1, 2], "table": "t", "column": "c"}));
        assert_eq!(term.kind(), TermKind::JsonContainedBy);
    }

    #[test]
    fn test_path_without_value_is_selector() {
        let term = parse(json!({"path": ["user", "email"], "table": "t", "column": "c"}));
        let QueryTerm::JsonPath(path) = term else { panic!("expected path term") };
        assert!(path.value.is_none());
    }

    #[test]
    fn test_unclassifiable_term_rejected() {
        let result: Result<QueryTerm, _> =
            serde_json::from_value(json!({"table": "t", "column": "c"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_is_query_term_array() {
        assert!(is_query_term_array(&[json!({"column": "email", "value": 1})]));
        assert!(is_query_term_array(&[json!({"table": "users"})]));
        assert!(!is_query_term_array(&[json!("alice"), json!({"column": "x"})]));
        assert!(!is_query_term_array(&[json!({"value": 1})]));
        assert!(!is_query_term_array(&[]));
    }

    #[test]
    fn test_serialize_round_trip() {
        let term: QueryTerm = ScalarTerm::new("bob", "users", "email")
            .with_index_type(IndexType::Match)
            .into();
        let json = serde_json::to_value(&term).unwrap();
        assert_eq!(json, json!({"value": "bob", "column": "email", "table": "users", "indexType": "match"}));
        assert_eq!(parse(json), term);
    }
}
