//! Batch query-term encryption.
//!
//! A batch of terms is encrypted with as few backend calls as possible:
//!
//! 1. **Partition**: every term is classified and routed to one of five
//!    buckets. Null scalar terms go to no bucket at all.
//! 2. **Dispatch**: every non-empty bucket is sent to the backend in exactly
//!    one bulk call. Calls are made one after another, never concurrently.
//! 3. **Reassemble**: results are written back to the position of the term
//!    that produced them, using one cursor per bucket.
//! 4. **Format**: scalar terms are shaped according to their return type.
//!
//! | Bucket            | Terms                                         | Backend call                         |
//! |-------------------|-----------------------------------------------|--------------------------------------|
//! | scalar-auto       | scalar, no index type                         | `bulk_encrypt`                       |
//! | scalar-explicit   | scalar, `ore` / `unique` / `match`            | `bulk_encrypt_query`                 |
//! | containment       | `contains`, `containedBy`, scalar `ste_vec` document | `bulk_encrypt_query` (`ste_vec`, `default`) |
//! | path-value        | `path` with `value`                           | `bulk_encrypt_query` (`ste_vec`, `default`) |
//! | selector          | `path` alone, scalar `ste_vec` string         | `bulk_encrypt_query` (`ste_vec`, `ste_vec_selector`) |
//!
//! Any failure aborts the whole batch.

use serde_json::Value;
use tracing::{debug, instrument, trace, warn};

use crate::backend::{AuditMetadata, CryptoBackend, EncryptPayload, QueryPayload};
use crate::encrypted::EncryptedValue;
use crate::error::{BackendError, Error};
use crate::format::{format_search_term, ReturnType, SearchTerm};
use crate::query::path::SELECTOR_ROOT;
use crate::query::{IndexType, JsonPath, QueryOp, QueryTerm, ScalarTerm};
use crate::schema::EncryptConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryBucket {
    ScalarExplicit,
    Containment,
    PathValue,
    Selector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    ScalarAuto,
    Query(QueryBucket),
}

impl Bucket {
    const fn label(self) -> &'static str {
        match self {
            Self::ScalarAuto => "scalar-auto",
            Self::Query(QueryBucket::ScalarExplicit) => "scalar-explicit",
            Self::Query(QueryBucket::Containment) => "containment",
            Self::Query(QueryBucket::PathValue) => "path-value",
            Self::Query(QueryBucket::Selector) => "selector",
        }
    }
}

/// Where the result of one term comes from and how it is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Null,
    /// `format` is `None` for JSON terms, which are never shaped into literals.
    Bucket { bucket: Bucket, format: Option<ReturnType> },
}

#[derive(Debug, Default)]
struct Plan {
    slots: Vec<Slot>,
    scalar_auto: Vec<EncryptPayload>,
    scalar_explicit: Vec<QueryPayload>,
    containment: Vec<QueryPayload>,
    path_value: Vec<QueryPayload>,
    selector: Vec<QueryPayload>,
}

impl Plan {
    fn push_query(
        &mut self,
        bucket: QueryBucket,
        payload: QueryPayload,
        format: Option<ReturnType>,
    ) {
        match bucket {
            QueryBucket::ScalarExplicit => self.scalar_explicit.push(payload),
            QueryBucket::Containment => self.containment.push(payload),
            QueryBucket::PathValue => self.path_value.push(payload),
            QueryBucket::Selector => self.selector.push(payload),
        }
        self.slots.push(Slot::Bucket { bucket: Bucket::Query(bucket), format });
    }
}

fn ste_vec_payload(plaintext: Value, table: &str, column: &str, query_op: QueryOp) -> QueryPayload {
    QueryPayload {
        plaintext,
        column: column.to_string(),
        table: table.to_string(),
        index_type: IndexType::SteVec,
        query_op,
    }
}

/// Fails unless the column exists and carries a structured-json index.
fn require_ste_vec(config: &EncryptConfig, table: &str, column: &str) -> Result<(), Error> {
    if config.column(table, column)?.has_ste_vec() {
        Ok(())
    } else {
        warn!(table, column, "JSON query on column without structured-json index");
        Err(Error::MissingSteVecIndex { table: table.to_string(), column: column.to_string() })
    }
}

/// Containment payloads must be objects or arrays; empty ones are fine.
fn containment_payload(value: &Value, table: &str, column: &str) -> Result<Value, Error> {
    match value {
        Value::Object(_) | Value::Array(_) => Ok(value.clone()),
        _ => {
            warn!(table, column, "scalar containment payload rejected");
            Err(Error::ScalarContainment { table: table.to_string(), column: column.to_string() })
        }
    }
}

/// A string starting with `$` is taken as a selector as-is; anything else is
/// read as a dot path.
fn selector_from_str(selector: &str) -> Result<String, Error> {
    if selector.starts_with(SELECTOR_ROOT) {
        Ok(selector.to_string())
    } else {
        Ok(JsonPath::parse(selector)?.to_selector())
    }
}

fn plan_scalar(plan: &mut Plan, config: &EncryptConfig, term: &ScalarTerm) -> Result<(), Error> {
    if term.value.is_null() {
        plan.slots.push(Slot::Null);
        return Ok(());
    }

    let format = Some(term.return_type.unwrap_or_default());

    match term.index_type {
        None => {
            plan.scalar_auto.push(EncryptPayload {
                plaintext: term.value.clone(),
                column: term.column.clone(),
                table: term.table.clone(),
            });
            plan.slots.push(Slot::Bucket { bucket: Bucket::ScalarAuto, format });
        }
        Some(IndexType::SteVec) => {
            require_ste_vec(config, &term.table, &term.column)?;

            match (term.query_op, &term.value) {
                (None | Some(QueryOp::Selector), Value::String(selector)) => {
                    let payload = ste_vec_payload(
                        Value::String(selector_from_str(selector)?),
                        &term.table,
                        &term.column,
                        QueryOp::Selector,
                    );
                    plan.push_query(QueryBucket::Selector, payload, format);
                }
                (Some(QueryOp::Selector), _) => {
                    return Err(Error::InvalidTerm(format!(
                        "selector query on {}.{} requires a JSON-Path string",
                        term.table, term.column
                    )));
                }
                (_, value) => {
                    let document = containment_payload(value, &term.table, &term.column)?;
                    let payload =
                        ste_vec_payload(document, &term.table, &term.column, QueryOp::Default);
                    plan.push_query(QueryBucket::Containment, payload, format);
                }
            }
        }
        Some(index_type) => {
            let payload = QueryPayload {
                plaintext: term.value.clone(),
                column: term.column.clone(),
                table: term.table.clone(),
                index_type,
                query_op: term.query_op.unwrap_or_default(),
            };
            plan.push_query(QueryBucket::ScalarExplicit, payload, format);
        }
    }

    Ok(())
}

fn plan_terms(config: &EncryptConfig, terms: &[QueryTerm]) -> Result<Plan, Error> {
    let mut plan = Plan { slots: Vec::with_capacity(terms.len()), ..Plan::default() };

    for term in terms {
        trace!(kind = ?term.kind(), table = term.table(), column = term.column(), "classify");

        match term {
            QueryTerm::Scalar(scalar) => plan_scalar(&mut plan, config, scalar)?,
            QueryTerm::JsonContains(t) => {
                require_ste_vec(config, &t.table, &t.column)?;
                let document = containment_payload(&t.contains, &t.table, &t.column)?;
                let payload = ste_vec_payload(document, &t.table, &t.column, QueryOp::Default);
                plan.push_query(QueryBucket::Containment, payload, None);
            }
            QueryTerm::JsonContainedBy(t) => {
                require_ste_vec(config, &t.table, &t.column)?;
                let document = containment_payload(&t.contained_by, &t.table, &t.column)?;
                let payload = ste_vec_payload(document, &t.table, &t.column, QueryOp::Default);
                plan.push_query(QueryBucket::Containment, payload, None);
            }
            QueryTerm::JsonPath(t) => {
                require_ste_vec(config, &t.table, &t.column)?;
                match &t.value {
                    Some(value) => {
                        let document = t.path.wrap_value(value.clone());
                        let payload =
                            ste_vec_payload(document, &t.table, &t.column, QueryOp::Default);
                        plan.push_query(QueryBucket::PathValue, payload, None);
                    }
                    None => {
                        let selector = Value::String(t.path.to_selector());
                        let payload =
                            ste_vec_payload(selector, &t.table, &t.column, QueryOp::Selector);
                        plan.push_query(QueryBucket::Selector, payload, None);
                    }
                }
            }
        }
    }

    Ok(plan)
}

fn check_len(bucket: Bucket, sent: usize, received: usize) -> Result<(), Error> {
    if sent == received {
        return Ok(());
    }
    Err(Error::Backend(BackendError::new(format!(
        "{} batch returned {received} results for {sent} items",
        bucket.label()
    ))))
}

async fn dispatch_query<B: CryptoBackend + ?Sized>(
    backend: &B,
    bucket: QueryBucket,
    items: Vec<QueryPayload>,
    metadata: Option<&AuditMetadata>,
) -> Result<Vec<EncryptedValue>, Error> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let bucket = Bucket::Query(bucket);
    let sent = items.len();
    debug!(bucket = bucket.label(), items = sent, "dispatching bulk_encrypt_query");
    let results = backend.bulk_encrypt_query(items, metadata).await?;
    check_len(bucket, sent, results.len())?;
    Ok(results)
}

async fn dispatch_encrypt<B: CryptoBackend + ?Sized>(
    backend: &B,
    items: Vec<EncryptPayload>,
    metadata: Option<&AuditMetadata>,
) -> Result<Vec<EncryptedValue>, Error> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let sent = items.len();
    debug!(bucket = Bucket::ScalarAuto.label(), items = sent, "dispatching bulk_encrypt");
    let results = backend.bulk_encrypt(items, metadata).await?;
    check_len(Bucket::ScalarAuto, sent, results.len())?;
    Ok(results)
}

/// Encrypts a batch of query terms.
///
/// Returns one [`SearchTerm`] per input term, in input order. Null scalar
/// terms yield [`SearchTerm::Null`] and are never sent to the backend.
///
/// # Errors
///
/// - `Error::MissingSteVecIndex`, `Error::UnknownTable`, `Error::UnknownColumn`
///   if a JSON term targets a column without a structured-json index. Raised
///   before any backend call.
/// - `Error::ScalarContainment` if a containment payload is not an object or
///   array.
/// - `Error::InvalidPath` / `Error::InvalidTerm` for malformed selectors.
/// - `Error::Backend` if any backend call fails; the batch is abandoned.
#[instrument(skip_all, fields(terms = terms.len()))]
pub async fn encrypt_query_terms<B: CryptoBackend + ?Sized>(
    backend: &B,
    config: &EncryptConfig,
    terms: &[QueryTerm],
    metadata: Option<&AuditMetadata>,
) -> Result<Vec<SearchTerm>, Error> {
    let Plan { slots, scalar_auto, scalar_explicit, containment, path_value, selector } =
        plan_terms(config, terms)?;

    let mut scalar_auto = dispatch_encrypt(backend, scalar_auto, metadata).await?.into_iter();
    let mut scalar_explicit =
        dispatch_query(backend, QueryBucket::ScalarExplicit, scalar_explicit, metadata)
            .await?
            .into_iter();
    let mut containment =
        dispatch_query(backend, QueryBucket::Containment, containment, metadata).await?.into_iter();
    let mut path_value =
        dispatch_query(backend, QueryBucket::PathValue, path_value, metadata).await?.into_iter();
    let mut selector =
        dispatch_query(backend, QueryBucket::Selector, selector, metadata).await?.into_iter();

    slots
        .into_iter()
        .map(|slot| {
            let Slot::Bucket { bucket, format } = slot else {
                return Ok(SearchTerm::Null);
            };

            let cursor = match bucket {
                Bucket::ScalarAuto => &mut scalar_auto,
                Bucket::Query(QueryBucket::ScalarExplicit) => &mut scalar_explicit,
                Bucket::Query(QueryBucket::Containment) => &mut containment,
                Bucket::Query(QueryBucket::PathValue) => &mut path_value,
                Bucket::Query(QueryBucket::Selector) => &mut selector,
            };
            // Lengths were checked on dispatch.
            let value = cursor.next().ok_or_else(|| {
                Error::Backend(BackendError::new(format!("{} batch ran short", bucket.label())))
            })?;

            match format {
                Some(return_type) => format_search_term(value, return_type),
                None => Ok(SearchTerm::Encrypted(value)),
            }
        })
        .collect()
}

/// Encrypts a single query term.
///
/// # Errors
///
/// See [`encrypt_query_terms`].
pub async fn encrypt_query<B: CryptoBackend + ?Sized>(
    backend: &B,
    config: &EncryptConfig,
    term: QueryTerm,
    metadata: Option<&AuditMetadata>,
) -> Result<SearchTerm, Error> {
    let mut results = encrypt_query_terms(backend, config, &[term], metadata).await?;
    results.pop().ok_or_else(|| Error::Backend(BackendError::new("empty result for one term")))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::encrypted::{ArtifactKind, SteVecEntry};
    use crate::query::{JsonContainedByTerm, JsonContainsTerm, JsonPathTerm};
    use crate::schema::{build_config, EncryptedColumn, JsonColumn, TableSchema};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Encrypt(Vec<EncryptPayload>),
        Query(Vec<QueryPayload>),
        Decrypt(usize),
    }

    /// Backend that echoes plaintexts back so results can be matched to terms.
    #[derive(Default)]
    pub struct RecordingBackend {
        pub calls: Mutex<Vec<Call>>,
        pub fail_with: Option<BackendError>,
        pub drop_one: bool,
    }

    impl RecordingBackend {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn check(&self) -> Result<(), BackendError> {
            self.fail_with.clone().map_or(Ok(()), Err)
        }
    }

    pub fn echo(value: &Value) -> String {
        value.to_string()
    }

    #[async_trait]
    impl CryptoBackend for RecordingBackend {
        async fn bulk_encrypt(
            &self,
            items: Vec<EncryptPayload>,
            _metadata: Option<&AuditMetadata>,
        ) -> Result<Vec<EncryptedValue>, BackendError> {
            self.calls.lock().unwrap().push(Call::Encrypt(items.clone()));
            self.check()?;
            let mut out: Vec<_> = items
                .iter()
                .map(|item| {
                    let mut value =
                        EncryptedValue::new(&item.table, &item.column, ArtifactKind::Ciphertext);
                    value.ciphertext = Some(echo(&item.plaintext));
                    value
                })
                .collect();
            if self.drop_one {
                out.pop();
            }
            Ok(out)
        }

        async fn bulk_encrypt_query(
            &self,
            items: Vec<QueryPayload>,
            _metadata: Option<&AuditMetadata>,
        ) -> Result<Vec<EncryptedValue>, BackendError> {
            self.calls.lock().unwrap().push(Call::Query(items.clone()));
            self.check()?;
            Ok(items
                .iter()
                .map(|item| match (item.index_type, item.query_op) {
                    (IndexType::SteVec, QueryOp::Selector) => {
                        let mut value =
                            EncryptedValue::new(&item.table, &item.column, ArtifactKind::Selector);
                        value.selector = Some(echo(&item.plaintext));
                        value
                    }
                    (IndexType::SteVec, QueryOp::Default) => {
                        let mut value =
                            EncryptedValue::new(&item.table, &item.column, ArtifactKind::SteVec);
                        value.ste_vec = Some(vec![SteVecEntry {
                            selector: "doc".into(),
                            term: Some(echo(&item.plaintext)),
                            ciphertext: None,
                        }]);
                        value
                    }
                    (index_type, _) => {
                        let mut value = EncryptedValue::new(
                            &item.table,
                            &item.column,
                            ArtifactKind::Ciphertext,
                        );
                        value.unique = Some(format!("{}:{}", index_type.as_str(), echo(&item.plaintext)));
                        value
                    }
                })
                .collect())
        }

        async fn bulk_decrypt(
            &self,
            items: Vec<EncryptedValue>,
            _metadata: Option<&AuditMetadata>,
        ) -> Result<Vec<Value>, BackendError> {
            self.calls.lock().unwrap().push(Call::Decrypt(items.len()));
            self.check()?;
            items
                .iter()
                .map(|item| {
                    let ciphertext = item.ciphertext.as_deref().unwrap_or("null");
                    serde_json::from_str(ciphertext).map_err(|e| BackendError::new(e.to_string()))
                })
                .collect()
        }
    }

    pub fn config() -> EncryptConfig {
        let users = TableSchema::new("users")
            .column(EncryptedColumn::new("email").equality().order_and_range().free_text_search())
            .json_column(JsonColumn::new("profile"));
        build_config([&users]).unwrap()
    }

    async fn run(backend: &RecordingBackend, terms: &[QueryTerm]) -> Result<Vec<SearchTerm>, Error> {
        encrypt_query_terms(backend, &config(), terms, None).await
    }

    fn ste_vec(value: impl Into<Value>) -> QueryTerm {
        ScalarTerm::new(value, "users", "profile").with_index_type(IndexType::SteVec).into()
    }

    #[tokio::test]
    async fn test_searchable_json_scenario() {
        let backend = RecordingBackend::default();
        let terms = [ste_vec("$.user.email"), ste_vec(json!({"role": "admin"})), ste_vec(Value::Null)];

        let results = run(&backend, &terms).await.unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(results[0].as_encrypted().unwrap().kind, ArtifactKind::Selector);
        assert_eq!(results[1].as_encrypted().unwrap().kind, ArtifactKind::SteVec);
        assert!(results[2].is_null());

        let calls = backend.calls();
        assert_eq!(calls.len(), 2);
        let Call::Query(containment) = &calls[0] else { panic!("expected query call") };
        assert_eq!(containment.len(), 1);
        assert_eq!(containment[0].query_op, QueryOp::Default);
        let Call::Query(selector) = &calls[1] else { panic!("expected query call") };
        assert_eq!(selector.len(), 1);
        assert_eq!(selector[0].query_op, QueryOp::Selector);
        assert_eq!(selector[0].plaintext, json!("$.user.email"));
    }

    #[tokio::test]
    async fn test_hundred_equality_terms_one_call() {
        let backend = RecordingBackend::default();
        let terms: Vec<QueryTerm> = (0..100)
            .map(|i| {
                ScalarTerm::new(format!("user{i}@example.com"), "users", "email")
                    .with_index_type(IndexType::Unique)
                    .into()
            })
            .collect();

        let results = run(&backend, &terms).await.unwrap();

        assert_eq!(results.len(), 100);
        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        let Call::Query(items) = &calls[0] else { panic!("expected query call") };
        assert_eq!(items.len(), 100);

        let distinct: std::collections::HashSet<_> =
            results.iter().map(|r| r.as_encrypted().unwrap().unique.clone()).collect();
        assert_eq!(distinct.len(), 100);
    }

    #[tokio::test]
    async fn test_auto_infer_single_call() {
        let backend = RecordingBackend::default();
        let terms: Vec<QueryTerm> =
            (0..5).map(|i| ScalarTerm::new(i, "users", "email").into()).collect();

        run(&backend, &terms).await.unwrap();

        let calls = backend.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], Call::Encrypt(items) if items.len() == 5));
    }

    #[tokio::test]
    async fn test_one_of_each_variant() {
        let backend = RecordingBackend::default();
        let path = JsonPath::parse("user.role").unwrap();
        let terms = [
            ScalarTerm::new("a", "users", "email").into(),
            JsonPathTerm::with_value(path.clone(), "admin", "users", "profile").into(),
            JsonContainsTerm::new(json!({"a": 1}), "users", "profile").into(),
            JsonContainedByTerm::new(json!([1, 2]), "users", "profile").into(),
            JsonPathTerm::selector(path, "users", "profile").into(),
        ];

        let results = run(&backend, &terms).await.unwrap();
        assert_eq!(results.len(), 5);

        let calls = backend.calls();
        assert_eq!(calls.len(), 4);
        assert!(matches!(&calls[0], Call::Encrypt(items) if items.len() == 1));
        let Call::Query(containment) = &calls[1] else { panic!() };
        assert_eq!(containment.len(), 2);
        let Call::Query(path_value) = &calls[2] else { panic!() };
        assert_eq!(path_value[0].plaintext, json!({"user": {"role": "admin"}}));
        let Call::Query(selector) = &calls[3] else { panic!() };
        assert_eq!(selector[0].plaintext, json!("$.user.role"));

        let term = |i: usize| results[i].as_encrypted().unwrap().ste_vec.clone().unwrap()[0].term.clone();
        assert_eq!(term(1), Some(echo(&json!({"user": {"role": "admin"}}))));
        assert_eq!(term(2), Some(echo(&json!({"a": 1}))));
        assert_eq!(term(3), Some(echo(&json!([1, 2]))));
    }

    #[tokio::test]
    async fn test_all_null_batch_makes_no_calls() {
        let backend = RecordingBackend::default();
        let terms = [ScalarTerm::new(Value::Null, "users", "email").into()];

        let results = run(&backend, &terms).await.unwrap();

        assert_eq!(results, vec![SearchTerm::Null]);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let backend = RecordingBackend::default();
        assert!(run(&backend, &[]).await.unwrap().is_empty());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ste_vec_index_fails_before_backend() {
        let backend = RecordingBackend::default();
        let terms = [
            ScalarTerm::new("x", "users", "email").into(),
            JsonContainsTerm::new(json!({"a": 1}), "users", "email").into(),
        ];

        let err = run(&backend, &terms).await.unwrap_err();

        assert!(matches!(err, Error::MissingSteVecIndex { ref column, .. } if column == "email"));
        assert!(err.to_string().contains("Column does not have structured-json index configured"));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_path_terms_require_index() {
        let backend = RecordingBackend::default();
        let path = JsonPath::parse("a").unwrap();

        let selector = [JsonPathTerm::selector(path.clone(), "users", "email").into()];
        assert!(matches!(run(&backend, &selector).await, Err(Error::MissingSteVecIndex { .. })));

        let by = [JsonContainedByTerm::new(json!({}), "users", "email").into()];
        assert!(matches!(run(&backend, &by).await, Err(Error::MissingSteVecIndex { .. })));

        let unknown = [JsonPathTerm::with_value(path, 1, "users", "nope").into()];
        assert!(matches!(run(&backend, &unknown).await, Err(Error::UnknownColumn { .. })));

        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_scalar_containment_rejected() {
        let backend = RecordingBackend::default();

        for payload in [json!(42), json!(true), Value::Null] {
            let terms = [JsonContainsTerm::new(payload, "users", "profile").into()];
            assert!(matches!(run(&backend, &terms).await, Err(Error::ScalarContainment { .. })));
        }
        assert!(matches!(run(&backend, &[ste_vec(7)]).await, Err(Error::ScalarContainment { .. })));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_containment_payloads_accepted() {
        let backend = RecordingBackend::default();
        let terms = [
            JsonContainsTerm::new(json!({}), "users", "profile").into(),
            JsonContainedByTerm::new(json!([]), "users", "profile").into(),
        ];
        assert_eq!(run(&backend, &terms).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_selector_op_requires_string() {
        let backend = RecordingBackend::default();
        let term: QueryTerm = ScalarTerm::new(json!({"a": 1}), "users", "profile")
            .with_index_type(IndexType::SteVec)
            .with_query_op(QueryOp::Selector)
            .into();
        assert!(matches!(run(&backend, &[term]).await, Err(Error::InvalidTerm(_))));
    }

    #[tokio::test]
    async fn test_dot_path_selector_normalized() {
        let backend = RecordingBackend::default();
        let results = run(&backend, &[ste_vec("user.first name")]).await.unwrap();
        assert_eq!(
            results[0].as_encrypted().unwrap().selector.as_deref(),
            Some(echo(&json!(r#"$.user["first name"]"#)).as_str())
        );
    }

    #[tokio::test]
    async fn test_return_types_apply_to_scalar_terms_only() {
        let backend = RecordingBackend::default();
        let terms = [
            ScalarTerm::new("a", "users", "email")
                .with_index_type(IndexType::Unique)
                .with_return_type(ReturnType::CompositeLiteral)
                .into(),
            ScalarTerm::new("b", "users", "email")
                .with_return_type(ReturnType::EscapedCompositeLiteral)
                .into(),
            JsonContainsTerm::new(json!({"a": 1}), "users", "profile").into(),
        ];

        let results = run(&backend, &terms).await.unwrap();

        let literal = results[0].as_literal().unwrap();
        assert!(literal.starts_with("(\"") && literal.ends_with("\")"));
        let escaped = results[1].as_literal().unwrap();
        assert!(escaped.starts_with("\"(\\\""));
        assert!(results[2].as_encrypted().is_some());
    }

    #[tokio::test]
    async fn test_backend_failure_aborts_batch() {
        let backend = RecordingBackend {
            fail_with: Some(BackendError::new("kms unavailable").with_code("KMS_DOWN")),
            ..RecordingBackend::default()
        };
        let terms = [
            ScalarTerm::new("a", "users", "email").into(),
            JsonContainsTerm::new(json!({"a": 1}), "users", "profile").into(),
        ];

        let err = run(&backend, &terms).await.unwrap_err();

        assert_eq!(err.code(), Some("KMS_DOWN"));
        // The first failing bucket stops dispatch.
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_short_backend_response_is_error() {
        let backend = RecordingBackend { drop_one: true, ..RecordingBackend::default() };
        let terms = [ScalarTerm::new("a", "users", "email").into()];
        assert!(matches!(run(&backend, &terms).await, Err(Error::Backend(_))));
    }

    #[tokio::test]
    async fn test_encrypt_query_single() {
        let backend = RecordingBackend::default();
        let term = ScalarTerm::new("a", "users", "email").with_index_type(IndexType::Ore);
        let result = encrypt_query(&backend, &config(), term.into(), None).await.unwrap();
        assert_eq!(result.as_encrypted().unwrap().unique.as_deref(), Some("ore:\"a\""));
    }

    #[derive(Debug, Clone)]
    enum Shape {
        Auto(i64),
        Null,
        Explicit(i64),
        Contains(i64),
        PathValue(i64),
        Selector(u8),
    }

    fn shape() -> impl Strategy<Value = Shape> {
        prop_oneof![
            any::<i64>().prop_map(Shape::Auto),
            Just(Shape::Null),
            any::<i64>().prop_map(Shape::Explicit),
            any::<i64>().prop_map(Shape::Contains),
            any::<i64>().prop_map(Shape::PathValue),
            any::<u8>().prop_map(Shape::Selector),
        ]
    }

    fn to_term(shape: &Shape) -> QueryTerm {
        match shape {
            Shape::Auto(n) => ScalarTerm::new(*n, "users", "email").into(),
            Shape::Null => ScalarTerm::new(Value::Null, "users", "email").into(),
            Shape::Explicit(n) => ScalarTerm::new(*n, "users", "email")
                .with_index_type(IndexType::Match)
                .into(),
            Shape::Contains(n) => JsonContainsTerm::new(json!({ "n": n }), "users", "profile").into(),
            Shape::PathValue(n) => JsonPathTerm::with_value(
                JsonPath::parse("p.q").unwrap(),
                *n,
                "users",
                "profile",
            )
            .into(),
            Shape::Selector(n) => JsonPathTerm::selector(
                JsonPath::from_segments([format!("k{n}")]).unwrap(),
                "users",
                "profile",
            )
            .into(),
        }
    }

    fn matches_shape(shape: &Shape, result: &SearchTerm) -> bool {
        let term = |r: &SearchTerm| {
            r.as_encrypted().and_then(|v| v.ste_vec.clone()).and_then(|sv| sv[0].term.clone())
        };
        match shape {
            Shape::Null => result.is_null(),
            Shape::Auto(n) => {
                result.as_encrypted().and_then(|v| v.ciphertext.clone()) == Some(n.to_string())
            }
            Shape::Explicit(n) => {
                result.as_encrypted().and_then(|v| v.unique.clone()) == Some(format!("match:{n}"))
            }
            Shape::Contains(n) => term(result) == Some(echo(&json!({ "n": n }))),
            Shape::PathValue(n) => term(result) == Some(echo(&json!({"p": {"q": n}}))),
            Shape::Selector(n) => {
                result.as_encrypted().and_then(|v| v.selector.clone())
                    == Some(echo(&json!(format!("$.k{n}"))))
            }
        }
    }

    fn payload_has_null(call: &Call) -> bool {
        match call {
            Call::Encrypt(items) => items.iter().any(|i| i.plaintext.is_null()),
            Call::Query(items) => items.iter().any(|i| i.plaintext.is_null()),
            Call::Decrypt(_) => false,
        }
    }

    proptest! {
        #[test]
        fn prop_order_preserved_and_nulls_transparent(shapes in prop::collection::vec(shape(), 0..40)) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let backend = RecordingBackend::default();
            let terms: Vec<QueryTerm> = shapes.iter().map(to_term).collect();

            let results = runtime.block_on(run(&backend, &terms)).unwrap();

            prop_assert_eq!(results.len(), shapes.len());
            for (shape, result) in shapes.iter().zip(&results) {
                prop_assert!(matches_shape(shape, result), "{:?} -> {:?}", shape, result);
            }

            let calls = backend.calls();
            prop_assert!(calls.len() <= 5);
            prop_assert!(!calls.iter().any(payload_has_null));

            let sent: usize = calls
                .iter()
                .map(|c| match c {
                    Call::Encrypt(items) => items.len(),
                    Call::Query(items) => items.len(),
                    Call::Decrypt(n) => *n,
                })
                .sum();
            let non_null = shapes.iter().filter(|s| !matches!(s, Shape::Null)).count();
            prop_assert_eq!(sent, non_null);
        }
    }
}
