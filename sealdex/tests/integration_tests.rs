//! Integration tests for sealdex with the local backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use sealdex::prelude::*;
use sealdex_local::{ste_vec, LocalBackend, StaticKeyProvider};
use serde_json::{json, Value};

/// Delegates to the local backend and records query batch sizes.
struct Counting {
    inner: LocalBackend<StaticKeyProvider>,
    calls: AtomicUsize,
    batches: Mutex<Vec<(IndexType, QueryOp, usize)>>,
}

impl Counting {
    fn batches(&self) -> Vec<(IndexType, QueryOp, usize)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait]
impl CryptoBackend for Counting {
    async fn bulk_encrypt(
        &self,
        items: Vec<EncryptPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.bulk_encrypt(items, metadata).await
    }

    async fn bulk_encrypt_query(
        &self,
        items: Vec<QueryPayload>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<EncryptedValue>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(first) = items.first() {
            self.batches.lock().unwrap().push((first.index_type, first.query_op, items.len()));
        }
        self.inner.bulk_encrypt_query(items, metadata).await
    }

    async fn bulk_decrypt(
        &self,
        items: Vec<EncryptedValue>,
        metadata: Option<&AuditMetadata>,
    ) -> Result<Vec<Value>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.bulk_decrypt(items, metadata).await
    }
}

fn config() -> EncryptConfig {
    let users = TableSchema::new("users")
        .column(EncryptedColumn::new("email").equality().free_text_search())
        .column(EncryptedColumn::new("age").data_type(DataType::Integer).order_and_range());
    let documents = TableSchema::new("documents")
        .column(EncryptedColumn::new("title").equality())
        .json_column(JsonColumn::new("metadata"));
    build_config([&users, &documents]).unwrap()
}

fn client() -> EncryptionClient<Counting> {
    let config = config();
    let backend = Counting {
        inner: LocalBackend::new(config.clone(), StaticKeyProvider::generate("kek_v1")),
        calls: AtomicUsize::new(0),
        batches: Mutex::new(Vec::new()),
    };
    EncryptionClient::new(backend, config)
}

#[tokio::test]
async fn test_round_trip_scalars_and_documents() {
    let client = client();

    let email = client.encrypt(json!("alice@example.com"), "users", "email").await.unwrap();
    let age = client.encrypt(json!(42), "users", "age").await.unwrap();
    let doc = json!({"user": {"email": "alice@example.com"}, "role": "admin", "tags": [1, 2]});
    let metadata = client.encrypt(doc.clone(), "documents", "metadata").await.unwrap();

    assert_eq!(client.decrypt(email.unwrap()).await.unwrap(), json!("alice@example.com"));
    assert_eq!(client.decrypt(age.unwrap()).await.unwrap(), json!(42));
    assert_eq!(client.decrypt(metadata.unwrap()).await.unwrap(), doc);
}

#[tokio::test]
async fn test_searchable_json_batch() {
    let client = client();
    let terms = vec![
        ScalarTerm::new("$.user.email", "documents", "metadata")
            .with_index_type(IndexType::SteVec)
            .into(),
        ScalarTerm::new(json!({"role": "admin"}), "documents", "metadata")
            .with_index_type(IndexType::SteVec)
            .into(),
        ScalarTerm::new(Value::Null, "documents", "metadata").with_index_type(IndexType::SteVec).into(),
    ];

    let results = client.encrypt_query_terms(&terms).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_encrypted().unwrap().kind, ArtifactKind::Selector);
    assert_eq!(results[1].as_encrypted().unwrap().kind, ArtifactKind::SteVec);
    assert!(results[2].is_null());

    let batches = client.backend().batches();
    assert_eq!(batches.len(), 2);
    assert!(batches.contains(&(IndexType::SteVec, QueryOp::Default, 1)));
    assert!(batches.contains(&(IndexType::SteVec, QueryOp::Selector, 1)));
}

#[tokio::test]
async fn test_hundred_equality_terms_single_call() {
    let client = client();
    let terms: Vec<QueryTerm> = (0..100)
        .map(|i| {
            ScalarTerm::new(format!("user{i}@example.com"), "users", "email")
                .with_index_type(IndexType::Unique)
                .into()
        })
        .collect();

    let results = client.encrypt_query_terms(&terms).await.unwrap();

    assert_eq!(results.len(), 100);
    assert_eq!(client.backend().calls.load(Ordering::SeqCst), 1);
    let distinct: HashSet<_> =
        results.iter().map(|r| r.as_encrypted().unwrap().unique.clone().unwrap()).collect();
    assert_eq!(distinct.len(), 100);
}

#[tokio::test]
async fn test_query_terms_match_stored_values() {
    let client = client();
    let doc = json!({"user": {"email": "alice@example.com"}, "role": "admin", "tags": ["x", "y"]});
    let stored = client.encrypt(doc, "documents", "metadata").await.unwrap().unwrap();
    let entries = stored.ste_vec.as_ref().unwrap();

    let terms = vec![
        JsonPathTerm::selector(JsonPath::parse("user.email").unwrap(), "documents", "metadata")
            .into(),
        JsonContainsTerm::new(json!({"tags": ["y"]}), "documents", "metadata").into(),
        JsonPathTerm::with_value(
            JsonPath::parse("user.email").unwrap(),
            "alice@example.com",
            "documents",
            "metadata",
        )
        .into(),
        JsonContainsTerm::new(json!({"role": "user"}), "documents", "metadata").into(),
    ];
    let results = client.encrypt_query_terms(&terms).await.unwrap();

    let selector = results[0].as_encrypted().unwrap().selector.as_ref().unwrap();
    assert!(entries.iter().any(|entry| &entry.selector == selector));

    let vector = |i: usize| results[i].as_encrypted().unwrap().ste_vec.clone().unwrap();
    assert!(ste_vec::contains(entries, &vector(1)));
    assert!(ste_vec::contains(entries, &vector(2)));
    assert!(!ste_vec::contains(entries, &vector(3)));
}

#[tokio::test]
async fn test_equality_term_matches_stored_term() {
    let client = client();
    let stored = client.encrypt(json!("Quarterly report"), "documents", "title").await.unwrap();

    let term = ScalarTerm::new("Quarterly report", "documents", "title")
        .with_index_type(IndexType::Unique);
    let result = client.encrypt_query(term).await.unwrap();

    assert_eq!(result.as_encrypted().unwrap().unique, stored.unwrap().unique);
}

#[tokio::test]
async fn test_composite_literal_output() {
    let client = client();
    let term = ScalarTerm::new(30, "users", "age")
        .with_index_type(IndexType::Ore)
        .with_return_type(ReturnType::CompositeLiteral);

    let result = client.encrypt_query(term).await.unwrap();

    let literal = result.as_literal().unwrap();
    assert!(literal.starts_with("(\"{") && literal.ends_with("}\")"));
}

#[tokio::test]
async fn test_missing_structured_index_fails_before_backend() {
    let client = client();
    let term = JsonContainsTerm::new(json!({"a": 1}), "users", "email");

    let err = client.encrypt_query(term).await.unwrap_err();

    assert!(matches!(err, Error::MissingSteVecIndex { .. }));
    assert_eq!(client.backend().calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_backend_rejection_fails_whole_batch() {
    let client = client();
    let terms = vec![
        ScalarTerm::new("a@b.c", "users", "email").with_index_type(IndexType::Unique).into(),
        ScalarTerm::new(5, "users", "age").with_index_type(IndexType::Unique).into(),
    ];

    let err = client.encrypt_query_terms(&terms).await.unwrap_err();

    assert_eq!(err.code(), Some("INDEX_NOT_CONFIGURED"));
}
