//! Encrypting a batch of query terms with `Sealdex`.

use sealdex::prelude::*;
use sealdex_local::{LocalBackend, StaticKeyProvider};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("Sealdex Query Terms Example");
    println!("===========================\n");

    // Declare which columns are encrypted and how they can be searched
    let users = TableSchema::new("users")
        .column(EncryptedColumn::new("email").equality().free_text_search())
        .column(EncryptedColumn::new("age").data_type(DataType::Integer).order_and_range())
        .json_column(JsonColumn::new("profile"));
    let config = build_config([&users])?;

    println!("Encryption config:\n{}\n", config.to_json_string()?);

    let backend = LocalBackend::new(config.clone(), StaticKeyProvider::generate("kek_v1"));
    let client = EncryptionClient::new(backend, config)
        .with_audit(AuditMetadata::new().with("sub", "example-user"));
    println!("✓ Client created with the local backend\n");

    // Store a row
    let profile = json!({"name": "Alice", "role": "admin", "tags": ["beta"]});
    let email = client.encrypt(json!("alice@example.com"), "users", "email").await?;
    let stored = client.encrypt(profile.clone(), "users", "profile").await?;
    println!("✓ Encrypted email and profile");
    if let Some(stored) = &stored {
        println!("  - profile vector entries: {}", stored.ste_vec.as_ref().map_or(0, Vec::len));
    }

    // Build one batch mixing every kind of term
    let terms: Vec<QueryTerm> = vec![
        ScalarTerm::new("alice@example.com", "users", "email")
            .with_index_type(IndexType::Unique)
            .with_return_type(ReturnType::CompositeLiteral)
            .into(),
        ScalarTerm::new(30, "users", "age").with_index_type(IndexType::Ore).into(),
        ScalarTerm::new(serde_json::Value::Null, "users", "email").into(),
        JsonPathTerm::selector(JsonPath::parse("role")?, "users", "profile").into(),
        JsonPathTerm::with_value(JsonPath::parse("role")?, "admin", "users", "profile").into(),
        JsonContainsTerm::new(json!({"tags": ["beta"]}), "users", "profile").into(),
    ];

    let results = client.encrypt_query_terms(&terms).await?;
    println!("\n✓ Encrypted {} query terms", results.len());
    for (term, result) in terms.iter().zip(&results) {
        let shape = match result {
            SearchTerm::Null => "null".to_string(),
            SearchTerm::Literal(literal) => format!("literal ({} chars)", literal.len()),
            SearchTerm::Encrypted(value) => format!("{:?}", value.kind),
        };
        println!("  - {:?} on {}.{} -> {shape}", term.kind(), term.table(), term.column());
    }

    // Decrypt what was stored
    if let (Some(email), Some(stored)) = (email, stored) {
        let decrypted = client.bulk_decrypt(vec![
            BulkEncrypted { id: Some("email".into()), data: Some(email) },
            BulkEncrypted { id: Some("profile".into()), data: Some(stored) },
        ]);
        for item in decrypted.await? {
            println!("\n✓ Decrypted {}: {}", item.id.unwrap_or_default(), item.data);
        }
    }

    Ok(())
}
