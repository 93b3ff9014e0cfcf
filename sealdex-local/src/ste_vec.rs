//! Structural vectors for structured-json columns.
//!
//! A document is flattened into one entry per node. Each entry carries the
//! keyed hash of the node's JSON-Path selector; leaves also carry a term for
//! their value and, in stored documents, their own ciphertext. Array
//! elements share the `[*]` selector of their array, so a containment query
//! encodes to entries that are a subset of every matching document's
//! entries.

use std::collections::HashSet;

use sealdex::encrypted::SteVecEntry;
use sealdex::query::path::{ARRAY_WILDCARD, SELECTOR_ROOT};
use sealdex::query::PathSegment;
use serde_json::Value;

use crate::blind_index::BlindIndexer;
use crate::error::Error;

/// Encodes documents, containment queries and selectors of one column.
pub struct SteVecEncoder<'a> {
    indexer: &'a BlindIndexer,
    prefix: &'a str,
}

impl<'a> SteVecEncoder<'a> {
    /// Creates an encoder over the column's index key and prefix.
    #[must_use]
    pub const fn new(indexer: &'a BlindIndexer, prefix: &'a str) -> Self {
        Self { indexer, prefix }
    }

    /// Hashes a JSON-Path selector such as `$.user.email`.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying MAC fails.
    pub fn selector(&self, selector: &str) -> Result<String, Error> {
        self.indexer.selector(self.prefix, selector)
    }

    /// Encodes a containment query. Entries carry no ciphertext.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying MAC fails.
    pub fn query(&self, document: &Value) -> Result<Vec<SteVecEntry>, Error> {
        self.encode(document, |_| Ok(None))
    }

    /// Encodes a stored document, sealing every leaf with `seal`.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing or sealing fails.
    pub fn document<F>(&self, document: &Value, mut seal: F) -> Result<Vec<SteVecEntry>, Error>
    where
        F: FnMut(&Value) -> Result<String, Error>,
    {
        self.encode(document, |leaf| seal(leaf).map(Some))
    }

    fn encode<F>(&self, document: &Value, mut seal: F) -> Result<Vec<SteVecEntry>, Error>
    where
        F: FnMut(&Value) -> Result<Option<String>, Error>,
    {
        let mut nodes = Vec::new();
        flatten(document, SELECTOR_ROOT.to_string(), &mut nodes);

        nodes
            .into_iter()
            .map(|(selector, leaf)| {
                let selector = self.selector(&selector)?;
                match leaf {
                    Some(value) => Ok(SteVecEntry {
                        selector,
                        term: Some(self.indexer.leaf(self.prefix, value)?),
                        ciphertext: seal(value)?,
                    }),
                    None => Ok(SteVecEntry { selector, term: None, ciphertext: None }),
                }
            })
            .collect()
    }
}

/// Collects `(selector, leaf)` pairs in document order; containers have no leaf.
fn flatten<'v>(value: &'v Value, selector: String, out: &mut Vec<(String, Option<&'v Value>)>) {
    match value {
        Value::Object(object) => {
            for (key, child) in object {
                let mut child_selector = selector.clone();
                push_member(&mut child_selector, key);
                flatten(child, child_selector, out);
            }
            out.push((selector, None));
        }
        Value::Array(items) => {
            let element_selector = format!("{selector}{ARRAY_WILDCARD}");
            for item in items {
                flatten(item, element_selector.clone(), out);
            }
            out.push((selector, None));
        }
        leaf => out.push((selector, Some(leaf))),
    }
}

fn push_member(selector: &mut String, key: &str) {
    match PathSegment::new(key) {
        Ok(segment) => segment.write_selector(selector),
        // empty member name
        Err(_) => selector.push_str("[\"\"]"),
    }
}

/// Returns `true` if every query entry appears in the stored vector.
///
/// Entries are compared on selector and term; ciphertexts are ignored.
#[must_use]
pub fn contains(stored: &[SteVecEntry], query: &[SteVecEntry]) -> bool {
    let stored: HashSet<(&str, Option<&str>)> =
        stored.iter().map(|e| (e.selector.as_str(), e.term.as_deref())).collect();
    query.iter().all(|e| stored.contains(&(e.selector.as_str(), e.term.as_deref())))
}
