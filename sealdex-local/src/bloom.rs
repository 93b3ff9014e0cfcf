//! Free-text match index: tokenizers and a keyed bloom filter.

use std::collections::BTreeSet;

use sealdex::schema::{MatchIndex, Tokenizer};

use crate::blind_index::BlindIndexer;
use crate::error::Error;

/// Splits text into tokens and applies the index's token filters.
#[must_use]
pub fn tokenize(text: &str, options: &MatchIndex) -> Vec<String> {
    let filtered = options.token_filters.iter().fold(text.to_string(), |t, f| f.apply(&t));

    let mut tokens = match options.tokenizer {
        Tokenizer::Standard => filtered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect(),
        Tokenizer::Ngram { token_length } => ngrams(&filtered, token_length),
    };

    if options.include_original && !filtered.is_empty() {
        tokens.push(filtered);
    }
    tokens
}

/// Splits a match query into tokens.
///
/// The whole query string is never added, since it is not a token of a
/// longer stored value. With the ngram tokenizer a query shorter than the
/// n-gram length yields no tokens, so its filter matches every stored value
/// instead of none.
#[must_use]
pub fn tokenize_query(text: &str, options: &MatchIndex) -> Vec<String> {
    let options = MatchIndex { include_original: false, ..options.clone() };
    if let Tokenizer::Ngram { token_length } = options.tokenizer {
        let filtered = options.token_filters.iter().fold(text.to_string(), |t, f| f.apply(&t));
        if filtered.chars().count() < token_length {
            return Vec::new();
        }
    }
    tokenize(text, &options)
}

fn ngrams(text: &str, length: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if length == 0 || chars.len() <= length {
        return vec![text.to_string()];
    }
    chars.windows(length).map(|window| window.iter().collect()).collect()
}

/// Bloom filter of `m` bits with `k` keyed hash functions per token.
pub struct BloomFilter<'a> {
    indexer: &'a BlindIndexer,
    k: usize,
    m: usize,
}

impl<'a> BloomFilter<'a> {
    /// Creates a filter over an index key.
    #[must_use]
    pub fn new(indexer: &'a BlindIndexer, options: &MatchIndex) -> Self {
        Self { indexer, k: options.k.max(1), m: options.m.max(1) }
    }

    /// Sorted positions of the set bits for the given tokens.
    ///
    /// A query's bits being a subset of a stored value's bits means every
    /// query token may be present; false positives are possible.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying MAC fails.
    pub fn bits<I, S>(&self, tokens: I) -> Result<Vec<u32>, Error>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let m = self.m as u64;
        let mut bits = BTreeSet::new();
        for token in tokens {
            let mac = self.indexer.mac(&[token.as_ref().as_bytes()])?;
            let mut h1 = [0u8; 8];
            let mut h2 = [0u8; 8];
            h1.copy_from_slice(&mac[..8]);
            h2.copy_from_slice(&mac[8..]);
            let (h1, h2) = (u64::from_be_bytes(h1), u64::from_be_bytes(h2));

            // Double hashing: position_i = h1 + i * h2 (mod m)
            for i in 0..self.k as u64 {
                let position = h1.wrapping_add(i.wrapping_mul(h2)) % m;
                bits.insert(u32::try_from(position).map_err(|_| {
                    Error::IndexGenerationFailed(format!("bloom filter size {m} exceeds u32"))
                })?);
            }
        }
        Ok(bits.into_iter().collect())
    }
}

/// Returns `true` if every query bit is set in the stored filter.
#[must_use]
pub fn may_contain(stored: &[u32], query: &[u32]) -> bool {
    query.iter().all(|bit| stored.binary_search(bit).is_ok())
}
