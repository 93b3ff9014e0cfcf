//! Order-revealing terms for range queries.
//!
//! Plaintexts are mapped to sortable 64-bit blocks and each block is passed
//! through a keyed strictly increasing affine map `a*x + b` over `u128`.
//! Comparing the hex-encoded block lists lexicographically gives the same
//! result as comparing the plaintexts. This leaks order by construction and
//! is meant for development, not production.

use sealdex::schema::DataType;
use serde_json::Value;

use crate::blind_index::BlindIndexer;
use crate::error::Error;

/// Maximum number of 8-byte blocks per string. Longer strings compare on
/// their first 32 bytes.
pub const MAX_STRING_BLOCKS: usize = 4;

/// Keyed monotone encoder.
pub struct OreEncoder {
    scale: u128,
    offset: u128,
}

impl OreEncoder {
    /// Derives the map coefficients from an index key.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying MAC fails.
    pub fn derive(indexer: &BlindIndexer) -> Result<Self, Error> {
        let seed = indexer.mac(&[b"ore-coefficients"])?;
        let mut scale = [0u8; 8];
        let mut offset = [0u8; 8];
        scale.copy_from_slice(&seed[..8]);
        offset.copy_from_slice(&seed[8..]);

        Ok(Self {
            scale: u128::from(u64::from_be_bytes(scale) | 1),
            offset: u128::from(u64::from_be_bytes(offset)),
        })
    }

    /// Encodes a scalar as order blocks.
    ///
    /// Numbers of a `bigint` column are ordered as integers, all other
    /// numbers as floats. Numbers, booleans and strings are supported; other
    /// values yield `None`.
    #[must_use]
    pub fn encode(&self, value: &Value, cast_as: DataType) -> Option<Vec<String>> {
        let blocks = sortable_blocks(value, cast_as)?;
        Some(blocks.into_iter().map(|block| format!("{:032x}", self.map(block))).collect())
    }

    const fn map(&self, block: u64) -> u128 {
        // (2^64 - 1)^2 + (2^64 - 1) < 2^128, so this never overflows.
        self.scale * block as u128 + self.offset
    }
}

fn sortable_blocks(value: &Value, cast_as: DataType) -> Option<Vec<u64>> {
    match value {
        Value::Bool(flag) => Some(vec![u64::from(*flag)]),
        Value::Number(number) if cast_as == DataType::Integer => {
            number.as_i64().map(|int| vec![sortable_i64(int)])
        }
        Value::Number(number) => number.as_f64().map(|float| vec![sortable_f64(float)]),
        Value::String(text) => Some(string_blocks(text.as_bytes())),
        _ => None,
    }
}

const fn sortable_i64(value: i64) -> u64 {
    (value as u64) ^ (1 << 63)
}

fn sortable_f64(value: f64) -> u64 {
    // -0.0 and 0.0 compare equal
    let bits = if value == 0.0 { 0 } else { value.to_bits() };
    if bits >> 63 == 1 {
        !bits
    } else {
        bits | (1 << 63)
    }
}

fn string_blocks(bytes: &[u8]) -> Vec<u64> {
    let bytes = &bytes[..bytes.len().min(MAX_STRING_BLOCKS * 8)];
    if bytes.is_empty() {
        return vec![0];
    }
    bytes
        .chunks(8)
        .map(|chunk| {
            let mut block = [0u8; 8];
            block[..chunk.len()].copy_from_slice(chunk);
            u64::from_be_bytes(block)
        })
        .collect()
}
