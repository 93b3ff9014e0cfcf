//! JSON paths used by structured-JSON queries.
//!
//! A [`JsonPath`] is a non-empty list of non-empty segments. It renders to a
//! canonical JSON-Path selector where identifier segments use dot notation
//! and every other segment is bracket-quoted:
//!
//! ```text
//! ["user", "role"]        -> $.user.role
//! ["user", "first name"]  -> $.user["first name"]
//! ["tags", "0"]           -> $.tags["0"]
//! ```

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::Error;

/// Root of every selector.
pub const SELECTOR_ROOT: &str = "$";

/// Segment matching any element of an array.
pub const ARRAY_WILDCARD: &str = "[*]";

/// One validated path segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathSegment(String);

impl PathSegment {
    /// Creates a segment.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the segment is empty.
    pub fn new(segment: impl Into<String>) -> Result<Self, Error> {
        let segment = segment.into();
        if segment.is_empty() {
            return Err(Error::InvalidPath("empty path segment".to_string()));
        }
        Ok(Self(segment))
    }

    /// Returns the raw segment.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the segment can be written in dot notation:
    /// `[A-Za-z_][A-Za-z0-9_]*`.
    #[must_use]
    pub fn is_identifier(&self) -> bool {
        let mut chars = self.0.chars();
        chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Appends this segment to a selector.
    pub fn write_selector(&self, out: &mut String) {
        if self.is_identifier() {
            out.push('.');
            out.push_str(&self.0);
        } else {
            out.push('[');
            out.push_str(&quote(&self.0));
            out.push(']');
        }
    }
}

fn quote(segment: &str) -> String {
    // A JSON string literal is a valid quoted JSON-Path member name.
    Value::String(segment.to_string()).to_string()
}

/// A non-empty sequence of path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Creates a path from segments.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if there are no segments or one is empty.
    pub fn from_segments<I, S>(segments: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let segments =
            segments.into_iter().map(PathSegment::new).collect::<Result<Vec<_>, _>>()?;

        if segments.is_empty() {
            return Err(Error::InvalidPath("path has no segments".to_string()));
        }
        Ok(Self { segments })
    }

    /// Parses a dot-separated path such as `user.role` or `$.user.role`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidPath` if the path is empty or has an empty
    /// segment (`user..role`).
    pub fn parse(path: &str) -> Result<Self, Error> {
        let trimmed = path.strip_prefix("$.").unwrap_or(path);
        Self::from_segments(trimmed.split('.')).map_err(|_| Error::InvalidPath(path.to_string()))
    }

    /// Returns the segments.
    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Renders the canonical JSON-Path selector.
    #[must_use]
    pub fn to_selector(&self) -> String {
        let mut out = String::from(SELECTOR_ROOT);
        for segment in &self.segments {
            segment.write_selector(&mut out);
        }
        out
    }

    /// Wraps a value in nested objects following the path.
    ///
    /// `["user", "role"]` with `"admin"` becomes `{"user": {"role": "admin"}}`.
    #[must_use]
    pub fn wrap_value(&self, value: Value) -> Value {
        self.segments.iter().rev().fold(value, |inner, segment| {
            let mut object = Map::new();
            object.insert(segment.as_str().to_string(), inner);
            Value::Object(object)
        })
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_selector())
    }
}

impl Serialize for JsonPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.segments.iter().map(PathSegment::as_str))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPath {
    Dotted(String),
    Segments(Vec<String>),
}

impl<'de> Deserialize<'de> for JsonPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = match RawPath::deserialize(deserializer)? {
            RawPath::Dotted(path) => Self::parse(&path),
            RawPath::Segments(segments) => Self::from_segments(segments),
        };
        path.map_err(serde::de::Error::custom)
    }
}
