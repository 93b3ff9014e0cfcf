//! Query term model and JSON paths.

pub mod path;
pub mod term;

pub use path::{JsonPath, PathSegment};
pub use term::{
    is_query_term_array, IndexType, JsonContainedByTerm, JsonContainsTerm, JsonPathTerm,
    QueryOp, QueryTerm, ScalarTerm, TermKind,
};
