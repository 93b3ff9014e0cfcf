//! Declarative index schema: columns, tables and the backend configuration.

pub mod column;
pub mod config;
pub mod table;

pub use column::{
    ColumnConfig, DataType, EncryptedColumn, EncryptedField, IndexesConfig, JsonColumn,
    MatchIndex, OreIndex, SteVecIndex, TokenFilter, Tokenizer, UniqueIndex,
};
pub use config::{build_config, EncryptConfig, CONFIG_VERSION};
pub use table::{FieldGroup, LeafGroup, SchemaLeaf, TableConfig, TableSchema, MAX_PATH_DEPTH};
