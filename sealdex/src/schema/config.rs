//! Versioned encryption configuration consumed by the backend.
//!
//! Wire format:
//!
//! ```text
//! {"v": 2, "tables": {"users": {"email": {"cast_as": "string", "indexes": {...}}}}}
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::column::ColumnConfig;
use super::table::{backfill_prefixes, check_path, TableSchema};
use crate::error::Error;

/// Configuration format version.
pub const CONFIG_VERSION: u32 = 2;

/// Configuration of every encrypted table, keyed by table then column path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptConfig {
    /// Format version
    pub v: u32,
    /// Table name to column path to column config
    pub tables: BTreeMap<String, BTreeMap<String, ColumnConfig>>,
}

impl Default for EncryptConfig {
    fn default() -> Self {
        Self { v: CONFIG_VERSION, tables: BTreeMap::new() }
    }
}

impl EncryptConfig {
    /// Parses a configuration from JSON.
    ///
    /// Missing structured-JSON prefixes are filled in the same way
    /// [`build_config`] does.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if the JSON does not match the format,
    /// or `Error::InvalidSchema` if a column path is empty or deeper than
    /// three segments.
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        let mut config: Self = serde_json::from_str(json)?;
        for (table, columns) in &mut config.tables {
            for path in columns.keys() {
                check_path(table, path)?;
            }
            backfill_prefixes(table, columns);
        }
        Ok(config)
    }

    /// Serializes the configuration to JSON.
    ///
    /// # Errors
    ///
    /// Returns `Error::Serialization` if serialization fails.
    pub fn to_json_string(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    /// Looks up the configuration of a column.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownTable` or `Error::UnknownColumn` if the table or
    /// column is not configured.
    pub fn column(&self, table: &str, column: &str) -> Result<&ColumnConfig, Error> {
        let columns =
            self.tables.get(table).ok_or_else(|| Error::UnknownTable(table.to_string()))?;

        columns.get(column).ok_or_else(|| Error::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
    }

    /// Returns `true` if the column exists and has a structured-json index.
    #[must_use]
    pub fn has_ste_vec(&self, table: &str, column: &str) -> bool {
        self.column(table, column).is_ok_and(ColumnConfig::has_ste_vec)
    }
}

/// Builds the versioned configuration for a set of tables.
///
/// Tables with the same name are merged.
///
/// # Example
///
/// ```
/// use sealdex::schema::{build_config, EncryptedColumn, JsonColumn, TableSchema};
///
/// let users = TableSchema::new("users")
///     .column(EncryptedColumn::new("email").equality())
///     .json_column(JsonColumn::new("profile"));
///
/// let config = build_config([&users])?;
/// assert_eq!(config.v, 2);
/// assert!(config.has_ste_vec("users", "profile"));
/// # Ok::<(), sealdex::error::Error>(())
/// ```
///
/// # Errors
///
/// Returns `Error::InvalidSchema` if a table fails to build or two schemas
/// of the same table define the same column path.
pub fn build_config<'a>(
    tables: impl IntoIterator<Item = &'a TableSchema>,
) -> Result<EncryptConfig, Error> {
    let mut config = EncryptConfig::default();

    for table in tables {
        let built = table.build()?;
        let columns = config.tables.entry(built.table_name).or_default();
        for (path, column) in built.columns {
            if columns.contains_key(&path) {
                return Err(Error::InvalidSchema {
                    table: table.name().to_string(),
                    reason: format!("column path {path:?} is defined twice"),
                });
            }
            columns.insert(path, column);
        }
    }

    for (table, columns) in &mut config.tables {
        backfill_prefixes(table, columns);
    }

    Ok(config)
}
