//! Table schemas: named trees of encrypted columns.
//!
//! A table holds leaves directly or inside nested groups. Groups nest at most
//! two levels deep, and [`TableSchema::build`] rejects entry names that are
//! empty or contain `.`, so a column path has at most [`MAX_PATH_DEPTH`]
//! segments (`profile.address.street`) and is unique within the table.
//! Adding an entry under a name already used at the same level replaces it.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use super::column::{ColumnConfig, EncryptedColumn, EncryptedField, JsonColumn};
use crate::error::Error;

/// Maximum number of segments in a column path.
pub const MAX_PATH_DEPTH: usize = 3;

/// A leaf of the schema tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaLeaf {
    /// Scalar column with search indexes
    Column(EncryptedColumn),
    /// JSON column with a structured-JSON index
    Json(JsonColumn),
    /// Bare encrypted value
    Field(EncryptedField),
}

impl SchemaLeaf {
    fn name(&self) -> &str {
        match self {
            Self::Column(c) => c.name(),
            Self::Json(c) => c.name(),
            Self::Field(f) => f.name(),
        }
    }

    fn build(&self) -> ColumnConfig {
        match self {
            Self::Column(c) => c.build(),
            Self::Json(c) => c.build(),
            Self::Field(f) => f.build(),
        }
    }
}

/// Innermost nested group; holds leaves only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeafGroup {
    leaves: BTreeMap<String, SchemaLeaf>,
}

impl LeafGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scalar column.
    #[must_use]
    pub fn column(self, column: EncryptedColumn) -> Self {
        self.leaf(SchemaLeaf::Column(column))
    }

    /// Adds a JSON column.
    #[must_use]
    pub fn json_column(self, column: JsonColumn) -> Self {
        self.leaf(SchemaLeaf::Json(column))
    }

    /// Adds a bare encrypted field.
    #[must_use]
    pub fn field(self, field: EncryptedField) -> Self {
        self.leaf(SchemaLeaf::Field(field))
    }

    fn leaf(mut self, leaf: SchemaLeaf) -> Self {
        self.leaves.insert(leaf.name().to_string(), leaf);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum GroupEntry {
    Leaf(SchemaLeaf),
    Nested(LeafGroup),
}

/// Nested group directly below a table; holds leaves and leaf groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldGroup {
    entries: BTreeMap<String, GroupEntry>,
}

impl FieldGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a scalar column.
    #[must_use]
    pub fn column(self, column: EncryptedColumn) -> Self {
        self.leaf(SchemaLeaf::Column(column))
    }

    /// Adds a JSON column.
    #[must_use]
    pub fn json_column(self, column: JsonColumn) -> Self {
        self.leaf(SchemaLeaf::Json(column))
    }

    /// Adds a bare encrypted field.
    #[must_use]
    pub fn field(self, field: EncryptedField) -> Self {
        self.leaf(SchemaLeaf::Field(field))
    }

    /// Adds a nested group of leaves.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, group: LeafGroup) -> Self {
        self.entries.insert(name.into(), GroupEntry::Nested(group));
        self
    }

    fn leaf(mut self, leaf: SchemaLeaf) -> Self {
        self.entries.insert(leaf.name().to_string(), GroupEntry::Leaf(leaf));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableEntry {
    Leaf(SchemaLeaf),
    Nested(FieldGroup),
}

/// Schema of one encrypted table.
///
/// # Example
///
/// ```
/// use sealdex::schema::{EncryptedColumn, EncryptedField, FieldGroup, JsonColumn, TableSchema};
///
/// let users = TableSchema::new("users")
///     .column(EncryptedColumn::new("email").equality())
///     .json_column(JsonColumn::new("profile"))
///     .nested("address", FieldGroup::new().field(EncryptedField::new("street")));
///
/// let built = users.build()?;
/// assert!(built.columns.contains_key("address.street"));
/// # Ok::<(), sealdex::error::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    name: String,
    entries: BTreeMap<String, TableEntry>,
}

/// Built form of a table: flat map from column path to column config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    /// Table name
    pub table_name: String,
    /// Column path to configuration
    pub columns: BTreeMap<String, ColumnConfig>,
}

impl TableSchema {
    /// Creates an empty table schema.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), entries: BTreeMap::new() }
    }

    /// Returns the table name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds a scalar column.
    #[must_use]
    pub fn column(self, column: EncryptedColumn) -> Self {
        self.leaf(SchemaLeaf::Column(column))
    }

    /// Adds a JSON column.
    #[must_use]
    pub fn json_column(self, column: JsonColumn) -> Self {
        self.leaf(SchemaLeaf::Json(column))
    }

    /// Adds a bare encrypted field.
    #[must_use]
    pub fn field(self, field: EncryptedField) -> Self {
        self.leaf(SchemaLeaf::Field(field))
    }

    /// Adds a nested group.
    #[must_use]
    pub fn nested(mut self, name: impl Into<String>, group: FieldGroup) -> Self {
        self.entries.insert(name.into(), TableEntry::Nested(group));
        self
    }

    fn leaf(mut self, leaf: SchemaLeaf) -> Self {
        self.entries.insert(leaf.name().to_string(), TableEntry::Leaf(leaf));
        self
    }

    /// Flattens the tree into `{path -> column config}`.
    ///
    /// Structured-JSON leaves without an explicit prefix get
    /// `"{table}/{path}"`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidSchema` if a leaf or group name is empty or
    /// contains `.`.
    pub fn build(&self) -> Result<TableConfig, Error> {
        let mut columns = BTreeMap::new();

        for (key, entry) in &self.entries {
            let path = self.segment(None, key)?;
            match entry {
                TableEntry::Leaf(leaf) => self.insert(&mut columns, path, leaf)?,
                TableEntry::Nested(group) => {
                    for (inner, entry) in &group.entries {
                        let path = self.segment(Some(&path), inner)?;
                        match entry {
                            GroupEntry::Leaf(leaf) => self.insert(&mut columns, path, leaf)?,
                            GroupEntry::Nested(leaves) => {
                                for (name, leaf) in &leaves.leaves {
                                    let path = self.segment(Some(&path), name)?;
                                    self.insert(&mut columns, path, leaf)?;
                                }
                            }
                        }
                    }
                }
            }
        }

        backfill_prefixes(&self.name, &mut columns);

        Ok(TableConfig { table_name: self.name.clone(), columns })
    }

    /// Appends one entry name to `parent`, rejecting names that would add
    /// more than one segment.
    fn segment(&self, parent: Option<&str>, name: &str) -> Result<String, Error> {
        if name.is_empty() || name.contains('.') {
            return Err(self.invalid(format!(
                "entry name {name:?} must be a single non-empty segment without '.'"
            )));
        }
        Ok(parent.map_or_else(|| name.to_string(), |parent| format!("{parent}.{name}")))
    }

    fn insert(
        &self,
        columns: &mut BTreeMap<String, ColumnConfig>,
        path: String,
        leaf: &SchemaLeaf,
    ) -> Result<(), Error> {
        match columns.entry(path) {
            Entry::Vacant(slot) => {
                slot.insert(leaf.build());
                Ok(())
            }
            Entry::Occupied(slot) => {
                Err(self.invalid(format!("column path {:?} is defined twice", slot.key())))
            }
        }
    }

    fn invalid(&self, reason: String) -> Error {
        Error::InvalidSchema { table: self.name.clone(), reason }
    }
}

/// Checks that a column path has between one and [`MAX_PATH_DEPTH`]
/// non-empty segments.
pub(crate) fn check_path(table: &str, path: &str) -> Result<(), Error> {
    let depth = path.split('.').count();
    if path.split('.').any(str::is_empty) || depth > MAX_PATH_DEPTH {
        return Err(Error::InvalidSchema {
            table: table.to_string(),
            reason: format!(
                "column path {path:?} must have 1 to {MAX_PATH_DEPTH} non-empty segments"
            ),
        });
    }
    Ok(())
}

/// Fills in missing structured-JSON prefixes as `"{table}/{path}"`.
///
/// Prefixes that are already set are left alone, so running this twice is a
/// no-op.
pub(crate) fn backfill_prefixes(table: &str, columns: &mut BTreeMap<String, ColumnConfig>) {
    for (path, config) in columns.iter_mut() {
        if let Some(ste_vec) = config.indexes.ste_vec.as_mut() {
            if ste_vec.prefix.is_none() {
                ste_vec.prefix = Some(format!("{table}/{path}"));
            }
        }
    }
}
