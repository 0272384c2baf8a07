//! Primary-key column lookup.
//!
//! The Data API knows nothing about application keys, so the name of a
//! layout's id field comes from entity metadata supplied by the caller.

use std::collections::HashMap;

/// Column assumed when no metadata describes a layout.
pub const DEFAULT_ID_COLUMN: &str = "id";

/// Source of identifier columns per table/layout.
pub trait EntityMetadata: Send + Sync {
    /// Identifier column names of `table`, in declaration order.
    fn identifier_columns(&self, table: &str) -> Vec<String>;
}

/// Metadata held in memory, usually loaded from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticMetadata {
    tables: HashMap<String, Vec<String>>,
}

impl StaticMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the identifier columns of `table`.
    pub fn with(mut self, table: impl Into<String>, columns: &[&str]) -> Self {
        self.tables.insert(
            table.into(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }
}

impl From<HashMap<String, Vec<String>>> for StaticMetadata {
    fn from(tables: HashMap<String, Vec<String>>) -> Self {
        Self { tables }
    }
}

impl EntityMetadata for StaticMetadata {
    fn identifier_columns(&self, table: &str) -> Vec<String> {
        self.tables.get(table).cloned().unwrap_or_default()
    }
}

/// Name of the id column of `layout`: the last declared identifier column,
/// or [`DEFAULT_ID_COLUMN`].
pub fn id_column(layout: &str, metadata: &dyn EntityMetadata) -> String {
    metadata
        .identifier_columns(layout)
        .pop()
        .unwrap_or_else(|| DEFAULT_ID_COLUMN.to_string())
}
