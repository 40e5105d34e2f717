//! Table definitions.

use super::column::ColumnDef;
use serde::{Deserialize, Serialize};

/// A table definition: ordered columns plus secondary indexes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Columns that get a plain secondary index.
    pub indexed: Vec<String>,
    /// Column sets that must be unique together.
    #[serde(default)]
    pub unique: Vec<Vec<String>>,
}

impl TableDef {
    /// Create an empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            indexed: Vec::new(),
            unique: Vec::new(),
        }
    }

    /// Add a column.
    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a secondary index on a column.
    pub fn with_index(mut self, column: impl Into<String>) -> Self {
        self.indexed.push(column.into());
        self
    }

    /// Require a set of columns to be unique together.
    pub fn with_unique(mut self, columns: &[&str]) -> Self {
        self.unique
            .push(columns.iter().map(|c| c.to_string()).collect());
        self
    }

    /// Look up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Column names in declaration order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// `CREATE TABLE` statement for this definition.
    pub fn create_sql(&self) -> String {
        self.create_sql_named(&self.name)
    }

    /// `CREATE TABLE` statement using a different table name, for rebuilds.
    pub fn create_sql_named(&self, name: &str) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.to_sql()).collect();
        format!("CREATE TABLE \"{}\" ({})", name, columns.join(", "))
    }

    /// `CREATE INDEX` statements for the secondary and unique indexes.
    pub fn index_sql(&self) -> Vec<String> {
        let plain = self.indexed.iter().map(|col| {
            format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_{col}_idx\" ON \"{table}\"(\"{col}\")",
                table = self.name,
                col = col
            )
        });
        let unique = self.unique.iter().map(|cols| {
            let quoted: Vec<String> = cols.iter().map(|c| format!("\"{}\"", c)).collect();
            format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"{table}_{name}_uniq\" ON \"{table}\"({cols})",
                table = self.name,
                name = cols.join("_"),
                cols = quoted.join(", ")
            )
        });
        plain.chain(unique).collect()
    }
}
