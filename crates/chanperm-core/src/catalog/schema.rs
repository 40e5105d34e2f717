//! In-memory schema state evolved by migration operations.

use super::column::ColumnDef;
use super::table::TableDef;
use crate::error::Error;
use std::collections::BTreeMap;

/// The set of tables known at a point in the migration history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaState {
    tables: BTreeMap<String, TableDef>,
}

impl SchemaState {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a table by name.
    pub fn table(&self, name: &str) -> Result<&TableDef, Error> {
        self.tables
            .get(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Get a column of a table.
    pub fn column(&self, table: &str, column: &str) -> Result<&ColumnDef, Error> {
        self.table(table)?
            .column(column)
            .ok_or_else(|| Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })
    }

    /// Whether a table exists.
    pub fn has_table(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    /// Table names in sorted order.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Register a new table.
    pub fn add_table(&mut self, table: TableDef) -> Result<(), Error> {
        if self.tables.contains_key(&table.name) {
            return Err(Error::DuplicateTable(table.name));
        }
        self.tables.insert(table.name.clone(), table);
        Ok(())
    }

    /// Remove a table, returning its definition.
    pub fn remove_table(&mut self, name: &str) -> Result<TableDef, Error> {
        self.tables
            .remove(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }

    /// Append a column to a table.
    pub fn add_column(&mut self, table: &str, column: ColumnDef) -> Result<(), Error> {
        let def = self.table_mut(table)?;
        if def.column(&column.name).is_some() {
            return Err(Error::DuplicateColumn {
                table: table.to_string(),
                column: column.name,
            });
        }
        def.columns.push(column);
        Ok(())
    }

    /// Remove a column from a table, returning its definition.
    pub fn remove_column(&mut self, table: &str, column: &str) -> Result<ColumnDef, Error> {
        let def = self.table_mut(table)?;
        let pos = def
            .columns
            .iter()
            .position(|c| c.name == column)
            .ok_or_else(|| Error::UnknownColumn {
                table: table.to_string(),
                column: column.to_string(),
            })?;
        def.indexed.retain(|c| c != column);
        Ok(def.columns.remove(pos))
    }

    /// Replace a column definition in place, returning the previous one.
    pub fn replace_column(&mut self, table: &str, column: ColumnDef) -> Result<ColumnDef, Error> {
        let def = self.table_mut(table)?;
        let slot = def
            .columns
            .iter_mut()
            .find(|c| c.name == column.name)
            .ok_or_else(|| Error::UnknownColumn {
                table: table.to_string(),
                column: column.name.clone(),
            })?;
        Ok(std::mem::replace(slot, column))
    }

    fn table_mut(&mut self, name: &str) -> Result<&mut TableDef, Error> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTable(name.to_string()))
    }
}
