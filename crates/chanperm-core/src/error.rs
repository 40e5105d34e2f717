//! Core error types.

use thiserror::Error;

/// Core storage and catalog errors.
#[derive(Debug, Error)]
pub enum Error {
    /// SQLite error.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Table is not part of the schema.
    #[error("unknown table: {0}")]
    UnknownTable(String),

    /// Column is not part of the table.
    #[error("unknown column: {table}.{column}")]
    UnknownColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Table already exists in the schema.
    #[error("table already exists: {0}")]
    DuplicateTable(String),

    /// Column already exists in the table.
    #[error("column already exists: {table}.{column}")]
    DuplicateColumn {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
    },

    /// Invalid data format.
    #[error("invalid data: {0}")]
    InvalidData(String),
}
