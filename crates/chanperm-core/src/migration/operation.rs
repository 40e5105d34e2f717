//! Migration operations.
//!
//! Every operation has two halves: a state change applied to the in-memory
//! [`SchemaState`], and the database change derived from the states before
//! and after it.

use super::backfill::BackfillConfig;
use super::error::MigrationError;
use crate::catalog::{ColumnDef, SchemaState, TableDef};
use crate::storage::ddl;
use rusqlite::Connection;

/// Settings handed to code operations.
#[derive(Debug, Clone, Default)]
pub struct MigrationContext {
    /// Backfill settings.
    pub backfill: BackfillConfig,
}

/// A data migration function.
pub type CodeFn = fn(&Connection, &MigrationContext) -> Result<(), MigrationError>;

/// Code operation that does nothing, for reverses that need no work.
pub fn noop(_conn: &Connection, _ctx: &MigrationContext) -> Result<(), MigrationError> {
    Ok(())
}

/// A single schema or data change.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Create a table.
    CreateTable(TableDef),

    /// Add a column to a table.
    AddField {
        /// Table name.
        table: String,
        /// New column.
        column: ColumnDef,
    },

    /// Replace a column's definition, keeping its data.
    AlterField {
        /// Table name.
        table: String,
        /// New definition; matched to the old one by name.
        column: ColumnDef,
    },

    /// Run a data migration function.
    RunCode {
        /// Name for logs and plans.
        name: &'static str,
        /// Forward function.
        forward: CodeFn,
        /// Reverse function; `None` makes the operation irreversible.
        reverse: Option<CodeFn>,
        /// Whether squashing may drop this operation.
        elidable: bool,
    },
}

impl Operation {
    /// One-line description.
    pub fn describe(&self) -> String {
        match self {
            Operation::CreateTable(table) => format!("Create table {}", table.name),
            Operation::AddField { table, column } => {
                format!("Add field {} to {}", column.name, table)
            }
            Operation::AlterField { table, column } => {
                format!("Alter field {} on {}", column.name, table)
            }
            Operation::RunCode { name, .. } => format!("Run code {}", name),
        }
    }

    /// Whether the operation can be unapplied.
    pub fn is_reversible(&self) -> bool {
        !matches!(self, Operation::RunCode { reverse: None, .. })
    }

    /// Apply this operation to the schema state.
    pub fn state_forward(&self, state: &mut SchemaState) -> Result<(), MigrationError> {
        match self {
            Operation::CreateTable(table) => state.add_table(table.clone())?,
            Operation::AddField { table, column } => state.add_column(table, column.clone())?,
            Operation::AlterField { table, column } => {
                state.replace_column(table, column.clone())?;
            }
            Operation::RunCode { .. } => {}
        }
        Ok(())
    }

    /// Apply the database change. `from` and `to` are the schema states
    /// before and after this operation.
    pub fn database_forward(
        &self,
        conn: &Connection,
        from: &SchemaState,
        to: &SchemaState,
        ctx: &MigrationContext,
    ) -> Result<(), MigrationError> {
        match self {
            Operation::CreateTable(table) => ddl::create_table(conn, table)?,
            Operation::AddField { table, column } => {
                ddl::add_column(conn, from.table(table)?, column)?;
            }
            Operation::AlterField { table, column } => {
                let previous = from.column(table, &column.name)?;
                if previous == column {
                    tracing::debug!(%table, column = %column.name, "column unchanged, skipping rebuild");
                    return Ok(());
                }
                check_nulls(conn, table, previous, column)?;
                ddl::rebuild_table(conn, from.table(table)?, to.table(table)?)?;
            }
            Operation::RunCode { forward, .. } => forward(conn, ctx)?,
        }
        Ok(())
    }

    /// Undo the database change. `from` and `to` are the same states passed
    /// to [`database_forward`](Self::database_forward).
    pub fn database_backward(
        &self,
        conn: &Connection,
        from: &SchemaState,
        to: &SchemaState,
        ctx: &MigrationContext,
    ) -> Result<(), MigrationError> {
        match self {
            Operation::CreateTable(table) => ddl::drop_table(conn, &table.name)?,
            Operation::AddField { table, .. } => {
                ddl::rebuild_table(conn, to.table(table)?, from.table(table)?)?;
            }
            Operation::AlterField { table, column } => {
                let restored = from.column(table, &column.name)?;
                if restored == column {
                    return Ok(());
                }
                check_nulls(conn, table, column, restored)?;
                ddl::rebuild_table(conn, to.table(table)?, from.table(table)?)?;
            }
            Operation::RunCode {
                reverse: Some(reverse),
                ..
            } => reverse(conn, ctx)?,
            Operation::RunCode { reverse: None, .. } => {
                return Err(MigrationError::Irreversible {
                    operation: self.describe(),
                });
            }
        }
        Ok(())
    }
}

/// Refuse to make a column NOT NULL while NULL rows remain.
fn check_nulls(
    conn: &Connection,
    table: &str,
    old: &ColumnDef,
    new: &ColumnDef,
) -> Result<(), MigrationError> {
    if !old.nullable || new.nullable {
        return Ok(());
    }
    let count = ddl::count_nulls(conn, table, &new.name)?;
    if count > 0 {
        return Err(MigrationError::NullsRemain {
            table: table.to_string(),
            column: new.name.clone(),
            count,
        });
    }
    Ok(())
}
