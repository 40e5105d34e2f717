//! Schema catalog.
//!
//! Describes tables, columns and foreign keys independently of the live
//! database. Migrations evolve a [`SchemaState`] alongside the SQL they run, so
//! a later operation can rebuild a table from its current definition.

mod column;
mod schema;
mod table;

pub use column::{ColumnDef, DeleteBehavior, ForeignKey, SqlType};
pub use schema::SchemaState;
pub use table::TableDef;
