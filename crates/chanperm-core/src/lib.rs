//! chanperm core - schema catalog, SQLite store and migration engine for
//! channel permission settings.

pub mod catalog;
pub mod error;
pub mod migration;
pub mod model;
pub mod storage;

pub use catalog::{ColumnDef, DeleteBehavior, SchemaState, SqlType, TableDef};
pub use error::Error;
pub use migration::{
    BackfillConfig, BackfillReport, BackfillRunner, MigrationConfig, MigrationError,
    MigrationExecutor, MigrationPlan, MigrationRegistry, MigrationTarget,
};
pub use model::{GroupId, RealmId, StreamId};
pub use storage::{Realms, StorageConfig, Store, Streams};
