//! Migration engine.
//!
//! Migrations are named lists of [`Operation`]s with declared dependencies.
//! The [`MigrationExecutor`] orders them, records what has been applied in a
//! ledger table, and applies or unapplies them to reach a target.
//!
//! Atomic migrations run in one transaction together with their ledger row.
//! Non-atomic migrations (the batched backfill) commit as they go and are
//! written so that a re-run picks up where a failed run stopped.
//!
//! # Example
//!
//! ```ignore
//! use chanperm_core::migration::{builtin, MigrationConfig, MigrationExecutor, MigrationTarget};
//!
//! let executor = MigrationExecutor::new(store, builtin::registry()?, MigrationConfig::default())?;
//! let result = executor.migrate(&MigrationTarget::Latest)?;
//! println!("applied {} migrations", result.applied.len());
//! ```

pub mod backfill;
pub mod builtin;
pub mod error;
pub mod executor;
pub mod operation;
pub mod plan;
pub mod registry;
pub mod state;

pub use backfill::{
    batch_ranges, BackfillConfig, BackfillReport, BackfillRunner, BackfillTarget, BatchRange,
    DEFAULT_BATCH_SIZE,
};
pub use error::MigrationError;
pub use executor::{MigrationConfig, MigrationExecutor, MigrationResult};
pub use operation::{noop, CodeFn, MigrationContext, Operation};
pub use plan::{Direction, MigrationPlan, MigrationTarget, PlanStep};
pub use registry::{Migration, MigrationRegistry};
pub use state::{MigrationLedger, MigrationRecord, MigrationStatusEntry, LEDGER_TABLE};
