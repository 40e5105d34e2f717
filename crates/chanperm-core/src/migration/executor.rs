//! Migration executor: plans against the ledger, then applies or unapplies
//! migrations one at a time.

use super::backfill::{BackfillConfig, BackfillReport, BackfillRunner};
use super::error::MigrationError;
use super::operation::MigrationContext;
use super::plan::{Direction, MigrationPlan, MigrationTarget};
use super::registry::{Migration, MigrationRegistry};
use super::state::{MigrationLedger, MigrationStatusEntry};
use crate::catalog::SchemaState;
use crate::model::{CAN_CREATE_TOPICS_GROUP_COLUMN, STREAM_TABLE};
use crate::storage::{ddl, Store, Streams};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Migration executor configuration.
#[derive(Debug, Clone, Default)]
pub struct MigrationConfig {
    /// Backfill configuration.
    pub backfill: BackfillConfig,
    /// Plan and log without changing the database.
    pub dry_run: bool,
}

/// Result of a migration run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MigrationResult {
    /// The plan that was run (or would have been, in a dry run).
    pub plan: MigrationPlan,
    /// Migrations applied, in order.
    pub applied: Vec<String>,
    /// Migrations unapplied, in order.
    pub unapplied: Vec<String>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

/// Applies registered migrations to a store.
pub struct MigrationExecutor {
    store: Arc<Store>,
    registry: MigrationRegistry,
    config: MigrationConfig,
}

impl MigrationExecutor {
    /// Create a new migration executor, creating the ledger table if needed.
    /// A dry-run executor never writes, so it leaves a missing ledger missing.
    pub fn new(
        store: Arc<Store>,
        registry: MigrationRegistry,
        config: MigrationConfig,
    ) -> Result<Self, MigrationError> {
        config.backfill.validate()?;
        if !config.dry_run {
            store.with_connection(MigrationLedger::ensure)?;
        }
        Ok(Self {
            store,
            registry,
            config,
        })
    }

    /// The registry this executor runs.
    pub fn registry(&self) -> &MigrationRegistry {
        &self.registry
    }

    /// Names of applied migrations.
    pub fn applied(&self) -> Result<BTreeSet<String>, MigrationError> {
        let records = self.store.with_connection(MigrationLedger::applied)?;
        Ok(records.into_iter().map(|r| r.name).collect())
    }

    /// Every registered migration with its ledger status, in dependency order.
    pub fn status(&self) -> Result<Vec<MigrationStatusEntry>, MigrationError> {
        let records: BTreeMap<_, _> = self
            .store
            .with_connection(MigrationLedger::applied)?
            .into_iter()
            .map(|r| (r.name, r.applied_at))
            .collect();

        Ok(self
            .registry
            .migrations()
            .iter()
            .map(|m| MigrationStatusEntry {
                name: m.name.clone(),
                applied: records.contains_key(&m.name),
                applied_at: records.get(&m.name).copied(),
                atomic: m.atomic,
                reversible: m.is_reversible(),
            })
            .collect())
    }

    /// Work needed to reach `target`.
    pub fn plan(&self, target: &MigrationTarget) -> Result<MigrationPlan, MigrationError> {
        let applied = self.applied()?;
        let ordered = self.registry.migrations();

        let plan = match target {
            MigrationTarget::Latest => MigrationPlan::forward(
                ordered
                    .iter()
                    .filter(|m| !applied.contains(&m.name))
                    .map(|m| m.name.clone()),
            ),
            MigrationTarget::Zero => MigrationPlan::backward(
                ordered
                    .iter()
                    .rev()
                    .filter(|m| applied.contains(&m.name))
                    .map(|m| m.name.clone()),
            ),
            MigrationTarget::Named(name) if applied.contains(name) => {
                let descendants = self.registry.descendants(name)?;
                MigrationPlan::backward(
                    ordered
                        .iter()
                        .rev()
                        .filter(|m| descendants.contains(&m.name) && applied.contains(&m.name))
                        .map(|m| m.name.clone()),
                )
            }
            MigrationTarget::Named(name) => {
                let ancestors = self.registry.ancestors(name)?;
                MigrationPlan::forward(
                    ordered
                        .iter()
                        .filter(|m| ancestors.contains(&m.name) && !applied.contains(&m.name))
                        .map(|m| m.name.clone()),
                )
            }
        };

        Ok(plan)
    }

    /// Bring the database to `target`.
    ///
    /// Stops at the first failing migration. Migrations finished before it stay
    /// applied.
    pub fn migrate(&self, target: &MigrationTarget) -> Result<MigrationResult, MigrationError> {
        let plan = self.plan(target)?;
        let mut result = MigrationResult {
            plan: plan.clone(),
            dry_run: self.config.dry_run,
            ..Default::default()
        };

        if plan.is_empty() {
            tracing::info!("no migrations to apply");
            return Ok(result);
        }

        for step in &plan.steps {
            let migration = self.registry.get(&step.migration)?;
            if step.direction == Direction::Backward && !migration.is_reversible() {
                return Err(MigrationError::MigrationFailed {
                    migration: migration.name.clone(),
                    source: Box::new(MigrationError::Irreversible {
                        operation: migration.name.clone(),
                    }),
                });
            }
        }

        if self.config.dry_run {
            for step in &plan.steps {
                tracing::info!(migration = %step.migration, "dry run: {}", step);
            }
            return Ok(result);
        }

        for step in &plan.steps {
            let migration = self.registry.get(&step.migration)?;
            let outcome = match step.direction {
                Direction::Forward => self.apply(migration),
                Direction::Backward => self.unapply(migration),
            };
            outcome.map_err(|e| {
                tracing::error!(migration = %migration.name, error = %e, "migration failed");
                MigrationError::MigrationFailed {
                    migration: migration.name.clone(),
                    source: Box::new(e),
                }
            })?;

            match step.direction {
                Direction::Forward => result.applied.push(migration.name.clone()),
                Direction::Backward => result.unapplied.push(migration.name.clone()),
            }
        }

        Ok(result)
    }

    /// Run the channel permission backfill on its own.
    ///
    /// Safe to run at any time after the column exists; only unset rows are
    /// touched.
    pub fn run_backfill(&self) -> Result<BackfillReport, MigrationError> {
        let runner = BackfillRunner::new(self.config.backfill.clone());
        self.store.with_connection(|conn| {
            ddl::column_not_null(conn, STREAM_TABLE, CAN_CREATE_TOPICS_GROUP_COLUMN)?;
            runner.run(&Streams::new(conn))
        })
    }

    fn context(&self) -> MigrationContext {
        MigrationContext {
            backfill: self.config.backfill.clone(),
        }
    }

    fn apply(&self, migration: &Migration) -> Result<(), MigrationError> {
        tracing::info!(
            migration = %migration.name,
            atomic = migration.atomic,
            "applying migration"
        );
        let state = self.registry.state_before(&migration.name)?;

        if migration.atomic {
            self.store
                .transaction(|tx| self.apply_operations(tx, migration, state))
        } else {
            self.store
                .with_connection(|conn| self.apply_operations(conn, migration, state))
        }
    }

    fn apply_operations(
        &self,
        conn: &Connection,
        migration: &Migration,
        mut state: SchemaState,
    ) -> Result<(), MigrationError> {
        let ctx = self.context();
        for op in &migration.operations {
            let before = state.clone();
            op.state_forward(&mut state)?;
            tracing::info!(migration = %migration.name, "{}", op.describe());
            op.database_forward(conn, &before, &state, &ctx)?;
        }
        MigrationLedger::record(conn, &migration.name)?;
        Ok(())
    }

    fn unapply(&self, migration: &Migration) -> Result<(), MigrationError> {
        tracing::info!(migration = %migration.name, "unapplying migration");
        let mut states = vec![self.registry.state_before(&migration.name)?];
        for op in &migration.operations {
            let mut next = states[states.len() - 1].clone();
            op.state_forward(&mut next)?;
            states.push(next);
        }

        if migration.atomic {
            self.store
                .transaction(|tx| self.unapply_operations(tx, migration, &states))
        } else {
            self.store
                .with_connection(|conn| self.unapply_operations(conn, migration, &states))
        }
    }

    /// `states[i]` is the schema before operation `i`, `states[i + 1]` after it.
    fn unapply_operations(
        &self,
        conn: &Connection,
        migration: &Migration,
        states: &[SchemaState],
    ) -> Result<(), MigrationError> {
        let ctx = self.context();
        for (i, op) in migration.operations.iter().enumerate().rev() {
            tracing::info!(migration = %migration.name, "reverse: {}", op.describe());
            op.database_backward(conn, &states[i], &states[i + 1], &ctx)?;
        }
        MigrationLedger::remove(conn, &migration.name)?;
        Ok(())
    }
}
