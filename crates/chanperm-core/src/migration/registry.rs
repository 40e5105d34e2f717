//! Named migrations and their dependency graph.

use super::error::MigrationError;
use super::operation::Operation;
use crate::catalog::SchemaState;
use std::collections::{BTreeMap, BTreeSet};

/// A named, ordered list of operations.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique name, e.g. `0699_set_default_for_can_create_topics_group`.
    pub name: String,
    /// Migrations that must be applied first.
    pub dependencies: Vec<String>,
    /// Operations in application order.
    pub operations: Vec<Operation>,
    /// Run all operations and the ledger update in one transaction.
    pub atomic: bool,
}

impl Migration {
    /// Create an empty atomic migration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dependencies: Vec::new(),
            operations: Vec::new(),
            atomic: true,
        }
    }

    /// Add a dependency.
    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        self.dependencies.push(name.into());
        self
    }

    /// Add an operation.
    pub fn with_operation(mut self, operation: Operation) -> Self {
        self.operations.push(operation);
        self
    }

    /// Set whether the migration runs in a single transaction.
    pub fn with_atomic(mut self, atomic: bool) -> Self {
        self.atomic = atomic;
        self
    }

    /// Whether every operation can be unapplied.
    pub fn is_reversible(&self) -> bool {
        self.operations.iter().all(Operation::is_reversible)
    }
}

/// The set of known migrations, kept in dependency order.
#[derive(Debug, Clone, Default)]
pub struct MigrationRegistry {
    ordered: Vec<Migration>,
}

impl MigrationRegistry {
    /// Build a registry, validating names and dependencies.
    pub fn new(migrations: Vec<Migration>) -> Result<Self, MigrationError> {
        let mut by_name = BTreeMap::new();
        for migration in migrations {
            if by_name.contains_key(&migration.name) {
                return Err(MigrationError::DuplicateMigration(migration.name));
            }
            by_name.insert(migration.name.clone(), migration);
        }

        for migration in by_name.values() {
            for dep in &migration.dependencies {
                if !by_name.contains_key(dep) {
                    return Err(MigrationError::UnknownDependency {
                        migration: migration.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        let ordered = topological_order(by_name)?;
        Ok(Self { ordered })
    }

    /// Migrations in dependency order; ties break by name.
    pub fn migrations(&self) -> &[Migration] {
        &self.ordered
    }

    /// Look up a migration.
    pub fn get(&self, name: &str) -> Result<&Migration, MigrationError> {
        self.ordered
            .iter()
            .find(|m| m.name == name)
            .ok_or_else(|| MigrationError::UnknownMigration(name.to_string()))
    }

    /// `name` and everything it transitively depends on.
    pub fn ancestors(&self, name: &str) -> Result<BTreeSet<String>, MigrationError> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![name.to_string()];
        while let Some(current) = stack.pop() {
            if seen.insert(current.clone()) {
                stack.extend(self.get(&current)?.dependencies.iter().cloned());
            }
        }
        Ok(seen)
    }

    /// Everything that transitively depends on `name`, excluding `name`.
    pub fn descendants(&self, name: &str) -> Result<BTreeSet<String>, MigrationError> {
        self.get(name)?;
        let mut found = BTreeSet::new();
        for migration in &self.ordered {
            let depends = migration
                .dependencies
                .iter()
                .any(|dep| dep == name || found.contains(dep));
            if depends {
                found.insert(migration.name.clone());
            }
        }
        Ok(found)
    }

    /// Migrations with nothing depending on them.
    pub fn leaves(&self) -> Vec<&str> {
        let depended: BTreeSet<&str> = self
            .ordered
            .iter()
            .flat_map(|m| m.dependencies.iter().map(String::as_str))
            .collect();
        self.ordered
            .iter()
            .map(|m| m.name.as_str())
            .filter(|name| !depended.contains(name))
            .collect()
    }

    /// Schema state just before `name` is applied: every ancestor's
    /// operations replayed in dependency order.
    pub fn state_before(&self, name: &str) -> Result<SchemaState, MigrationError> {
        let ancestors = self.ancestors(name)?;
        let mut state = SchemaState::new();
        for migration in &self.ordered {
            if migration.name != name && ancestors.contains(&migration.name) {
                for op in &migration.operations {
                    op.state_forward(&mut state)?;
                }
            }
        }
        Ok(state)
    }

    /// Schema state once every registered migration is applied.
    pub fn final_state(&self) -> Result<SchemaState, MigrationError> {
        let mut state = SchemaState::new();
        for op in self.ordered.iter().flat_map(|m| &m.operations) {
            op.state_forward(&mut state)?;
        }
        Ok(state)
    }
}

/// Kahn's algorithm over `by_name`, always taking the smallest ready name.
fn topological_order(
    mut by_name: BTreeMap<String, Migration>,
) -> Result<Vec<Migration>, MigrationError> {
    let mut ordered = Vec::with_capacity(by_name.len());
    let mut done = BTreeSet::new();

    loop {
        let ready = by_name
            .values()
            .find(|m| m.dependencies.iter().all(|d| done.contains(d)))
            .map(|m| m.name.clone());

        match ready {
            Some(name) => {
                if let Some(migration) = by_name.remove(&name) {
                    ordered.push(migration);
                }
                done.insert(name);
            }
            None if by_name.is_empty() => return Ok(ordered),
            None => {
                return Err(MigrationError::DependencyCycle {
                    migrations: by_name.into_keys().collect(),
                });
            }
        }
    }
}
