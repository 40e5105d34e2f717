//! Migration plans: which migrations to apply or unapply, in order.

use serde::Serialize;
use std::fmt;

/// How far to migrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationTarget {
    /// Apply everything.
    Latest,
    /// Bring the database to exactly this migration: apply it and its
    /// dependencies, or unapply everything that depends on it.
    Named(String),
    /// Unapply everything.
    Zero,
}

impl MigrationTarget {
    /// Parse a CLI target: `None` is latest, `"zero"` unapplies everything.
    pub fn parse(target: Option<&str>) -> Self {
        match target {
            None => MigrationTarget::Latest,
            Some("zero") => MigrationTarget::Zero,
            Some(name) => MigrationTarget::Named(name.to_string()),
        }
    }
}

/// Direction of a plan step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// Apply the migration.
    Forward,
    /// Unapply the migration.
    Backward,
}

/// One migration to apply or unapply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanStep {
    /// Migration name.
    pub migration: String,
    /// Direction.
    pub direction: Direction,
}

impl fmt::Display for PlanStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Direction::Forward => write!(f, "Apply {}", self.migration),
            Direction::Backward => write!(f, "Unapply {}", self.migration),
        }
    }
}

/// Ordered steps; all steps share one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationPlan {
    pub steps: Vec<PlanStep>,
}

impl MigrationPlan {
    /// Plan that applies `names` in order.
    pub fn forward(names: impl IntoIterator<Item = String>) -> Self {
        Self::with_direction(names, Direction::Forward)
    }

    /// Plan that unapplies `names` in order.
    pub fn backward(names: impl IntoIterator<Item = String>) -> Self {
        Self::with_direction(names, Direction::Backward)
    }

    fn with_direction(names: impl IntoIterator<Item = String>, direction: Direction) -> Self {
        Self {
            steps: names
                .into_iter()
                .map(|migration| PlanStep {
                    migration,
                    direction,
                })
                .collect(),
        }
    }

    /// Whether there is nothing to do.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
