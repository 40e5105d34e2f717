//! Migration-specific error types.

use thiserror::Error;

/// Migration-specific errors.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// Storage or catalog error.
    #[error("storage error: {0}")]
    Storage(#[from] crate::error::Error),

    /// No migration with this name is registered.
    #[error("unknown migration: {0}")]
    UnknownMigration(String),

    /// Two migrations share a name.
    #[error("duplicate migration: {0}")]
    DuplicateMigration(String),

    /// A migration depends on one that is not registered.
    #[error("migration {migration} depends on unknown migration {dependency}")]
    UnknownDependency {
        /// The dependent migration.
        migration: String,
        /// The missing dependency.
        dependency: String,
    },

    /// The dependency graph has a cycle.
    #[error("dependency cycle between migrations: {}", .migrations.join(", "))]
    DependencyCycle {
        /// Migrations that could not be ordered.
        migrations: Vec<String>,
    },

    /// A backfill batch failed. Earlier batches stay committed.
    #[error("backfill of {table}.{column} failed in batch {lower_bound} to {upper_bound}: {reason}")]
    BackfillFailed {
        /// Table being backfilled.
        table: String,
        /// Column being backfilled.
        column: String,
        /// First id of the failed batch.
        lower_bound: i64,
        /// Last id of the failed batch.
        upper_bound: i64,
        /// The reason for failure.
        reason: String,
    },

    /// Rows still hold NULL in a column about to become NOT NULL.
    #[error("cannot make {table}.{column} NOT NULL: {count} rows are still NULL")]
    NullsRemain {
        /// Table name.
        table: String,
        /// Column name.
        column: String,
        /// Number of NULL rows.
        count: u64,
    },

    /// An operation has no reverse.
    #[error("operation cannot be reversed: {operation}")]
    Irreversible {
        /// Description of the operation.
        operation: String,
    },

    /// A migration failed while being applied or unapplied.
    #[error("migration {migration} failed: {source}")]
    MigrationFailed {
        /// The failing migration.
        migration: String,
        /// The underlying error.
        #[source]
        source: Box<MigrationError>,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl From<rusqlite::Error> for MigrationError {
    fn from(err: rusqlite::Error) -> Self {
        MigrationError::Storage(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrationError::BackfillFailed {
            table: "stream".to_string(),
            column: "can_create_topics_group_id".to_string(),
            lower_bound: 1001,
            upper_bound: 2000,
            reason: "disk I/O error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("stream.can_create_topics_group_id"));
        assert!(msg.contains("1001 to 2000"));
    }

    #[test]
    fn test_cycle_display() {
        let err = MigrationError::DependencyCycle {
            migrations: vec!["a".to_string(), "b".to_string()],
        };
        assert_eq!(err.to_string(), "dependency cycle between migrations: a, b");
    }

    #[test]
    fn test_nulls_remain_display() {
        let err = MigrationError::NullsRemain {
            table: "stream".to_string(),
            column: "can_create_topics_group_id".to_string(),
            count: 3,
        };
        assert!(err.to_string().contains("3 rows are still NULL"));
    }
}
