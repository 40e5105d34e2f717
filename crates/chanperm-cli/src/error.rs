//! CLI error type.

use thiserror::Error;

/// Errors surfaced to the user.
#[derive(Debug, Error)]
pub enum CliError {
    /// Storage error.
    #[error(transparent)]
    Storage(#[from] chanperm_core::Error),

    /// Migration error.
    #[error(transparent)]
    Migration(#[from] chanperm_core::MigrationError),
}
