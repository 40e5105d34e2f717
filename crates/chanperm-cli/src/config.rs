//! Command-line arguments and the configuration built from them.

use crate::formatter::OutputFormat;
use chanperm_core::migration::{BackfillConfig, DEFAULT_BATCH_SIZE};
use chanperm_core::{MigrationConfig, StorageConfig};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Default database file.
pub const DEFAULT_DATABASE: &str = "./chanperm.sqlite3";

/// Default busy timeout in seconds.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// chanperm migration runner
#[derive(Parser, Debug)]
#[command(name = "chanperm")]
#[command(version, about = "Channel permission migration runner", long_about = None)]
pub struct Args {
    /// Path to the SQLite database.
    #[arg(short, long, default_value = DEFAULT_DATABASE, global = true)]
    pub database: PathBuf,

    /// Seconds to wait on a locked database.
    #[arg(long, default_value_t = DEFAULT_BUSY_TIMEOUT_SECS, global = true)]
    pub busy_timeout: u64,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Apply or unapply migrations.
    Migrate {
        /// Migration to migrate to; `zero` unapplies everything. Defaults to
        /// the latest migration.
        #[arg(long)]
        target: Option<String>,

        /// Print the plan without changing the database.
        #[arg(long)]
        dry_run: bool,

        #[command(flatten)]
        backfill: BackfillArgs,
    },

    /// Fill unset channel permission groups. Safe to re-run.
    Backfill {
        #[command(flatten)]
        backfill: BackfillArgs,
    },

    /// Show which migrations are applied.
    Status {
        /// Output format.
        #[arg(long, default_value = "table", value_enum)]
        format: OutputFormat,
    },
}

/// Backfill tuning flags.
#[derive(clap::Args, Debug, Clone)]
pub struct BackfillArgs {
    /// Channels per batch (by id range).
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: i64,

    /// Pause between batches in milliseconds.
    #[arg(long, default_value_t = 0)]
    pub batch_delay_ms: u64,
}

impl BackfillArgs {
    /// Convert to the backfill configuration.
    pub fn into_config(self) -> BackfillConfig {
        BackfillConfig::default()
            .with_batch_size(self.batch_size)
            .with_batch_delay_ms(self.batch_delay_ms)
    }
}

impl Args {
    /// Storage configuration for the selected database.
    pub fn storage_config(&self) -> StorageConfig {
        StorageConfig::new(&self.database)
            .with_busy_timeout(Duration::from_secs(self.busy_timeout))
    }
}

/// Build the migration configuration for a command.
pub fn migration_config(backfill: Option<BackfillArgs>, dry_run: bool) -> MigrationConfig {
    MigrationConfig {
        backfill: backfill.map(BackfillArgs::into_config).unwrap_or_default(),
        dry_run,
    }
}
