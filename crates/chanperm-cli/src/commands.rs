//! Subcommand handlers.

use crate::config::{migration_config, Args, Command};
use crate::error::CliError;
use crate::formatter::{create_formatter, OutputFormat};
use chanperm_core::migration::builtin;
use chanperm_core::{MigrationConfig, MigrationExecutor, MigrationTarget, StorageConfig, Store};
use std::sync::Arc;

/// Run the parsed command, returning the text to print.
pub fn run(args: Args) -> Result<String, CliError> {
    let storage = args.storage_config();
    tracing::debug!(database = %args.database.display(), "opening database");

    match args.command {
        Command::Migrate {
            target,
            dry_run,
            backfill,
        } => {
            let executor = open_executor(
                storage.with_read_only(dry_run),
                migration_config(Some(backfill), dry_run),
            )?;
            let target = MigrationTarget::parse(target.as_deref());
            let result = executor.migrate(&target)?;
            Ok(create_formatter(OutputFormat::Table).format_migration_result(&result))
        }
        Command::Backfill { backfill } => {
            let executor = open_executor(storage, migration_config(Some(backfill), false))?;
            let report = executor.run_backfill()?;
            Ok(create_formatter(OutputFormat::Table).format_backfill_report(&report))
        }
        Command::Status { format } => {
            let executor = open_executor(storage, MigrationConfig::default())?;
            let entries = executor.status()?;
            Ok(create_formatter(format).format_status(&entries))
        }
    }
}

fn open_executor(
    storage: StorageConfig,
    config: MigrationConfig,
) -> Result<MigrationExecutor, CliError> {
    let store = Arc::new(Store::open(storage)?);
    let registry = builtin::registry()?;
    Ok(MigrationExecutor::new(store, registry, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use tempfile::TempDir;

    fn run_with(dir: &TempDir, argv: &[&str]) -> Result<String, CliError> {
        let db = dir.path().join("chanperm.sqlite3");
        let db = db.to_str().unwrap().to_string();
        let mut full = vec!["chanperm", "--database", db.as_str()];
        full.extend_from_slice(argv);
        run(Args::try_parse_from(full).unwrap())
    }

    #[test]
    fn test_migrate_then_status() {
        let dir = TempDir::new().unwrap();

        let output = run_with(&dir, &["migrate"]).unwrap();
        assert!(output.contains("Applied 0001_initial"));
        assert!(output.contains("Applied 0700_alter_stream_can_create_topics_group"));

        let output = run_with(&dir, &["migrate"]).unwrap();
        assert_eq!(output, "No migrations to apply");

        let output = run_with(&dir, &["status", "--format", "json"]).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&output).unwrap();
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 4);
        assert!(rows.iter().all(|row| row["applied"] == true));
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let dir = TempDir::new().unwrap();

        let output = run_with(&dir, &["migrate", "--dry-run"]).unwrap();
        assert!(output.starts_with("Planned operations:"));
        assert!(output.contains("Apply 0698_stream_can_create_topics_group"));
        assert!(!dir.path().join("chanperm.sqlite3").exists());

        let output = run_with(&dir, &["status"]).unwrap();
        assert!(output.contains("0 of 4 migration(s) applied"));
    }

    #[test]
    fn test_backfill_after_partial_migrate() {
        let dir = TempDir::new().unwrap();

        run_with(
            &dir,
            &["migrate", "--target", "0698_stream_can_create_topics_group"],
        )
        .unwrap();

        let output = run_with(&dir, &["backfill", "--batch-size", "10"]).unwrap();
        assert_eq!(output, "Nothing to backfill");
    }

    #[test]
    fn test_backfill_requires_column() {
        let dir = TempDir::new().unwrap();
        assert!(run_with(&dir, &["backfill"]).is_err());
    }

    #[test]
    fn test_invalid_batch_size() {
        let dir = TempDir::new().unwrap();
        let err = run_with(&dir, &["migrate", "--batch-size", "0"]).unwrap_err();
        assert!(matches!(err, CliError::Migration(_)));
    }

    #[test]
    fn test_unknown_target() {
        let dir = TempDir::new().unwrap();
        let err = run_with(&dir, &["migrate", "--target", "0999_missing"]).unwrap_err();
        assert!(err.to_string().contains("0999_missing"));
    }
}
