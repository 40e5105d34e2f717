//! Output formatters for command results.

use chanperm_core::migration::{BackfillReport, MigrationResult, MigrationStatusEntry};
use clap::ValueEnum;
use comfy_table::{Cell, Table};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format
    Table,
    /// JSON format
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Trait for formatting output.
pub trait Formatter: Send + Sync {
    /// Format the migration status listing.
    fn format_status(&self, entries: &[MigrationStatusEntry]) -> String;

    /// Format the outcome of a migrate run.
    fn format_migration_result(&self, result: &MigrationResult) -> String;

    /// Format a backfill report.
    fn format_backfill_report(&self, report: &BackfillReport) -> String;
}

/// Create a formatter for the given output format.
pub fn create_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Table => Box::new(TableFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}

/// Table formatter using comfy-table.
pub struct TableFormatter;

impl Formatter for TableFormatter {
    fn format_status(&self, entries: &[MigrationStatusEntry]) -> String {
        let mut table = Table::new();
        table.set_header(vec!["Migration", "Applied", "Applied at", "Atomic", "Reversible"]);

        for entry in entries {
            let applied_at = entry
                .applied_at
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            table.add_row(vec![
                Cell::new(&entry.name),
                Cell::new(yes_no(entry.applied)),
                Cell::new(applied_at),
                Cell::new(yes_no(entry.atomic)),
                Cell::new(yes_no(entry.reversible)),
            ]);
        }

        let applied = entries.iter().filter(|e| e.applied).count();
        format!("{}\n{} of {} migration(s) applied", table, applied, entries.len())
    }

    fn format_migration_result(&self, result: &MigrationResult) -> String {
        if result.plan.is_empty() {
            return "No migrations to apply".to_string();
        }

        let mut lines: Vec<String> = Vec::new();
        if result.dry_run {
            lines.push("Planned operations:".to_string());
            lines.extend(result.plan.steps.iter().map(|step| format!("  {}", step)));
        } else {
            lines.extend(result.applied.iter().map(|name| format!("Applied {}", name)));
            lines.extend(result.unapplied.iter().map(|name| format!("Unapplied {}", name)));
        }
        lines.join("\n")
    }

    fn format_backfill_report(&self, report: &BackfillReport) -> String {
        if report.is_noop() {
            return "Nothing to backfill".to_string();
        }

        let mut table = Table::new();
        table.set_header(vec!["Batches", "Rows updated", "Remaining unset", "Elapsed"]);
        table.add_row(vec![
            Cell::new(report.batches.len()),
            Cell::new(report.rows_updated),
            Cell::new(report.remaining_unset),
            Cell::new(format!("{:.2?}", report.elapsed)),
        ]);
        table.to_string()
    }
}

/// JSON formatter.
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn format_status(&self, entries: &[MigrationStatusEntry]) -> String {
        serde_json::to_string_pretty(entries).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_migration_result(&self, result: &MigrationResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_backfill_report(&self, report: &BackfillReport) -> String {
        let mut value = serde_json::to_value(report).unwrap_or_else(|_| serde_json::json!({}));
        if let Some(obj) = value.as_object_mut() {
            obj.insert(
                "elapsed_ms".to_string(),
                serde_json::json!(report.elapsed.as_millis() as u64),
            );
        }
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
