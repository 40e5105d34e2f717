//! Applied-migration ledger.
//!
//! One row per applied migration in `chanperm_migrations`, written in the same
//! transaction as an atomic migration's changes.

use crate::error::Error;
use crate::storage::ddl;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

/// Name of the ledger table.
pub const LEDGER_TABLE: &str = "chanperm_migrations";

/// A migration recorded as applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Migration name.
    pub name: String,
    /// When it was applied.
    pub applied_at: DateTime<Utc>,
}

/// Status of a registered migration, for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusEntry {
    /// Migration name.
    pub name: String,
    /// Whether the ledger records it as applied.
    pub applied: bool,
    /// When it was applied.
    pub applied_at: Option<DateTime<Utc>>,
    /// Whether it runs in a single transaction.
    pub atomic: bool,
    /// Whether it can be unapplied.
    pub reversible: bool,
}

/// Reads and writes the ledger table.
pub struct MigrationLedger;

impl MigrationLedger {
    /// Create the ledger table if missing.
    pub fn ensure(conn: &Connection) -> Result<(), Error> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                applied_at TEXT NOT NULL
            )"
        ))?;
        Ok(())
    }

    /// All applied migrations, oldest first. Empty when the ledger table
    /// has not been created yet.
    pub fn applied(conn: &Connection) -> Result<Vec<MigrationRecord>, Error> {
        if !ddl::table_exists(conn, LEDGER_TABLE)? {
            return Ok(Vec::new());
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT name, applied_at FROM {LEDGER_TABLE} ORDER BY id"
        ))?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (name, applied_at) = row?;
            records.push(MigrationRecord {
                name,
                applied_at: parse_timestamp(&applied_at)?,
            });
        }
        Ok(records)
    }

    /// Look up one migration.
    pub fn get(conn: &Connection, name: &str) -> Result<Option<MigrationRecord>, Error> {
        let applied_at: Option<String> = conn
            .query_row(
                &format!("SELECT applied_at FROM {LEDGER_TABLE} WHERE name = ?1"),
                [name],
                |row| row.get(0),
            )
            .optional()?;
        applied_at
            .map(|ts| {
                Ok(MigrationRecord {
                    name: name.to_string(),
                    applied_at: parse_timestamp(&ts)?,
                })
            })
            .transpose()
    }

    /// Record a migration as applied now.
    pub fn record(conn: &Connection, name: &str) -> Result<MigrationRecord, Error> {
        let record = MigrationRecord {
            name: name.to_string(),
            applied_at: Utc::now(),
        };
        conn.execute(
            &format!("INSERT INTO {LEDGER_TABLE} (name, applied_at) VALUES (?1, ?2)"),
            [&record.name, &record.applied_at.to_rfc3339()],
        )?;
        Ok(record)
    }

    /// Forget a migration.
    pub fn remove(conn: &Connection, name: &str) -> Result<bool, Error> {
        let removed = conn.execute(
            &format!("DELETE FROM {LEDGER_TABLE} WHERE name = ?1"),
            [name],
        )?;
        Ok(removed > 0)
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::InvalidData(format!("bad applied_at {value:?}: {e}")))
}
