//! Schema changes applied to a live connection from catalog definitions.
//!
//! SQLite cannot change a column's nullability or drop a foreign key column
//! in place, so those changes rebuild the table: create a replacement, copy
//! rows, drop the original and rename.

use crate::catalog::{ColumnDef, TableDef};
use crate::error::Error;
use rusqlite::Connection;

/// Create a table and its indexes.
pub fn create_table(conn: &Connection, table: &TableDef) -> Result<(), Error> {
    conn.execute_batch(&table.create_sql())?;
    for sql in table.index_sql() {
        conn.execute_batch(&sql)?;
    }
    tracing::debug!(table = %table.name, "table created");
    Ok(())
}

/// Drop a table.
pub fn drop_table(conn: &Connection, name: &str) -> Result<(), Error> {
    conn.execute_batch(&format!("DROP TABLE \"{}\"", name))?;
    tracing::debug!(table = %name, "table dropped");
    Ok(())
}

/// Add a column to an existing table.
///
/// Nullable columns use `ALTER TABLE ADD COLUMN`; a NOT NULL column needs a
/// rebuild and fails if the table already holds rows.
pub fn add_column(conn: &Connection, before: &TableDef, column: &ColumnDef) -> Result<(), Error> {
    if column.nullable {
        conn.execute_batch(&format!(
            "ALTER TABLE \"{}\" ADD COLUMN {}",
            before.name,
            column.to_sql()
        ))?;
        return Ok(());
    }

    let after = before.clone().with_column(column.clone());
    rebuild_table(conn, before, &after)
}

/// Rebuild `before` into the shape of `after`, copying the shared columns.
///
/// Runs in its own transaction unless the connection is already inside one,
/// so a failed rebuild never leaves the scratch table behind.
pub fn rebuild_table(conn: &Connection, before: &TableDef, after: &TableDef) -> Result<(), Error> {
    if before.name != after.name {
        return Err(Error::InvalidData(format!(
            "cannot rebuild {} as {}",
            before.name, after.name
        )));
    }

    if !conn.is_autocommit() {
        return rebuild_in_place(conn, before, after);
    }

    let tx = conn.unchecked_transaction()?;
    rebuild_in_place(&tx, before, after)?;
    tx.commit()?;
    Ok(())
}

fn rebuild_in_place(conn: &Connection, before: &TableDef, after: &TableDef) -> Result<(), Error> {
    let name = &after.name;
    let scratch = format!("{}__rebuild", name);
    let shared: Vec<String> = after
        .columns
        .iter()
        .filter(|c| before.column(&c.name).is_some())
        .map(|c| format!("\"{}\"", c.name))
        .collect();
    let shared = shared.join(", ");

    conn.execute_batch(&after.create_sql_named(&scratch))?;
    conn.execute_batch(&format!(
        "INSERT INTO \"{scratch}\" ({shared}) SELECT {shared} FROM \"{name}\""
    ))?;
    conn.execute_batch(&format!("DROP TABLE \"{name}\""))?;
    conn.execute_batch(&format!("ALTER TABLE \"{scratch}\" RENAME TO \"{name}\""))?;
    for sql in after.index_sql() {
        conn.execute_batch(&sql)?;
    }

    check_foreign_keys(conn, name)?;
    tracing::debug!(table = %name, "table rebuilt");
    Ok(())
}

/// Count rows of `table` where `column` is NULL.
pub fn count_nulls(conn: &Connection, table: &str, column: &str) -> Result<u64, Error> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM \"{table}\" WHERE \"{column}\" IS NULL"),
        [],
        |row| row.get(0),
    )?;
    Ok(count as u64)
}

/// Whether a table exists in the live database.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Whether a column is declared NOT NULL in the live database.
pub fn column_not_null(conn: &Connection, table: &str, column: &str) -> Result<bool, Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{}\")", table))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(row.get::<_, i64>(3)? != 0);
        }
    }
    Err(Error::UnknownColumn {
        table: table.to_string(),
        column: column.to_string(),
    })
}

fn check_foreign_keys(conn: &Connection, table: &str) -> Result<(), Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA foreign_key_check(\"{}\")", table))?;
    let violations = stmt.query_map([], |_| Ok(()))?.count();
    if violations > 0 {
        return Err(Error::InvalidData(format!(
            "{violations} foreign key violations in {table} after rebuild"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SqlType;

    fn note_table() -> TableDef {
        TableDef::new("note")
            .with_column(ColumnDef::primary_key("id"))
            .with_column(ColumnDef::new("body", SqlType::Text).nullable())
            .with_index("body")
    }

    #[test]
    fn test_create_and_drop_table() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, &note_table()).unwrap();
        assert!(table_exists(&conn, "note").unwrap());

        drop_table(&conn, "note").unwrap();
        assert!(!table_exists(&conn, "note").unwrap());
    }

    #[test]
    fn test_add_nullable_column() {
        let conn = Connection::open_in_memory().unwrap();
        let table = note_table();
        create_table(&conn, &table).unwrap();
        conn.execute("INSERT INTO note (body) VALUES ('hi')", []).unwrap();

        add_column(&conn, &table, &ColumnDef::new("title", SqlType::Text).nullable()).unwrap();
        assert_eq!(count_nulls(&conn, "note", "title").unwrap(), 1);
        assert!(!column_not_null(&conn, "note", "title").unwrap());
    }

    #[test]
    fn test_rebuild_tightens_nullability() {
        let conn = Connection::open_in_memory().unwrap();
        let before = note_table();
        create_table(&conn, &before).unwrap();
        conn.execute("INSERT INTO note (body) VALUES ('kept')", []).unwrap();

        let mut after = before.clone();
        after.columns[1] = after.columns[1].clone().with_nullable(false);
        rebuild_table(&conn, &before, &after).unwrap();

        assert!(column_not_null(&conn, "note", "body").unwrap());
        let body: String = conn
            .query_row("SELECT body FROM note", [], |row| row.get(0))
            .unwrap();
        assert_eq!(body, "kept");
    }

    #[test]
    fn test_rebuild_fails_on_nulls() {
        let conn = Connection::open_in_memory().unwrap();
        let before = note_table();
        create_table(&conn, &before).unwrap();
        conn.execute("INSERT INTO note (body) VALUES (NULL)", []).unwrap();

        let mut after = before.clone();
        after.columns[1] = after.columns[1].clone().with_nullable(false);
        assert!(rebuild_table(&conn, &before, &after).is_err());

        assert!(!table_exists(&conn, "note__rebuild").unwrap());
        assert!(!column_not_null(&conn, "note", "body").unwrap());
        assert_eq!(count_nulls(&conn, "note", "body").unwrap(), 1);
    }

    #[test]
    fn test_unknown_column() {
        let conn = Connection::open_in_memory().unwrap();
        create_table(&conn, &note_table()).unwrap();
        assert!(matches!(
            column_not_null(&conn, "note", "missing"),
            Err(Error::UnknownColumn { .. })
        ));
    }
}
