//! Connection ownership and transaction scoping.

use super::config::StorageConfig;
use crate::error::Error;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, Transaction};

/// A SQLite database handle shared behind `Arc`.
pub struct Store {
    conn: Mutex<Connection>,
    config: StorageConfig,
}

impl Store {
    /// Open a database with the given configuration.
    pub fn open(config: StorageConfig) -> Result<Self, Error> {
        let conn = match &config.path {
            Some(path) if config.read_only && !path.exists() => {
                tracing::debug!(path = %path.display(), "database missing, using empty in-memory database");
                Connection::open_in_memory()?
            }
            Some(path) if config.read_only => Connection::open_with_flags(
                path,
                OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX,
            )?,
            Some(path) => Connection::open(path)?,
            None => Connection::open_in_memory()?,
        };

        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
        if !config.is_in_memory() && !config.read_only {
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            tracing::debug!(journal_mode = %mode, "journal mode set");
        }

        tracing::debug!(
            path = ?config.path,
            foreign_keys = config.foreign_keys,
            "database opened"
        );

        Ok(Self {
            conn: Mutex::new(conn),
            config,
        })
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::open(StorageConfig::in_memory())
    }

    /// The configuration this store was opened with.
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    /// Run `f` with the connection in autocommit mode.
    pub fn with_connection<T, E>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, E>,
    ) -> Result<T, E> {
        let conn = self.conn.lock();
        f(&conn)
    }

    /// Run `f` inside a transaction.
    ///
    /// Commits when `f` returns `Ok`; the transaction is rolled back when it is
    /// dropped on any error path.
    pub fn transaction<T, E>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<Error>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(Error::from)?;
        let value = f(&tx)?;
        tx.commit().map_err(Error::from)?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter_store() -> Store {
        let store = Store::open_in_memory().unwrap();
        store
            .with_connection(|conn| {
                conn.execute_batch("CREATE TABLE counter (n INTEGER NOT NULL)")
                    .map_err(Error::from)
            })
            .unwrap();
        store
    }

    fn count(store: &Store) -> i64 {
        store
            .with_connection(|conn| {
                conn.query_row("SELECT COUNT(*) FROM counter", [], |row| row.get(0))
                    .map_err(Error::from)
            })
            .unwrap()
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let store = Store::open_in_memory().unwrap();
        let enabled: bool = store
            .with_connection(|conn| {
                conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                    .map_err(Error::from)
            })
            .unwrap();
        assert!(enabled);
    }

    #[test]
    fn test_transaction_commits() {
        let store = counter_store();
        store
            .transaction(|tx| {
                tx.execute("INSERT INTO counter (n) VALUES (1)", [])
                    .map_err(Error::from)
            })
            .unwrap();
        assert_eq!(count(&store), 1);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let store = counter_store();
        let result: Result<(), Error> = store.transaction(|tx| {
            tx.execute("INSERT INTO counter (n) VALUES (1)", [])?;
            Err(Error::InvalidData("boom".to_string()))
        });
        assert!(result.is_err());
        assert_eq!(count(&store), 0);
    }

    #[test]
    fn test_file_backed_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanperm.sqlite3");
        {
            let store = Store::open(StorageConfig::new(&path)).unwrap();
            store
                .with_connection(|conn| {
                    conn.execute_batch(
                        "CREATE TABLE counter (n INTEGER NOT NULL); INSERT INTO counter VALUES (1);",
                    )
                    .map_err(Error::from)
                })
                .unwrap();
        }
        let reopened = Store::open(StorageConfig::new(&path)).unwrap();
        assert_eq!(count(&reopened), 1);
    }

    #[test]
    fn test_read_only_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanperm.sqlite3");

        let missing = Store::open(StorageConfig::new(&path).with_read_only(true)).unwrap();
        drop(missing);
        assert!(!path.exists());

        {
            let store = Store::open(StorageConfig::new(&path)).unwrap();
            store
                .with_connection(|conn| {
                    conn.execute_batch("CREATE TABLE counter (n INTEGER NOT NULL)")
                        .map_err(Error::from)
                })
                .unwrap();
        }

        let store = Store::open(StorageConfig::new(&path).with_read_only(true)).unwrap();
        assert_eq!(count(&store), 0);
        let write = store.with_connection(|conn| {
            conn.execute("INSERT INTO counter (n) VALUES (1)", [])
                .map_err(Error::from)
        });
        assert!(write.is_err());
    }
}
