//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default time to wait on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for opening a [`Store`](super::Store).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Database file. `None` opens a private in-memory database.
    pub path: Option<PathBuf>,

    /// How long to wait on a locked database.
    pub busy_timeout: Duration,

    /// Enforce foreign key constraints (`PRAGMA foreign_keys`).
    pub foreign_keys: bool,

    /// Open the file read-only and leave its journal mode alone. A missing
    /// file is not created; an empty in-memory database stands in for it.
    pub read_only: bool,
}

impl StorageConfig {
    /// Create a configuration for a database file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::in_memory()
        }
    }

    /// Create a configuration for an in-memory database.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            foreign_keys: true,
            read_only: false,
        }
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Enable or disable foreign key enforcement.
    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    /// Open without writing to the file.
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Whether this configuration opens an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::new("./chanperm.sqlite3")
    }
}
