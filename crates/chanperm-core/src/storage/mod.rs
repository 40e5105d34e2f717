//! SQLite storage layer.
//!
//! [`Store`] owns the connection. Everything else borrows a
//! [`rusqlite::Connection`] (or a transaction dereferencing to one) so the
//! same code runs inside or outside an enclosing transaction.

mod config;
pub mod ddl;
mod engine;
mod realm;
mod stream;

pub use config::{StorageConfig, DEFAULT_BUSY_TIMEOUT};
pub use engine::Store;
pub use realm::Realms;
pub use stream::{Streams, UnsetBounds};
