//! Row identifiers and well-known names for the chat server schema.

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Table holding channels.
pub const STREAM_TABLE: &str = "stream";
/// Column referencing the group allowed to create topics in a channel.
pub const CAN_CREATE_TOPICS_GROUP_COLUMN: &str = "can_create_topics_group_id";
/// Base table for user groups; the foreign key target.
pub const USERGROUP_TABLE: &str = "usergroup";
/// Named user groups, including the per-realm system groups.
pub const NAMED_USERGROUP_TABLE: &str = "namedusergroup";
/// Tenants.
pub const REALM_TABLE: &str = "realm";

/// System group every realm member belongs to.
pub const EVERYONE_GROUP_NAME: &str = "role:everyone";

/// System groups seeded for each new realm.
pub const SYSTEM_GROUP_NAMES: &[&str] = &[
    "role:owners",
    "role:administrators",
    "role:moderators",
    "role:fullmembers",
    "role:members",
    EVERYONE_GROUP_NAME,
    "role:nobody",
];

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map($name)
            }
        }
    };
}

row_id!(
    /// Primary key of a realm.
    RealmId
);
row_id!(
    /// Primary key of a user group.
    GroupId
);
row_id!(
    /// Primary key of a channel.
    StreamId
);
