//! Realms and user groups.

use crate::error::Error;
use crate::model::{GroupId, RealmId, SYSTEM_GROUP_NAMES};
use rusqlite::{params, Connection, OptionalExtension};

/// Realm and group operations on a borrowed connection.
pub struct Realms<'c> {
    conn: &'c Connection,
}

impl<'c> Realms<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a realm.
    pub fn create_realm(&self, string_id: &str) -> Result<RealmId, Error> {
        self.conn
            .execute("INSERT INTO realm (string_id) VALUES (?1)", [string_id])?;
        Ok(RealmId(self.conn.last_insert_rowid()))
    }

    /// Insert a named group owned by `realm`. Group names are unique within
    /// a realm; a duplicate leaves nothing behind.
    pub fn create_group(
        &self,
        realm: RealmId,
        name: &str,
        is_system_group: bool,
    ) -> Result<GroupId, Error> {
        in_transaction(self.conn, |conn| {
            conn.execute("INSERT INTO usergroup (realm_id) VALUES (?1)", [realm])?;
            let group = GroupId(conn.last_insert_rowid());
            conn.execute(
                "INSERT INTO namedusergroup (usergroup_ptr_id, name, is_system_group, realm_for_sharding)
                 VALUES (?1, ?2, ?3, ?4)",
                params![group, name, is_system_group, realm],
            )?;
            Ok(group)
        })
    }

    /// Seed the built-in role groups for a realm.
    pub fn create_system_groups(&self, realm: RealmId) -> Result<Vec<(String, GroupId)>, Error> {
        SYSTEM_GROUP_NAMES
            .iter()
            .map(|name| Ok((name.to_string(), self.create_group(realm, name, true)?)))
            .collect()
    }

    /// Look up a named group in a realm.
    pub fn find_group(
        &self,
        realm: RealmId,
        name: &str,
        is_system_group: bool,
    ) -> Result<Option<GroupId>, Error> {
        let group = self
            .conn
            .query_row(
                "SELECT usergroup_ptr_id FROM namedusergroup
                 WHERE name = ?1 AND is_system_group = ?2 AND realm_for_sharding = ?3",
                params![name, is_system_group, realm],
                |row| row.get(0),
            )
            .optional()?;
        Ok(group)
    }

    /// Delete a group. Fails while a channel setting still references it,
    /// leaving both the group and its name in place.
    pub fn delete_group(&self, group: GroupId) -> Result<(), Error> {
        in_transaction(self.conn, |conn| {
            conn.execute(
                "DELETE FROM namedusergroup WHERE usergroup_ptr_id = ?1",
                [group],
            )?;
            conn.execute("DELETE FROM usergroup WHERE id = ?1", [group])?;
            Ok(())
        })
    }
}

/// Run `f` in its own transaction unless `conn` is already inside one.
fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, Error>,
) -> Result<T, Error> {
    if !conn.is_autocommit() {
        return f(conn);
    }

    let tx = conn.unchecked_transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}
