//! Channel rows and the topic-creation permission column.

use crate::error::Error;
use crate::model::{GroupId, RealmId, StreamId, EVERYONE_GROUP_NAME};
use rusqlite::{params, Connection, OptionalExtension};

/// Id range of channels whose permission group is still unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnsetBounds {
    /// Smallest unset id.
    pub min_id: i64,
    /// Largest unset id.
    pub max_id: i64,
}

/// Channel operations on a borrowed connection.
pub struct Streams<'c> {
    conn: &'c Connection,
}

impl<'c> Streams<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Insert a channel. With `group = None` the permission column is left
    /// out of the insert, which also works before the column exists.
    pub fn create(
        &self,
        realm: RealmId,
        name: &str,
        group: Option<GroupId>,
    ) -> Result<StreamId, Error> {
        match group {
            Some(group) => self.conn.execute(
                "INSERT INTO stream (name, realm_id, can_create_topics_group_id) VALUES (?1, ?2, ?3)",
                params![name, realm, group],
            )?,
            None => self.conn.execute(
                "INSERT INTO stream (name, realm_id) VALUES (?1, ?2)",
                params![name, realm],
            )?,
        };
        Ok(StreamId(self.conn.last_insert_rowid()))
    }

    /// Insert a channel with an explicit id.
    pub fn create_with_id(&self, id: StreamId, realm: RealmId, name: &str) -> Result<(), Error> {
        self.conn.execute(
            "INSERT INTO stream (id, name, realm_id) VALUES (?1, ?2, ?3)",
            params![id, name, realm],
        )?;
        Ok(())
    }

    /// The group allowed to create topics in a channel.
    pub fn can_create_topics_group(&self, stream: StreamId) -> Result<Option<GroupId>, Error> {
        let group = self
            .conn
            .query_row(
                "SELECT can_create_topics_group_id FROM stream WHERE id = ?1",
                [stream],
                |row| row.get::<_, Option<GroupId>>(0),
            )
            .optional()?;
        Ok(group.flatten())
    }

    /// The default group for channels in `realm`: that realm's
    /// `role:everyone` system group, if one exists. Names are unique per
    /// realm, so there is never more than one candidate.
    pub fn resolve_default_group(&self, realm: RealmId) -> Result<Option<GroupId>, Error> {
        let group = self
            .conn
            .query_row(
                "SELECT usergroup_ptr_id FROM namedusergroup
                 WHERE name = ?1 AND is_system_group = 1 AND realm_for_sharding = ?2",
                params![EVERYONE_GROUP_NAME, realm],
                |row| row.get(0),
            )
            .optional()?;
        Ok(group)
    }

    /// Id bounds of channels whose group is unset, `None` if there are none.
    pub fn unset_bounds(&self) -> Result<Option<UnsetBounds>, Error> {
        let (min_id, max_id): (Option<i64>, Option<i64>) = self.conn.query_row(
            "SELECT MIN(id), MAX(id) FROM stream WHERE can_create_topics_group_id IS NULL",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok(match (min_id, max_id) {
            (Some(min_id), Some(max_id)) => Some(UnsetBounds { min_id, max_id }),
            _ => None,
        })
    }

    /// Number of channels whose group is unset.
    pub fn count_unset(&self) -> Result<u64, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stream WHERE can_create_topics_group_id IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Set the default group on every unset channel with `lower <= id <= upper`.
    ///
    /// The update runs in its own transaction unless the connection is already
    /// inside one. Channels whose realm has no default group are not touched.
    /// Returns the number of channels updated.
    pub fn fill_default_group(&self, lower: i64, upper: i64) -> Result<usize, Error> {
        if !self.conn.is_autocommit() {
            return Ok(fill_range(self.conn, lower, upper)?);
        }

        let tx = self.conn.unchecked_transaction()?;
        let updated = fill_range(&tx, lower, upper)?;
        tx.commit()?;
        Ok(updated)
    }
}

fn fill_range(conn: &Connection, lower: i64, upper: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE stream
         SET can_create_topics_group_id = (
             SELECT g.usergroup_ptr_id FROM namedusergroup g
             WHERE g.name = ?1 AND g.is_system_group = 1
               AND g.realm_for_sharding = stream.realm_id
         )
         WHERE id BETWEEN ?2 AND ?3
           AND can_create_topics_group_id IS NULL
           AND realm_id IN (
             SELECT realm_for_sharding FROM namedusergroup
             WHERE name = ?1 AND is_system_group = 1
           )",
        params![EVERYONE_GROUP_NAME, lower, upper],
    )
}
