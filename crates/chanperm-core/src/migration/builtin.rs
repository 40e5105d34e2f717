//! The migration chain shipped with the server schema.
//!
//! `0698` adds the nullable `stream.can_create_topics_group_id` column and
//! `0699` fills it with each realm's `role:everyone` group, then makes it NOT
//! NULL. `0700` restates the final definition. Deleting a group a channel
//! still points at is refused.

use super::backfill::BackfillRunner;
use super::error::MigrationError;
use super::operation::{noop, MigrationContext, Operation};
use super::registry::{Migration, MigrationRegistry};
use crate::catalog::{ColumnDef, DeleteBehavior, SqlType, TableDef};
use crate::model::{
    CAN_CREATE_TOPICS_GROUP_COLUMN, NAMED_USERGROUP_TABLE, REALM_TABLE, STREAM_TABLE,
    USERGROUP_TABLE,
};
use crate::storage::Streams;
use rusqlite::Connection;

pub const INITIAL: &str = "0001_initial";
pub const ADD_CAN_CREATE_TOPICS_GROUP: &str = "0698_stream_can_create_topics_group";
pub const SET_DEFAULT_CAN_CREATE_TOPICS_GROUP: &str =
    "0699_set_default_for_can_create_topics_group";
pub const ALTER_CAN_CREATE_TOPICS_GROUP: &str = "0700_alter_stream_can_create_topics_group";

/// The full registry.
pub fn registry() -> Result<MigrationRegistry, MigrationError> {
    MigrationRegistry::new(migrations())
}

/// All shipped migrations.
pub fn migrations() -> Vec<Migration> {
    vec![
        initial(),
        add_can_create_topics_group(),
        set_default_for_can_create_topics_group(),
        alter_can_create_topics_group(),
    ]
}

fn can_create_topics_group_column() -> ColumnDef {
    ColumnDef::foreign_key(
        CAN_CREATE_TOPICS_GROUP_COLUMN,
        USERGROUP_TABLE,
        "id",
        DeleteBehavior::Restrict,
    )
}

fn initial() -> Migration {
    let realm = TableDef::new(REALM_TABLE)
        .with_column(ColumnDef::primary_key("id"))
        .with_column(ColumnDef::new("string_id", SqlType::Text));

    let usergroup = TableDef::new(USERGROUP_TABLE)
        .with_column(ColumnDef::primary_key("id"))
        .with_column(ColumnDef::foreign_key(
            "realm_id",
            REALM_TABLE,
            "id",
            DeleteBehavior::Cascade,
        ))
        .with_index("realm_id");

    let named = TableDef::new(NAMED_USERGROUP_TABLE)
        .with_column(
            ColumnDef::foreign_key(
                "usergroup_ptr_id",
                USERGROUP_TABLE,
                "id",
                DeleteBehavior::Cascade,
            )
            .with_primary_key(),
        )
        .with_column(ColumnDef::new("name", SqlType::Text))
        .with_column(ColumnDef::new("is_system_group", SqlType::Boolean))
        .with_column(ColumnDef::foreign_key(
            "realm_for_sharding",
            REALM_TABLE,
            "id",
            DeleteBehavior::Cascade,
        ))
        .with_index("realm_for_sharding")
        .with_unique(&["realm_for_sharding", "name"]);

    let stream = TableDef::new(STREAM_TABLE)
        .with_column(ColumnDef::primary_key("id"))
        .with_column(ColumnDef::new("name", SqlType::Text))
        .with_column(ColumnDef::foreign_key(
            "realm_id",
            REALM_TABLE,
            "id",
            DeleteBehavior::Cascade,
        ))
        .with_index("realm_id");

    Migration::new(INITIAL)
        .with_operation(Operation::CreateTable(realm))
        .with_operation(Operation::CreateTable(usergroup))
        .with_operation(Operation::CreateTable(named))
        .with_operation(Operation::CreateTable(stream))
}

fn add_can_create_topics_group() -> Migration {
    Migration::new(ADD_CAN_CREATE_TOPICS_GROUP)
        .depends_on(INITIAL)
        .with_operation(Operation::AddField {
            table: STREAM_TABLE.to_string(),
            column: can_create_topics_group_column().nullable(),
        })
}

fn set_default_for_can_create_topics_group() -> Migration {
    // Batches commit independently, so the migration cannot be one transaction.
    Migration::new(SET_DEFAULT_CAN_CREATE_TOPICS_GROUP)
        .depends_on(ADD_CAN_CREATE_TOPICS_GROUP)
        .with_atomic(false)
        .with_operation(Operation::RunCode {
            name: "set_default_value_for_can_create_topics_group",
            forward: set_default_value_for_can_create_topics_group,
            reverse: Some(noop),
            elidable: true,
        })
        .with_operation(Operation::AlterField {
            table: STREAM_TABLE.to_string(),
            column: can_create_topics_group_column(),
        })
}

fn alter_can_create_topics_group() -> Migration {
    Migration::new(ALTER_CAN_CREATE_TOPICS_GROUP)
        .depends_on(SET_DEFAULT_CAN_CREATE_TOPICS_GROUP)
        .with_operation(Operation::AlterField {
            table: STREAM_TABLE.to_string(),
            column: can_create_topics_group_column(),
        })
}

fn set_default_value_for_can_create_topics_group(
    conn: &Connection,
    ctx: &MigrationContext,
) -> Result<(), MigrationError> {
    BackfillRunner::new(ctx.backfill.clone()).run(&Streams::new(conn))?;
    Ok(())
}
