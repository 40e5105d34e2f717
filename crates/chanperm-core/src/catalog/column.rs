//! Column definitions for tables.

use serde::{Deserialize, Serialize};

/// SQL storage class of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    /// 64-bit signed integer.
    Integer,
    /// UTF-8 text.
    Text,
    /// Boolean, stored as 0/1.
    Boolean,
}

impl SqlType {
    /// SQLite type name used in DDL.
    pub fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::Text => "TEXT",
            SqlType::Boolean => "BOOLEAN",
        }
    }
}

/// What happens to referencing rows when the referenced row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeleteBehavior {
    /// Delete referencing rows.
    Cascade,
    /// Prevent deletion while referencing rows exist.
    Restrict,
    /// Set the referencing column to null.
    SetNull,
}

impl DeleteBehavior {
    /// The `ON DELETE` action clause.
    pub fn as_sql(&self) -> &'static str {
        match self {
            DeleteBehavior::Cascade => "CASCADE",
            DeleteBehavior::Restrict => "RESTRICT",
            DeleteBehavior::SetNull => "SET NULL",
        }
    }
}

/// Foreign key reference from a column to another table's column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referenced table.
    pub table: String,
    /// Referenced column.
    pub column: String,
    /// Delete behavior.
    pub on_delete: DeleteBehavior,
}

/// A column definition within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Storage type.
    pub sql_type: SqlType,
    /// Whether NULL is allowed.
    pub nullable: bool,
    /// Whether this column is the primary key.
    pub primary_key: bool,
    /// Foreign key reference, if any.
    pub references: Option<ForeignKey>,
}

impl ColumnDef {
    /// Create a new NOT NULL column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: false,
            primary_key: false,
            references: None,
        }
    }

    /// Create an auto-assigned integer primary key column.
    pub fn primary_key(name: impl Into<String>) -> Self {
        Self {
            primary_key: true,
            ..Self::new(name, SqlType::Integer)
        }
    }

    /// Create an integer foreign key column.
    pub fn foreign_key(
        name: impl Into<String>,
        table: impl Into<String>,
        column: impl Into<String>,
        on_delete: DeleteBehavior,
    ) -> Self {
        Self::new(name, SqlType::Integer).with_reference(table, column, on_delete)
    }

    /// Allow NULL values.
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Set whether NULL values are allowed.
    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Mark this column as the primary key.
    pub fn with_primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Add a foreign key reference.
    pub fn with_reference(
        mut self,
        table: impl Into<String>,
        column: impl Into<String>,
        on_delete: DeleteBehavior,
    ) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
            on_delete,
        });
        self
    }

    /// Render the column clause for `CREATE TABLE`.
    pub fn to_sql(&self) -> String {
        let mut sql = format!("\"{}\" {}", self.name, self.sql_type.as_sql());
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(fk) = &self.references {
            sql.push_str(&format!(
                " REFERENCES \"{}\"(\"{}\") ON DELETE {}",
                fk.table,
                fk.column,
                fk.on_delete.as_sql()
            ));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_sql() {
        let col = ColumnDef::primary_key("id");
        assert_eq!(col.to_sql(), "\"id\" INTEGER PRIMARY KEY NOT NULL");
    }

    #[test]
    fn test_nullable_foreign_key_sql() {
        let col = ColumnDef::foreign_key("group_id", "usergroup", "id", DeleteBehavior::Restrict)
            .nullable();
        assert_eq!(
            col.to_sql(),
            "\"group_id\" INTEGER REFERENCES \"usergroup\"(\"id\") ON DELETE RESTRICT"
        );
    }

    #[test]
    fn test_with_nullable_toggles() {
        let col = ColumnDef::new("name", SqlType::Text).nullable();
        assert!(col.nullable);
        assert!(!col.with_nullable(false).nullable);
    }
}
