//! Live schema introspection and statement execution.
//!
//! `DbUpgrade` talks to the database only through these traits, so the same
//! reconciliation runs against a server connection or [`crate::MemoryDatabase`].

use crate::backend::BackendError;
use serde::Serialize;

/// A live column as reported by `information_schema.COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Base type, lower-cased (`varchar`, `int`, `longtext`).
    pub data_type: String,
    pub char_max_len: Option<u64>,
    /// Default as the server reports it (possibly quoted, possibly `NULL`).
    pub default: Option<String>,
    pub nullable: bool,
}

/// Live constraint kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ConstraintKind {
    PrimaryKey,
    Unique,
    ForeignKey,
    Check,
    Other(String),
}

impl ConstraintKind {
    pub fn parse(value: &str) -> Self {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "PRIMARY KEY" | "PRIMARY" => Self::PrimaryKey,
            "UNIQUE" | "UNIQUE KEY" => Self::Unique,
            "FOREIGN KEY" | "FOREIGN" => Self::ForeignKey,
            "CHECK" => Self::Check,
            _ => Self::Other(value.to_string()),
        }
    }
}

/// A live constraint as reported by `information_schema.TABLE_CONSTRAINTS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConstraintMetadata {
    pub kind: ConstraintKind,
    pub name: String,
    pub fields: Vec<String>,
    pub delete_rule: Option<String>,
    pub update_rule: Option<String>,
}

/// Columns and constraints of one live table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableMetadata {
    pub name: String,
    pub columns: Vec<ColumnMetadata>,
    pub constraints: Vec<ConstraintMetadata>,
}

impl TableMetadata {
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// One row of `SHOW TABLE STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableStatus {
    pub name: String,
    pub collation: Option<String>,
}

/// One row of `SHOW FULL COLUMNS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FullColumn {
    pub field: String,
    /// Full column type (`varchar(255)`, `int(11) unsigned`).
    pub column_type: String,
    pub collation: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Database metadata service.
pub trait MetadataSource {
    fn list_tables(&self) -> Result<Vec<String>, BackendError>;

    fn describe_table(&self, table: &str) -> Result<TableMetadata, BackendError>;

    fn table_status(&self) -> Result<Vec<TableStatus>, BackendError>;

    fn show_full_columns(&self, table: &str) -> Result<Vec<FullColumn>, BackendError>;

    /// `SHOW CREATE TABLE` text, or `None` when the table does not exist.
    fn show_create_table(&self, table: &str) -> Result<Option<String>, BackendError>;
}

/// SQL execution service.
pub trait SqlExecutor {
    fn execute(&self, sql: &str) -> Result<(), BackendError>;
}

/// Anything that can both introspect and execute.
pub trait DatabaseAdapter: MetadataSource + SqlExecutor {}

impl<T: MetadataSource + SqlExecutor + ?Sized> DatabaseAdapter for T {}

#[cfg(feature = "mysql")]
mod mysql {
    use super::*;
    use crate::backend::{DbConnection, DbValue};
    use crate::lexer::quote_ident;

    const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME AS name FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' ORDER BY TABLE_NAME";

    const COLUMNS_SQL: &str = "SELECT COLUMN_NAME AS name, DATA_TYPE AS data_type, \
         CHARACTER_MAXIMUM_LENGTH AS char_max_len, COLUMN_DEFAULT AS column_default, \
         IS_NULLABLE AS is_nullable FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? ORDER BY ORDINAL_POSITION";

    const CONSTRAINTS_SQL: &str = "SELECT tc.CONSTRAINT_NAME AS name, \
         tc.CONSTRAINT_TYPE AS kind, kcu.COLUMN_NAME AS column_name, \
         rc.DELETE_RULE AS delete_rule, rc.UPDATE_RULE AS update_rule \
         FROM information_schema.TABLE_CONSTRAINTS tc \
         LEFT JOIN information_schema.KEY_COLUMN_USAGE kcu \
           ON kcu.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
          AND kcu.TABLE_NAME = tc.TABLE_NAME \
          AND kcu.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
         LEFT JOIN information_schema.REFERENTIAL_CONSTRAINTS rc \
           ON rc.CONSTRAINT_SCHEMA = tc.CONSTRAINT_SCHEMA \
          AND rc.TABLE_NAME = tc.TABLE_NAME \
          AND rc.CONSTRAINT_NAME = tc.CONSTRAINT_NAME \
         WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.TABLE_NAME = ? \
         ORDER BY tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION";

    impl MetadataSource for DbConnection {
        fn list_tables(&self) -> Result<Vec<String>, BackendError> {
            self.query_all(LIST_TABLES_SQL, &[])?
                .iter()
                .map(|row| row.get::<String>(0))
                .collect()
        }

        fn describe_table(&self, table: &str) -> Result<TableMetadata, BackendError> {
            let params = [DbValue::from(table)];
            let mut columns = Vec::new();
            for row in self.query_all(COLUMNS_SQL, &params)? {
                let nullable: String = row.get_by_name("is_nullable")?;
                columns.push(ColumnMetadata {
                    name: row.get_by_name("name")?,
                    data_type: row.get_by_name::<String>("data_type")?.to_ascii_lowercase(),
                    char_max_len: row.get_by_name("char_max_len")?,
                    default: row.get_by_name("column_default")?,
                    nullable: nullable.eq_ignore_ascii_case("YES"),
                });
            }

            let mut constraints: Vec<ConstraintMetadata> = Vec::new();
            for row in self.query_all(CONSTRAINTS_SQL, &params)? {
                let name: String = row.get_by_name("name")?;
                let kind = ConstraintKind::parse(&row.get_by_name::<String>("kind")?);
                let column: Option<String> = row.get_by_name("column_name")?;
                let index = match constraints
                    .iter()
                    .position(|c| c.name == name && c.kind == kind)
                {
                    Some(index) => index,
                    None => {
                        constraints.push(ConstraintMetadata {
                            kind,
                            name,
                            fields: Vec::new(),
                            delete_rule: row.get_by_name("delete_rule")?,
                            update_rule: row.get_by_name("update_rule")?,
                        });
                        constraints.len() - 1
                    }
                };
                if let Some(column) = column {
                    constraints[index].fields.push(column);
                }
            }

            Ok(TableMetadata {
                name: table.to_string(),
                columns,
                constraints,
            })
        }

        fn table_status(&self) -> Result<Vec<TableStatus>, BackendError> {
            self.query_all("SHOW TABLE STATUS", &[])?
                .iter()
                .map(|row| {
                    Ok(TableStatus {
                        name: row.get_by_name("Name")?,
                        collation: row.get_by_name("Collation")?,
                    })
                })
                .collect()
        }

        fn show_full_columns(&self, table: &str) -> Result<Vec<FullColumn>, BackendError> {
            let sql = format!("SHOW FULL COLUMNS FROM {}", quote_ident(table));
            self.query_all(&sql, &[])?
                .iter()
                .map(|row| {
                    let null: String = row.get_by_name("Null")?;
                    Ok(FullColumn {
                        field: row.get_by_name("Field")?,
                        column_type: row.get_by_name("Type")?,
                        collation: row.get_by_name("Collation")?,
                        nullable: null.eq_ignore_ascii_case("YES"),
                        default: row.get_by_name("Default")?,
                    })
                })
                .collect()
        }

        fn show_create_table(&self, table: &str) -> Result<Option<String>, BackendError> {
            if !self
                .list_tables()?
                .iter()
                .any(|t| t.eq_ignore_ascii_case(table))
            {
                return Ok(None);
            }
            let sql = format!("SHOW CREATE TABLE {}", quote_ident(table));
            match self.query_optional(&sql, &[])? {
                Some(row) => Ok(Some(row.get(1)?)),
                None => Ok(None),
            }
        }
    }

    impl SqlExecutor for DbConnection {
        fn execute(&self, sql: &str) -> Result<(), BackendError> {
            self.execute_batch(sql)
        }
    }
}
