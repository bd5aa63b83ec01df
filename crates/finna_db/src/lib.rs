//! Declarative schema reconciliation for the Finna database
//!
//! The declared schema (a `mysql.sql` script of `CREATE TABLE` / `ALTER
//! TABLE` statements) is parsed once and diffed against live metadata.
//! Every difference has a detector and an emitter; emitters either log the
//! corrective DDL or execute it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use finna_db::{DbConnection, DbUpgrade};
//! use std::sync::Arc;
//!
//! let mut upgrade = DbUpgrade::new();
//! upgrade.load_sql_file("module/VuFind/sql/mysql.sql")?;
//! upgrade.set_adapter(Arc::new(DbConnection::connect("mysql://finna@localhost/vufind")?));
//!
//! // Dry run: collect the SQL without touching the database
//! let report = upgrade.run_upgrade(true)?;
//! print!("{}", report.sql);
//! ```

pub mod backend;
pub mod catalog;
pub mod ddl;
mod error;
pub mod lexer;
mod memory;
mod types;
mod upgrade;

pub use backend::{BackendError, DbRow, DbValue, FromDbValue};
pub use catalog::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, DatabaseAdapter, FullColumn,
    MetadataSource, SqlExecutor, TableMetadata, TableStatus,
};
pub use ddl::{parse_schema, DeclaredSchema, ReferentialAction};
pub use error::{Result, UpgradeError};
pub use memory::MemoryDatabase;
pub use types::*;
pub use upgrade::DbUpgrade;

#[cfg(feature = "mysql")]
pub use backend::DbConnection;
