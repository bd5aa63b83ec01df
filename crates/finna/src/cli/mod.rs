//! CLI commands for the Finna maintenance tool.

pub mod db_status;
pub mod db_upgrade;
pub mod error;
pub mod output;

use crate::cli::error::HelpfulError;
use clap::Args;
use finna_db::{DbConnection, DbUpgrade, UpgradeOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Connection and schema options shared by the database commands.
#[derive(Args, Debug, Clone)]
pub struct DbArgs {
    /// MySQL connection URL
    #[arg(long, env = "FINNA_DATABASE_URL", hide_env_values = true)]
    pub database_url: String,

    /// Declarative schema file (CREATE TABLE / ALTER TABLE statements)
    #[arg(long, env = "FINNA_SCHEMA_SQL")]
    pub sql: PathBuf,
}

/// Load the declared schema and attach a live connection.
pub fn open_upgrader(db: &DbArgs, options: UpgradeOptions) -> anyhow::Result<DbUpgrade> {
    let mut upgrader = load_schema(&db.sql, options)?;
    let connection = DbConnection::connect(&db.database_url)
        .map_err(|err| HelpfulError::database_unreachable(&err.to_string()))?;
    info!(backend = connection.backend_name(), "Connected to database");
    upgrader.set_adapter(Arc::new(connection));
    Ok(upgrader)
}

/// Parse the declared schema file.
pub fn load_schema(path: &std::path::Path, options: UpgradeOptions) -> anyhow::Result<DbUpgrade> {
    if !path.exists() {
        return Err(HelpfulError::file_not_found(path).into());
    }
    let mut upgrader = DbUpgrade::with_options(options);
    upgrader
        .load_sql_file(path)
        .map_err(|err| HelpfulError::cannot_read_file(path, &err.to_string()))?;
    if upgrader.schema().is_empty() {
        return Err(HelpfulError::empty_schema(path).into());
    }
    info!(
        path = %path.display(),
        tables = upgrader.schema().tables().len(),
        "Loaded declared schema"
    );
    Ok(upgrader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_schema_missing_file() {
        let err = load_schema(std::path::Path::new("/nonexistent/mysql.sql"), UpgradeOptions::default())
            .unwrap_err();
        let helpful = err.downcast_ref::<HelpfulError>().unwrap();
        assert!(helpful.message.contains("/nonexistent/mysql.sql"));
    }

    #[test]
    fn test_load_schema_without_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "-- nothing here\nSET NAMES utf8mb4;").unwrap();
        let err = load_schema(file.path(), UpgradeOptions::default()).unwrap_err();
        let helpful = err.downcast_ref::<HelpfulError>().unwrap();
        assert!(helpful.message.contains("No tables"));
    }

    #[test]
    fn test_load_schema_counts_tables() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "CREATE TABLE `user` (`id` int(11) NOT NULL AUTO_INCREMENT, PRIMARY KEY (`id`));"
        )
        .unwrap();
        let upgrader = load_schema(file.path(), UpgradeOptions::default()).unwrap();
        assert_eq!(upgrader.schema().table_names().collect::<Vec<_>>(), vec!["user"]);
    }
}
