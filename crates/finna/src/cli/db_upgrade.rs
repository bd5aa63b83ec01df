//! `finna db-upgrade`

use crate::cli::error::HelpfulError;
use crate::cli::{open_upgrader, DbArgs};
use anyhow::Result;
use clap::Args;
use finna_db::{DbUpgrade, UpgradeOptions, UpgradeReport};
use tracing::info;

#[derive(Args, Debug, Clone)]
pub struct DbUpgradeArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Print the SQL instead of executing it
    #[arg(long)]
    pub logsql: bool,

    /// Also drop columns the current schema no longer uses
    #[arg(long)]
    pub remove_deprecated: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl DbUpgradeArgs {
    fn options(&self) -> UpgradeOptions {
        UpgradeOptions {
            remove_deprecated_columns: self.remove_deprecated,
            ..UpgradeOptions::default()
        }
    }
}

pub fn run(args: DbUpgradeArgs) -> Result<()> {
    let mut upgrader = open_upgrader(&args.db, args.options())?;
    let output = upgrade(&mut upgrader, &args)?;
    print!("{}", output);
    Ok(())
}

/// Run the upgrade and render its outcome.
pub fn upgrade(upgrader: &mut DbUpgrade, args: &DbUpgradeArgs) -> Result<String> {
    info!(logsql = args.logsql, "Starting database upgrade");
    let report = upgrader
        .run_upgrade(args.logsql)
        .map_err(|err| HelpfulError::upgrade_failed(&err.to_string()))?;
    info!(
        warnings = report.warnings.len(),
        sql_bytes = report.sql.len(),
        "Database upgrade finished"
    );
    render(&report, args)
}

fn render(report: &UpgradeReport, args: &DbUpgradeArgs) -> Result<String> {
    if args.json {
        return Ok(format!("{}\n", serde_json::to_string_pretty(report)?));
    }
    if args.logsql {
        if report.sql.is_empty() {
            return Ok("-- Database is up to date\n".to_string());
        }
        return Ok(report.sql.clone());
    }
    if report.warnings.is_empty() {
        return Ok("Database is up to date\n".to_string());
    }
    let mut out = String::new();
    for warning in &report.warnings {
        out.push_str(warning);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use finna_db::MemoryDatabase;
    use std::path::PathBuf;
    use std::sync::Arc;

    const DECLARED: &str = "CREATE TABLE `user` (\n\
        `id` int(11) NOT NULL AUTO_INCREMENT,\n\
        `username` varchar(255) NOT NULL DEFAULT '',\n\
        `email` varchar(255) NOT NULL DEFAULT '',\n\
        PRIMARY KEY (`id`)\n\
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin;\n";

    const LIVE: &str = "CREATE TABLE `user` (\n\
        `id` int(11) NOT NULL AUTO_INCREMENT,\n\
        `username` varchar(255) NOT NULL DEFAULT '',\n\
        PRIMARY KEY (`id`)\n\
        ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin;\n";

    fn args(logsql: bool, json: bool) -> DbUpgradeArgs {
        DbUpgradeArgs {
            db: DbArgs {
                database_url: "mysql://localhost/finna".to_string(),
                sql: PathBuf::from("mysql.sql"),
            },
            logsql,
            remove_deprecated: false,
            json,
        }
    }

    fn upgrader(db: &Arc<MemoryDatabase>) -> DbUpgrade {
        let mut upgrader = DbUpgrade::new();
        upgrader.load_sql(DECLARED);
        upgrader.set_adapter(db.clone());
        upgrader
    }

    #[test]
    fn test_logsql_prints_statements() {
        let db = Arc::new(MemoryDatabase::from_sql(LIVE).unwrap());
        let out = upgrade(&mut upgrader(&db), &args(true, false)).unwrap();
        assert!(out.contains("ALTER TABLE `user` ADD COLUMN `email`"));
        assert!(out.ends_with(";\n"));
        assert!(db.executed().is_empty());
    }

    #[test]
    fn test_execute_prints_warnings_then_up_to_date() {
        let db = Arc::new(MemoryDatabase::from_sql(LIVE).unwrap());
        let out = upgrade(&mut upgrader(&db), &args(false, false)).unwrap();
        assert_eq!(out, "Added column(s) to table(s): user\n");

        let again = upgrade(&mut upgrader(&db), &args(false, false)).unwrap();
        assert_eq!(again, "Database is up to date\n");
    }

    #[test]
    fn test_json_report() {
        let db = Arc::new(MemoryDatabase::from_sql(LIVE).unwrap());
        let out = upgrade(&mut upgrader(&db), &args(false, true)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["warnings"][0], "Added column(s) to table(s): user");
        assert_eq!(value["sql"], "");
    }

    #[test]
    fn test_remove_deprecated_flag() {
        let mut with = args(false, false);
        with.remove_deprecated = true;
        assert!(with.options().remove_deprecated_columns);
        assert!(!args(false, false).options().remove_deprecated_columns);
    }
}
