//! Declarative schema reconciliation.
//!
//! [`DbUpgrade`] compares the tables declared in a SQL schema file against the
//! live database and produces (or executes) the DDL that closes the gap.
//! Every detection step has a matching emitter; emitters either return the
//! SQL they would run (`logsql = true`) or execute it and return an empty
//! string.
//!
//! Run the "missing" detections before the "modified" ones and pass their
//! results along, so nothing already known to be absent is reported twice.

mod charset;
mod columns;
mod constraints;
mod keys;

use crate::catalog::{DatabaseAdapter, TableMetadata, TableStatus};
use crate::ddl::{DeclaredSchema, TableDefinition};
use crate::error::{Result, UpgradeError};
use crate::lexer::strip_trailing_semicolon;
use crate::types::{PerTable, UpgradeOptions, UpgradeReport};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Schema upgrader.
#[derive(Default)]
pub struct DbUpgrade {
    schema: DeclaredSchema,
    adapter: Option<Arc<dyn DatabaseAdapter>>,
    options: UpgradeOptions,
    table_info: Option<Vec<TableMetadata>>,
    table_status: Option<Vec<TableStatus>>,
}

impl std::fmt::Debug for DbUpgrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbUpgrade")
            .field("tables", &self.schema.tables().len())
            .field("adapter_set", &self.adapter.is_some())
            .field("options", &self.options)
            .finish()
    }
}

impl DbUpgrade {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: UpgradeOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &UpgradeOptions {
        &self.options
    }

    pub fn schema(&self) -> &DeclaredSchema {
        &self.schema
    }

    /// Parse declarative SQL and append its statements per table.
    pub fn load_sql(&mut self, sql: &str) {
        self.schema.load(sql);
        debug!(tables = self.schema.tables().len(), "Loaded declarative schema");
    }

    /// Read and parse a declarative SQL file.
    pub fn load_sql_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let sql = std::fs::read_to_string(path)?;
        self.load_sql(&sql);
        info!("Loaded schema from {}", path.display());
        Ok(())
    }

    pub fn set_adapter(&mut self, adapter: Arc<dyn DatabaseAdapter>) {
        self.adapter = Some(adapter);
        self.invalidate_caches();
    }

    /// The configured adapter; fails when none was set.
    pub fn adapter(&self) -> Result<Arc<dyn DatabaseAdapter>> {
        self.adapter.clone().ok_or(UpgradeError::AdapterNotSet)
    }

    /// Force the next metadata lookup to hit the database.
    pub fn reload_table_info(&mut self) -> Result<()> {
        self.table_info = None;
        self.load_table_info()
    }

    /// Run (or log) one statement.
    ///
    /// Logged statements come back `;\n`-terminated. Executing drops the
    /// cached metadata, since the live schema just changed.
    pub fn query(&mut self, sql: &str, logsql: bool) -> Result<String> {
        let statement = strip_trailing_semicolon(sql);
        if logsql {
            return Ok(format!("{};\n", statement));
        }
        self.adapter()?.execute(statement)?;
        info!("Executed: {}", statement);
        self.invalidate_caches();
        Ok(String::new())
    }

    // ------------------------------------------------------------------------
    // Tables
    // ------------------------------------------------------------------------

    /// Live table names.
    pub fn get_all_tables(&mut self) -> Result<Vec<String>> {
        self.load_table_info()?;
        Ok(self.live_tables().iter().map(|t| t.name.clone()).collect())
    }

    /// Declared tables that do not exist (compared case-insensitively).
    pub fn get_missing_tables(&mut self) -> Result<Vec<String>> {
        let live: HashSet<String> = self
            .get_all_tables()?
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();
        Ok(self
            .schema
            .table_names()
            .filter(|t| !live.contains(&t.trim().to_lowercase()))
            .map(str::to_string)
            .collect())
    }

    /// Run (or log) the `CREATE TABLE` statement of each listed table.
    pub fn create_missing_tables(&mut self, tables: &[String], logsql: bool) -> Result<String> {
        let mut sql = String::new();
        for table in tables {
            let Some(statement) = self
                .schema
                .table(table)
                .and_then(|t| t.statements.first())
                .cloned()
            else {
                continue;
            };
            sql.push_str(&self.query(&statement, logsql)?);
        }
        Ok(sql)
    }

    // ------------------------------------------------------------------------
    // Full run
    // ------------------------------------------------------------------------

    /// Reconcile the live schema with the declared one.
    ///
    /// When logging, each "missing" result is fed to the following "modified"
    /// detection; when executing, the missing items exist by then, so empty
    /// lists are passed instead.
    pub fn run_upgrade(&mut self, logsql: bool) -> Result<UpgradeReport> {
        let mut report = UpgradeReport::default();

        let missing_tables = self.get_missing_tables()?;
        if !missing_tables.is_empty() {
            report
                .sql
                .push_str(&self.create_missing_tables(&missing_tables, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Created missing table(s): {}",
                    missing_tables.join(", ")
                ));
            }
        }
        let skip_tables = if logsql { missing_tables } else { Vec::new() };

        let missing_columns = self.get_missing_columns(&skip_tables)?;
        if !missing_columns.is_empty() {
            report
                .sql
                .push_str(&self.create_missing_columns(&missing_columns, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Added column(s) to table(s): {}",
                    join_tables(&missing_columns)
                ));
            }
        }
        let skip_columns = if logsql { missing_columns } else { PerTable::new() };

        let modified_columns = self.get_modified_columns(&skip_tables, &skip_columns)?;
        if !modified_columns.is_empty() {
            report
                .sql
                .push_str(&self.update_modified_columns(&modified_columns, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Modified column(s) in table(s): {}",
                    join_tables(&modified_columns)
                ));
            }
        }

        let missing_constraints = self.get_missing_constraints(&skip_tables)?;
        if !missing_constraints.is_empty() {
            report
                .sql
                .push_str(&self.create_missing_constraints(&missing_constraints, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Added constraint(s) to table(s): {}",
                    join_tables(&missing_constraints)
                ));
            }
        }
        let skip_constraints = if logsql {
            missing_constraints
        } else {
            PerTable::new()
        };

        let modified_constraints =
            self.get_modified_constraints(&skip_tables, &skip_constraints)?;
        if !modified_constraints.is_empty() {
            report.sql.push_str(
                &self.update_modified_constraints(&modified_constraints, logsql)?,
            );
            if !logsql {
                report.warnings.push(format!(
                    "Modified constraint(s) in table(s): {}",
                    join_tables(&modified_constraints)
                ));
            }
        }

        let modified_keys = self.get_modified_keys(&skip_tables, &skip_constraints)?;
        if !modified_keys.is_empty() {
            report
                .sql
                .push_str(&self.update_modified_keys(&modified_keys, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Modified key(s) in table(s): {}",
                    join_tables(&modified_keys)
                ));
            }
        }

        if self.options.remove_deprecated_columns {
            let deprecated = self.get_deprecated_columns(&skip_tables)?;
            if !deprecated.is_empty() {
                report
                    .sql
                    .push_str(&self.remove_deprecated_columns(&deprecated, logsql)?);
                if !logsql {
                    report.warnings.push(format!(
                        "Removed deprecated column(s) from table(s): {}",
                        join_tables(&deprecated)
                    ));
                }
            }
        }

        let encoding = self.get_encoding_problems()?;
        if !encoding.is_empty() {
            report
                .sql
                .push_str(&self.fix_encoding_problems(&encoding, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Converted character encoding of table(s): {}",
                    join_tables(&encoding)
                ));
            }
        }

        let collation = self.get_collation_problems()?;
        if !collation.is_empty() {
            report
                .sql
                .push_str(&self.fix_collation_problems(&collation, logsql)?);
            if !logsql {
                report.warnings.push(format!(
                    "Modified character set and collation of table(s): {}",
                    join_tables(&collation)
                ));
            }
        }

        info!(
            logsql,
            statements = report.sql.lines().count(),
            changes = report.warnings.len(),
            "Schema upgrade finished"
        );
        Ok(report)
    }

    // ------------------------------------------------------------------------
    // Cached metadata
    // ------------------------------------------------------------------------

    fn invalidate_caches(&mut self) {
        self.table_info = None;
        self.table_status = None;
    }

    fn load_table_info(&mut self) -> Result<()> {
        if self.table_info.is_some() {
            return Ok(());
        }
        let adapter = self.adapter()?;
        let mut info = Vec::new();
        for table in adapter.list_tables()? {
            info.push(adapter.describe_table(&table)?);
        }
        debug!(tables = info.len(), "Loaded live table metadata");
        self.table_info = Some(info);
        Ok(())
    }

    fn live_tables(&self) -> &[TableMetadata] {
        self.table_info.as_deref().unwrap_or(&[])
    }

    fn live_table(&self, name: &str) -> Option<&TableMetadata> {
        let tables = self.live_tables();
        tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    /// Live `SHOW TABLE STATUS`, cached until the next executed statement.
    pub fn get_table_status(&mut self) -> Result<Vec<TableStatus>> {
        if let Some(status) = &self.table_status {
            return Ok(status.clone());
        }
        let status = self.adapter()?.table_status()?;
        self.table_status = Some(status.clone());
        Ok(status)
    }

    /// Declared tables that are not in `skip`, with their `CREATE TABLE`.
    fn declared_tables<'a>(
        &'a self,
        skip: &'a [String],
    ) -> impl Iterator<Item = (&'a TableDefinition, &'a crate::ddl::CreateTable)> + 'a {
        self.schema
            .tables()
            .iter()
            .filter(move |t| !is_listed(skip, &t.name))
            .filter_map(|t| t.create.as_ref().map(|create| (t, create)))
    }
}

fn is_listed(list: &[String], table: &str) -> bool {
    list.iter().any(|t| t.eq_ignore_ascii_case(table))
}

fn join_tables<T>(map: &PerTable<T>) -> String {
    map.tables().collect::<Vec<_>>().join(", ")
}
