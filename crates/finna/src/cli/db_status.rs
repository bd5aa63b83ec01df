//! `finna db-status`

use crate::cli::output::{plural, print_table_colored};
use crate::cli::{open_upgrader, DbArgs};
use anyhow::Result;
use clap::Args;
use comfy_table::Color;
use finna_db::{
    CollationProblem, DbUpgrade, EncodingProblem, KeyChanges, ModifiedConstraint, PerTable,
    UpgradeOptions,
};
use serde::Serialize;

#[derive(Args, Debug, Clone)]
pub struct DbStatusArgs {
    #[command(flatten)]
    pub db: DbArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Every pending difference, without touching the database.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaStatus {
    pub missing_tables: Vec<String>,
    pub missing_columns: PerTable<Vec<String>>,
    pub modified_columns: PerTable<Vec<String>>,
    pub missing_constraints: PerTable<Vec<String>>,
    pub modified_constraints: PerTable<Vec<ModifiedConstraint>>,
    pub modified_keys: PerTable<KeyChanges>,
    pub deprecated_columns: PerTable<Vec<String>>,
    pub encoding_problems: PerTable<EncodingProblem>,
    pub collation_problems: PerTable<CollationProblem>,
}

impl SchemaStatus {
    /// Run all detections in upgrade order.
    pub fn collect(upgrader: &mut DbUpgrade) -> Result<Self> {
        let missing_tables = upgrader.get_missing_tables()?;
        let missing_columns = upgrader.get_missing_columns(&missing_tables)?;
        let modified_columns = upgrader.get_modified_columns(&missing_tables, &missing_columns)?;
        let missing_constraints = upgrader.get_missing_constraints(&missing_tables)?;
        let modified_constraints =
            upgrader.get_modified_constraints(&missing_tables, &missing_constraints)?;
        let modified_keys = upgrader.get_modified_keys(&missing_tables, &missing_constraints)?;
        let deprecated_columns = upgrader.get_deprecated_columns(&missing_tables)?;
        let encoding_problems = upgrader.get_encoding_problems()?;
        let collation_problems = upgrader.get_collation_problems()?;
        Ok(Self {
            missing_tables,
            missing_columns,
            modified_columns,
            missing_constraints,
            modified_constraints,
            modified_keys,
            deprecated_columns,
            encoding_problems,
            collation_problems,
        })
    }

    pub fn is_up_to_date(&self) -> bool {
        self.missing_tables.is_empty()
            && self.missing_columns.is_empty()
            && self.modified_columns.is_empty()
            && self.missing_constraints.is_empty()
            && self.modified_constraints.is_empty()
            && self.modified_keys.is_empty()
            && self.deprecated_columns.is_empty()
            && self.encoding_problems.is_empty()
            && self.collation_problems.is_empty()
    }

    /// One line per problem for `table`; empty when the table is current.
    pub fn details(&self, table: &str) -> Vec<String> {
        if self.missing_tables.iter().any(|t| t == table) {
            return vec!["table missing".to_string()];
        }
        let mut details = Vec::new();
        if let Some(columns) = self.missing_columns.get(table) {
            details.push(format!("{} missing", plural(columns.len(), "column")));
        }
        if let Some(columns) = self.modified_columns.get(table) {
            details.push(format!("{} modified", plural(columns.len(), "column")));
        }
        if let Some(constraints) = self.missing_constraints.get(table) {
            details.push(format!("{} missing", plural(constraints.len(), "constraint")));
        }
        if let Some(constraints) = self.modified_constraints.get(table) {
            details.push(format!("{} modified", plural(constraints.len(), "constraint")));
        }
        if let Some(keys) = self.modified_keys.get(table) {
            details.push(format!(
                "{} to add, {} to drop",
                plural(keys.add.len(), "key"),
                keys.drop.len()
            ));
        }
        if let Some(columns) = self.deprecated_columns.get(table) {
            details.push(format!("deprecated: {}", columns.join(", ")));
        }
        if let Some(problem) = self.encoding_problems.get(table) {
            details.push(format!(
                "encoding {} -> {}",
                problem.current_collation, problem.target_collation
            ));
        }
        if let Some(problem) = self.collation_problems.get(table) {
            details.push(format!(
                "collation {} -> {}",
                problem.current_collation.as_deref().unwrap_or("unknown"),
                problem.expected_collation
            ));
        }
        details
    }
}

pub fn run(args: DbStatusArgs) -> Result<()> {
    let mut upgrader = open_upgrader(&args.db, UpgradeOptions::default())?;
    let status = SchemaStatus::collect(&mut upgrader)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    let tables: Vec<String> = upgrader.schema().table_names().map(str::to_string).collect();
    print_table_colored(&["Table", "Status", "Details"], status_rows(&status, &tables));
    if status.is_up_to_date() {
        println!("Database is up to date");
    } else {
        println!("Run `finna db-upgrade --logsql` to review the changes");
    }
    Ok(())
}

fn status_rows(status: &SchemaStatus, tables: &[String]) -> Vec<Vec<(String, Option<Color>)>> {
    tables
        .iter()
        .map(|table| {
            let details = status.details(table);
            let (label, color) = if status.missing_tables.contains(table) {
                ("missing", Color::Red)
            } else if details.is_empty() {
                ("ok", Color::Green)
            } else {
                ("outdated", Color::Yellow)
            };
            vec![
                (table.clone(), None),
                (label.to_string(), Some(color)),
                (details.join("; "), None),
            ]
        })
        .collect()
}
