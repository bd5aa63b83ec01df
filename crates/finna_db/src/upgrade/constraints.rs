//! Primary, unique and foreign key constraints.

use super::DbUpgrade;
use crate::catalog::{ConstraintKind, ConstraintMetadata, TableMetadata};
use crate::ddl::{fragment_name, CreateTable, ReferentialAction};
use crate::error::{Result, UpgradeError};
use crate::lexer::quote_ident;
use crate::types::{ConstraintCategory, ModifiedConstraint, PerTable};
use std::collections::BTreeSet;
use tracing::debug;

impl DbUpgrade {
    /// Declared constraints with no live counterpart (table -> DDL fragments).
    ///
    /// A constraint is present when a live constraint of the same category
    /// covers the same set of fields, whatever its name.
    pub fn get_missing_constraints(
        &mut self,
        missing_tables: &[String],
    ) -> Result<PerTable<Vec<String>>> {
        self.load_table_info()?;
        let mut missing: PerTable<Vec<String>> = PerTable::new();
        for (table, create) in self.declared_tables(missing_tables) {
            let live = match self.live_table(&table.name) {
                Some(live) => live_constraints(live)?,
                None => Vec::new(),
            };
            for (category, fields, sql) in declared_constraints(create) {
                let present = live
                    .iter()
                    .any(|(kind, constraint)| *kind == category && same_fields(fields, &constraint.fields));
                if !present {
                    missing.entry(&table.name).push(sql.to_string());
                }
            }
        }
        debug!(tables = missing.len(), "Detected missing constraints");
        Ok(missing)
    }

    pub fn create_missing_constraints(
        &mut self,
        constraints: &PerTable<Vec<String>>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, fragments) in constraints.iter() {
            for fragment in fragments {
                let statement = format!("ALTER TABLE {} ADD {}", quote_ident(table), fragment);
                sql.push_str(&self.query(&statement, logsql)?);
            }
        }
        Ok(sql)
    }

    /// Foreign keys whose live `ON DELETE` / `ON UPDATE` rules differ.
    ///
    /// Constraints listed in `missing_constraints` are skipped. A declared
    /// foreign key that is neither missing nor found by name is an error.
    pub fn get_modified_constraints(
        &mut self,
        missing_tables: &[String],
        missing_constraints: &PerTable<Vec<String>>,
    ) -> Result<PerTable<Vec<ModifiedConstraint>>> {
        self.load_table_info()?;
        let mut modified: PerTable<Vec<ModifiedConstraint>> = PerTable::new();
        for (table, create) in self.declared_tables(missing_tables) {
            let live = match self.live_table(&table.name) {
                Some(live) => live_constraints(live)?,
                None => Vec::new(),
            };
            for fk in &create.foreign_keys {
                if constraint_is_missing(missing_constraints, &table.name, &fk.name) {
                    continue;
                }
                let actual = live
                    .iter()
                    .find(|(kind, c)| {
                        *kind == ConstraintCategory::Foreign && c.name.eq_ignore_ascii_case(&fk.name)
                    })
                    .map(|(_, c)| *c)
                    .ok_or_else(|| UpgradeError::constraint_not_found(&table.name, &fk.name))?;

                let delete_rule = live_rule(actual.delete_rule.as_deref());
                let update_rule = live_rule(actual.update_rule.as_deref());
                if delete_rule != fk.on_delete.normalized() || update_rule != fk.on_update.normalized() {
                    debug!(
                        table = %table.name,
                        constraint = %fk.name,
                        live_delete = %delete_rule,
                        live_update = %update_rule,
                        "Foreign key rules differ"
                    );
                    modified.entry(&table.name).push(ModifiedConstraint {
                        category: ConstraintCategory::Foreign,
                        name: fk.name.clone(),
                        sql: fk.sql.clone(),
                    });
                }
            }
        }
        Ok(modified)
    }

    /// Drop and re-add each modified foreign key.
    pub fn update_modified_constraints(
        &mut self,
        constraints: &PerTable<Vec<ModifiedConstraint>>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, modified) in constraints.iter() {
            for constraint in modified {
                if constraint.category != ConstraintCategory::Foreign {
                    return Err(UpgradeError::UnsupportedConstraintModification {
                        table: table.to_string(),
                        category: constraint.category.to_string(),
                        name: constraint.name.clone(),
                    });
                }
                let drop = format!(
                    "ALTER TABLE {} DROP FOREIGN KEY {}",
                    quote_ident(table),
                    quote_ident(&constraint.name)
                );
                sql.push_str(&self.query(&drop, logsql)?);
                let add = format!("ALTER TABLE {} ADD {}", quote_ident(table), constraint.sql);
                sql.push_str(&self.query(&add, logsql)?);
            }
        }
        Ok(sql)
    }
}

/// Whether `missing` lists a constraint or key fragment named `name` for `table`.
pub(crate) fn constraint_is_missing(missing: &PerTable<Vec<String>>, table: &str, name: &str) -> bool {
    missing.get(table).is_some_and(|fragments| {
        fragments
            .iter()
            .filter_map(|sql| fragment_name(sql))
            .any(|n| n.eq_ignore_ascii_case(name))
    })
}

/// Categorised live constraints. `CHECK` constraints are ignored.
fn live_constraints(table: &TableMetadata) -> Result<Vec<(ConstraintCategory, &ConstraintMetadata)>> {
    let mut out = Vec::with_capacity(table.constraints.len());
    for constraint in &table.constraints {
        let category = match &constraint.kind {
            ConstraintKind::PrimaryKey => ConstraintCategory::Primary,
            ConstraintKind::Unique => ConstraintCategory::Unique,
            ConstraintKind::ForeignKey => ConstraintCategory::Foreign,
            ConstraintKind::Check => continue,
            ConstraintKind::Other(kind) => return Err(UpgradeError::unexpected_constraint(kind)),
        };
        out.push((category, constraint));
    }
    Ok(out)
}

fn declared_constraints(create: &CreateTable) -> Vec<(ConstraintCategory, &[String], &str)> {
    let mut out = Vec::new();
    if let Some(pk) = &create.primary_key {
        out.push((ConstraintCategory::Primary, pk.fields.as_slice(), pk.sql.as_str()));
    }
    for unique in &create.unique_keys {
        out.push((ConstraintCategory::Unique, unique.fields.as_slice(), unique.sql.as_str()));
    }
    for fk in &create.foreign_keys {
        out.push((ConstraintCategory::Foreign, fk.fields.as_slice(), fk.sql.as_str()));
    }
    out
}

fn same_fields(expected: &[String], actual: &[String]) -> bool {
    let lower = |fields: &[String]| -> BTreeSet<String> {
        fields.iter().map(|f| f.to_lowercase()).collect()
    };
    lower(expected) == lower(actual)
}

fn live_rule(rule: Option<&str>) -> ReferentialAction {
    rule.and_then(ReferentialAction::parse)
        .unwrap_or_default()
        .normalized()
}
