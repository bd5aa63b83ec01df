//! Table and column character set / collation audits.

use super::DbUpgrade;
use crate::catalog::FullColumn;
use crate::ddl::{base_type, CreateTable};
use crate::error::Result;
use crate::lexer::{quote_ident, quote_literal};
use crate::types::{CollationProblem, EncodingProblem, PerTable, ProblemColumn};
use tracing::debug;

const FALLBACK_CHARSET: &str = "utf8mb4";

impl DbUpgrade {
    /// Declared tables whose live charset or collation (table or column level)
    /// differs from the declared `CHARSET` / `COLLATE` options.
    ///
    /// Tables without both options declared, and `latin1` tables (see
    /// [`DbUpgrade::get_encoding_problems`]), are skipped. Declared `json`
    /// columns are never reported.
    pub fn get_collation_problems(&mut self) -> Result<PerTable<CollationProblem>> {
        let status = self.get_table_status()?;
        let adapter = self.adapter()?;
        let mut problems = PerTable::new();
        for table in status {
            let Some(create) = self.schema.table(&table.name).and_then(|t| t.create.as_ref())
            else {
                continue;
            };
            let (Some(charset), Some(collation)) = (&create.charset, &create.collation) else {
                continue;
            };
            let current = table.collation.as_deref().map(normalize_encoding_name);
            if current.as_deref().is_some_and(is_latin1) {
                continue;
            }
            let expected_charset = normalize_encoding_name(charset);
            let expected_collation = normalize_encoding_name(collation);

            let columns: Vec<ProblemColumn> = adapter
                .show_full_columns(&table.name)?
                .into_iter()
                .filter(|c| !is_json_column(create, &c.field))
                .filter(|c| {
                    c.collation
                        .as_deref()
                        .filter(|coll| !coll.is_empty())
                        .is_some_and(|coll| normalize_encoding_name(coll) != expected_collation)
                })
                .map(problem_column)
                .collect();

            let table_charset = current
                .as_deref()
                .and_then(|c| c.split('_').next())
                .unwrap_or_default();
            if current.as_deref() != Some(expected_collation.as_str())
                || table_charset != expected_charset
                || !columns.is_empty()
            {
                debug!(
                    table = %table.name,
                    current = ?table.collation,
                    expected = %collation,
                    columns = columns.len(),
                    "Collation problem"
                );
                problems.insert(
                    table.name.clone(),
                    CollationProblem {
                        current_collation: table.collation.clone(),
                        expected_charset: charset.clone(),
                        expected_collation: collation.clone(),
                        columns,
                    },
                );
            }
        }
        Ok(problems)
    }

    /// Re-collate each problem column (type, nullability and default kept),
    /// then convert the table.
    pub fn fix_collation_problems(
        &mut self,
        problems: &PerTable<CollationProblem>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, problem) in problems.iter() {
            for column in &problem.columns {
                let statement = format!(
                    "ALTER TABLE {} MODIFY {} {} COLLATE {}{}",
                    quote_ident(table),
                    quote_ident(&column.name),
                    column.column_type,
                    problem.expected_collation,
                    column_suffix(column)
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
            let statement = format!(
                "ALTER TABLE {} CONVERT TO CHARACTER SET {} COLLATE {}",
                quote_ident(table),
                problem.expected_charset,
                problem.expected_collation
            );
            sql.push_str(&self.query(&statement, logsql)?);
        }
        Ok(sql)
    }

    /// Declared tables still stored as `latin1`.
    ///
    /// The target charset and collation are the declared ones, falling back
    /// to `utf8mb4` / `<charset>_unicode_ci`.
    pub fn get_encoding_problems(&mut self) -> Result<PerTable<EncodingProblem>> {
        let status = self.get_table_status()?;
        let adapter = self.adapter()?;
        let mut problems = PerTable::new();
        for table in status {
            let Some(current) = table.collation.as_deref().filter(|c| is_latin1(c)) else {
                continue;
            };
            let Some(declared) = self.schema.table(&table.name) else {
                continue;
            };
            let create = declared.create.as_ref();
            let target_charset = create
                .and_then(|c| c.charset.clone())
                .unwrap_or_else(|| FALLBACK_CHARSET.to_string());
            let target_collation = create
                .and_then(|c| c.collation.clone())
                .unwrap_or_else(|| format!("{}_unicode_ci", target_charset));

            let columns = adapter
                .show_full_columns(&table.name)?
                .into_iter()
                .filter(|c| c.collation.as_deref().is_some_and(is_latin1))
                .map(problem_column)
                .collect();

            debug!(table = %table.name, current, "Encoding problem");
            problems.insert(
                table.name.clone(),
                EncodingProblem {
                    current_collation: current.to_string(),
                    target_charset,
                    target_collation,
                    columns,
                },
            );
        }
        Ok(problems)
    }

    /// Re-encode `latin1` tables without touching the stored bytes.
    ///
    /// Each textual column is cast to its binary counterpart and back under
    /// the target charset; columns without a binary counterpart (`enum`,
    /// `set`) are modified directly. The table default is switched last.
    pub fn fix_encoding_problems(
        &mut self,
        problems: &PerTable<EncodingProblem>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, problem) in problems.iter() {
            for column in &problem.columns {
                let suffix = column_suffix(column);
                if let Some(binary) = binary_type(&column.column_type) {
                    let statement = format!(
                        "ALTER TABLE {} MODIFY {} {}{}",
                        quote_ident(table),
                        quote_ident(&column.name),
                        binary,
                        suffix
                    );
                    sql.push_str(&self.query(&statement, logsql)?);
                }
                let statement = format!(
                    "ALTER TABLE {} MODIFY {} {} CHARACTER SET {} COLLATE {}{}",
                    quote_ident(table),
                    quote_ident(&column.name),
                    column.column_type,
                    problem.target_charset,
                    problem.target_collation,
                    suffix
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
            let statement = format!(
                "ALTER TABLE {} DEFAULT CHARACTER SET {} COLLATE {}",
                quote_ident(table),
                problem.target_charset,
                problem.target_collation
            );
            sql.push_str(&self.query(&statement, logsql)?);
        }
        Ok(sql)
    }
}

fn problem_column(column: FullColumn) -> ProblemColumn {
    ProblemColumn {
        name: column.field,
        column_type: column.column_type,
        collation: column.collation,
        nullable: column.nullable,
        default: column.default,
    }
}

fn column_suffix(column: &ProblemColumn) -> String {
    let mut suffix = String::new();
    if !column.nullable {
        suffix.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        suffix.push_str(" DEFAULT ");
        suffix.push_str(&quote_literal(default));
    }
    suffix
}

fn is_json_column(create: &CreateTable, name: &str) -> bool {
    create
        .column(name)
        .is_some_and(|c| c.base_type() == "json")
}

fn is_latin1(collation: &str) -> bool {
    collation.to_ascii_lowercase().starts_with("latin1")
}

/// Lower-case, with MySQL 8's `utf8mb3` reported as the `utf8` alias.
fn normalize_encoding_name(name: &str) -> String {
    let lower = name.to_ascii_lowercase();
    match lower.strip_prefix("utf8mb3") {
        Some(rest) => format!("utf8{}", rest),
        None => lower,
    }
}

/// Binary counterpart of a textual column type, keeping its length.
fn binary_type(column_type: &str) -> Option<String> {
    let lower = column_type.to_ascii_lowercase();
    let base = base_type(&lower);
    let length = &lower[base.len()..];
    let binary = match base {
        "varchar" => "varbinary",
        "char" => "binary",
        "tinytext" => "tinyblob",
        "text" => "blob",
        "mediumtext" => "mediumblob",
        "longtext" => "longblob",
        _ => return None,
    };
    let length = length.split_whitespace().next().unwrap_or("");
    Some(format!("{}{}", binary, length))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_counterparts_keep_length() {
        assert_eq!(binary_type("varchar(255)").as_deref(), Some("varbinary(255)"));
        assert_eq!(binary_type("char(3)").as_deref(), Some("binary(3)"));
        assert_eq!(binary_type("MEDIUMTEXT").as_deref(), Some("mediumblob"));
        assert_eq!(binary_type("enum('a','b')"), None);
        assert_eq!(binary_type("int(11)"), None);
    }

    #[test]
    fn utf8mb3_is_the_utf8_alias() {
        assert_eq!(normalize_encoding_name("utf8mb3_general_ci"), "utf8_general_ci");
        assert_eq!(normalize_encoding_name("UTF8MB4_Bin"), "utf8mb4_bin");
        assert_eq!(normalize_encoding_name("utf8"), "utf8");
    }

    #[test]
    fn column_suffix_keeps_nullability_and_default() {
        let column = ProblemColumn {
            name: "title".to_string(),
            column_type: "varchar(200)".to_string(),
            collation: Some("utf8mb4_bin".to_string()),
            nullable: false,
            default: Some("it's".to_string()),
        };
        assert_eq!(column_suffix(&column), " NOT NULL DEFAULT 'it''s'");
    }
}
