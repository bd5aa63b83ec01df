//! Column detection and remediation.

use super::{is_listed, DbUpgrade};
use crate::catalog::ColumnMetadata;
use crate::ddl::{base_type, modify_column_fragment, normalize_default, ColumnDef, CreateTable};
use crate::error::Result;
use crate::lexer::quote_ident;
use crate::types::PerTable;
use tracing::debug;

/// Types whose live `CHARACTER_MAXIMUM_LENGTH` is not part of the declared type.
const UNSIZED_TYPES: &[&str] = &[
    "tinytext",
    "text",
    "mediumtext",
    "longtext",
    "tinyblob",
    "blob",
    "mediumblob",
    "longblob",
    "json",
];

/// Display width is not significant for these.
const INTEGER_TYPES: &[&str] = &["tinyint", "smallint", "mediumint", "int", "integer", "bigint"];

/// Types whose parenthetical is not a character length; only the base is compared.
const BASE_ONLY_TYPES: &[&str] = &[
    "enum", "set", "decimal", "numeric", "float", "double", "bit", "datetime", "timestamp",
    "time",
];

impl DbUpgrade {
    /// Declared columns absent from live tables (table -> column DDL fragments).
    ///
    /// Always reloads live metadata first.
    pub fn get_missing_columns(&mut self, missing_tables: &[String]) -> Result<PerTable<Vec<String>>> {
        self.reload_table_info()?;
        let mut missing: PerTable<Vec<String>> = PerTable::new();
        for (table, create) in self.declared_tables(missing_tables) {
            let live = self.live_table(&table.name);
            for column in &create.columns {
                if live.and_then(|t| t.column(&column.name)).is_none() {
                    missing
                        .entry(&table.name)
                        .push(column.sql.clone());
                }
            }
        }
        debug!(tables = missing.len(), "Detected missing columns");
        Ok(missing)
    }

    /// Declared columns whose live type, default or nullability differs.
    ///
    /// Columns listed in `missing_columns` are skipped. Always reloads live
    /// metadata first.
    pub fn get_modified_columns(
        &mut self,
        missing_tables: &[String],
        missing_columns: &PerTable<Vec<String>>,
    ) -> Result<PerTable<Vec<String>>> {
        self.reload_table_info()?;
        let mut modified: PerTable<Vec<String>> = PerTable::new();
        for (table, create) in self.declared_tables(missing_tables) {
            let Some(live) = self.live_table(&table.name) else {
                continue;
            };
            let already_missing = missing_columns.get(&table.name);
            for column in &create.columns {
                if already_missing.is_some_and(|sqls| sqls.contains(&column.sql)) {
                    continue;
                }
                let Some(actual) = live.column(&column.name) else {
                    continue;
                };
                if !column_matches(actual, column, create) {
                    debug!(
                        table = %table.name,
                        column = %column.name,
                        "Column definition differs"
                    );
                    modified.entry(&table.name).push(column.sql.clone());
                }
            }
        }
        Ok(modified)
    }

    pub fn create_missing_columns(
        &mut self,
        columns: &PerTable<Vec<String>>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, fragments) in columns.iter() {
            for fragment in fragments {
                let statement = format!("ALTER TABLE {} ADD COLUMN {}", quote_ident(table), fragment);
                sql.push_str(&self.query(&statement, logsql)?);
            }
        }
        Ok(sql)
    }

    pub fn update_modified_columns(
        &mut self,
        columns: &PerTable<Vec<String>>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, fragments) in columns.iter() {
            for fragment in fragments {
                let statement = format!(
                    "ALTER TABLE {} MODIFY COLUMN {}",
                    quote_ident(table),
                    modify_column_fragment(fragment)
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
        }
        Ok(sql)
    }

    /// Deprecated columns that still exist live (table -> column names).
    pub fn get_deprecated_columns(
        &mut self,
        missing_tables: &[String],
    ) -> Result<PerTable<Vec<String>>> {
        self.reload_table_info()?;
        let mut deprecated: PerTable<Vec<String>> = PerTable::new();
        for (table, columns) in &self.options.deprecated_columns {
            if is_listed(missing_tables, table) {
                continue;
            }
            let Some(live) = self.live_table(table) else {
                continue;
            };
            for column in columns {
                if let Some(actual) = live.column(column) {
                    deprecated.entry(&live.name).push(actual.name.clone());
                }
            }
        }
        Ok(deprecated)
    }

    pub fn remove_deprecated_columns(
        &mut self,
        columns: &PerTable<Vec<String>>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, names) in columns.iter() {
            for name in names {
                let statement = format!(
                    "ALTER TABLE {} DROP COLUMN {}",
                    quote_ident(table),
                    quote_ident(name)
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
        }
        Ok(sql)
    }
}

fn column_matches(actual: &ColumnMetadata, declared: &ColumnDef, create: &CreateTable) -> bool {
    type_matches(actual, declared) && default_matches(actual, declared) && {
        let in_primary = create
            .primary_key
            .as_ref()
            .is_some_and(|pk| pk.fields.iter().any(|f| f.eq_ignore_ascii_case(&declared.name)));
        actual.nullable == (declared.nullable && !in_primary)
    }
}

/// Compare a live column type against the declared type token.
pub(crate) fn type_matches(actual: &ColumnMetadata, declared: &ColumnDef) -> bool {
    let live_base = actual.data_type.to_ascii_lowercase();
    let expected = declared.data_type.to_ascii_lowercase();
    let expected_base = base_type(&expected);

    if live_base == "longtext" && expected_base == "json" {
        return true;
    }
    if INTEGER_TYPES.contains(&expected_base) || BASE_ONLY_TYPES.contains(&expected_base) {
        return live_base == expected_base
            || (expected_base == "integer" && live_base == "int");
    }

    let mut live_type = live_base.clone();
    if !UNSIZED_TYPES.contains(&live_base.as_str()) {
        if let Some(len) = actual.char_max_len {
            live_type = format!("{}({})", live_type, len);
        }
    }
    let expected = match expected_base {
        "char" | "binary" if !expected.contains('(') => format!("{}(1)", expected_base),
        _ => expected.clone(),
    };
    live_type == expected
}

fn default_matches(actual: &ColumnMetadata, declared: &ColumnDef) -> bool {
    let live = actual.default.as_deref().and_then(normalize_default);
    live == declared.default
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ddl::parse_create_table;

    fn declared(sql: &str) -> ColumnDef {
        let create = parse_create_table(&format!("CREATE TABLE t ({})", sql)).unwrap();
        create.columns[0].clone()
    }

    fn live(data_type: &str, len: Option<u64>) -> ColumnMetadata {
        ColumnMetadata {
            name: "c".to_string(),
            data_type: data_type.to_string(),
            char_max_len: len,
            default: None,
            nullable: true,
        }
    }

    #[test]
    fn integer_display_width_is_ignored() {
        assert!(type_matches(&live("int", None), &declared("`c` int(10)")));
        assert!(type_matches(&live("bigint", None), &declared("`c` bigint(20) unsigned")));
        assert!(!type_matches(&live("bigint", None), &declared("`c` int(11)")));
    }

    #[test]
    fn character_length_is_significant() {
        assert!(type_matches(&live("varchar", Some(255)), &declared("`c` varchar(255)")));
        assert!(!type_matches(&live("varchar", Some(255)), &declared("`c` varchar(100)")));
        assert!(type_matches(&live("char", Some(1)), &declared("`c` char")));
    }

    #[test]
    fn unsized_types_and_json() {
        assert!(type_matches(&live("text", Some(65_535)), &declared("`c` text")));
        assert!(type_matches(&live("mediumtext", Some(16_777_215)), &declared("`c` mediumtext")));
        assert!(type_matches(&live("longtext", Some(4_294_967_295)), &declared("`c` json")));
        assert!(!type_matches(&live("text", Some(65_535)), &declared("`c` mediumtext")));
    }

    #[test]
    fn parenthetical_non_lengths_compare_base() {
        assert!(type_matches(&live("enum", Some(3)), &declared("`c` enum('a','bc')")));
        assert!(type_matches(&live("decimal", None), &declared("`c` decimal(10,2)")));
        assert!(type_matches(&live("datetime", None), &declared("`c` datetime")));
    }

    #[test]
    fn defaults_are_normalised_on_both_sides() {
        let column = declared("`c` varchar(10) DEFAULT 'x'");
        let mut actual = live("varchar", Some(10));
        actual.default = Some("'x'".to_string());
        assert!(default_matches(&actual, &column));
        actual.default = Some("x".to_string());
        assert!(default_matches(&actual, &column));
        actual.default = Some("y".to_string());
        assert!(!default_matches(&actual, &column));

        let column = declared("`c` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP");
        actual.default = Some("current_timestamp()".to_string());
        assert!(default_matches(&actual, &column));

        let column = declared("`c` int(11) DEFAULT NULL");
        actual.default = Some("NULL".to_string());
        assert!(default_matches(&actual, &column));
        actual.default = None;
        assert!(default_matches(&actual, &column));
    }

    #[test]
    fn modify_keeps_existing_primary_key() {
        let mut modified = PerTable::new();
        modified.insert("thetable", vec!["id bigint primary key".to_string()]);
        let sql = DbUpgrade::new()
            .update_modified_columns(&modified, true)
            .unwrap();
        assert_eq!(sql, "ALTER TABLE `thetable` MODIFY COLUMN id bigint NOT NULL;\n");
    }

    #[test]
    fn empty_string_default_matches_live_empty_value() {
        let column = declared("`c` varchar(255) NOT NULL DEFAULT ''");
        let mut actual = live("varchar", Some(255));
        actual.default = Some(String::new());
        assert!(default_matches(&actual, &column));
        actual.default = Some("''".to_string());
        assert!(default_matches(&actual, &column));
        actual.default = None;
        assert!(!default_matches(&actual, &column));
    }
}
