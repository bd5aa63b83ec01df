//! Secondary keys (`KEY` / `UNIQUE KEY`).

use super::constraints::constraint_is_missing;
use super::DbUpgrade;
use crate::ddl::{normalize_key_definition, parse_create_table, IndexDef};
use crate::error::Result;
use crate::lexer::quote_ident;
use crate::types::{KeyChanges, PerTable};
use tracing::debug;

impl DbUpgrade {
    /// Declared keys that are absent live, or whose uniqueness or column list
    /// differs from the live `SHOW CREATE TABLE`.
    ///
    /// Keys already reported in `missing_constraints` are skipped. Extra live
    /// keys are left alone.
    pub fn get_modified_keys(
        &mut self,
        missing_tables: &[String],
        missing_constraints: &PerTable<Vec<String>>,
    ) -> Result<PerTable<KeyChanges>> {
        let adapter = self.adapter()?;
        let mut modified: PerTable<KeyChanges> = PerTable::new();
        for (table, create) in self.declared_tables(missing_tables) {
            if create.keys.is_empty() {
                continue;
            }
            let Some(live_sql) = adapter.show_create_table(&table.name)? else {
                continue;
            };
            let live_keys = parse_create_table(&live_sql)
                .map(|live| live.keys)
                .unwrap_or_default();

            for key in &create.keys {
                match live_keys.iter().find(|k| k.name.eq_ignore_ascii_case(&key.name)) {
                    None => {
                        if constraint_is_missing(missing_constraints, &table.name, &key.name) {
                            continue;
                        }
                        debug!(table = %table.name, key = %key.name, "Key is missing");
                        modified.entry(&table.name).add.push(key.clone());
                    }
                    Some(live) if !same_key(live, key) => {
                        debug!(
                            table = %table.name,
                            key = %key.name,
                            live = %live.definition,
                            declared = %key.definition,
                            "Key definition differs"
                        );
                        let changes = modified.entry(&table.name);
                        changes.drop.push(live.name.clone());
                        changes.add.push(key.clone());
                    }
                    Some(_) => {}
                }
            }
        }
        Ok(modified)
    }

    /// Drop the changed keys, then add every declared key that needs it.
    pub fn update_modified_keys(
        &mut self,
        keys: &PerTable<KeyChanges>,
        logsql: bool,
    ) -> Result<String> {
        let mut sql = String::new();
        for (table, changes) in keys.iter() {
            for name in &changes.drop {
                let statement = format!(
                    "ALTER TABLE {} DROP KEY {}",
                    quote_ident(table),
                    quote_ident(name)
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
            for key in &changes.add {
                let statement = format!(
                    "ALTER TABLE {} ADD {}KEY {} ({})",
                    quote_ident(table),
                    if key.unique { "UNIQUE " } else { "" },
                    quote_ident(&key.name),
                    key.definition
                );
                sql.push_str(&self.query(&statement, logsql)?);
            }
        }
        Ok(sql)
    }
}

fn same_key(live: &IndexDef, declared: &IndexDef) -> bool {
    live.unique == declared.unique
        && normalize_key_definition(&live.definition)
            .eq_ignore_ascii_case(&normalize_key_definition(&declared.definition))
}
