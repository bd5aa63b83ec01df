//! In-memory catalog.
//!
//! Applies the DDL subset the upgrader emits (`CREATE TABLE`, column and
//! constraint `ALTER`s, `CONVERT TO CHARACTER SET`) and answers the same
//! metadata questions a server would. Used by tests and dry runs.

use crate::backend::{hash_sql, sql_op_name, BackendError};
use crate::catalog::{
    ColumnMetadata, ConstraintKind, ConstraintMetadata, FullColumn, MetadataSource, SqlExecutor,
    TableMetadata, TableStatus,
};
use crate::ddl::{
    base_type, parse_create_item, parse_create_table, statement_table, ColumnDef, CreateItem,
    ForeignKeyDef, ReferentialAction,
};
use crate::lexer::{
    first_keyword, first_paren_group, next_token, quote_ident, split_statements,
    split_top_level, tokens_upper, unquote_ident,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;
use tracing::debug_span;

static TABLE_CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:CHARSET|CHARACTER\s+SET)\s*=?\s*(\w+)").expect("valid charset regex")
});
static TABLE_COLLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)COLLATE\s*=?\s*(\w+)").expect("valid collate regex"));
static COLUMN_ENCODING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:CHARACTER\s+SET|CHARSET|COLLATE)\s+\w+").expect("valid encoding regex")
});

#[derive(Debug, Clone)]
struct MemColumn {
    def: ColumnDef,
    collation: Option<String>,
}

#[derive(Debug, Clone)]
struct MemIndex {
    name: String,
    unique: bool,
    definition: String,
    fields: Vec<String>,
}

#[derive(Debug, Clone)]
struct MemTable {
    name: String,
    columns: Vec<MemColumn>,
    primary: Option<Vec<String>>,
    indexes: Vec<MemIndex>,
    foreign_keys: Vec<ForeignKeyDef>,
    extra_constraints: Vec<ConstraintMetadata>,
    charset: String,
    collation: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    tables: Vec<MemTable>,
    executed: Vec<String>,
}

/// Thread-safe in-memory stand-in for a MySQL schema.
#[derive(Debug, Default)]
pub struct MemoryDatabase {
    state: Mutex<MemoryState>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a database by applying a SQL script.
    pub fn from_sql(sql: &str) -> Result<Self, BackendError> {
        let db = Self::new();
        db.apply(sql)?;
        Ok(db)
    }

    /// Apply a SQL script without recording it in [`Self::executed`].
    pub fn apply(&self, sql: &str) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        for statement in split_statements(sql) {
            apply_statement(&mut state.tables, &statement)?;
        }
        Ok(())
    }

    /// Statements received through [`SqlExecutor::execute`], in order.
    pub fn executed(&self) -> Vec<String> {
        self.lock().map(|s| s.executed.clone()).unwrap_or_default()
    }

    /// Attach a constraint the DDL subset cannot express (e.g. an unusual kind).
    pub fn add_raw_constraint(
        &self,
        table: &str,
        constraint: ConstraintMetadata,
    ) -> Result<(), BackendError> {
        let mut state = self.lock()?;
        let table = find_table_mut(&mut state.tables, table)?;
        table.extra_constraints.push(constraint);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, BackendError> {
        self.state
            .lock()
            .map_err(|_| BackendError::Database("memory database lock poisoned".to_string()))
    }
}

impl MetadataSource for MemoryDatabase {
    fn list_tables(&self) -> Result<Vec<String>, BackendError> {
        Ok(self.lock()?.tables.iter().map(|t| t.name.clone()).collect())
    }

    fn describe_table(&self, table: &str) -> Result<TableMetadata, BackendError> {
        let state = self.lock()?;
        let Some(table) = find_table(&state.tables, table) else {
            return Ok(TableMetadata {
                name: table.to_string(),
                ..TableMetadata::default()
            });
        };

        let columns = table
            .columns
            .iter()
            .map(|c| ColumnMetadata {
                name: c.def.name.clone(),
                data_type: base_type(&c.def.data_type).to_string(),
                char_max_len: char_max_len(&c.def.data_type),
                default: c.def.default.clone(),
                nullable: c.def.nullable,
            })
            .collect();

        let mut constraints = Vec::new();
        if let Some(fields) = &table.primary {
            constraints.push(ConstraintMetadata {
                kind: ConstraintKind::PrimaryKey,
                name: "PRIMARY".to_string(),
                fields: fields.clone(),
                delete_rule: None,
                update_rule: None,
            });
        }
        for index in table.indexes.iter().filter(|i| i.unique) {
            constraints.push(ConstraintMetadata {
                kind: ConstraintKind::Unique,
                name: index.name.clone(),
                fields: index.fields.clone(),
                delete_rule: None,
                update_rule: None,
            });
        }
        for fk in &table.foreign_keys {
            constraints.push(ConstraintMetadata {
                kind: ConstraintKind::ForeignKey,
                name: fk.name.clone(),
                fields: fk.fields.clone(),
                delete_rule: Some(fk.on_delete.to_string()),
                update_rule: Some(fk.on_update.to_string()),
            });
        }
        constraints.extend(table.extra_constraints.iter().cloned());

        Ok(TableMetadata {
            name: table.name.clone(),
            columns,
            constraints,
        })
    }

    fn table_status(&self) -> Result<Vec<TableStatus>, BackendError> {
        Ok(self
            .lock()?
            .tables
            .iter()
            .map(|t| TableStatus {
                name: t.name.clone(),
                collation: Some(t.collation.clone()),
            })
            .collect())
    }

    fn show_full_columns(&self, table: &str) -> Result<Vec<FullColumn>, BackendError> {
        let state = self.lock()?;
        let table = find_table(&state.tables, table)
            .ok_or_else(|| BackendError::Query(format!("Table '{}' doesn't exist", table)))?;
        Ok(table
            .columns
            .iter()
            .map(|c| FullColumn {
                field: c.def.name.clone(),
                column_type: c.def.data_type.clone(),
                collation: c.collation.clone(),
                nullable: c.def.nullable,
                default: c.def.default.clone(),
            })
            .collect())
    }

    fn show_create_table(&self, table: &str) -> Result<Option<String>, BackendError> {
        let state = self.lock()?;
        Ok(find_table(&state.tables, table).map(render_create_table))
    }
}

impl SqlExecutor for MemoryDatabase {
    fn execute(&self, sql: &str) -> Result<(), BackendError> {
        let span = debug_span!(
            "db.exec",
            op = sql_op_name(sql),
            sql_hash = %hash_sql(sql),
            duration_ms = tracing::field::Empty
        );
        let _guard = span.enter();
        let start = Instant::now();

        let mut state = self.lock()?;
        for statement in split_statements(sql) {
            apply_statement(&mut state.tables, &statement)?;
            state.executed.push(statement);
        }
        span.record("duration_ms", start.elapsed().as_millis() as u64);
        Ok(())
    }
}

fn find_table<'a>(tables: &'a [MemTable], name: &str) -> Option<&'a MemTable> {
    tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

fn find_table_mut<'a>(
    tables: &'a mut [MemTable],
    name: &str,
) -> Result<&'a mut MemTable, BackendError> {
    tables
        .iter_mut()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .ok_or_else(|| BackendError::Query(format!("Table '{}' doesn't exist", name)))
}

fn apply_statement(tables: &mut Vec<MemTable>, statement: &str) -> Result<(), BackendError> {
    match first_keyword(statement).as_deref() {
        Some("CREATE") => create_table(tables, statement),
        Some("ALTER") => alter_table(tables, statement),
        Some("DROP") => drop_table(tables, statement),
        Some("SET") => Ok(()),
        _ => Err(unsupported(statement)),
    }
}

fn create_table(tables: &mut Vec<MemTable>, statement: &str) -> Result<(), BackendError> {
    let (name, is_create) = statement_table(statement).ok_or_else(|| unsupported(statement))?;
    let create = parse_create_table(statement).ok_or_else(|| unsupported(statement))?;
    if !is_create {
        return Err(unsupported(statement));
    }
    if find_table(tables, &name).is_some() {
        if tokens_upper(statement).iter().any(|t| t == "EXISTS") {
            return Ok(());
        }
        return Err(BackendError::Query(format!("Table '{}' already exists", name)));
    }

    let options = statement.rsplit(')').next().unwrap_or("");
    let charset = TABLE_CHARSET_RE
        .captures(options)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "utf8mb4".to_string());
    let collation = TABLE_COLLATE_RE
        .captures(options)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| default_collation(&charset));

    let mut table = MemTable {
        name,
        columns: Vec::new(),
        primary: create.primary_key.map(|k| k.fields),
        indexes: Vec::new(),
        foreign_keys: create.foreign_keys,
        extra_constraints: Vec::new(),
        charset,
        collation,
    };
    for def in create.columns {
        let column = mem_column(def, &table.collation);
        table.columns.push(column);
    }
    for key in create.keys {
        let fields = create
            .unique_keys
            .iter()
            .find(|u| u.name.as_deref() == Some(key.name.as_str()))
            .map(|u| u.fields.clone())
            .unwrap_or_else(|| split_fields(&key.definition));
        table.indexes.push(MemIndex {
            name: key.name,
            unique: key.unique,
            definition: key.definition,
            fields,
        });
    }
    enforce_primary_not_null(&mut table);
    tables.push(table);
    Ok(())
}

fn drop_table(tables: &mut Vec<MemTable>, statement: &str) -> Result<(), BackendError> {
    let tokens = tokens_upper(statement);
    if tokens.get(1).map(String::as_str) != Some("TABLE") {
        return Err(unsupported(statement));
    }
    let (_, rest) = skip_tokens(statement, 2).ok_or_else(|| unsupported(statement))?;
    let rest = if tokens.get(2).map(String::as_str) == Some("IF") {
        skip_tokens(rest, 2).map(|(_, r)| r).unwrap_or("")
    } else {
        rest
    };
    let name = next_token(rest)
        .map(|(t, _)| unquote_ident(t))
        .ok_or_else(|| unsupported(statement))?;
    tables.retain(|t| !t.name.eq_ignore_ascii_case(&name));
    Ok(())
}

fn alter_table(tables: &mut [MemTable], statement: &str) -> Result<(), BackendError> {
    let (name, is_create) = statement_table(statement).ok_or_else(|| unsupported(statement))?;
    if is_create {
        return Err(unsupported(statement));
    }
    // Actions follow `ALTER TABLE <name>`.
    let (_, actions) = skip_tokens(statement, 3).ok_or_else(|| unsupported(statement))?;
    let table = find_table_mut(tables, &name)?;

    for action in split_top_level(actions, ',', true) {
        let action = action.trim();
        if action.is_empty() {
            continue;
        }
        alter_action(table, action)?;
    }
    enforce_primary_not_null(table);
    Ok(())
}

fn alter_action(table: &mut MemTable, action: &str) -> Result<(), BackendError> {
    let tokens = tokens_upper(action);
    let first = tokens.first().map(String::as_str).unwrap_or("");
    let second = tokens.get(1).map(String::as_str).unwrap_or("");

    match (first, second) {
        ("ADD", "COLUMN") => {
            let (_, operand) = skip_tokens(action, 2).ok_or_else(|| unsupported(action))?;
            add_item(table, operand)
        }
        ("ADD", _) => {
            let (_, operand) = skip_tokens(action, 1).ok_or_else(|| unsupported(action))?;
            add_item(table, operand)
        }
        ("MODIFY", _) => {
            let skip = if second == "COLUMN" { 2 } else { 1 };
            let (_, operand) = skip_tokens(action, skip).ok_or_else(|| unsupported(action))?;
            let CreateItem::Column(def) = parse_create_item(operand) else {
                return Err(unsupported(action));
            };
            let collation = table.collation.clone();
            let column = table
                .columns
                .iter_mut()
                .find(|c| c.def.name.eq_ignore_ascii_case(&def.name))
                .ok_or_else(|| {
                    BackendError::Query(format!("Unknown column '{}'", def.name))
                })?;
            *column = mem_column(def, &collation);
            Ok(())
        }
        ("DROP", "FOREIGN") => {
            let name = nth_ident(action, 3).ok_or_else(|| unsupported(action))?;
            let before = table.foreign_keys.len();
            table.foreign_keys.retain(|fk| fk.name != name);
            if table.foreign_keys.len() == before {
                return Err(BackendError::Query(format!(
                    "Can't DROP FOREIGN KEY '{}'; check that it exists",
                    name
                )));
            }
            Ok(())
        }
        ("DROP", "PRIMARY") => {
            table.primary = None;
            Ok(())
        }
        ("DROP", "KEY") | ("DROP", "INDEX") => {
            let name = nth_ident(action, 2).ok_or_else(|| unsupported(action))?;
            let before = table.indexes.len();
            table.indexes.retain(|i| i.name != name);
            if table.indexes.len() == before {
                return Err(BackendError::Query(format!(
                    "Can't DROP '{}'; check that column/key exists",
                    name
                )));
            }
            Ok(())
        }
        ("DROP", _) => {
            let index = if second == "COLUMN" { 2 } else { 1 };
            let name = nth_ident(action, index).ok_or_else(|| unsupported(action))?;
            let before = table.columns.len();
            table
                .columns
                .retain(|c| !c.def.name.eq_ignore_ascii_case(&name));
            if table.columns.len() == before {
                return Err(BackendError::Query(format!(
                    "Can't DROP '{}'; check that column/key exists",
                    name
                )));
            }
            Ok(())
        }
        ("CONVERT", "TO") => {
            set_table_encoding(table, action);
            let collation = table.collation.clone();
            for column in &mut table.columns {
                if is_textual(base_type(&column.def.data_type)) {
                    column.def.sql = COLUMN_ENCODING_RE
                        .replace_all(&column.def.sql, "")
                        .into_owned();
                    column.def.collation = None;
                    column.collation = Some(collation.clone());
                }
            }
            Ok(())
        }
        ("DEFAULT", _) | ("CHARACTER", "SET") | ("CHARSET", _) | ("COLLATE", _) => {
            set_table_encoding(table, action);
            Ok(())
        }
        ("ENGINE", _) => Ok(()),
        _ => Err(unsupported(action)),
    }
}

fn add_item(table: &mut MemTable, operand: &str) -> Result<(), BackendError> {
    match parse_create_item(operand) {
        CreateItem::Column(def) => {
            if table
                .columns
                .iter()
                .any(|c| c.def.name.eq_ignore_ascii_case(&def.name))
            {
                return Err(BackendError::Query(format!(
                    "Duplicate column name '{}'",
                    def.name
                )));
            }
            let column = mem_column(def, &table.collation);
            table.columns.push(column);
        }
        CreateItem::Primary(key) => {
            if table.primary.is_some() {
                return Err(BackendError::Query("Multiple primary key defined".to_string()));
            }
            table.primary = Some(key.fields);
        }
        CreateItem::Unique(key, index) => {
            let name = key
                .name
                .clone()
                .or_else(|| key.fields.first().cloned())
                .unwrap_or_default();
            let definition = index.map(|i| i.definition).unwrap_or_else(|| {
                key.fields
                    .iter()
                    .map(|f| quote_ident(f))
                    .collect::<Vec<_>>()
                    .join(",")
            });
            add_index(table, name, true, definition, key.fields)?;
        }
        CreateItem::Key(index) => {
            let fields = split_fields(&index.definition);
            add_index(table, index.name, false, index.definition, fields)?;
        }
        CreateItem::Foreign(fk) => {
            if table.foreign_keys.iter().any(|f| f.name == fk.name) {
                return Err(BackendError::Query(format!(
                    "Duplicate foreign key constraint name '{}'",
                    fk.name
                )));
            }
            table.foreign_keys.push(fk);
        }
        CreateItem::Ignored => return Err(unsupported(operand)),
    }
    Ok(())
}

fn add_index(
    table: &mut MemTable,
    name: String,
    unique: bool,
    definition: String,
    fields: Vec<String>,
) -> Result<(), BackendError> {
    if table.indexes.iter().any(|i| i.name == name) {
        return Err(BackendError::Query(format!("Duplicate key name '{}'", name)));
    }
    table.indexes.push(MemIndex {
        name,
        unique,
        definition,
        fields,
    });
    Ok(())
}

fn set_table_encoding(table: &mut MemTable, clause: &str) {
    if let Some(charset) = TABLE_CHARSET_RE.captures(clause).and_then(|c| c.get(1)) {
        table.charset = charset.as_str().to_ascii_lowercase();
        table.collation = default_collation(&table.charset);
    }
    if let Some(collation) = TABLE_COLLATE_RE.captures(clause).and_then(|c| c.get(1)) {
        table.collation = collation.as_str().to_ascii_lowercase();
    }
}

fn mem_column(def: ColumnDef, table_collation: &str) -> MemColumn {
    let collation = if is_textual(base_type(&def.data_type)) {
        Some(
            def.collation
                .clone()
                .unwrap_or_else(|| table_collation.to_string()),
        )
    } else {
        None
    };
    MemColumn { def, collation }
}

fn enforce_primary_not_null(table: &mut MemTable) {
    let Some(primary) = &table.primary else {
        return;
    };
    for column in &mut table.columns {
        if primary.iter().any(|f| f.eq_ignore_ascii_case(&column.def.name)) {
            column.def.nullable = false;
        }
    }
}

fn render_create_table(table: &MemTable) -> String {
    let mut lines: Vec<String> = table
        .columns
        .iter()
        .map(|c| format!("  {}", c.def.sql))
        .collect();
    if let Some(primary) = &table.primary {
        lines.push(format!("  PRIMARY KEY ({})", quote_list(primary)));
    }
    for index in table.indexes.iter().filter(|i| i.unique) {
        lines.push(format!(
            "  UNIQUE KEY {} ({})",
            quote_ident(&index.name),
            index.definition
        ));
    }
    for index in table.indexes.iter().filter(|i| !i.unique) {
        lines.push(format!(
            "  KEY {} ({})",
            quote_ident(&index.name),
            index.definition
        ));
    }
    for fk in &table.foreign_keys {
        let mut line = format!(
            "  CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&fk.name),
            quote_list(&fk.fields),
            quote_ident(&fk.references_table),
            quote_list(&fk.references_fields)
        );
        if fk.on_delete != ReferentialAction::Restrict {
            line.push_str(&format!(" ON DELETE {}", fk.on_delete));
        }
        if fk.on_update != ReferentialAction::Restrict {
            line.push_str(&format!(" ON UPDATE {}", fk.on_update));
        }
        lines.push(line);
    }
    format!(
        "CREATE TABLE {} (\n{}\n) ENGINE=InnoDB DEFAULT CHARSET={} COLLATE={}",
        quote_ident(&table.name),
        lines.join(",\n"),
        table.charset,
        table.collation
    )
}

fn quote_list(fields: &[String]) -> String {
    fields
        .iter()
        .map(|f| quote_ident(f))
        .collect::<Vec<_>>()
        .join(",")
}

fn split_fields(definition: &str) -> Vec<String> {
    split_top_level(definition, ',', true)
        .into_iter()
        .map(|f| {
            let f = f.trim();
            let f = f.split('(').next().unwrap_or(f);
            unquote_ident(f)
        })
        .filter(|f| !f.is_empty())
        .collect()
}

fn skip_tokens(text: &str, count: usize) -> Option<(&str, &str)> {
    let mut last = "";
    let mut rest = text;
    for _ in 0..count {
        let (token, tail) = next_token(rest)?;
        last = token;
        rest = tail;
    }
    Some((last, rest.trim_start()))
}

fn nth_ident(text: &str, index: usize) -> Option<String> {
    let (_, rest) = skip_tokens(text, index)?;
    next_token(rest).map(|(t, _)| unquote_ident(t))
}

fn is_textual(base: &str) -> bool {
    matches!(
        base,
        "char" | "varchar" | "tinytext" | "text" | "mediumtext" | "longtext" | "enum" | "set"
    )
}

fn char_max_len(data_type: &str) -> Option<u64> {
    let base = base_type(data_type);
    match base {
        "char" | "varchar" | "binary" | "varbinary" => Some(
            first_paren_group(data_type)
                .and_then(|n| n.trim().parse().ok())
                .unwrap_or(1),
        ),
        "tinytext" | "tinyblob" => Some(255),
        "text" | "blob" => Some(65_535),
        "mediumtext" | "mediumblob" => Some(16_777_215),
        "longtext" | "longblob" => Some(4_294_967_295),
        _ => None,
    }
}

fn default_collation(charset: &str) -> String {
    match charset {
        "latin1" => "latin1_swedish_ci".to_string(),
        other => format!("{}_general_ci", other),
    }
}

fn unsupported(statement: &str) -> BackendError {
    BackendError::Query(format!(
        "Unsupported statement in memory database: {}",
        statement
    ))
}
