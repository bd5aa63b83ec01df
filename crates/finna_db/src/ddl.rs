//! Declarative schema parser.
//!
//! The schema file is parsed once into a structured representation: every
//! table keeps its raw statements (the `CREATE TABLE` first, then any
//! `ALTER TABLE`s) plus the structured body of its `CREATE TABLE`.
//! Fragments that cannot be understood are skipped, never rejected.

use crate::lexer::{
    contains_keywords, first_paren_group, matching_paren, next_token, split_statements,
    split_top_level, strip_trailing_semicolon, tokens_upper, unquote_ident, unquote_literal,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

static TABLE_STATEMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\b(create\s+table|alter\s+table)\s+(?:if\s+not\s+exists\s+)?([^\s(]+)")
        .expect("valid table statement regex")
});
static CHARSET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:CHARSET|CHARACTER\s+SET)[\s=]+(utf8(?:mb4)?)\b")
        .expect("valid charset regex")
});
static COLLATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)COLLATE[\s=]+(\w+)").expect("valid collate regex"));
static KEY_DEFINITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s+`").expect("valid key definition regex"));
static ON_DELETE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ON\s+DELETE\s+(RESTRICT|CASCADE|SET\s+NULL|NO\s+ACTION|SET\s+DEFAULT)")
        .expect("valid on delete regex")
});
static ON_UPDATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)ON\s+UPDATE\s+(RESTRICT|CASCADE|SET\s+NULL|NO\s+ACTION|SET\s+DEFAULT)")
        .expect("valid on update regex")
});
static REFERENCES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)REFERENCES\s+([^\s(]+)\s*\(([^)]*)\)").expect("valid references regex")
});

/// Foreign key `ON DELETE` / `ON UPDATE` rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    #[default]
    Restrict,
    Cascade,
    SetNull,
    NoAction,
    SetDefault,
}

impl ReferentialAction {
    /// Parse a rule as written in DDL or reported by `information_schema`.
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
        match normalized.to_ascii_uppercase().as_str() {
            "RESTRICT" => Some(Self::Restrict),
            "CASCADE" => Some(Self::Cascade),
            "SET NULL" => Some(Self::SetNull),
            "NO ACTION" => Some(Self::NoAction),
            "SET DEFAULT" => Some(Self::SetDefault),
            _ => None,
        }
    }

    /// `NO ACTION` behaves like `RESTRICT` in InnoDB.
    pub fn normalized(self) -> Self {
        match self {
            Self::NoAction => Self::Restrict,
            other => other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restrict => "RESTRICT",
            Self::Cascade => "CASCADE",
            Self::SetNull => "SET NULL",
            Self::NoAction => "NO ACTION",
            Self::SetDefault => "SET DEFAULT",
        }
    }
}

impl fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDef {
    pub name: String,
    /// Declared type token, lower-cased (`int(11)`, `varchar(255)`, `json`).
    pub data_type: String,
    /// Default with quotes removed; `NULL` and absent defaults are `None`.
    pub default: Option<String>,
    pub nullable: bool,
    pub auto_increment: bool,
    /// Explicit column collation, if declared.
    pub collation: Option<String>,
    /// Full DDL fragment, reusable in `ADD COLUMN` / `MODIFY COLUMN`.
    pub sql: String,
}

impl ColumnDef {
    /// Base type name without any parenthetical (`varchar`, `int`).
    pub fn base_type(&self) -> &str {
        base_type(&self.data_type)
    }
}

/// `PRIMARY KEY` or `UNIQUE KEY` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyConstraint {
    pub name: Option<String>,
    pub fields: Vec<String>,
    pub sql: String,
}

/// `CONSTRAINT ... FOREIGN KEY` clause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForeignKeyDef {
    pub name: String,
    pub fields: Vec<String>,
    pub references_table: String,
    pub references_fields: Vec<String>,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
    pub sql: String,
}

/// Secondary index (`KEY` / `UNIQUE KEY`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexDef {
    pub name: String,
    pub unique: bool,
    /// Column list with `,\s+\`` collapsed to `,\``.
    pub definition: String,
}

/// One item of a `CREATE TABLE` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateItem {
    Column(ColumnDef),
    Primary(KeyConstraint),
    Unique(KeyConstraint, Option<IndexDef>),
    Foreign(ForeignKeyDef),
    Key(IndexDef),
    Ignored,
}

/// Structured body of a `CREATE TABLE` statement.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CreateTable {
    pub columns: Vec<ColumnDef>,
    pub primary_key: Option<KeyConstraint>,
    pub unique_keys: Vec<KeyConstraint>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub keys: Vec<IndexDef>,
    pub charset: Option<String>,
    pub collation: Option<String>,
}

impl CreateTable {
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// Statements and structure declared for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDefinition {
    pub name: String,
    pub statements: Vec<String>,
    pub create: Option<CreateTable>,
}

/// Parsed declarative schema, tables in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeclaredSchema {
    tables: Vec<TableDefinition>,
}

impl DeclaredSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the statements of a SQL script.
    pub fn load(&mut self, sql: &str) {
        for statement in split_statements(sql) {
            let Some((table, is_create)) = statement_table(&statement) else {
                continue;
            };
            let index = match self
                .tables
                .iter()
                .position(|t| t.name == table)
            {
                Some(index) => index,
                None => {
                    self.tables.push(TableDefinition {
                        name: table,
                        statements: Vec::new(),
                        create: None,
                    });
                    self.tables.len() - 1
                }
            };
            let entry = &mut self.tables[index];
            if is_create && entry.create.is_none() {
                entry.create = parse_create_table(&statement);
            }
            entry.statements.push(statement);
        }
    }

    pub fn tables(&self) -> &[TableDefinition] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableDefinition> {
        self.tables
            .iter()
            .find(|t| t.name == name)
            .or_else(|| self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name)))
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|t| t.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Parse a SQL script into a [`DeclaredSchema`].
pub fn parse_schema(sql: &str) -> DeclaredSchema {
    let mut schema = DeclaredSchema::new();
    schema.load(sql);
    schema
}

/// Table named by a `CREATE TABLE` / `ALTER TABLE` statement, and whether it
/// is a create.
pub fn statement_table(statement: &str) -> Option<(String, bool)> {
    let caps = TABLE_STATEMENT_RE.captures(statement)?;
    let verb = caps.get(1)?.as_str();
    let name = unquote_ident(caps.get(2)?.as_str());
    if name.is_empty() {
        return None;
    }
    Some((name, verb.to_ascii_lowercase().starts_with("create")))
}

/// Parse a full `CREATE TABLE` statement.
pub fn parse_create_table(statement: &str) -> Option<CreateTable> {
    let caps = TABLE_STATEMENT_RE.captures(statement)?;
    let after_name = caps.get(0)?.end();
    let open = after_name + statement[after_name..].find('(')?;
    let close = matching_paren(statement, open)?;
    let body = &statement[open + 1..close];
    let options = strip_trailing_semicolon(&statement[close + 1..]);

    let mut table = CreateTable {
        charset: CHARSET_RE
            .captures(options)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        collation: COLLATE_RE
            .captures(options)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        ..CreateTable::default()
    };

    for item in split_top_level(body, ',', true) {
        match parse_create_item(item) {
            CreateItem::Column(column) => {
                if table.primary_key.is_none() && contains_keywords(&column.sql, &["PRIMARY", "KEY"])
                {
                    table.primary_key = Some(KeyConstraint {
                        name: None,
                        fields: vec![column.name.clone()],
                        sql: format!("PRIMARY KEY ({})", crate::lexer::quote_ident(&column.name)),
                    });
                }
                table.columns.push(column);
            }
            CreateItem::Primary(key) => table.primary_key = Some(key),
            CreateItem::Unique(key, index) => {
                table.unique_keys.push(key);
                if let Some(index) = index {
                    table.keys.push(index);
                }
            }
            CreateItem::Foreign(fk) => table.foreign_keys.push(fk),
            CreateItem::Key(index) => table.keys.push(index),
            CreateItem::Ignored => {}
        }
    }

    Some(table)
}

/// Classify and parse a single `CREATE TABLE` body item (or the operand of
/// `ALTER TABLE ... ADD`).
pub fn parse_create_item(item: &str) -> CreateItem {
    let sql = clean_fragment(item);
    if sql.is_empty() {
        return CreateItem::Ignored;
    }
    let tokens = tokens_upper(&sql);
    let first = tokens.first().map(String::as_str).unwrap_or("");
    let starts_quoted = sql.starts_with('`') || sql.starts_with('"');

    if starts_quoted {
        return parse_column(&sql).map_or(CreateItem::Ignored, CreateItem::Column);
    }

    match first {
        "PRIMARY" => CreateItem::Primary(KeyConstraint {
            name: None,
            fields: explode_fields(&sql),
            sql,
        }),
        "UNIQUE" => parse_unique(sql),
        "KEY" | "INDEX" => parse_index(&sql, false).map_or(CreateItem::Ignored, CreateItem::Key),
        "CONSTRAINT" => parse_named_constraint(sql),
        "FOREIGN" | "CHECK" | "FULLTEXT" | "SPATIAL" => CreateItem::Ignored,
        _ => parse_column(&sql).map_or(CreateItem::Ignored, CreateItem::Column),
    }
}

/// Name carried by a column or constraint fragment (`` `name` `` after an
/// optional `CONSTRAINT` / `UNIQUE KEY` / `KEY` prefix).
pub fn fragment_name(fragment: &str) -> Option<String> {
    match parse_create_item(fragment) {
        CreateItem::Column(c) => Some(c.name),
        CreateItem::Primary(_) => Some("PRIMARY".to_string()),
        CreateItem::Unique(k, _) => k.name,
        CreateItem::Foreign(fk) => Some(fk.name),
        CreateItem::Key(index) => Some(index.name),
        CreateItem::Ignored => None,
    }
}

/// Base type name without any parenthetical or modifiers.
pub fn base_type(data_type: &str) -> &str {
    let end = data_type
        .find(|c: char| c == '(' || c.is_whitespace())
        .unwrap_or(data_type.len());
    &data_type[..end]
}

/// Normalise a key column list the way `SHOW CREATE TABLE` prints it.
pub fn normalize_key_definition(definition: &str) -> String {
    KEY_DEFINITION_RE
        .replace_all(definition.trim(), ",`")
        .into_owned()
}

fn clean_fragment(item: &str) -> String {
    item.trim()
        .trim_end_matches([',', ';'])
        .trim()
        .to_string()
}

fn parse_column(sql: &str) -> Option<ColumnDef> {
    let (name_token, rest) = next_token(sql)?;
    let (type_token, modifiers) = next_token(rest)?;
    let name = unquote_ident(name_token);
    if name.is_empty() {
        return None;
    }
    let nullable = !contains_keywords(modifiers, &["NOT", "NULL"])
        && !contains_keywords(modifiers, &["PRIMARY", "KEY"]);

    Some(ColumnDef {
        name,
        data_type: type_token.to_ascii_lowercase(),
        default: parse_default(modifiers),
        nullable,
        auto_increment: contains_keywords(modifiers, &["AUTO_INCREMENT"]),
        collation: COLLATE_RE
            .captures(modifiers)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string()),
        sql: sql.to_string(),
    })
}

/// Value following `DEFAULT` in a column's modifiers.
pub fn parse_default(modifiers: &str) -> Option<String> {
    let mut rest = modifiers;
    while let Some((token, tail)) = next_token(rest) {
        rest = tail;
        if !token.eq_ignore_ascii_case("DEFAULT") {
            continue;
        }
        let (value, _) = next_token(rest)?;
        return normalize_default(value);
    }
    None
}

/// Normalise a default as written in DDL or reported by the server.
pub fn normalize_default(value: &str) -> Option<String> {
    let value = value.trim().trim_end_matches([',', ';']);
    if let Some(literal) = unquote_literal(value) {
        return Some(literal);
    }
    let upper = value.to_ascii_uppercase();
    if upper == "NULL" {
        return None;
    }
    if upper == "CURRENT_TIMESTAMP" || upper == "CURRENT_TIMESTAMP()" {
        return Some("CURRENT_TIMESTAMP".to_string());
    }
    Some(value.to_string())
}

/// Column fragment for `MODIFY COLUMN`.
///
/// An inline `PRIMARY KEY` is replaced by `NOT NULL`: the live table already
/// has its primary key and MySQL rejects a second one.
pub fn modify_column_fragment(sql: &str) -> String {
    if !contains_keywords(sql, &["PRIMARY", "KEY"]) {
        return sql.to_string();
    }
    let mut tokens = Vec::new();
    let mut rest = sql;
    while let Some((token, tail)) = next_token(rest) {
        tokens.push(token);
        rest = tail;
    }
    let not_null = contains_keywords(sql, &["NOT", "NULL"]);
    let mut kept = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let is_primary = tokens[i].eq_ignore_ascii_case("PRIMARY")
            && tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("KEY"));
        if is_primary {
            if !not_null {
                kept.extend(["NOT", "NULL"]);
            }
            i += 2;
            continue;
        }
        kept.push(tokens[i]);
        i += 1;
    }
    kept.join(" ")
}

fn parse_unique(sql: String) -> CreateItem {
    let fields = explode_fields(&sql);
    let index = parse_index(&sql, true);
    let name = index.as_ref().map(|i| i.name.clone());
    CreateItem::Unique(KeyConstraint { name, fields, sql }, index)
}

fn parse_index(sql: &str, unique: bool) -> Option<IndexDef> {
    let open = sql.find('(')?;
    let head_tokens: Vec<&str> = sql[..open].split_whitespace().collect();
    let name_token = head_tokens.iter().rev().find(|t| {
        let upper = t.to_ascii_uppercase();
        !matches!(upper.as_str(), "KEY" | "INDEX" | "UNIQUE" | "CONSTRAINT")
    })?;
    let close = matching_paren(sql, open)?;
    Some(IndexDef {
        name: unquote_ident(name_token),
        unique,
        definition: normalize_key_definition(&sql[open + 1..close]),
    })
}

fn parse_named_constraint(sql: String) -> CreateItem {
    let Some((_, rest)) = next_token(&sql) else {
        return CreateItem::Ignored;
    };
    let Some((name_token, body)) = next_token(rest) else {
        return CreateItem::Ignored;
    };
    let name = unquote_ident(name_token);
    let kind = tokens_upper(body);

    match kind.first().map(String::as_str) {
        Some("FOREIGN") => CreateItem::Foreign(parse_foreign_key(name, &sql, body)),
        Some("PRIMARY") => CreateItem::Primary(KeyConstraint {
            name: Some(name),
            fields: explode_fields(body),
            sql,
        }),
        Some("UNIQUE") => {
            let fields = explode_fields(body);
            let definition = first_paren_group(body).map(normalize_key_definition);
            let index = definition.map(|definition| IndexDef {
                name: name.clone(),
                unique: true,
                definition,
            });
            CreateItem::Unique(
                KeyConstraint {
                    name: Some(name),
                    fields,
                    sql,
                },
                index,
            )
        }
        _ => CreateItem::Ignored,
    }
}

fn parse_foreign_key(name: String, sql: &str, body: &str) -> ForeignKeyDef {
    let fields = explode_fields(body);
    let references = REFERENCES_RE.captures(body);
    let references_table = references
        .as_ref()
        .and_then(|c| c.get(1))
        .map(|m| unquote_ident(m.as_str()))
        .unwrap_or_default();
    let references_fields = references
        .as_ref()
        .and_then(|c| c.get(2))
        .map(|m| split_field_list(m.as_str()))
        .unwrap_or_default();
    let rule = |re: &Regex| {
        re.captures(body)
            .and_then(|c| c.get(1))
            .and_then(|m| ReferentialAction::parse(m.as_str()))
            .unwrap_or_default()
    };

    ForeignKeyDef {
        name,
        fields,
        references_table,
        references_fields,
        on_delete: rule(&ON_DELETE_RE),
        on_update: rule(&ON_UPDATE_RE),
        sql: sql.to_string(),
    }
}

/// Field names inside the first parenthesised group.
fn explode_fields(sql: &str) -> Vec<String> {
    first_paren_group(sql)
        .map(split_field_list)
        .unwrap_or_default()
}

fn split_field_list(list: &str) -> Vec<String> {
    split_top_level(list, ',', true)
        .into_iter()
        .map(|field| {
            let field = field.trim();
            let without_prefix = match field.find('(') {
                Some(idx) if !field.starts_with('(') => &field[..idx],
                _ => field,
            };
            let name = without_prefix
                .split_whitespace()
                .next()
                .unwrap_or(without_prefix);
            unquote_ident(name)
        })
        .filter(|f| !f.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const USER_TABLE: &str = r#"
--
-- Table structure for table `user`
--
CREATE TABLE `user` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `username` varchar(255) NOT NULL DEFAULT '',
  `email` varchar(255) NOT NULL DEFAULT '', -- contact address
  `created` datetime NOT NULL DEFAULT '2000-01-01 00:00:00',
  `home_library` varchar(100) DEFAULT NULL,
  `last_login` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP(),
  `settings` json DEFAULT NULL,
  PRIMARY KEY (`id`),
  UNIQUE KEY `username` (`username`),
  KEY `email` (`email`, `created`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci;

CREATE TABLE `user_list` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `user_id` int(11) NOT NULL,
  PRIMARY KEY (`id`),
  KEY `user_id` (`user_id`),
  CONSTRAINT `user_list_ibfk_1` FOREIGN KEY (`user_id`) REFERENCES `user` (`id`) ON DELETE CASCADE
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_general_ci;

ALTER TABLE `user_list` ADD COLUMN `title` varchar(200);
SET foreign_key_checks = 0;
"#;

    #[test]
    fn tables_keep_declaration_order_and_statements() {
        let schema = parse_schema(USER_TABLE);
        let names: Vec<&str> = schema.table_names().collect();
        assert_eq!(names, vec!["user", "user_list"]);
        let list = schema.table("user_list").unwrap();
        assert_eq!(list.statements.len(), 2);
        assert!(list.statements[0].starts_with("CREATE TABLE"));
        assert!(list.statements[1].starts_with("ALTER TABLE"));
    }

    #[test]
    fn columns_carry_type_default_and_nullability() {
        let schema = parse_schema(USER_TABLE);
        let create = schema.table("user").unwrap().create.as_ref().unwrap();
        assert_eq!(create.columns.len(), 7);

        let id = create.column("id").unwrap();
        assert_eq!(id.data_type, "int(11)");
        assert!(!id.nullable);
        assert!(id.auto_increment);
        assert_eq!(id.default, None);

        let username = create.column("username").unwrap();
        assert_eq!(username.default, Some(String::new()));

        let email = create.column("email").unwrap();
        assert_eq!(email.sql, "`email` varchar(255) NOT NULL DEFAULT ''");

        let library = create.column("home_library").unwrap();
        assert!(library.nullable);
        assert_eq!(library.default, None);

        let login = create.column("last_login").unwrap();
        assert_eq!(login.default.as_deref(), Some("CURRENT_TIMESTAMP"));
        assert_eq!(create.column("settings").unwrap().base_type(), "json");
    }

    #[test]
    fn constraints_and_keys_are_categorised() {
        let schema = parse_schema(USER_TABLE);
        let user = schema.table("user").unwrap().create.as_ref().unwrap();
        assert_eq!(user.primary_key.as_ref().unwrap().fields, vec!["id"]);
        assert_eq!(user.unique_keys.len(), 1);
        assert_eq!(user.unique_keys[0].name.as_deref(), Some("username"));
        assert_eq!(user.keys.len(), 2);
        let email_key = user.keys.iter().find(|k| k.name == "email").unwrap();
        assert!(!email_key.unique);
        assert_eq!(email_key.definition, "`email`,`created`");
        assert_eq!(user.charset.as_deref(), Some("utf8mb4"));
        assert_eq!(user.collation.as_deref(), Some("utf8mb4_general_ci"));

        let list = schema.table("user_list").unwrap().create.as_ref().unwrap();
        assert_eq!(list.foreign_keys.len(), 1);
        let fk = &list.foreign_keys[0];
        assert_eq!(fk.name, "user_list_ibfk_1");
        assert_eq!(fk.fields, vec!["user_id"]);
        assert_eq!(fk.references_table, "user");
        assert_eq!(fk.references_fields, vec!["id"]);
        assert_eq!(fk.on_delete, ReferentialAction::Cascade);
        assert_eq!(fk.on_update, ReferentialAction::Restrict);
    }

    #[test]
    fn inline_primary_key_and_unquoted_names() {
        let schema =
            parse_schema("create table if not exists thetable (id int primary key, name varchar(50) default 'x');");
        let table = schema.table("thetable").unwrap();
        let create = table.create.as_ref().unwrap();
        assert_eq!(create.primary_key.as_ref().unwrap().fields, vec!["id"]);
        assert!(!create.column("id").unwrap().nullable);
        assert_eq!(create.column("name").unwrap().default.as_deref(), Some("x"));
    }

    #[test]
    fn modify_fragment_drops_inline_primary_key() {
        assert_eq!(modify_column_fragment("id bigint primary key"), "id bigint NOT NULL");
        assert_eq!(
            modify_column_fragment("`id` int(11) NOT NULL PRIMARY KEY AUTO_INCREMENT"),
            "`id` int(11) NOT NULL AUTO_INCREMENT"
        );
        assert_eq!(
            modify_column_fragment("`note` varchar(20) DEFAULT 'primary key'"),
            "`note` varchar(20) DEFAULT 'primary key'"
        );
    }

    #[test]
    fn statements_without_table_are_ignored() {
        let schema = parse_schema("INSERT INTO foo VALUES (1); DROP TABLE bar;");
        assert!(schema.is_empty());
    }

    #[test]
    fn referential_actions_normalise() {
        assert_eq!(ReferentialAction::parse("no  action"), Some(ReferentialAction::NoAction));
        assert_eq!(
            ReferentialAction::NoAction.normalized(),
            ReferentialAction::Restrict
        );
        assert_eq!(ReferentialAction::parse("bogus"), None);
        assert_eq!(ReferentialAction::SetNull.to_string(), "SET NULL");
    }

    #[test]
    fn fragment_names() {
        assert_eq!(fragment_name("`title` varchar(200)").as_deref(), Some("title"));
        assert_eq!(
            fragment_name("CONSTRAINT `fk_x` FOREIGN KEY (`a`) REFERENCES `b` (`id`)").as_deref(),
            Some("fk_x")
        );
        assert_eq!(fragment_name("UNIQUE KEY `u` (`a`,`b`)").as_deref(), Some("u"));
        assert_eq!(fragment_name("PRIMARY KEY (`id`)").as_deref(), Some("PRIMARY"));
    }

    #[test]
    fn defaults_normalise() {
        assert_eq!(normalize_default("'abc'"), Some("abc".to_string()));
        assert_eq!(normalize_default("NULL"), None);
        assert_eq!(normalize_default(""), Some(String::new()));
        assert_eq!(normalize_default("''"), Some(String::new()));
        assert_eq!(normalize_default("0"), Some("0".to_string()));
        assert_eq!(
            normalize_default("current_timestamp()"),
            Some("CURRENT_TIMESTAMP".to_string())
        );
    }
}
