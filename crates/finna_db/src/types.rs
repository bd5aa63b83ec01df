//! Result types produced by schema reconciliation.

use crate::ddl::IndexDef;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Per-table results
// ============================================================================

/// Table-keyed results in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerTable<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for PerTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> PerTable<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for `table`.
    pub fn insert(&mut self, table: impl Into<String>, value: T) {
        let table = table.into();
        match self.entries.iter_mut().find(|(name, _)| *name == table) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((table, value)),
        }
    }

    pub fn get(&self, table: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(name, _)| name == table)
            .map(|(_, value)| value)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.get(table).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T: Default> PerTable<T> {
    /// Mutable entry for `table`, created on first use.
    pub fn entry(&mut self, table: &str) -> &mut T {
        let index = match self.entries.iter().position(|(name, _)| name == table) {
            Some(index) => index,
            None => {
                self.entries.push((table.to_string(), T::default()));
                self.entries.len() - 1
            }
        };
        &mut self.entries[index].1
    }
}

impl<T> FromIterator<(String, T)> for PerTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut out = Self::new();
        for (table, value) in iter {
            out.insert(table, value);
        }
        out
    }
}

impl<T: Serialize> Serialize for PerTable<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.entries.iter().map(|(k, v)| (k, v)))
    }
}

// ============================================================================
// Constraint types
// ============================================================================

/// Constraint categories tracked by the upgrader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintCategory {
    Primary,
    Unique,
    Foreign,
}

impl ConstraintCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Unique => "unique",
            Self::Foreign => "foreign",
        }
    }
}

impl fmt::Display for ConstraintCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared constraint whose live rules differ.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifiedConstraint {
    pub category: ConstraintCategory,
    pub name: String,
    /// Declared DDL fragment to recreate the constraint with.
    pub sql: String,
}

// ============================================================================
// Key types
// ============================================================================

/// Secondary-key changes for one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct KeyChanges {
    /// Live keys whose definition differs; dropped before re-adding.
    pub drop: Vec<String>,
    /// Declared keys to add.
    pub add: Vec<IndexDef>,
}

impl KeyChanges {
    pub fn is_empty(&self) -> bool {
        self.drop.is_empty() && self.add.is_empty()
    }
}

// ============================================================================
// Charset/collation types
// ============================================================================

/// A live column that needs re-collating or re-encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemColumn {
    pub name: String,
    pub column_type: String,
    pub collation: Option<String>,
    pub nullable: bool,
    pub default: Option<String>,
}

/// Table whose live collation or charset differs from the declared one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollationProblem {
    pub current_collation: Option<String>,
    pub expected_charset: String,
    pub expected_collation: String,
    pub columns: Vec<ProblemColumn>,
}

/// `latin1` table that needs a byte-accurate conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingProblem {
    pub current_collation: String,
    pub target_charset: String,
    pub target_collation: String,
    pub columns: Vec<ProblemColumn>,
}

// ============================================================================
// Options and report
// ============================================================================

/// Upgrade tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpgradeOptions {
    /// Columns that older schemas carried and the current one drops.
    pub deprecated_columns: BTreeMap<String, Vec<String>>,
    /// Whether [`crate::DbUpgrade::run_upgrade`] also drops deprecated columns.
    pub remove_deprecated_columns: bool,
}

impl Default for UpgradeOptions {
    fn default() -> Self {
        let mut deprecated_columns = BTreeMap::new();
        deprecated_columns.insert("search".to_string(), vec!["folder_id".to_string()]);
        Self {
            deprecated_columns,
            remove_deprecated_columns: false,
        }
    }
}

/// Outcome of [`crate::DbUpgrade::run_upgrade`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    /// Logged SQL (only populated when logging instead of executing).
    pub sql: String,
    /// Human-readable summary of what was changed.
    pub warnings: Vec<String>,
}

impl UpgradeReport {
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.warnings.is_empty()
    }
}
