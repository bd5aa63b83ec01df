//! Error types for schema reconciliation.

use crate::backend::BackendError;
use thiserror::Error;

/// Upgrade operation result type.
pub type Result<T> = std::result::Result<T, UpgradeError>;

/// Fatal upgrade errors.
///
/// These indicate a programming or schema-declaration error and are never
/// swallowed during an administrative upgrade.
#[derive(Error, Debug)]
pub enum UpgradeError {
    /// No database adapter was configured before first use.
    #[error("Database adapter not set")]
    AdapterNotSet,

    /// The live database reported a constraint kind outside the known set.
    #[error("Unexpected constraint type: {0}")]
    UnexpectedConstraintType(String),

    /// Only foreign keys can be dropped and recreated in place.
    #[error("Unsupported constraint modification for {table}: {category} constraint {name}")]
    UnsupportedConstraintModification {
        table: String,
        category: String,
        name: String,
    },

    /// A declared constraint vanished between detection steps.
    #[error("Could not find constraint {name} in table {table}")]
    ConstraintNotFound { table: String, name: String },

    /// Adapter failure (connection, query, DDL).
    #[error("Database error: {0}")]
    Backend(#[from] BackendError),

    /// IO error (reading the schema file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpgradeError {
    /// Create an unexpected constraint type error.
    pub fn unexpected_constraint(kind: impl Into<String>) -> Self {
        Self::UnexpectedConstraintType(kind.into())
    }

    /// Create a constraint not found error.
    pub fn constraint_not_found(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self::ConstraintNotFound {
            table: table.into(),
            name: name.into(),
        }
    }
}
