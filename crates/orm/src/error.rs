//! Errors

use thiserror::Error;

/// Result type used across the crate.
pub type Result<T> = anyhow::Result<T, Error>;

/// Errors raised while mapping entities or running their statements.
#[derive(Error, Debug)]
pub enum Error {
    /// The entity's declared fields and accessors do not line up.
    #[error("entity `{entity}` cannot be mapped: {reason}")]
    Mapping { entity: String, reason: String },

    /// A value's runtime type is not one the binding layer supports.
    #[error("column `{column}` expected {expected} but found {found}")]
    UnsupportedType { column: String, expected: &'static str, found: &'static str },

    /// Placeholders, type tags and values disagree in number.
    #[error("binding mismatch: {placeholders} placeholders, {tags} type tags, {values} values")]
    Binding { placeholders: usize, tags: usize, values: usize },

    /// The database collaborator failed to prepare, bind or execute.
    #[error("statement `{sql}` failed: {cause:#}")]
    Statement { sql: String, cause: anyhow::Error },

    /// No row exists for the requested id.
    #[error("no `{entity}` row with id {id}")]
    NotFound { entity: String, id: i64 },

    /// A comparison or logic operator outside the supported set.
    #[error("unsupported operator `{0}`")]
    InvalidOperator(String),

    /// A predicate names a column the entity does not map.
    #[error("entity `{entity}` has no column `{column}`")]
    UnknownColumn { entity: String, column: String },
}

impl Error {
    pub(crate) fn mapping(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Mapping {
            entity: entity.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn statement(sql: &str, cause: anyhow::Error) -> Self {
        Self::Statement {
            sql: sql.to_string(),
            cause,
        }
    }
}
