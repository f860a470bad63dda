//! Error types for pgstmt

use thiserror::Error;

/// Result type alias for pgstmt operations
pub type StmtResult<T> = Result<T, StmtError>;

/// Errors raised while building, composing or executing statements.
#[derive(Debug, Error)]
pub enum StmtError {
    /// A template's placeholder count does not match the number of bound values.
    #[error("Placeholder mismatch in `{template}`: {expected} placeholder(s), {found} value(s)")]
    PlaceholderMismatch {
        template: String,
        expected: usize,
        found: usize,
    },

    /// A `{N}` schema placeholder has no entry in the supplied schema list.
    #[error("Schema placeholder {{{index}}} is out of range for schemas {schemas:?}")]
    SchemaPlaceholderOutOfRange { index: usize, schemas: Vec<String> },

    /// A `$N` placeholder references a value that was never bound.
    #[error("Placeholder ${index} has no bound value ({available} value(s) available)")]
    UnboundPlaceholder { index: usize, available: usize },

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Query execution error
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Unique constraint violation
    #[error("Unique constraint violation: {0}")]
    UniqueViolation(String),

    /// Foreign key constraint violation
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl StmtError {
    /// Create a placeholder mismatch error for a template.
    pub fn placeholder_mismatch(template: impl Into<String>, expected: usize, found: usize) -> Self {
        Self::PlaceholderMismatch {
            template: template.into(),
            expected,
            found,
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Check if this is a placeholder mismatch error
    pub fn is_placeholder_mismatch(&self) -> bool {
        matches!(self, Self::PlaceholderMismatch { .. })
    }

    /// Copy a deferred builder error so it can be reported on every build.
    ///
    /// Driver errors cannot be cloned and are reported by message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            Self::PlaceholderMismatch {
                template,
                expected,
                found,
            } => Self::placeholder_mismatch(template.clone(), *expected, *found),
            Self::SchemaPlaceholderOutOfRange { index, schemas } => {
                Self::SchemaPlaceholderOutOfRange {
                    index: *index,
                    schemas: schemas.clone(),
                }
            }
            Self::UnboundPlaceholder { index, available } => Self::UnboundPlaceholder {
                index: *index,
                available: *available,
            },
            Self::Validation(msg) => Self::Validation(msg.clone()),
            Self::UniqueViolation(msg) => Self::UniqueViolation(msg.clone()),
            Self::ForeignKeyViolation(msg) => Self::ForeignKeyViolation(msg.clone()),
            Self::Query(err) => Self::Other(err.to_string()),
            #[cfg(feature = "pool")]
            Self::Pool(msg) => Self::Pool(msg.clone()),
            Self::Other(msg) => Self::Other(msg.clone()),
        }
    }

    /// Parse a tokio_postgres error into a more specific StmtError
    pub fn from_db_error(err: tokio_postgres::Error) -> Self {
        if let Some(db_err) = err.as_db_error() {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let message = db_err.message();

            match db_err.code().code() {
                "23505" => return Self::UniqueViolation(format!("{constraint}: {message}")),
                "23503" => return Self::ForeignKeyViolation(format!("{constraint}: {message}")),
                _ => {}
            }
        }
        Self::Query(err)
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for StmtError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_names_template() {
        let err = StmtError::placeholder_mismatch("a = ? AND b = ?", 2, 1);
        assert!(err.is_placeholder_mismatch());
        assert_eq!(
            err.to_string(),
            "Placeholder mismatch in `a = ? AND b = ?`: 2 placeholder(s), 1 value(s)"
        );
    }

    #[test]
    fn schema_out_of_range_lists_schemas() {
        let err = StmtError::SchemaPlaceholderOutOfRange {
            index: 2,
            schemas: vec!["public".into(), "audit".into()],
        };
        assert_eq!(
            err.to_string(),
            r#"Schema placeholder {2} is out of range for schemas ["public", "audit"]"#
        );
    }
}
