//! Placeholder numbering and the built `(sql, values)` pair.

use crate::dedup::{EqualityMode, dedupe};
use crate::error::StmtResult;
use crate::value::Value;
use tokio_postgres::types::ToSql;

/// The "next placeholder number" authority of a statement.
///
/// Numbering is 1-based: a fresh cursor hands out `$1` first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamCursor {
    next: usize,
}

impl Default for ParamCursor {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl ParamCursor {
    /// Create a cursor starting at `$1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// The index the next placeholder will receive.
    pub fn peek(&self) -> usize {
        self.next
    }

    /// Shift the cursor forward by `n` slots.
    pub fn advance_by(&mut self, n: usize) {
        self.next += n;
    }

    /// Set the next index to an absolute value (clamped to >= 1).
    pub fn set_to(&mut self, next: usize) {
        self.next = next.max(1);
    }

    /// Move back to `$1`.
    pub fn reset(&mut self) {
        self.next = 1;
    }

    /// Number of slots that precede the next placeholder.
    pub fn offset(&self) -> usize {
        self.next - 1
    }
}

/// A rendered statement: SQL text with `$N` placeholders and the values they bind.
///
/// `values[N - 1]` is the value bound to `$N`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuiltQuery {
    pub sql: String,
    pub values: Vec<Value>,
}

impl BuiltQuery {
    /// Create a new built query.
    pub fn new(sql: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            values,
        }
    }

    /// Check if the query renders to nothing.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }

    /// Get the number of bound values.
    pub fn param_count(&self) -> usize {
        self.values.len()
    }

    /// Get parameters as references for tokio-postgres.
    pub fn params_ref(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
    }

    /// Collapse placeholders bound to equal values into shared slots.
    pub fn dedupe(&self, mode: EqualityMode) -> StmtResult<BuiltQuery> {
        dedupe(self, mode)
    }
}
