//! Splicing independently built fragments into one query.
//!
//! Every part is numbered by resetting its offset and then shifting it by the
//! number of values already consumed. Parts never deduplicate on their own; the
//! composed query is deduplicated once at the end.
//!
//! # Example
//!
//! ```ignore
//! use pgstmt::{Composer, EqualityMode, Statement};
//!
//! let mut on = Statement::on();
//! on.eq("o.status", "paid");
//! let mut filter = Statement::new();
//! filter.gt("u.age", 18);
//!
//! let mut q = Composer::new();
//! q.push("SELECT * FROM users u JOIN orders o ")
//!     .push_part(&mut on)?
//!     .push(" ")
//!     .push_part(&mut filter)?;
//! let built = q.build(EqualityMode::Strict)?;
//! // SELECT * FROM users u JOIN orders o ON (o.status = $1) WHERE (u.age > $2)
//! ```

use crate::dedup::{EqualityMode, dedupe};
use crate::error::{StmtError, StmtResult};
use crate::param::BuiltQuery;
use crate::placeholder::check_numbered;
use crate::statement::Statement;
use crate::value::Value;

pub use crate::placeholder::shift_placeholders;

/// A fragment that can be embedded into a larger query.
pub trait Composable {
    /// Drop any applied offset so numbering starts right after prepended values.
    fn reset_offset(&mut self);

    /// Shift numbering forward by `n` slots.
    fn add_offset(&mut self, n: usize);

    /// Whether the fragment skips deduplication when built.
    fn dedup_suppressed(&self) -> bool;

    /// Enable or disable the fragment's own deduplication.
    fn set_dedup_suppressed(&mut self, suppressed: bool);

    /// Render with the current offset, honoring dedup suppression.
    fn render_fragment(&mut self) -> StmtResult<BuiltQuery>;
}

impl Composable for Statement {
    fn reset_offset(&mut self) {
        Statement::reset_offset(self);
    }

    fn add_offset(&mut self, n: usize) {
        Statement::add_offset(self, n);
    }

    fn dedup_suppressed(&self) -> bool {
        Statement::dedup_suppressed(self)
    }

    fn set_dedup_suppressed(&mut self, suppressed: bool) {
        Statement::set_dedup_suppressed(self, suppressed);
    }

    fn render_fragment(&mut self) -> StmtResult<BuiltQuery> {
        self.build(EqualityMode::default())
    }
}

/// Render `part` as a sub-component starting at `offset + 1`.
///
/// The part's own dedup setting is restored afterwards; its offset is left at
/// the embedded position.
pub(crate) fn render_at<C: Composable + ?Sized>(
    part: &mut C,
    offset: usize,
) -> StmtResult<BuiltQuery> {
    part.reset_offset();
    part.add_offset(offset);
    let suppressed = part.dedup_suppressed();
    part.set_dedup_suppressed(true);
    let built = part.render_fragment();
    part.set_dedup_suppressed(suppressed);
    built
}

/// Render `part` on its own numbering, from `$1`.
pub(crate) fn render_detached<C: Composable + ?Sized>(part: &mut C) -> StmtResult<BuiltQuery> {
    render_at(part, 0)
}

/// Running-offset accumulator for composed SQL.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Composer {
    sql: String,
    values: Vec<Value>,
    /// Slots consumed before this composer's first value.
    base: usize,
}

impl Composer {
    /// Create an empty composer numbering from `$1`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a composer whose first placeholder is `$base + 1`.
    pub fn with_offset(base: usize) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Append SQL text that binds nothing.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// Append a composable part numbered after everything pushed so far.
    pub fn push_part<C: Composable + ?Sized>(&mut self, part: &mut C) -> StmtResult<&mut Self> {
        let built = render_at(part, self.offset())?;
        self.sql.push_str(&built.sql);
        self.values.extend(built.values);
        Ok(self)
    }

    /// Append an already built pair numbered from `$1`.
    ///
    /// Every `$N` in the pair must bind one of its values and every value must be
    /// referenced; otherwise the pair is rejected and nothing is appended.
    pub fn push_built(&mut self, built: BuiltQuery) -> StmtResult<&mut Self> {
        check_numbered(&built.sql, built.values.len())?;
        let shifted = shift_placeholders(&built.sql, self.offset());
        self.sql.push_str(&shifted);
        self.values.extend(built.values);
        Ok(self)
    }

    /// Total slots consumed, including the base offset.
    pub fn offset(&self) -> usize {
        self.base + self.values.len()
    }

    /// Check if nothing has been pushed.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty() && self.values.is_empty()
    }

    /// Get the SQL composed so far.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Finish without deduplicating.
    pub fn finish(self) -> BuiltQuery {
        BuiltQuery::new(self.sql, self.values)
    }

    /// Finish and deduplicate the composed query.
    ///
    /// Only a composer numbering from `$1` owns every value it references, so
    /// one created with [`Composer::with_offset`] must be finished with
    /// [`Composer::finish`] and deduplicated by whoever owns the earlier slots.
    pub fn build(self, mode: EqualityMode) -> StmtResult<BuiltQuery> {
        if self.base > 0 {
            return Err(StmtError::validation(format!(
                "cannot deduplicate a composer starting after ${}",
                self.base
            )));
        }
        dedupe(&self.finish(), mode)
    }
}
