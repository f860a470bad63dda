//! Parameterized boolean-expression builder.
//!
//! A [`Statement`] is an ordered list of [`ConditionFragment`]s joined by `AND`/`OR`.
//! Each fragment keeps its parameter slots unresolved until render time, when they
//! are numbered `$N` from the statement's [`ParamCursor`]. Nested statements are
//! flattened into one parenthesized fragment when they are inserted.
//!
//! # Example
//!
//! ```ignore
//! use pgstmt::Statement;
//!
//! let mut stmt = Statement::new();
//! stmt.eq("status", "active").or().gt("age", 18);
//! stmt.add_offset(2);
//!
//! let built = stmt.render();
//! assert_eq!(built.sql, "WHERE (status = $3) OR (age > $4)");
//! ```

mod conditions;
mod fragment;

#[cfg(test)]
mod tests;

pub use conditions::TextSearch;
pub use fragment::{Combinator, ConditionFragment};

pub(crate) use fragment::LeafBuilder;

use crate::dedup::{EqualityMode, dedupe};
use crate::error::StmtResult;
use crate::param::{BuiltQuery, ParamCursor};
use crate::value::{IntoBindings, Value};

/// Default placeholder marker for templates.
pub const DEFAULT_MARKER: &str = "?";

/// A boolean expression tree with memoized rendering.
#[derive(Debug, Clone)]
#[must_use]
pub struct Statement {
    fragments: Vec<ConditionFragment>,
    /// Prepended foreign values followed by every fragment's values.
    values: Vec<Value>,
    /// How many of `values` were prepended via `add_params`.
    foreign: usize,
    cursor: ParamCursor,
    keyword: &'static str,
    emit_keyword: bool,
    marker: String,
    pending: Option<Combinator>,
    dedup_suppressed: bool,
    cache: Option<BuiltQuery>,
}

impl Default for Statement {
    fn default() -> Self {
        Self::new()
    }
}

impl Statement {
    /// Create an empty statement that renders with a leading `WHERE`.
    pub fn new() -> Self {
        Self::with_keyword("WHERE")
    }

    /// Create an empty statement that renders with a leading `HAVING`.
    pub fn having() -> Self {
        Self::with_keyword("HAVING")
    }

    /// Create an empty statement that renders with a leading `ON` (join condition).
    pub fn on() -> Self {
        Self::with_keyword("ON")
    }

    /// Create an empty statement without a leading keyword.
    pub fn group() -> Self {
        let mut stmt = Self::with_keyword("");
        stmt.emit_keyword = false;
        stmt
    }

    /// Create an empty statement with a custom leading keyword.
    pub fn with_keyword(keyword: &'static str) -> Self {
        Self {
            fragments: Vec::new(),
            values: Vec::new(),
            foreign: 0,
            cursor: ParamCursor::new(),
            keyword,
            emit_keyword: !keyword.is_empty(),
            marker: DEFAULT_MARKER.to_string(),
            pending: None,
            dedup_suppressed: false,
            cache: None,
        }
    }

    /// Use a different placeholder marker for templates added after this call.
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = marker.into();
        self
    }

    /// The placeholder marker used by templates.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Render this statement under a different clause keyword.
    pub(crate) fn into_keyword(mut self, keyword: &'static str) -> Self {
        self.keyword = keyword;
        self.emit_keyword = !keyword.is_empty();
        self.invalidate();
        self
    }

    /// Enable or disable the leading keyword.
    pub fn set_keyword_enabled(&mut self, enabled: bool) -> &mut Self {
        self.emit_keyword = enabled && !self.keyword.is_empty();
        self.invalidate();
        self
    }

    // ==================== Combinators ====================

    /// Join the next condition with `AND` (the default).
    pub fn and(&mut self) -> &mut Self {
        self.pending = Some(Combinator::And);
        self
    }

    /// Join the next condition with `OR`.
    pub fn or(&mut self) -> &mut Self {
        self.pending = Some(Combinator::Or);
        self
    }

    fn next_combinator(&mut self) -> Combinator {
        self.pending.take().unwrap_or(Combinator::And)
    }

    // ==================== Insertion ====================

    /// Add a leaf condition from a template.
    ///
    /// Every marker occurrence in `template` becomes one parameter slot. The number
    /// of markers must equal the number of values (a scalar counts as one).
    pub fn add_leaf(
        &mut self,
        template: &str,
        values: impl IntoBindings,
        combinator: Combinator,
    ) -> StmtResult<&mut Self> {
        let fragment = ConditionFragment::from_template(
            template,
            &self.marker,
            values.into_bindings(),
            combinator,
        )?;
        Ok(self.push_fragment(fragment))
    }

    /// Add raw SQL verbatim, joined with the pending combinator.
    ///
    /// The template is not escaped in any way, but its markers are still counted
    /// against `values`.
    pub fn raw(&mut self, template: &str, values: impl IntoBindings) -> StmtResult<&mut Self> {
        let combinator = self.next_combinator();
        self.add_leaf(template, values, combinator)
    }

    /// Add a nested statement as one parenthesized fragment.
    ///
    /// The subtree is flattened immediately: its keyword is dropped and its
    /// fragment values are appended in render order. Values the subtree received
    /// through [`Statement::add_params`] are not carried over. An empty subtree is
    /// ignored.
    pub fn add_group(&mut self, subtree: &Statement, combinator: Combinator) -> &mut Self {
        if subtree.fragments.is_empty() {
            return self;
        }
        let mut leaf = LeafBuilder::new();
        subtree.write_fragments(&mut leaf);
        self.push_fragment(leaf.finish(combinator))
    }

    /// Add a nested statement joined with `AND`.
    pub fn and_group(&mut self, subtree: &Statement) -> &mut Self {
        self.add_group(subtree, Combinator::And)
    }

    /// Add a nested statement joined with `OR`.
    pub fn or_group(&mut self, subtree: &Statement) -> &mut Self {
        self.add_group(subtree, Combinator::Or)
    }

    pub(crate) fn push_leaf(&mut self, leaf: LeafBuilder) -> &mut Self {
        let combinator = self.next_combinator();
        self.push_fragment(leaf.finish(combinator))
    }

    fn push_fragment(&mut self, mut fragment: ConditionFragment) -> &mut Self {
        if self.fragments.is_empty() {
            fragment.set_combinator(Combinator::None);
        } else if fragment.combinator() == Combinator::None {
            fragment.set_combinator(Combinator::And);
        }
        self.values.extend(fragment.values().iter().cloned());
        self.fragments.push(fragment);
        self.invalidate();
        self
    }

    fn write_fragments(&self, leaf: &mut LeafBuilder) {
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                if let Some(kw) = fragment.combinator().keyword() {
                    leaf.push(" ").push(kw).push(" ");
                }
            }
            leaf.push("(").append(fragment).push(")");
        }
    }

    // ==================== Offsets ====================

    /// Shift placeholder numbering forward by `n` slots.
    pub fn add_offset(&mut self, n: usize) -> &mut Self {
        self.cursor.advance_by(n);
        self.invalidate();
        self
    }

    /// Set the number of slots preceding this statement's own values.
    ///
    /// Prefer [`Statement::reset_offset`] followed by [`Statement::add_offset`];
    /// composition always uses the relative form.
    pub fn set_offset(&mut self, offset: usize) -> &mut Self {
        self.cursor.set_to(offset + self.foreign + 1);
        self.invalidate();
        self
    }

    /// Drop any applied offset. Prepended parameters keep their slots.
    pub fn reset_offset(&mut self) -> &mut Self {
        self.set_offset(0)
    }

    /// The number of slots that precede this statement's first placeholder.
    pub fn offset(&self) -> usize {
        self.cursor.offset()
    }

    /// Prepend foreign values so they occupy the lowest placeholder numbers.
    ///
    /// The text that references them lives elsewhere (for example a CTE prologue);
    /// this statement's own placeholders move up by `values.len()`.
    pub fn add_params(&mut self, values: impl IntoBindings) -> &mut Self {
        let values = values.into_bindings();
        let n = values.len();
        self.values.splice(0..0, values);
        self.foreign += n;
        self.cursor.advance_by(n);
        self.invalidate();
        self
    }

    // ==================== Rendering ====================

    /// Drop the memoized render.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// Render to SQL text and values, reusing the previous result when nothing changed.
    ///
    /// Placeholders are numbered from the cursor's current position; rendering does
    /// not move the cursor.
    pub fn render(&mut self) -> &BuiltQuery {
        let built = match self.cache.take() {
            Some(built) => built,
            None => self.render_uncached(),
        };
        self.cache.insert(built)
    }

    /// Render and deduplicate, unless deduplication is suppressed.
    pub fn build(&mut self, mode: EqualityMode) -> StmtResult<BuiltQuery> {
        let suppressed = self.dedup_suppressed;
        let built = self.render();
        if suppressed {
            Ok(built.clone())
        } else {
            dedupe(built, mode)
        }
    }

    /// Get the rendered SQL string (for debugging).
    pub fn to_sql(&mut self) -> String {
        self.render().sql.clone()
    }

    fn render_uncached(&self) -> BuiltQuery {
        if self.fragments.is_empty() {
            // Prepended values still belong to the composed query.
            return BuiltQuery::new(String::new(), self.values.clone());
        }

        let mut sql = String::new();
        if self.emit_keyword {
            sql.push_str(self.keyword);
            sql.push(' ');
        }

        let mut cursor = self.cursor;
        for (i, fragment) in self.fragments.iter().enumerate() {
            if i > 0 {
                if let Some(kw) = fragment.combinator().keyword() {
                    sql.push(' ');
                    sql.push_str(kw);
                    sql.push(' ');
                }
            }
            sql.push('(');
            fragment.write_sql(&mut sql, &mut cursor);
            sql.push(')');
        }

        BuiltQuery::new(sql, self.values.clone())
    }

    // ==================== State ====================

    /// Check if the statement has no conditions.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Get the number of fragments.
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    /// Get the fragments in insertion order.
    pub fn fragments(&self) -> &[ConditionFragment] {
        &self.fragments
    }

    /// Get all values: prepended values first, then fragment values.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get the total number of bound values.
    pub fn param_count(&self) -> usize {
        self.values.len()
    }

    /// Clear all conditions, values and offsets. Keyword and marker settings are kept.
    pub fn clear(&mut self) -> &mut Self {
        self.fragments.clear();
        self.values.clear();
        self.foreign = 0;
        self.cursor.reset();
        self.pending = None;
        self.invalidate();
        self
    }

    pub(crate) fn dedup_suppressed(&self) -> bool {
        self.dedup_suppressed
    }

    pub(crate) fn set_dedup_suppressed(&mut self, suppressed: bool) {
        self.dedup_suppressed = suppressed;
    }
}
