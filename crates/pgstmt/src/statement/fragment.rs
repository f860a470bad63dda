//! Condition fragments: one leaf (or flattened group) of a statement.

use crate::error::{StmtError, StmtResult};
use crate::param::ParamCursor;
use crate::placeholder::{SqlPart, push_raw, split_markers, split_numbered};
use crate::value::Value;

/// Boolean operator placed before a fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    /// No leading operator (first fragment).
    #[default]
    None,
    And,
    Or,
}

impl Combinator {
    /// Returns the SQL keyword, if any.
    pub fn keyword(&self) -> Option<&'static str> {
        match self {
            Combinator::None => None,
            Combinator::And => Some("AND"),
            Combinator::Or => Some("OR"),
        }
    }
}

/// A single condition with its own parameter slots and bound values.
///
/// The number of parameter slots always equals the number of values.
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionFragment {
    combinator: Combinator,
    parts: Vec<SqlPart>,
    values: Vec<Value>,
}

impl ConditionFragment {
    /// Parse a template, turning each `marker` occurrence into a parameter slot.
    pub fn from_template(
        template: &str,
        marker: &str,
        values: Vec<Value>,
        combinator: Combinator,
    ) -> StmtResult<Self> {
        let parts = split_markers(template, marker)?;
        let expected = parts
            .iter()
            .filter(|p| matches!(p, SqlPart::Param(_)))
            .count();
        if expected != values.len() {
            return Err(StmtError::placeholder_mismatch(
                template,
                expected,
                values.len(),
            ));
        }
        Ok(Self {
            combinator,
            parts,
            values,
        })
    }

    /// Re-embed SQL that was already numbered from `$1` (a rendered subquery).
    ///
    /// `$k` keeps pointing at `values[k - 1]`, so a value referenced twice stays
    /// shared after renumbering.
    pub(crate) fn from_numbered(
        sql: &str,
        values: Vec<Value>,
        combinator: Combinator,
    ) -> StmtResult<Self> {
        let parts = split_numbered(sql, values.len())?;
        Ok(Self {
            combinator,
            parts,
            values,
        })
    }

    /// Get the combinator.
    pub fn combinator(&self) -> Combinator {
        self.combinator
    }

    pub(crate) fn set_combinator(&mut self, combinator: Combinator) {
        self.combinator = combinator;
    }

    /// Get the bound values, in slot order.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Get the number of parameter slots.
    pub fn param_count(&self) -> usize {
        self.values.len()
    }

    pub(crate) fn parts(&self) -> &[SqlPart] {
        &self.parts
    }

    /// Write the fragment body (without combinator or parentheses), numbering
    /// slots from the cursor. The cursor moves past every value of the fragment.
    pub(crate) fn write_sql(&self, out: &mut String, cursor: &mut ParamCursor) {
        let base = cursor.peek();
        for part in &self.parts {
            match part {
                SqlPart::Raw(s) => out.push_str(s),
                SqlPart::Param(slot) => {
                    out.push('$');
                    out.push_str(&(base + slot).to_string());
                }
            }
        }
        cursor.advance_by(self.values.len());
    }

    /// Render with `?` markers in place of slots (diagnostics only).
    pub fn template(&self) -> String {
        self.parts
            .iter()
            .map(|p| match p {
                SqlPart::Raw(s) => s.as_str(),
                SqlPart::Param(_) => "?",
            })
            .collect()
    }
}

/// Incremental construction of a fragment from typed pieces.
///
/// Slots and values are pushed together, so the count invariant holds by construction.
#[derive(Debug, Default)]
pub(crate) struct LeafBuilder {
    parts: Vec<SqlPart>,
    values: Vec<Value>,
}

impl LeafBuilder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append raw SQL (no parameters).
    pub(crate) fn push(&mut self, sql: &str) -> &mut Self {
        push_raw(&mut self.parts, sql);
        self
    }

    /// Append a parameter slot and bind its value.
    pub(crate) fn bind(&mut self, value: Value) -> &mut Self {
        self.parts.push(SqlPart::Param(self.values.len()));
        self.values.push(value);
        self
    }

    /// Append a comma-separated list of slots.
    pub(crate) fn bind_list(&mut self, values: Vec<Value>) -> &mut Self {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind(v);
        }
        self
    }

    /// Append the body of another fragment.
    pub(crate) fn append(&mut self, fragment: &ConditionFragment) -> &mut Self {
        let base = self.values.len();
        for part in fragment.parts() {
            match part {
                SqlPart::Raw(s) => {
                    push_raw(&mut self.parts, s);
                }
                SqlPart::Param(slot) => self.parts.push(SqlPart::Param(base + slot)),
            }
        }
        self.values.extend(fragment.values().iter().cloned());
        self
    }

    pub(crate) fn finish(self, combinator: Combinator) -> ConditionFragment {
        ConditionFragment {
            combinator,
            parts: self.parts,
            values: self.values,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_counts_markers() {
        let frag = ConditionFragment::from_template(
            "a = ? OR b = ?",
            "?",
            vec![Value::from(1), Value::from(2)],
            Combinator::None,
        )
        .unwrap();
        assert_eq!(frag.param_count(), 2);
        assert_eq!(frag.template(), "a = ? OR b = ?");

        let mut out = String::new();
        let mut cursor = ParamCursor::new();
        cursor.advance_by(2);
        frag.write_sql(&mut out, &mut cursor);
        assert_eq!(out, "a = $3 OR b = $4");
    }

    #[test]
    fn template_mismatch_fails_fast() {
        let err = ConditionFragment::from_template(
            "a = ? AND b = ?",
            "?",
            vec![Value::from(1)],
            Combinator::And,
        )
        .unwrap_err();
        match err {
            StmtError::PlaceholderMismatch {
                template,
                expected,
                found,
            } => {
                assert_eq!(template, "a = ? AND b = ?");
                assert_eq!(expected, 2);
                assert_eq!(found, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn leaf_builder_keeps_slots_and_values_aligned() {
        let mut leaf = LeafBuilder::new();
        leaf.push("id IN (")
            .bind_list(vec![Value::from(1), Value::from(2)])
            .push(")");
        let frag = leaf.finish(Combinator::None);
        assert_eq!(frag.template(), "id IN (?, ?)");
        assert_eq!(frag.param_count(), 2);
    }

    #[test]
    fn numbered_fragment_keeps_shared_slots() {
        let frag = ConditionFragment::from_numbered(
            "a = $1 OR b = $1 OR c = $2",
            vec![Value::from(1), Value::from(2)],
            Combinator::None,
        )
        .unwrap();
        assert_eq!(frag.param_count(), 2);

        let mut leaf = LeafBuilder::new();
        leaf.bind(Value::from(0)).push(" AND (").append(&frag).push(")");
        let frag = leaf.finish(Combinator::None);

        let mut out = String::new();
        let mut cursor = ParamCursor::new();
        cursor.advance_by(4);
        frag.write_sql(&mut out, &mut cursor);
        assert_eq!(out, "$5 AND (a = $6 OR b = $6 OR c = $7)");
        assert_eq!(cursor.peek(), 8);
    }

    #[test]
    fn combinator_keywords() {
        assert_eq!(Combinator::None.keyword(), None);
        assert_eq!(Combinator::And.keyword(), Some("AND"));
        assert_eq!(Combinator::Or.keyword(), Some("OR"));
    }
}
