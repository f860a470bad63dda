//! Placeholder deduplication.
//!
//! Runs once on a fully composed `(sql, values)` pair and rewrites placeholders so
//! that equal values share one slot. Values keep their first-occurrence order.

use std::collections::HashMap;

use crate::error::{StmtError, StmtResult};
use crate::param::BuiltQuery;
use crate::placeholder::{Token, tokenize};
use crate::value::{StrictKey, StructuralEq, Value};

/// How bound values are compared when collapsing placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EqualityMode {
    /// Scalars by value, arrays/objects/functions by identity. O(1) lookups.
    ///
    /// Floats follow IEEE equality: `0.0` and `-0.0` share a slot, while a NaN
    /// never matches another value, so each NaN keeps its own placeholder.
    /// [`EqualityMode::Deep`] applies the same float rule.
    #[default]
    Strict,
    /// Structural comparison of every value kind. O(k) lookups.
    Deep,
}

enum Seen<'a> {
    Strict(HashMap<StrictKey<'a>, usize>),
    Deep(Vec<(&'a Value, usize)>),
}

impl<'a> Seen<'a> {
    fn new(mode: EqualityMode) -> Self {
        match mode {
            EqualityMode::Strict => Seen::Strict(HashMap::new()),
            EqualityMode::Deep => Seen::Deep(Vec::new()),
        }
    }

    fn find(&self, value: &'a Value) -> Option<usize> {
        match self {
            Seen::Strict(map) => value.strict_key().and_then(|key| map.get(&key).copied()),
            Seen::Deep(seen) => seen
                .iter()
                .find(|(v, _)| v.structural_eq(value))
                .map(|(_, idx)| *idx),
        }
    }

    fn insert(&mut self, value: &'a Value, idx: usize) {
        match self {
            Seen::Strict(map) => {
                if let Some(key) = value.strict_key() {
                    map.insert(key, idx);
                }
            }
            Seen::Deep(seen) => seen.push((value, idx)),
        }
    }
}

/// Collapse placeholders bound to equal values.
///
/// Each `$N` must satisfy `1 <= N <= values.len()`. Values no placeholder refers
/// to are dropped. Running this on its own output returns the output unchanged.
pub fn dedupe(query: &BuiltQuery, mode: EqualityMode) -> StmtResult<BuiltQuery> {
    let mut sql = String::with_capacity(query.sql.len());
    let mut values: Vec<Value> = Vec::with_capacity(query.values.len());
    // Old index -> new index, so repeated tokens skip the equality lookup.
    let mut remap: HashMap<usize, usize> = HashMap::new();
    let mut seen = Seen::new(mode);

    for token in tokenize(&query.sql) {
        let old = match token {
            Token::Text(s) => {
                sql.push_str(s);
                continue;
            }
            Token::Placeholder(idx) => idx,
        };

        let new = match remap.get(&old) {
            Some(&new) => new,
            None => {
                let value = old
                    .checked_sub(1)
                    .and_then(|i| query.values.get(i))
                    .ok_or(StmtError::UnboundPlaceholder {
                        index: old,
                        available: query.values.len(),
                    })?;
                let new = match seen.find(value) {
                    Some(existing) => existing,
                    None => {
                        values.push(value.clone());
                        let new = values.len();
                        seen.insert(value, new);
                        new
                    }
                };
                remap.insert(old, new);
                new
            }
        };

        sql.push('$');
        sql.push_str(&new.to_string());
    }

    let collapsed = query.values.len() - values.len();
    if collapsed > 0 {
        tracing::trace!(
            target: "pgstmt.sql",
            ?mode,
            before = query.values.len(),
            after = values.len(),
            "collapsed duplicate parameters"
        );
    }

    Ok(BuiltQuery::new(sql, values))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn q(sql: &str, values: Vec<Value>) -> BuiltQuery {
        BuiltQuery::new(sql, values)
    }

    #[test]
    fn no_duplicates_is_unchanged() {
        let input = q(
            "WHERE (a = $1) AND (b = $2) AND (c IN ($3, $4))",
            vec![1.into(), "x".into(), 2.into(), 3.into()],
        );
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn strict_collapses_equal_primitives() {
        let input = q("(a = $1) OR (b = $2)", vec![1.into(), 1.into()]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out.sql, "(a = $1) OR (b = $1)");
        assert_eq!(out.values, vec![Value::Int(1)]);
    }

    #[test]
    fn deep_collapses_equal_arrays_strict_does_not() {
        let input = q(
            "a = ANY($1) AND b = ANY($2)",
            vec![Value::array([1, 2]), Value::array([1, 2])],
        );

        let strict = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(strict, input);

        let deep = dedupe(&input, EqualityMode::Deep).unwrap();
        assert_eq!(deep.sql, "a = ANY($1) AND b = ANY($1)");
        assert_eq!(deep.values.len(), 1);
    }

    #[test]
    fn strict_collapses_shared_references() {
        let tags = Value::array(["a", "b"]);
        let input = q("x = $1 OR y = $2", vec![tags.clone(), tags]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out.sql, "x = $1 OR y = $1");
        assert_eq!(out.param_count(), 1);
    }

    #[test]
    fn deep_objects_ignore_key_order() {
        let a = Value::object([("k", Value::from(1)), ("j", Value::from("v"))]);
        let b = Value::object([("j", Value::from("v")), ("k", Value::from(1))]);
        let out = dedupe(&q("$1, $2", vec![a, b]), EqualityMode::Deep).unwrap();
        assert_eq!(out.sql, "$1, $1");
    }

    #[test]
    fn mixed_leaves_scenario() {
        let input = q(
            "WHERE (a = $1) OR (b = $2) AND (status = $3)",
            vec![1.into(), 1.into(), "active".into()],
        );
        let out = dedupe(&input, EqualityMode::Deep).unwrap();
        assert_eq!(out.sql, "WHERE (a = $1) OR (b = $1) AND (status = $2)");
        assert_eq!(out.values, vec![Value::Int(1), Value::from("active")]);
    }

    #[test]
    fn is_idempotent() {
        let input = q(
            "(a = $1) AND (b = $2) AND (c = $3) AND (d = $4)",
            vec!["x".into(), 2.into(), "x".into(), 2.into()],
        );
        for mode in [EqualityMode::Strict, EqualityMode::Deep] {
            let once = dedupe(&input, mode).unwrap();
            let twice = dedupe(&once, mode).unwrap();
            assert_eq!(once, twice);
            assert_eq!(once.sql, "(a = $1) AND (b = $2) AND (c = $1) AND (d = $2)");
        }
    }

    #[test]
    fn null_and_undefined_stay_apart() {
        let input = q("$1, $2, $3", vec![Value::Null, Value::Undefined, Value::Null]);
        let out = dedupe(&input, EqualityMode::Deep).unwrap();
        assert_eq!(out.sql, "$1, $2, $1");
        assert_eq!(out.values, vec![Value::Null, Value::Undefined]);
    }

    #[test]
    fn nan_never_collapses() {
        let input = q("$1, $2", vec![f64::NAN.into(), f64::NAN.into()]);
        for mode in [EqualityMode::Strict, EqualityMode::Deep] {
            let out = dedupe(&input, mode).unwrap();
            assert_eq!(out.sql, "$1, $2");
            assert_eq!(out.param_count(), 2);
        }

        // one slot referenced twice is still one slot
        let input = q("$1, $1", vec![f64::NAN.into()]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out.sql, "$1, $1");
        assert_eq!(out.param_count(), 1);
    }

    #[test]
    fn int_and_float_are_different_kinds() {
        let input = q("$1, $2", vec![1.into(), 1.0.into()]);
        let out = dedupe(&input, EqualityMode::Deep).unwrap();
        assert_eq!(out.param_count(), 2);
    }

    #[test]
    fn placeholders_in_literals_are_left_alone() {
        let input = q("a = $1 AND b = '$1' AND c = $2", vec![5.into(), 5.into()]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out.sql, "a = $1 AND b = '$1' AND c = $1");
    }

    #[test]
    fn reorders_by_first_occurrence() {
        let input = q("y = $2 AND x = $1", vec!["first".into(), "second".into()]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out.sql, "y = $1 AND x = $2");
        assert_eq!(out.values, vec![Value::from("second"), Value::from("first")]);
    }

    #[test]
    fn unreferenced_values_are_dropped() {
        let input = q("", vec![1.into(), 2.into()]);
        let out = dedupe(&input, EqualityMode::Strict).unwrap();
        assert_eq!(out, BuiltQuery::default());
    }

    #[test]
    fn unbound_placeholder_is_an_error() {
        let err = dedupe(&q("a = $3", vec![1.into()]), EqualityMode::Strict).unwrap_err();
        assert!(matches!(
            err,
            StmtError::UnboundPlaceholder {
                index: 3,
                available: 1
            }
        ));

        let err = dedupe(&q("a = $0", vec![1.into()]), EqualityMode::Strict).unwrap_err();
        assert!(matches!(err, StmtError::UnboundPlaceholder { index: 0, .. }));
    }
}
