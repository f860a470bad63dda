//! Typed condition helpers.
//!
//! Each helper builds one leaf from a column and its values and joins it with the
//! pending combinator (`AND` unless [`Statement::or`] was called).

use super::fragment::{Combinator, ConditionFragment, LeafBuilder};
use super::Statement;
use crate::compose::{Composable, render_detached};
use crate::error::StmtResult;
use crate::value::Value;

/// Full-text query parser used by [`Statement::search`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextSearch {
    /// `plainto_tsquery`: words are ANDed, punctuation ignored.
    #[default]
    Plain,
    /// `phraseto_tsquery`: words must appear in order.
    Phrase,
    /// `websearch_to_tsquery`: quoted phrases, `or` and `-term`.
    Websearch,
    /// `to_tsquery`: raw tsquery syntax.
    Raw,
}

impl TextSearch {
    /// Returns the tsquery constructor function.
    pub fn function(&self) -> &'static str {
        match self {
            TextSearch::Plain => "plainto_tsquery",
            TextSearch::Phrase => "phraseto_tsquery",
            TextSearch::Websearch => "websearch_to_tsquery",
            TextSearch::Raw => "to_tsquery",
        }
    }
}

impl Statement {
    fn compare(&mut self, column: &str, op: &str, value: Value) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push(column).push(" ").push(op).push(" ").bind(value);
        self.push_leaf(leaf)
    }

    fn unary(&mut self, column: &str, op: &str) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push(column).push(" ").push(op);
        self.push_leaf(leaf)
    }

    fn constant(&mut self, sql: &str) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push(sql);
        self.push_leaf(leaf)
    }

    /// Add a condition: column = value
    pub fn eq(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "=", value.into())
    }

    /// Add a condition: column != value
    pub fn ne(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "!=", value.into())
    }

    /// Add a condition: column > value
    pub fn gt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, ">", value.into())
    }

    /// Add a condition: column >= value
    pub fn gte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, ">=", value.into())
    }

    /// Add a condition: column < value
    pub fn lt(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "<", value.into())
    }

    /// Add a condition: column <= value
    pub fn lte(&mut self, column: &str, value: impl Into<Value>) -> &mut Self {
        self.compare(column, "<=", value.into())
    }

    /// Add a condition: column LIKE pattern
    pub fn like(&mut self, column: &str, pattern: impl Into<Value>) -> &mut Self {
        self.compare(column, "LIKE", pattern.into())
    }

    /// Add a condition: column ILIKE pattern (case-insensitive)
    pub fn ilike(&mut self, column: &str, pattern: impl Into<Value>) -> &mut Self {
        self.compare(column, "ILIKE", pattern.into())
    }

    /// Add a condition: column NOT LIKE pattern
    pub fn not_like(&mut self, column: &str, pattern: impl Into<Value>) -> &mut Self {
        self.compare(column, "NOT LIKE", pattern.into())
    }

    /// Add a condition: column NOT ILIKE pattern
    pub fn not_ilike(&mut self, column: &str, pattern: impl Into<Value>) -> &mut Self {
        self.compare(column, "NOT ILIKE", pattern.into())
    }

    /// Add a condition: column = ANY(array)
    ///
    /// Binds the whole list to a single placeholder.
    pub fn any<T: Into<Value>>(&mut self, column: &str, values: Vec<T>) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push(column).push(" = ANY(").bind(Value::array(values)).push(")");
        self.push_leaf(leaf)
    }

    /// Add a condition: column IS NULL
    pub fn is_null(&mut self, column: &str) -> &mut Self {
        self.unary(column, "IS NULL")
    }

    /// Add a condition: column IS NOT NULL
    pub fn is_not_null(&mut self, column: &str) -> &mut Self {
        self.unary(column, "IS NOT NULL")
    }

    /// Add a condition: column IN (values...)
    ///
    /// An empty list renders `1=0`.
    pub fn in_list<T: Into<Value>>(&mut self, column: &str, values: Vec<T>) -> &mut Self {
        self.list(column, "IN", values, "1=0")
    }

    /// Add a condition: column NOT IN (values...)
    ///
    /// An empty list renders `1=1`.
    pub fn not_in<T: Into<Value>>(&mut self, column: &str, values: Vec<T>) -> &mut Self {
        self.list(column, "NOT IN", values, "1=1")
    }

    fn list<T: Into<Value>>(
        &mut self,
        column: &str,
        op: &str,
        values: Vec<T>,
        when_empty: &str,
    ) -> &mut Self {
        if values.is_empty() {
            return self.constant(when_empty);
        }
        let mut leaf = LeafBuilder::new();
        leaf.push(column)
            .push(" ")
            .push(op)
            .push(" (")
            .bind_list(values.into_iter().map(Into::into).collect())
            .push(")");
        self.push_leaf(leaf)
    }

    /// Add a condition: column BETWEEN from AND to
    pub fn between(
        &mut self,
        column: &str,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> &mut Self {
        self.range(column, "BETWEEN", from.into(), to.into())
    }

    /// Add a condition: column NOT BETWEEN from AND to
    pub fn not_between(
        &mut self,
        column: &str,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> &mut Self {
        self.range(column, "NOT BETWEEN", from.into(), to.into())
    }

    fn range(&mut self, column: &str, op: &str, from: Value, to: Value) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push(column)
            .push(" ")
            .push(op)
            .push(" ")
            .bind(from)
            .push(" AND ")
            .bind(to);
        self.push_leaf(leaf)
    }

    /// Add full-text search: to_tsvector(column) @@ <parser>(query)
    pub fn search(&mut self, column: &str, query: impl Into<Value>, mode: TextSearch) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push("to_tsvector(")
            .push(column)
            .push(") @@ ")
            .push(mode.function())
            .push("(")
            .bind(query.into())
            .push(")");
        self.push_leaf(leaf)
    }

    /// Add full-text search with an explicit text search configuration.
    ///
    /// The configuration is bound on both sides of `@@`.
    pub fn search_with_config(
        &mut self,
        config: &str,
        column: &str,
        query: impl Into<Value>,
        mode: TextSearch,
    ) -> &mut Self {
        let mut leaf = LeafBuilder::new();
        leaf.push("to_tsvector(")
            .bind(Value::from(config))
            .push("::regconfig, ")
            .push(column)
            .push(") @@ ")
            .push(mode.function())
            .push("(")
            .bind(Value::from(config))
            .push("::regconfig, ")
            .bind(query.into())
            .push(")");
        self.push_leaf(leaf)
    }

    /// Add the same ILIKE pattern over several columns as one OR group.
    pub fn multi_ilike(&mut self, columns: &[&str], pattern: impl Into<Value>) -> &mut Self {
        if columns.is_empty() {
            return self;
        }
        let pattern = pattern.into();
        let mut group = Statement::group();
        for column in columns {
            group.or().ilike(column, pattern.clone());
        }
        let combinator = self.next_combinator();
        self.add_group(&group, combinator)
    }

    // ==================== Subqueries ====================

    /// Add a condition: EXISTS (subquery)
    pub fn exists<C: Composable + ?Sized>(&mut self, subquery: &mut C) -> StmtResult<&mut Self> {
        self.subquery("EXISTS (", subquery)
    }

    /// Add a condition: NOT EXISTS (subquery)
    pub fn not_exists<C: Composable + ?Sized>(
        &mut self,
        subquery: &mut C,
    ) -> StmtResult<&mut Self> {
        self.subquery("NOT EXISTS (", subquery)
    }

    /// Add a condition: column IN (subquery)
    pub fn in_subquery<C: Composable + ?Sized>(
        &mut self,
        column: &str,
        subquery: &mut C,
    ) -> StmtResult<&mut Self> {
        self.subquery(&format!("{column} IN ("), subquery)
    }

    /// Add a condition: column NOT IN (subquery)
    pub fn not_in_subquery<C: Composable + ?Sized>(
        &mut self,
        column: &str,
        subquery: &mut C,
    ) -> StmtResult<&mut Self> {
        self.subquery(&format!("{column} NOT IN ("), subquery)
    }

    /// Render the subquery on its own numbering and re-embed its slots.
    fn subquery<C: Composable + ?Sized>(
        &mut self,
        prefix: &str,
        subquery: &mut C,
    ) -> StmtResult<&mut Self> {
        let built = render_detached(subquery)?;
        let inner = ConditionFragment::from_numbered(&built.sql, built.values, Combinator::None)?;
        let mut leaf = LeafBuilder::new();
        leaf.push(prefix).append(&inner).push(")");
        Ok(self.push_leaf(leaf))
    }

    // ========== Optional value methods ==========

    /// Add a condition if value is Some: column = value
    pub fn eq_opt<T: Into<Value>>(&mut self, column: &str, value: Option<T>) -> &mut Self {
        match value {
            Some(v) => self.eq(column, v),
            None => self,
        }
    }

    /// Add a condition if value is Some: column LIKE pattern
    pub fn like_opt<T: Into<Value>>(&mut self, column: &str, pattern: Option<T>) -> &mut Self {
        match pattern {
            Some(v) => self.like(column, v),
            None => self,
        }
    }

    /// Add a condition if value is Some: column ILIKE pattern
    pub fn ilike_opt<T: Into<Value>>(&mut self, column: &str, pattern: Option<T>) -> &mut Self {
        match pattern {
            Some(v) => self.ilike(column, v),
            None => self,
        }
    }

    /// Add a condition if values is Some and non-empty: column IN (values...)
    pub fn in_opt<T: Into<Value>>(&mut self, column: &str, values: Option<Vec<T>>) -> &mut Self {
        match values {
            Some(v) if !v.is_empty() => self.in_list(column, v),
            _ => self,
        }
    }
}
