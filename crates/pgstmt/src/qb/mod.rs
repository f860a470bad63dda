//! SELECT query builder driving the composition protocol.
//!
//! `SelectQb` assembles CTEs, joins, WHERE/HAVING statements, subqueries and set
//! operations into one `(sql, values)` pair and deduplicates it once.
//!
//! # Example
//!
//! ```ignore
//! use pgstmt::qb;
//!
//! let mut q = qb::select("users")
//!     .select_cols(&["id", "name"])
//!     .eq("status", "active")
//!     .order_by("id")
//!     .limit(10);
//! let built = q.build()?;
//! // SELECT id, name FROM users WHERE (status = $1) ORDER BY id LIMIT 10
//! ```

mod select;


pub use select::SelectQb;

/// Start a SELECT from a table.
pub fn select(table: &str) -> SelectQb {
    SelectQb::new(table)
}

/// Start a SELECT from a subquery: `FROM (subquery) AS alias`.
pub fn select_from(subquery: SelectQb, alias: &str) -> SelectQb {
    SelectQb::from_subquery(subquery, alias)
}

/// Type of SQL JOIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    /// Returns the SQL JOIN keyword.
    pub fn to_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL OUTER JOIN",
            JoinType::Cross => "CROSS JOIN",
        }
    }
}

/// Set operation combining two SELECTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperation {
    /// UNION - combines results, removes duplicates
    Union,
    /// UNION ALL - combines results, keeps duplicates
    UnionAll,
    /// INTERSECT - returns only rows in both queries
    Intersect,
    /// INTERSECT ALL - keeps duplicates
    IntersectAll,
    /// EXCEPT - returns rows in first query but not second
    Except,
    /// EXCEPT ALL - keeps duplicates
    ExceptAll,
}

impl SetOperation {
    /// Returns the SQL keyword.
    pub fn to_sql(&self) -> &'static str {
        match self {
            SetOperation::Union => "UNION",
            SetOperation::UnionAll => "UNION ALL",
            SetOperation::Intersect => "INTERSECT",
            SetOperation::IntersectAll => "INTERSECT ALL",
            SetOperation::Except => "EXCEPT",
            SetOperation::ExceptAll => "EXCEPT ALL",
        }
    }
}
