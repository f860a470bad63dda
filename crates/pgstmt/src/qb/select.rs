//! SELECT query builder composed from statements and subqueries.

use super::{JoinType, SetOperation};
use crate::compose::{Composable, Composer};
use crate::config::BuildOptions;
use crate::dedup::{EqualityMode, dedupe};
use crate::error::{StmtError, StmtResult};
use crate::executor::{Executor, QueryOutput};
use crate::param::BuiltQuery;
use crate::placeholder::check_numbered;
use crate::schema::substitute_schemas;
use crate::statement::{Statement, TextSearch};
use crate::value::{IntoBindings, Value};

#[derive(Debug)]
enum FromSource {
    Table(String),
    Subquery { query: Box<SelectQb>, alias: String },
}

#[derive(Debug)]
struct Join {
    kind: JoinType,
    table: String,
    on: Statement,
}

#[derive(Debug)]
enum CteBody {
    Query(Box<SelectQb>),
    Recursive {
        base: Box<SelectQb>,
        step: Box<SelectQb>,
        union_all: bool,
    },
    /// SQL numbered from `$1` with its values.
    Raw(BuiltQuery),
}

#[derive(Debug)]
struct Cte {
    name: String,
    columns: Vec<String>,
    body: CteBody,
}

/// SELECT query builder.
///
/// Every parameterized part (CTEs, FROM subquery, JOIN ... ON, WHERE, HAVING, set
/// operation branches) is numbered after the parts before it in the output text.
/// The assembled query is deduplicated once in [`SelectQb::build`].
#[derive(Debug)]
#[must_use]
pub struct SelectQb {
    ctes: Vec<Cte>,
    from: FromSource,
    select_cols: Vec<String>,
    distinct: bool,
    joins: Vec<Join>,
    where_stmt: Statement,
    group_by: Vec<String>,
    having_stmt: Statement,
    set_ops: Vec<(SetOperation, SelectQb)>,
    order_clauses: Vec<String>,
    limit: Option<i64>,
    offset: Option<i64>,
    /// Schema names for `{N}` placeholders in table references.
    schemas: Vec<String>,
    /// Slots consumed before this query when it is embedded.
    param_offset: usize,
    /// Embedded queries skip their own deduplication.
    nested: bool,
    options: BuildOptions,
    build_error: Option<StmtError>,
}

impl SelectQb {
    /// Create a new SELECT query builder for a table.
    pub fn new(table: &str) -> Self {
        Self::with_source(FromSource::Table(table.to_string()))
    }

    /// Create a SELECT query builder over a subquery: `FROM (subquery) AS alias`.
    pub fn from_subquery(subquery: SelectQb, alias: &str) -> Self {
        Self::with_source(FromSource::Subquery {
            query: Box::new(subquery),
            alias: alias.to_string(),
        })
    }

    fn with_source(from: FromSource) -> Self {
        Self {
            ctes: Vec::new(),
            from,
            select_cols: vec!["*".to_string()],
            distinct: false,
            joins: Vec::new(),
            where_stmt: Statement::new(),
            group_by: Vec::new(),
            having_stmt: Statement::having(),
            set_ops: Vec::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            schemas: Vec::new(),
            param_offset: 0,
            nested: false,
            options: BuildOptions::default(),
            build_error: None,
        }
    }

    fn record(&mut self, result: StmtResult<()>) {
        if let Err(err) = result {
            // keep the first error
            self.build_error.get_or_insert(err);
        }
    }

    // ==================== Options ====================

    /// Set build options.
    pub fn options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `{N}` in table references against these schema names.
    pub fn schemas(mut self, schemas: &[&str]) -> Self {
        self.schemas = schemas.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Mark this query as a sub-component: its build skips deduplication.
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    /// Get the first error recorded while building, if any.
    pub fn build_error(&self) -> Option<&StmtError> {
        self.build_error.as_ref()
    }

    // ==================== SELECT columns ====================

    /// Set SELECT columns (string form, supports complex expressions).
    pub fn select(mut self, cols: &str) -> Self {
        self.select_cols = vec![cols.to_string()];
        self
    }

    /// Set SELECT columns (array form).
    pub fn select_cols(mut self, cols: &[&str]) -> Self {
        self.select_cols = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Append one SELECT column.
    pub fn add_select(mut self, col: &str) -> Self {
        if self.select_cols.len() == 1 && self.select_cols[0] == "*" {
            self.select_cols[0] = col.to_string();
        } else {
            self.select_cols.push(col.to_string());
        }
        self
    }

    /// SELECT DISTINCT.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    // ==================== CTEs ====================

    /// Add a CTE: `WITH name AS (query)`.
    pub fn with(self, name: &str, query: SelectQb) -> Self {
        self.push_cte(name, &[], CteBody::Query(Box::new(query)))
    }

    /// Add a CTE with explicit column names: `WITH name(a, b) AS (query)`.
    pub fn with_columns(self, name: &str, columns: &[&str], query: SelectQb) -> Self {
        self.push_cte(name, columns, CteBody::Query(Box::new(query)))
    }

    /// Add a recursive CTE: `WITH RECURSIVE name AS (base UNION ALL step)`.
    pub fn with_recursive(self, name: &str, base: SelectQb, step: SelectQb) -> Self {
        self.push_cte(
            name,
            &[],
            CteBody::Recursive {
                base: Box::new(base),
                step: Box::new(step),
                union_all: true,
            },
        )
    }

    /// Add a recursive CTE joined with `UNION` (duplicates removed).
    pub fn with_recursive_union(self, name: &str, base: SelectQb, step: SelectQb) -> Self {
        self.push_cte(
            name,
            &[],
            CteBody::Recursive {
                base: Box::new(base),
                step: Box::new(step),
                union_all: false,
            },
        )
    }

    /// Add a CTE from raw SQL whose placeholders are numbered from `$1`.
    ///
    /// Every `$N` must lie in `1..=values.len()` and every value must be
    /// referenced (a value may be referenced more than once); otherwise
    /// building fails with a placeholder mismatch.
    pub fn with_raw(mut self, name: &str, sql: &str, values: impl IntoBindings) -> Self {
        let values = values.into_bindings();
        self.record(check_numbered(sql, values.len()));
        let body = CteBody::Raw(BuiltQuery::new(sql, values));
        self.push_cte(name, &[], body)
    }

    fn push_cte(mut self, name: &str, columns: &[&str], body: CteBody) -> Self {
        let checked = validate_ident(name)
            .and_then(|()| columns.iter().try_for_each(|c| validate_ident(c)));
        self.record(checked);
        self.ctes.push(Cte {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            body,
        });
        self
    }

    // ==================== JOIN ====================

    /// Add a JOIN with an ON statement.
    pub fn join(mut self, kind: JoinType, table: &str, on: Statement) -> Self {
        self.joins.push(Join {
            kind,
            table: table.to_string(),
            on: on.into_keyword("ON"),
        });
        self
    }

    /// Add INNER JOIN.
    pub fn inner_join(self, table: &str, on: Statement) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Add LEFT JOIN.
    pub fn left_join(self, table: &str, on: Statement) -> Self {
        self.join(JoinType::Left, table, on)
    }

    /// Add RIGHT JOIN.
    pub fn right_join(self, table: &str, on: Statement) -> Self {
        self.join(JoinType::Right, table, on)
    }

    /// Add FULL OUTER JOIN.
    pub fn full_join(self, table: &str, on: Statement) -> Self {
        self.join(JoinType::Full, table, on)
    }

    /// Add CROSS JOIN.
    pub fn cross_join(self, table: &str) -> Self {
        self.join(JoinType::Cross, table, Statement::on())
    }

    // ==================== WHERE conditions (consuming builder) ====================

    /// Join the next WHERE condition with `OR`.
    pub fn or(mut self) -> Self {
        self.where_stmt.or();
        self
    }

    /// Join the next WHERE condition with `AND` (the default).
    pub fn and(mut self) -> Self {
        self.where_stmt.and();
        self
    }

    /// Edit the WHERE statement directly.
    pub fn filter(mut self, f: impl FnOnce(&mut Statement)) -> Self {
        f(&mut self.where_stmt);
        self
    }

    /// Add a nested WHERE group joined with `AND`.
    pub fn and_where(mut self, group: &Statement) -> Self {
        self.where_stmt.and_group(group);
        self
    }

    /// Add a nested WHERE group joined with `OR`.
    pub fn or_where(mut self, group: &Statement) -> Self {
        self.where_stmt.or_group(group);
        self
    }

    /// Add a WHERE condition with `?` placeholders.
    pub fn where_template(mut self, sql: &str, values: impl IntoBindings) -> Self {
        let result = self.where_stmt.raw(sql, values).map(|_| ());
        self.record(result);
        self
    }

    /// Add WHERE: column = value
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.eq(column, value);
        self
    }

    /// Add WHERE: column != value
    pub fn ne(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.ne(column, value);
        self
    }

    /// Add WHERE: column > value
    pub fn gt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.gt(column, value);
        self
    }

    /// Add WHERE: column >= value
    pub fn gte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.gte(column, value);
        self
    }

    /// Add WHERE: column < value
    pub fn lt(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.lt(column, value);
        self
    }

    /// Add WHERE: column <= value
    pub fn lte(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.where_stmt.lte(column, value);
        self
    }

    /// Add WHERE: column LIKE pattern
    pub fn like(mut self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_stmt.like(column, pattern);
        self
    }

    /// Add WHERE: column ILIKE pattern (case-insensitive)
    pub fn ilike(mut self, column: &str, pattern: impl Into<Value>) -> Self {
        self.where_stmt.ilike(column, pattern);
        self
    }

    /// Add WHERE: column IS NULL
    pub fn is_null(mut self, column: &str) -> Self {
        self.where_stmt.is_null(column);
        self
    }

    /// Add WHERE: column IS NOT NULL
    pub fn is_not_null(mut self, column: &str) -> Self {
        self.where_stmt.is_not_null(column);
        self
    }

    /// Add WHERE: column IN (values...)
    pub fn in_list<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_stmt.in_list(column, values);
        self
    }

    /// Add WHERE: column NOT IN (values...)
    pub fn not_in<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_stmt.not_in(column, values);
        self
    }

    /// Add WHERE: column = ANY(array)
    pub fn any<T: Into<Value>>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_stmt.any(column, values);
        self
    }

    /// Add WHERE: column BETWEEN from AND to
    pub fn between(mut self, column: &str, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        self.where_stmt.between(column, from, to);
        self
    }

    /// Add full-text search on a column.
    pub fn search(mut self, column: &str, query: impl Into<Value>, mode: TextSearch) -> Self {
        self.where_stmt.search(column, query, mode);
        self
    }

    /// Add multi-column ILIKE search (OR).
    pub fn multi_ilike(mut self, columns: &[&str], pattern: impl Into<Value>) -> Self {
        self.where_stmt.multi_ilike(columns, pattern);
        self
    }

    /// Add WHERE if value is Some: column = value
    pub fn eq_opt<T: Into<Value>>(mut self, column: &str, value: Option<T>) -> Self {
        self.where_stmt.eq_opt(column, value);
        self
    }

    /// Add WHERE if value is Some: column ILIKE pattern
    pub fn ilike_opt<T: Into<Value>>(mut self, column: &str, pattern: Option<T>) -> Self {
        self.where_stmt.ilike_opt(column, pattern);
        self
    }

    /// Add WHERE if values is Some and non-empty: column IN (values...)
    pub fn in_opt<T: Into<Value>>(mut self, column: &str, values: Option<Vec<T>>) -> Self {
        self.where_stmt.in_opt(column, values);
        self
    }

    // ==================== Subqueries ====================

    /// Add WHERE: EXISTS (subquery)
    pub fn where_exists(mut self, mut subquery: SelectQb) -> Self {
        let result = self.where_stmt.exists(&mut subquery).map(|_| ());
        self.record(result);
        self
    }

    /// Add WHERE: NOT EXISTS (subquery)
    pub fn where_not_exists(mut self, mut subquery: SelectQb) -> Self {
        let result = self.where_stmt.not_exists(&mut subquery).map(|_| ());
        self.record(result);
        self
    }

    /// Add WHERE: column IN (subquery)
    pub fn where_in(mut self, column: &str, mut subquery: SelectQb) -> Self {
        let result = self.where_stmt.in_subquery(column, &mut subquery).map(|_| ());
        self.record(result);
        self
    }

    /// Add WHERE: column NOT IN (subquery)
    pub fn where_not_in(mut self, column: &str, mut subquery: SelectQb) -> Self {
        let result = self
            .where_stmt
            .not_in_subquery(column, &mut subquery)
            .map(|_| ());
        self.record(result);
        self
    }

    // ==================== Grouping ====================

    /// Set GROUP BY columns.
    pub fn group_by(mut self, cols: &[&str]) -> Self {
        self.group_by = cols.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Edit the HAVING statement directly.
    pub fn having(mut self, f: impl FnOnce(&mut Statement)) -> Self {
        f(&mut self.having_stmt);
        self
    }

    /// Add a HAVING condition with `?` placeholders.
    pub fn having_template(mut self, sql: &str, values: impl IntoBindings) -> Self {
        let result = self.having_stmt.raw(sql, values).map(|_| ());
        self.record(result);
        self
    }

    // ==================== Set operations ====================

    /// Combine with another query.
    pub fn set_op(mut self, op: SetOperation, other: SelectQb) -> Self {
        self.set_ops.push((op, other));
        self
    }

    /// Combine with UNION (duplicates removed).
    pub fn union(self, other: SelectQb) -> Self {
        self.set_op(SetOperation::Union, other)
    }

    /// Combine with UNION ALL.
    pub fn union_all(self, other: SelectQb) -> Self {
        self.set_op(SetOperation::UnionAll, other)
    }

    /// Combine with INTERSECT.
    pub fn intersect(self, other: SelectQb) -> Self {
        self.set_op(SetOperation::Intersect, other)
    }

    /// Combine with EXCEPT.
    pub fn except(self, other: SelectQb) -> Self {
        self.set_op(SetOperation::Except, other)
    }

    // ==================== Ordering & Pagination ====================

    /// Add ORDER BY clause.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.order_clauses.push(clause.to_string());
        self
    }

    /// Add ORDER BY column ASC.
    pub fn order_by_asc(mut self, column: &str) -> Self {
        self.order_clauses.push(format!("{column} ASC"));
        self
    }

    /// Add ORDER BY column DESC.
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_clauses.push(format!("{column} DESC"));
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Pagination helper.
    ///
    /// `page` is 1-based (clamped to >= 1).
    /// `per_page` is clamped to >= 1.
    pub fn paginate(mut self, page: i64, per_page: i64) -> Self {
        let p = page.max(1);
        let size = per_page.max(1);
        self.limit = Some(size);
        self.offset = Some((p - 1) * size);
        self
    }

    // ==================== Build ====================

    /// Build the final query numbered from `$1`, deduplicated per the build options.
    pub fn build(&mut self) -> StmtResult<BuiltQuery> {
        let mode = self.options.equality;
        self.build_with(mode)
    }

    /// Build with an explicit equality mode.
    pub fn build_with(&mut self, mode: EqualityMode) -> StmtResult<BuiltQuery> {
        self.param_offset = 0;
        let built = self.assemble(mode)?;
        self.options.log("select", &built);
        Ok(built)
    }

    /// Get the built SQL string (for debugging).
    pub fn to_sql(&mut self) -> StmtResult<String> {
        self.build().map(|built| built.sql)
    }

    /// Build and run through an executor.
    pub async fn fetch(&mut self, executor: &Executor<'_>) -> StmtResult<QueryOutput> {
        let built = self.build()?;
        executor.execute(&built).await
    }

    fn assemble(&mut self, mode: EqualityMode) -> StmtResult<BuiltQuery> {
        let built = self.render()?;
        if self.nested || !self.options.dedupe {
            Ok(built)
        } else {
            dedupe(&built, mode)
        }
    }

    /// Render every part in output order without deduplicating.
    fn render(&mut self) -> StmtResult<BuiltQuery> {
        if let Some(err) = &self.build_error {
            return Err(err.duplicate());
        }

        let mut q = Composer::with_offset(self.param_offset);

        write_ctes(&mut self.ctes, &mut q)?;

        q.push("SELECT ");
        if self.distinct {
            q.push("DISTINCT ");
        }
        q.push(&self.select_cols.join(", "));
        q.push(" FROM ");
        match &mut self.from {
            FromSource::Table(table) => {
                q.push(&substitute_schemas(table, self.schemas.as_slice())?);
            }
            FromSource::Subquery { query, alias } => {
                q.push("(").push_part(query.as_mut())?.push(") AS ").push(alias);
            }
        }

        for join in &mut self.joins {
            let table = substitute_schemas(&join.table, self.schemas.as_slice())?;
            q.push(" ").push(join.kind.to_sql()).push(" ").push(&table);
            if join.on.is_empty() {
                if join.kind != JoinType::Cross {
                    return Err(StmtError::validation(format!(
                        "{} {} requires an ON condition",
                        join.kind.to_sql(),
                        join.table
                    )));
                }
                continue;
            }
            q.push(" ").push_part(&mut join.on)?;
        }

        if !self.where_stmt.is_empty() {
            q.push(" ").push_part(&mut self.where_stmt)?;
        }

        if !self.group_by.is_empty() {
            q.push(" GROUP BY ").push(&self.group_by.join(", "));
        }

        if !self.having_stmt.is_empty() {
            q.push(" ").push_part(&mut self.having_stmt)?;
        }

        for (op, branch) in &mut self.set_ops {
            q.push(" ").push(op.to_sql()).push(" (");
            q.push_part(branch)?.push(")");
        }

        if !self.order_clauses.is_empty() {
            q.push(" ORDER BY ").push(&self.order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            q.push(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            q.push(&format!(" OFFSET {offset}"));
        }

        Ok(q.finish())
    }
}

impl Composable for SelectQb {
    fn reset_offset(&mut self) {
        self.param_offset = 0;
    }

    fn add_offset(&mut self, n: usize) {
        self.param_offset += n;
    }

    fn dedup_suppressed(&self) -> bool {
        self.nested
    }

    fn set_dedup_suppressed(&mut self, suppressed: bool) {
        self.nested = suppressed;
    }

    fn render_fragment(&mut self) -> StmtResult<BuiltQuery> {
        let mode = self.options.equality;
        self.assemble(mode)
    }
}

fn write_ctes(ctes: &mut [Cte], q: &mut Composer) -> StmtResult<()> {
    if ctes.is_empty() {
        return Ok(());
    }

    q.push("WITH ");
    if ctes
        .iter()
        .any(|cte| matches!(cte.body, CteBody::Recursive { .. }))
    {
        q.push("RECURSIVE ");
    }

    for (i, cte) in ctes.iter_mut().enumerate() {
        if i > 0 {
            q.push(", ");
        }
        q.push(&cte.name);
        if !cte.columns.is_empty() {
            q.push("(").push(&cte.columns.join(", ")).push(")");
        }
        q.push(" AS (");
        match &mut cte.body {
            CteBody::Query(query) => {
                q.push_part(query.as_mut())?;
            }
            CteBody::Recursive {
                base,
                step,
                union_all,
            } => {
                q.push_part(base.as_mut())?;
                q.push(if *union_all { " UNION ALL " } else { " UNION " });
                q.push_part(step.as_mut())?;
            }
            CteBody::Raw(built) => {
                q.push_built(built.clone())?;
            }
        }
        q.push(")");
    }
    q.push(" ");
    Ok(())
}

fn validate_ident(name: &str) -> StmtResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c == '_' || c.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(StmtError::validation(format!("invalid identifier: {name:?}")))
    }
}
