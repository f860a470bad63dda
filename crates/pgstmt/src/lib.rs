//! # pgstmt
//!
//! Parameterized PostgreSQL predicates that compose.
//!
//! ## Features
//!
//! - **Statements**: boolean expression trees of `AND`/`OR` leaves and groups, rendered
//!   to `$N` placeholders with a parallel values list
//! - **Offsets**: every statement owns a cursor that can be shifted so independently
//!   built parts number after one another
//! - **Composition**: joins, subqueries, CTEs and set operations are spliced with their
//!   values kept aligned
//! - **Deduplication**: the assembled query is rewritten once so equal values share a
//!   placeholder, by identity (strict) or structurally (deep)
//! - **Execution**: a built query can be forwarded to a function, a client/transaction
//!   or a client manager
//!
//! ## Example
//!
//! ```ignore
//! use pgstmt::{qb, Statement};
//!
//! let mut on = Statement::on();
//! on.raw("o.user_id = u.id", ())?.eq("o.status", "paid");
//!
//! let mut q = qb::select("users u")
//!     .inner_join("orders o", on)
//!     .eq("u.status", "paid")
//!     .where_in("u.org_id", qb::select("orgs").select("id").eq("plan", "pro"));
//!
//! let built = q.build()?;
//! // SELECT * FROM users u INNER JOIN orders o ON (o.user_id = u.id) AND (o.status = $1)
//! //   WHERE (u.status = $1) AND (u.org_id IN (SELECT id FROM orgs WHERE (plan = $2)))
//! let rows = client.query(&built.sql, &built.params_ref()).await?;
//! ```

pub mod compose;
pub mod config;
pub mod dedup;
pub mod error;
pub mod executor;
pub mod param;
mod placeholder;
pub mod qb;
pub mod schema;
pub mod statement;
pub mod value;

pub use compose::{Composable, Composer, shift_placeholders};
pub use config::BuildOptions;
pub use dedup::{EqualityMode, dedupe};
pub use error::{StmtError, StmtResult};
pub use executor::{ClientManager, Executor, QueryOutput, RunQuery};
pub use param::{BuiltQuery, ParamCursor};
pub use qb::{SelectQb, SetOperation, select, select_from};
pub use schema::substitute_schemas;
pub use statement::{Combinator, ConditionFragment, Statement, TextSearch};
pub use value::{FnDescriptor, IntoBindings, StructuralEq, Value};
