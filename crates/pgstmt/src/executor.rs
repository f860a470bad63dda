//! Forwarding built queries to whatever can run them.
//!
//! [`Executor`] is resolved once per call: a plain async function, a client
//! (`tokio_postgres::Client` or `Transaction`), or a manager that lends a client
//! for the duration of one query. Every form yields a [`QueryOutput`].

use std::fmt;
use std::future::Future;

use crate::error::{StmtError, StmtResult};
use crate::param::BuiltQuery;
use futures_core::future::BoxFuture;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// Rows returned by an executor.
#[derive(Debug, Default)]
pub struct QueryOutput {
    pub rows: Vec<Row>,
}

impl QueryOutput {
    /// Wrap a row set.
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    /// Get the number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl From<Vec<Row>> for QueryOutput {
    fn from(rows: Vec<Row>) -> Self {
        Self::new(rows)
    }
}

/// Anything that can run SQL with positional parameters.
pub trait RunQuery: Send + Sync {
    fn run<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, StmtResult<Vec<Row>>>;
}

impl RunQuery for tokio_postgres::Client {
    fn run<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, StmtResult<Vec<Row>>> {
        Box::pin(async move {
            tokio_postgres::Client::query(self, sql, params)
                .await
                .map_err(StmtError::from_db_error)
        })
    }
}

impl RunQuery for tokio_postgres::Transaction<'_> {
    fn run<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, StmtResult<Vec<Row>>> {
        Box::pin(async move {
            tokio_postgres::Transaction::query(self, sql, params)
                .await
                .map_err(StmtError::from_db_error)
        })
    }
}

/// Lends a client for a single query (for example a pool).
pub trait ClientManager: Send + Sync {
    fn acquire(&self) -> BoxFuture<'_, StmtResult<Box<dyn RunQuery + '_>>>;
}

#[cfg(feature = "pool")]
struct PooledClient(deadpool_postgres::Object);

#[cfg(feature = "pool")]
impl RunQuery for PooledClient {
    fn run<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a (dyn ToSql + Sync)],
    ) -> BoxFuture<'a, StmtResult<Vec<Row>>> {
        Box::pin(async move {
            self.0
                .query(sql, params)
                .await
                .map_err(StmtError::from_db_error)
        })
    }
}

/// The pooled client is returned to the pool when the query completes.
#[cfg(feature = "pool")]
impl ClientManager for deadpool_postgres::Pool {
    fn acquire(&self) -> BoxFuture<'_, StmtResult<Box<dyn RunQuery + '_>>> {
        Box::pin(async move {
            let client = self.get().await?;
            Ok(Box::new(PooledClient(client)) as Box<dyn RunQuery>)
        })
    }
}

type QueryFn = dyn Fn(BuiltQuery) -> BoxFuture<'static, StmtResult<QueryOutput>> + Send + Sync;

/// The execution primitive a built query is forwarded to.
pub enum Executor<'a> {
    /// An async function taking the built query.
    Function(Box<QueryFn>),
    /// A client or transaction.
    Client(&'a dyn RunQuery),
    /// A manager that lends a client per query.
    Manager(&'a dyn ClientManager),
}

impl fmt::Debug for Executor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Executor::Function(_) => "Executor::Function",
            Executor::Client(_) => "Executor::Client",
            Executor::Manager(_) => "Executor::Manager",
        })
    }
}

impl<'a> Executor<'a> {
    /// Wrap an async function.
    pub fn function<F, Fut>(f: F) -> Self
    where
        F: Fn(BuiltQuery) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = StmtResult<QueryOutput>> + Send + 'static,
    {
        Executor::Function(Box::new(
            move |built| -> BoxFuture<'static, StmtResult<QueryOutput>> { Box::pin(f(built)) },
        ))
    }

    /// Wrap a client or transaction.
    pub fn client(client: &'a dyn RunQuery) -> Self {
        Executor::Client(client)
    }

    /// Wrap a client manager.
    pub fn manager(manager: &'a dyn ClientManager) -> Self {
        Executor::Manager(manager)
    }

    fn kind(&self) -> &'static str {
        match self {
            Executor::Function(_) => "function",
            Executor::Client(_) => "client",
            Executor::Manager(_) => "manager",
        }
    }

    /// Run a built query.
    pub async fn execute(&self, built: &BuiltQuery) -> StmtResult<QueryOutput> {
        tracing::debug!(
            target: "pgstmt.sql",
            executor = self.kind(),
            param_count = built.param_count(),
            sql = %built.sql,
            "executing query"
        );

        match self {
            Executor::Function(f) => f(built.clone()).await,
            Executor::Client(client) => {
                let params = built.params_ref();
                client.run(&built.sql, &params).await.map(QueryOutput::new)
            }
            Executor::Manager(manager) => {
                let client = manager.acquire().await?;
                let params = built.params_ref();
                client.run(&built.sql, &params).await.map(QueryOutput::new)
            }
        }
    }
}
