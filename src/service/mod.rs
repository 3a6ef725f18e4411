//! Query service layer.
//!
//! [`QueryExecutor`] is the vocabulary domain services build on: implement
//! the two accessors and every helper comes for free. [`QueryService`] is the
//! stock implementation. The helpers are also available as free functions in
//! [`query`] for code that holds a bare [`Connection`].

pub mod query;

pub use query::{
    SortOrder, commit_transaction, ensure_not_empty, ensure_valid_row_count,
    execute_select_query, execute_update_query, fetch_data_with_query, modify_data_with_query,
    rollback_transaction, sort_string, start_transaction,
};

use crate::db::{Connection, ConnectionRegistry, ResultMode, Row, Value};
use crate::error::DbResult;
use crate::trace::{DebugSink, TracingSink};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn connection(&self) -> &Connection;

    fn sink(&self) -> &dyn DebugSink;

    async fn start_transaction(&self) -> DbResult<()> {
        query::start_transaction(self.connection()).await
    }

    async fn commit_transaction(&self) -> DbResult<()> {
        query::commit_transaction(self.connection()).await
    }

    async fn rollback_transaction(&self) -> DbResult<()> {
        query::rollback_transaction(self.connection()).await
    }

    async fn execute_select_query(
        &self,
        sql: &str,
        params: &[Value],
        mode: ResultMode,
    ) -> DbResult<Vec<Row>> {
        query::execute_select_query(self.connection(), self.sink(), sql, params, mode).await
    }

    async fn fetch_data_with_query(
        &self,
        sql: &str,
        params: &[Value],
        error_message: &str,
    ) -> DbResult<Vec<Row>> {
        query::fetch_data_with_query(self.connection(), self.sink(), sql, params, error_message)
            .await
    }

    async fn execute_update_query(&self, sql: &str, params: &[Value]) -> DbResult<u64> {
        query::execute_update_query(self.connection(), self.sink(), sql, params).await
    }

    async fn modify_data_with_query(
        &self,
        sql: &str,
        params: &[Value],
        rows_expected: u64,
        error_message: &str,
    ) -> DbResult<u64> {
        query::modify_data_with_query(
            self.connection(),
            self.sink(),
            sql,
            params,
            rows_expected,
            error_message,
        )
        .await
    }

    fn ensure_not_empty(&self, rows: &[Row], error_message: &str) -> DbResult<()> {
        query::ensure_not_empty(rows, error_message, self.sink())
    }

    fn ensure_valid_row_count(
        &self,
        affected: u64,
        rows_expected: u64,
        error_message: &str,
    ) -> DbResult<()> {
        query::ensure_valid_row_count(affected, rows_expected, error_message, self.sink())
    }

    fn sort_string(&self, ascending: bool) -> &'static str {
        query::sort_string(ascending)
    }
}

/// A connection paired with a debug sink.
#[derive(Clone)]
pub struct QueryService {
    connection: Arc<Connection>,
    sink: Arc<dyn DebugSink>,
}

impl QueryService {
    /// Service tracing through `tracing` when the connection has debug on.
    pub fn new(connection: Arc<Connection>) -> Self {
        let sink = TracingSink::shared(connection.debug());
        Self { connection, sink }
    }

    pub fn with_sink(connection: Arc<Connection>, sink: Arc<dyn DebugSink>) -> Self {
        Self { connection, sink }
    }

    /// Service over the registry's connection for `name`.
    pub async fn open(registry: &ConnectionRegistry, name: &str, debug: bool) -> DbResult<Self> {
        let connection = registry.get_instance(name, debug).await?;
        Ok(Self::new(connection))
    }

    pub fn shared_connection(&self) -> Arc<Connection> {
        Arc::clone(&self.connection)
    }
}

impl QueryExecutor for QueryService {
    fn connection(&self) -> &Connection {
        &self.connection
    }

    fn sink(&self) -> &dyn DebugSink {
        self.sink.as_ref()
    }
}

impl std::fmt::Debug for QueryService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryService")
            .field("connection", &self.connection)
            .finish_non_exhaustive()
    }
}
