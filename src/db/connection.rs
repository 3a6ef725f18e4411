//! A named, long-lived database connection.

use crate::db::driver::{Driver, StatementResult};
use crate::db::row::{QueryOutput, ResultMode, Row};
use crate::db::{DatabaseType, Value};
use crate::error::{DatabaseError, DbResult};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// One open handle to a configured database.
///
/// Statements and transaction calls are serialized through an internal
/// mutex. Once closed, every call fails with
/// [`DatabaseError::ConnectionClosed`].
pub struct Connection {
    name: String,
    debug: bool,
    db_type: DatabaseType,
    handle: Mutex<Option<Box<dyn Driver>>>,
}

impl Connection {
    pub fn new(name: impl Into<String>, debug: bool, handle: Box<dyn Driver>) -> Self {
        Self {
            name: name.into(),
            debug,
            db_type: handle.db_type(),
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Logical database name this connection was created for.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    fn open_driver<'a>(
        &self,
        slot: &'a mut Option<Box<dyn Driver>>,
    ) -> DbResult<&'a mut Box<dyn Driver>> {
        slot.as_mut()
            .ok_or_else(|| DatabaseError::connection_closed(&self.name))
    }

    /// Prepare and execute `sql` with positional `params`.
    ///
    /// Returns the rows keyed per `mode` when the statement produced a
    /// result set, the affected-row count otherwise.
    pub async fn execute_query(
        &self,
        sql: &str,
        params: &[Value],
        mode: ResultMode,
    ) -> DbResult<QueryOutput> {
        if self.debug {
            debug!(database = %self.name, sql = %sql, params = params.len(), "Executing prepared statement");
        }
        let mut guard = self.handle.lock().await;
        let driver = self.open_driver(&mut guard)?;
        let result = driver
            .execute_prepared(sql, params)
            .await
            .map_err(|e| DatabaseError::execute(sql, e))?;
        Ok(self.build_output(result, mode))
    }

    /// Execute `sql` without binding; rows are keyed by column name.
    pub async fn execute_raw_query(&self, sql: &str) -> DbResult<QueryOutput> {
        if self.debug {
            debug!(database = %self.name, sql = %sql, "Executing raw statement");
        }
        let mut guard = self.handle.lock().await;
        let driver = self.open_driver(&mut guard)?;
        let result = driver
            .execute_raw(sql)
            .await
            .map_err(|e| DatabaseError::execute(sql, e))?;
        Ok(self.build_output(result, ResultMode::Assoc))
    }

    fn build_output(&self, result: StatementResult, mode: ResultMode) -> QueryOutput {
        match result {
            StatementResult::Rows { columns, rows } => {
                if self.debug {
                    debug!(database = %self.name, rows = rows.len(), "Statement returned rows");
                }
                QueryOutput::Rows(
                    rows.into_iter()
                        .map(|values| Row::from_columns(&columns, values, mode))
                        .collect(),
                )
            }
            StatementResult::Affected(count) => {
                if self.debug {
                    debug!(database = %self.name, affected = count, "Statement affected rows");
                }
                QueryOutput::Affected(count)
            }
        }
    }

    pub async fn begin_transaction(&self) -> DbResult<()> {
        let mut guard = self.handle.lock().await;
        let driver = self.open_driver(&mut guard)?;
        if self.debug {
            debug!(database = %self.name, "Beginning transaction");
        }
        driver.begin_transaction().await
    }

    pub async fn commit(&self) -> DbResult<()> {
        let mut guard = self.handle.lock().await;
        let driver = self.open_driver(&mut guard)?;
        if self.debug {
            debug!(database = %self.name, "Committing transaction");
        }
        driver.commit().await
    }

    pub async fn rollback(&self) -> DbResult<()> {
        let mut guard = self.handle.lock().await;
        let driver = self.open_driver(&mut guard)?;
        if self.debug {
            debug!(database = %self.name, "Rolling back transaction");
        }
        driver.rollback().await
    }

    /// Close the underlying handle. Closing twice is a no-op.
    pub async fn close_connection(&self) -> DbResult<()> {
        let Some(mut driver) = self.handle.lock().await.take() else {
            return Ok(());
        };
        debug!(database = %self.name, "Closing connection");
        driver.close().await.inspect_err(|e| {
            warn!(database = %self.name, error = %e, "Error while closing connection");
        })
    }

    pub async fn is_closed(&self) -> bool {
        self.handle.lock().await.is_none()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("name", &self.name)
            .field("debug", &self.debug)
            .field("db_type", &self.db_type)
            .finish_non_exhaustive()
    }
}
