//! Driver handles.
//!
//! [`Driver`] is the seam between a [`Connection`](crate::db::Connection) and
//! the database client library. Production code uses [`SqlxDriver`], opened
//! by [`SqlxConnector`]; tests inject any other implementation, typically
//! [`MockDriver`](crate::db::mock::MockDriver).

use crate::config::DbSettings;
use crate::db::params::{bind_mysql_param, bind_sqlite_param};
use crate::db::statement::{StatementShape, classify};
use crate::db::types::{RowToValues, decode_rows};
use crate::db::{DatabaseType, Value};
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use futures_util::TryStreamExt;
use futures_util::stream::BoxStream;
use sqlx::mysql::{MySqlConnectOptions, MySqlQueryResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteQueryResult};
use sqlx::{
    ConnectOptions, Connection as _, Either, Executor, MySqlConnection, SqliteConnection,
};
use std::str::FromStr;
use tracing::{debug, info};

/// What a statement handed back, before rows are keyed.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementResult {
    /// A result set: column names plus values in driver order.
    Rows {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
    },
    /// Number of rows changed by the statement.
    Affected(u64),
}

/// A live database handle.
#[async_trait]
pub trait Driver: Send {
    /// Back end this handle talks to.
    fn db_type(&self) -> DatabaseType;

    /// Prepare `sql`, bind `params` positionally and execute it.
    async fn execute_prepared(&mut self, sql: &str, params: &[Value]) -> DbResult<StatementResult>;

    /// Execute `sql` as is, without preparing or binding.
    async fn execute_raw(&mut self, sql: &str) -> DbResult<StatementResult>;

    async fn begin_transaction(&mut self) -> DbResult<()>;

    async fn commit(&mut self) -> DbResult<()>;

    async fn rollback(&mut self) -> DbResult<()>;

    /// Close the handle. The handle is not used again afterwards.
    async fn close(&mut self) -> DbResult<()>;
}

/// Opens driver handles from configuration.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, name: &str, settings: &DbSettings) -> DbResult<Box<dyn Driver>>;
}

/// Back-end specific sqlx connection.
#[derive(Debug)]
pub enum DbHandle {
    MySql(MySqlConnection),
    SQLite(SqliteConnection),
}

/// [`Driver`] backed by a single sqlx connection.
#[derive(Debug)]
pub struct SqlxDriver {
    handle: Option<DbHandle>,
    db_type: DatabaseType,
}

impl SqlxDriver {
    pub fn new(handle: DbHandle) -> Self {
        let db_type = match &handle {
            DbHandle::MySql(_) => DatabaseType::MySql,
            DbHandle::SQLite(_) => DatabaseType::SQLite,
        };
        Self {
            handle: Some(handle),
            db_type,
        }
    }

    /// Open a connection for `settings`.
    pub async fn open(settings: &DbSettings) -> DbResult<Self> {
        let handle = match settings.driver {
            DatabaseType::MySql => {
                let mut options = MySqlConnectOptions::new()
                    .host(&settings.host)
                    .username(&settings.username)
                    .password(&settings.password)
                    .database(&settings.dbname)
                    .charset(&settings.charset_or_default());
                if let Some(port) = settings.port {
                    options = options.port(port);
                }
                let conn = options.connect().await.map_err(|e| {
                    DatabaseError::connection(
                        format!("Failed to connect: {}", e),
                        connection_suggestion(DatabaseType::MySql, &e),
                    )
                })?;
                DbHandle::MySql(conn)
            }
            DatabaseType::SQLite => {
                let options = if settings.dbname == ":memory:" {
                    SqliteConnectOptions::from_str("sqlite::memory:")?
                } else {
                    SqliteConnectOptions::new()
                        .filename(&settings.dbname)
                        .create_if_missing(true)
                };
                let conn = options.connect().await.map_err(|e| {
                    DatabaseError::connection(
                        format!("Failed to connect: {}", e),
                        connection_suggestion(DatabaseType::SQLite, &e),
                    )
                })?;
                DbHandle::SQLite(conn)
            }
        };
        Ok(Self::new(handle))
    }

    fn handle(&mut self) -> DbResult<&mut DbHandle> {
        self.handle
            .as_mut()
            .ok_or_else(|| DatabaseError::driver("Driver handle already closed", None))
    }

    async fn run_control(&mut self, statement: &'static str) -> DbResult<()> {
        crate::impl_db_dispatch!(self.handle()?, {
            MySql(c) => c.execute(statement).await.map(|_| ())?,
            SQLite(c) => c.execute(statement).await.map(|_| ())?,
        });
        Ok(())
    }
}

#[async_trait]
impl Driver for SqlxDriver {
    fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn execute_prepared(&mut self, sql: &str, params: &[Value]) -> DbResult<StatementResult> {
        let shape = classify(sql, self.db_type);
        let result = match self.handle()? {
            DbHandle::MySql(c) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_mysql_param(query, param);
                }
                let (rows, affected) =
                    drain(c.fetch_many(query), MySqlQueryResult::rows_affected).await?;
                outcome(rows, affected, shape)
            }
            DbHandle::SQLite(c) => {
                let mut query = sqlx::query(sql);
                for param in params {
                    query = bind_sqlite_param(query, param);
                }
                let (rows, affected) =
                    drain(c.fetch_many(query), SqliteQueryResult::rows_affected).await?;
                outcome(rows, affected, shape)
            }
        };
        Ok(result)
    }

    async fn execute_raw(&mut self, sql: &str) -> DbResult<StatementResult> {
        let shape = classify(sql, self.db_type);
        let result = match self.handle()? {
            DbHandle::MySql(c) => {
                let (rows, affected) =
                    drain(c.fetch_many(sql), MySqlQueryResult::rows_affected).await?;
                outcome(rows, affected, shape)
            }
            DbHandle::SQLite(c) => {
                let (rows, affected) =
                    drain(c.fetch_many(sql), SqliteQueryResult::rows_affected).await?;
                outcome(rows, affected, shape)
            }
        };
        Ok(result)
    }

    async fn begin_transaction(&mut self) -> DbResult<()> {
        let statement = match self.db_type {
            DatabaseType::MySql => "START TRANSACTION",
            DatabaseType::SQLite => "BEGIN",
        };
        self.run_control(statement).await
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.run_control("COMMIT").await
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.run_control("ROLLBACK").await
    }

    async fn close(&mut self) -> DbResult<()> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        crate::impl_db_dispatch!(handle, {
            MySql(c) => c.close().await?,
            SQLite(c) => c.close().await?,
        });
        Ok(())
    }
}

/// Collect every row and add up the affected counts a statement streams back.
async fn drain<Q, R>(
    mut stream: BoxStream<'_, Result<Either<Q, R>, sqlx::Error>>,
    rows_affected: fn(&Q) -> u64,
) -> DbResult<(Vec<R>, u64)> {
    let mut rows = Vec::new();
    let mut affected = 0;
    while let Some(item) = stream.try_next().await? {
        match item {
            Either::Left(done) => affected += rows_affected(&done),
            Either::Right(row) => rows.push(row),
        }
    }
    Ok((rows, affected))
}

/// Rows win whenever the driver returned any; otherwise the statement's
/// shape decides between an empty result set and an affected count.
fn outcome<R: RowToValues>(rows: Vec<R>, affected: u64, shape: StatementShape) -> StatementResult {
    if rows.is_empty() && shape == StatementShape::Modification {
        return StatementResult::Affected(affected);
    }
    let (columns, rows) = decode_rows(&rows);
    StatementResult::Rows { columns, rows }
}

/// [`Connector`] opening real sqlx connections.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlxConnector;

#[async_trait]
impl Connector for SqlxConnector {
    async fn connect(&self, name: &str, settings: &DbSettings) -> DbResult<Box<dyn Driver>> {
        info!(
            database = %name,
            db_type = %settings.driver,
            host = %settings.host,
            "Connecting to database"
        );
        let driver = SqlxDriver::open(settings).await?;
        debug!(database = %name, "Connected successfully");
        Ok(Box::new(driver))
    }
}

/// Generate a helpful suggestion for connection errors.
fn connection_suggestion(db_type: DatabaseType, error: &sqlx::Error) -> String {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") {
        return format!(
            "Check that the {} server is running and accessible",
            db_type
        );
    }

    if error_str.contains("access denied") || error_str.contains("password") {
        return "Verify the username and password in db_config".to_string();
    }

    if error_str.contains("unknown database") {
        return "Check that the dbname in db_config exists".to_string();
    }

    match db_type {
        DatabaseType::MySql => "Verify host, port and credentials in db_config".to_string(),
        DatabaseType::SQLite => {
            "Verify the file path in dbname exists and is accessible".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_settings() -> DbSettings {
        DbSettings::sqlite(":memory:")
    }

    #[tokio::test]
    async fn test_sqlite_prepared_round_trip() {
        let mut driver = SqlxDriver::open(&memory_settings()).await.unwrap();
        assert_eq!(driver.db_type(), DatabaseType::SQLite);

        let created = driver
            .execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();
        assert_eq!(created, StatementResult::Affected(0));

        let inserted = driver
            .execute_prepared(
                "INSERT INTO t (id, name) VALUES (?, ?)",
                &[Value::Int(1), Value::Text("Jane".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(inserted, StatementResult::Affected(1));

        let selected = driver
            .execute_prepared("SELECT id, name FROM t WHERE id = ?", &[Value::Int(1)])
            .await
            .unwrap();
        assert_eq!(
            selected,
            StatementResult::Rows {
                columns: vec!["id".to_string(), "name".to_string()],
                rows: vec![vec![Value::Int(1), Value::Text("Jane".to_string())]],
            }
        );
    }

    #[tokio::test]
    async fn test_rows_from_returning_clause_are_kept() {
        let mut driver = SqlxDriver::open(&memory_settings()).await.unwrap();
        driver
            .execute_raw("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)")
            .await
            .unwrap();

        let inserted = driver
            .execute_prepared(
                "INSERT INTO t (name) VALUES (?) RETURNING id",
                &[Value::Text("x".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(
            inserted,
            StatementResult::Rows {
                columns: vec!["id".to_string()],
                rows: vec![vec![Value::Int(1)]],
            }
        );

        // Matched nothing: still a result set, just empty
        let deleted = driver
            .execute_raw("DELETE FROM t WHERE id = 42 RETURNING name")
            .await
            .unwrap();
        assert!(matches!(deleted, StatementResult::Rows { ref rows, .. } if rows.is_empty()));
    }

    #[tokio::test]
    async fn test_empty_select_is_a_result_set() {
        let mut driver = SqlxDriver::open(&memory_settings()).await.unwrap();
        driver.execute_raw("CREATE TABLE t (id INTEGER)").await.unwrap();
        let selected = driver
            .execute_prepared("SELECT id FROM t WHERE id = ?", &[Value::Int(1)])
            .await
            .unwrap();
        assert!(matches!(selected, StatementResult::Rows { ref rows, .. } if rows.is_empty()));
    }

    #[tokio::test]
    async fn test_sqlite_driver_error_surfaces() {
        let mut driver = SqlxDriver::open(&memory_settings()).await.unwrap();
        let err = driver
            .execute_prepared("SELECT * FROM missing_table", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Driver { .. }));
    }

    #[tokio::test]
    async fn test_closed_driver_rejects_statements() {
        let mut driver = SqlxDriver::open(&memory_settings()).await.unwrap();
        driver.close().await.unwrap();
        // Second close is a no-op
        driver.close().await.unwrap();
        assert!(driver.execute_raw("SELECT 1").await.is_err());
    }
}
