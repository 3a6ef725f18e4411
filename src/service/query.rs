//! Query helpers shared by every service.
//!
//! Each helper traces the SQL it runs and dumps its parameters and outcome
//! to a [`DebugSink`], then translates failures into the layered
//! [`DatabaseError`] variants callers match on.

use crate::db::{Connection, QueryOutput, ResultMode, Row, Value};
use crate::error::{DatabaseError, DbResult};
use crate::trace::DebugSink;
use serde::Serialize;

fn to_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Value {
    serde_json::to_value(value).unwrap_or_default()
}

pub async fn start_transaction(conn: &Connection) -> DbResult<()> {
    conn.begin_transaction().await
}

pub async fn commit_transaction(conn: &Connection) -> DbResult<()> {
    conn.commit().await
}

pub async fn rollback_transaction(conn: &Connection) -> DbResult<()> {
    conn.rollback().await
}

/// Run a statement that must return rows.
///
/// Every failure, including a statement that produced no result set, is
/// reported as [`DatabaseError::Select`].
pub async fn execute_select_query(
    conn: &Connection,
    sink: &dyn DebugSink,
    sql: &str,
    params: &[Value],
    mode: ResultMode,
) -> DbResult<Vec<Row>> {
    sink.trace(&format!("SQL: {}", sql));
    sink.dump("Parameters", &to_json(params));

    let rows = match conn.execute_query(sql, params, mode).await {
        Ok(QueryOutput::Rows(rows)) => rows,
        Ok(QueryOutput::Affected(_)) => {
            return Err(DatabaseError::select(DatabaseError::unexpected_outcome(
                format!("Query did not produce a result set: {}", sql),
            )));
        }
        Err(e) => return Err(DatabaseError::select(e)),
    };

    sink.dump("Result", &to_json(&rows));
    Ok(rows)
}

/// Select rows keyed by column name, failing when there are none.
pub async fn fetch_data_with_query(
    conn: &Connection,
    sink: &dyn DebugSink,
    sql: &str,
    params: &[Value],
    error_message: &str,
) -> DbResult<Vec<Row>> {
    let rows = execute_select_query(conn, sink, sql, params, ResultMode::Assoc).await?;
    ensure_not_empty(&rows, error_message, sink)?;
    Ok(rows)
}

pub fn ensure_not_empty(rows: &[Row], error_message: &str, sink: &dyn DebugSink) -> DbResult<()> {
    if rows.is_empty() {
        return Err(sink.fail_database(DatabaseError::empty_result(error_message)));
    }
    Ok(())
}

/// Run an INSERT/UPDATE/DELETE and return the number of affected rows.
///
/// Every failure, including a statement that produced a result set, is
/// reported as [`DatabaseError::Update`].
pub async fn execute_update_query(
    conn: &Connection,
    sink: &dyn DebugSink,
    sql: &str,
    params: &[Value],
) -> DbResult<u64> {
    sink.trace(&format!("SQL: {}", sql));
    sink.dump("Parameters", &to_json(params));

    let affected = match conn.execute_query(sql, params, ResultMode::Assoc).await {
        Ok(QueryOutput::Affected(count)) => count,
        Ok(QueryOutput::Rows(_)) => {
            return Err(DatabaseError::update(DatabaseError::unexpected_outcome(
                format!("Query produced a result set: {}", sql),
            )));
        }
        Err(e) => return Err(DatabaseError::update(e)),
    };

    sink.dump("Affected rows", &serde_json::Value::from(affected));
    Ok(affected)
}

/// Run a mutation and check it touched exactly `rows_expected` rows.
///
/// The check runs after the statement; callers that need the change undone
/// on a mismatch run this inside a transaction and roll back.
pub async fn modify_data_with_query(
    conn: &Connection,
    sink: &dyn DebugSink,
    sql: &str,
    params: &[Value],
    rows_expected: u64,
    error_message: &str,
) -> DbResult<u64> {
    let affected = execute_update_query(conn, sink, sql, params).await?;
    ensure_valid_row_count(affected, rows_expected, error_message, sink)?;
    Ok(affected)
}

pub fn ensure_valid_row_count(
    affected: u64,
    rows_expected: u64,
    error_message: &str,
    sink: &dyn DebugSink,
) -> DbResult<()> {
    if affected == 0 || affected != rows_expected {
        return Err(sink.fail_database(DatabaseError::row_count(
            error_message,
            rows_expected,
            affected,
        )));
    }
    Ok(())
}

/// Direction keyword for an ORDER BY clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl From<bool> for SortOrder {
    fn from(ascending: bool) -> Self {
        if ascending { Self::Asc } else { Self::Desc }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// `"ASC"` or `"DESC"`.
pub fn sort_string(ascending: bool) -> &'static str {
    SortOrder::from(ascending).as_sql()
}
