//! Statement classification.
//!
//! The driver reports rows whenever a statement streams any back. When it
//! streams none, the statement's shape decides between an empty result set
//! and an affected-row count. Classification uses sqlparser with the back
//! end's dialect and falls back to the leading keyword for SQL the parser does
//! not understand.

use crate::db::DatabaseType;
use sqlparser::ast::Statement;
use sqlparser::dialect::{Dialect, MySqlDialect, SQLiteDialect};
use sqlparser::parser::Parser;

/// Leading keywords of statements that return rows.
const RESULT_SET_KEYWORDS: &[&str] = &[
    "SELECT", "SHOW", "DESCRIBE", "DESC", "EXPLAIN", "WITH", "PRAGMA", "VALUES", "CALL",
];

/// Shape of a statement as far as result handling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementShape {
    /// SELECT and other statements producing rows
    ResultSet,
    /// INSERT, UPDATE, DELETE, DDL and everything else
    Modification,
}

fn dialect_for(db_type: DatabaseType) -> Box<dyn Dialect> {
    match db_type {
        DatabaseType::MySql => Box::new(MySqlDialect {}),
        DatabaseType::SQLite => Box::new(SQLiteDialect {}),
    }
}

/// Classify `sql` for the given back end.
pub fn classify(sql: &str, db_type: DatabaseType) -> StatementShape {
    let dialect = dialect_for(db_type);
    match Parser::parse_sql(dialect.as_ref(), sql) {
        Ok(statements) if !statements.is_empty() => {
            // The last statement decides what the driver hands back.
            match statements.last() {
                Some(stmt) if returns_rows(stmt) => StatementShape::ResultSet,
                _ => StatementShape::Modification,
            }
        }
        _ => classify_by_keyword(sql),
    }
}

fn returns_rows(stmt: &Statement) -> bool {
    match stmt {
        Statement::Insert(insert) => return insert.returning.is_some(),
        Statement::Update(update) => return update.returning.is_some(),
        Statement::Delete(delete) => return delete.returning.is_some(),
        _ => {}
    }
    matches!(
        stmt,
        Statement::Query(_)
            | Statement::Call { .. }
            | Statement::Explain { .. }
            | Statement::ExplainTable { .. }
            | Statement::ShowCreate { .. }
            | Statement::ShowTables { .. }
            | Statement::ShowColumns { .. }
            | Statement::ShowDatabases { .. }
            | Statement::ShowSchemas { .. }
            | Statement::ShowFunctions { .. }
            | Statement::ShowVariable { .. }
            | Statement::ShowVariables { .. }
            | Statement::ShowStatus { .. }
            | Statement::ShowCollation { .. }
            | Statement::Pragma { .. }
    )
}

fn classify_by_keyword(sql: &str) -> StatementShape {
    let first = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    if RESULT_SET_KEYWORDS.contains(&first.as_str()) {
        StatementShape::ResultSet
    } else {
        StatementShape::Modification
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_is_result_set() {
        assert_eq!(
            classify("SELECT * FROM proposals WHERE id = ?", DatabaseType::MySql),
            StatementShape::ResultSet
        );
        assert_eq!(
            classify("WITH p AS (SELECT 1) SELECT * FROM p", DatabaseType::SQLite),
            StatementShape::ResultSet
        );
        assert_eq!(
            classify("SHOW TABLES", DatabaseType::MySql),
            StatementShape::ResultSet
        );
    }

    #[test]
    fn test_writes_are_modifications() {
        for sql in [
            "UPDATE t SET name = ? WHERE id = ?",
            "INSERT INTO t (name) VALUES (?)",
            "DELETE FROM t WHERE id = 3",
            "CREATE TABLE t (id INT PRIMARY KEY)",
        ] {
            assert_eq!(
                classify(sql, DatabaseType::MySql),
                StatementShape::Modification,
                "{}",
                sql
            );
        }
    }

    #[test]
    fn test_returning_and_call_are_result_sets() {
        assert_eq!(
            classify("INSERT INTO t (name) VALUES (?) RETURNING id", DatabaseType::SQLite),
            StatementShape::ResultSet
        );
        assert_eq!(
            classify("DELETE FROM t WHERE id = 1 RETURNING name", DatabaseType::SQLite),
            StatementShape::ResultSet
        );
        assert_eq!(
            classify("CALL pending_reviews(?)", DatabaseType::MySql),
            StatementShape::ResultSet
        );
    }

    #[test]
    fn test_unparseable_falls_back_to_keyword() {
        assert_eq!(
            classify("  select weird syntax ~~~", DatabaseType::MySql),
            StatementShape::ResultSet
        );
        assert_eq!(
            classify("UPDATEE broken", DatabaseType::MySql),
            StatementShape::Modification
        );
        assert_eq!(classify("", DatabaseType::SQLite), StatementShape::Modification);
    }
}
