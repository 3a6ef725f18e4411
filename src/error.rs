//! Error types for the TAC database layer.
//!
//! Every layer reports failures through [`DatabaseError`]. Messages keep the
//! wording callers of the proposal manager already match on, while each
//! variant carries the structured context (SQL text, row counts, wrapped
//! cause) needed to act on the failure programmatically.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Database configuration for '{name}' not found.")]
    Configuration { name: String },

    #[error("Invalid database configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Connection '{name}' is closed.")]
    ConnectionClosed { name: String },

    #[error("Database error: {message}")]
    Driver {
        message: String,
        /// e.g. "23000" for an integrity constraint violation
        sql_state: Option<String>,
    },

    #[error("Execute failed for query: {sql}")]
    Execute {
        sql: String,
        #[source]
        source: Box<DatabaseError>,
    },

    #[error("Invalid query parameters: {message}")]
    InvalidParameters { message: String },

    #[error("{message}")]
    UnexpectedOutcome { message: String },

    #[error("Error executing SELECT query: {source}")]
    Select {
        #[source]
        source: Box<DatabaseError>,
    },

    #[error("Error executing INSERT/UPDATE/DELETE query: {source}")]
    Update {
        #[source]
        source: Box<DatabaseError>,
    },

    #[error("Empty result error: {message}")]
    EmptyResult { message: String },

    #[error("Unexpected row-count error: {message} {}", row_count_reason(.actual))]
    RowCount {
        message: String,
        expected: u64,
        actual: u64,
    },
}

fn row_count_reason(actual: &u64) -> &'static str {
    if *actual == 0 {
        "No rows were affected."
    } else {
        "Unexpected number of affected rows."
    }
}

/// Coarse classification of a [`DatabaseError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Statement,
    InvalidParameters,
    EmptyResult,
    RowCount,
}

impl DatabaseError {
    /// Missing `db_config` entry for `name`.
    pub fn configuration(name: impl Into<String>) -> Self {
        Self::Configuration { name: name.into() }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn connection_closed(name: impl Into<String>) -> Self {
        Self::ConnectionClosed { name: name.into() }
    }

    /// Create a driver error with optional SQL state.
    pub fn driver(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Driver {
            message: message.into(),
            sql_state,
        }
    }

    /// Wrap a failed prepare/execute step for `sql`.
    pub fn execute(sql: impl Into<String>, source: DatabaseError) -> Self {
        Self::Execute {
            sql: sql.into(),
            source: Box::new(source),
        }
    }

    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        Self::InvalidParameters {
            message: message.into(),
        }
    }

    pub fn unexpected_outcome(message: impl Into<String>) -> Self {
        Self::UnexpectedOutcome {
            message: message.into(),
        }
    }

    pub fn select(source: DatabaseError) -> Self {
        Self::Select {
            source: Box::new(source),
        }
    }

    pub fn update(source: DatabaseError) -> Self {
        Self::Update {
            source: Box::new(source),
        }
    }

    pub fn empty_result(message: impl Into<String>) -> Self {
        Self::EmptyResult {
            message: message.into(),
        }
    }

    pub fn row_count(message: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::RowCount {
            message: message.into(),
            expected,
            actual,
        }
    }

    /// Classify this error. Wrappers report the kind of what they wrap.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } | Self::InvalidConfig { .. } => ErrorKind::Configuration,
            Self::Connection { .. } | Self::ConnectionClosed { .. } => ErrorKind::Connection,
            Self::Driver { .. } | Self::Execute { .. } | Self::UnexpectedOutcome { .. } => {
                ErrorKind::Statement
            }
            Self::InvalidParameters { .. } => ErrorKind::InvalidParameters,
            Self::Select { source } | Self::Update { source } => source.kind(),
            Self::EmptyResult { .. } => ErrorKind::EmptyResult,
            Self::RowCount { .. } => ErrorKind::RowCount,
        }
    }

    /// The innermost error of a wrapped chain.
    pub fn root_cause(&self) -> &DatabaseError {
        match self {
            Self::Execute { source, .. } | Self::Select { source } | Self::Update { source } => {
                source.root_cause()
            }
            _ => self,
        }
    }

    /// The SQL text this error refers to, if any layer recorded it.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Self::Execute { sql, .. } => Some(sql),
            Self::Select { source } | Self::Update { source } => source.sql(),
            _ => None,
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self.root_cause() {
            Self::Connection { suggestion, .. } => Some(suggestion),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DatabaseError.
impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DatabaseError::connection(
                msg.to_string(),
                "Check the host, credentials and schema in db_config",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DatabaseError::driver(db_err.message(), code)
            }
            sqlx::Error::Io(io_err) => DatabaseError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DatabaseError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DatabaseError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnDecode { index, source } => {
                DatabaseError::driver(format!("Failed to decode column {}: {}", index, source), None)
            }
            other => DatabaseError::driver(other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DatabaseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message() {
        let err = DatabaseError::configuration("test_db");
        assert_eq!(
            err.to_string(),
            "Database configuration for 'test_db' not found."
        );
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_execute_message_and_source() {
        let err = DatabaseError::execute(
            "SELEC 1",
            DatabaseError::driver("syntax error", Some("42000".to_string())),
        );
        assert_eq!(err.to_string(), "Execute failed for query: SELEC 1");
        assert_eq!(err.sql(), Some("SELEC 1"));

        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "Database error: syntax error");
    }

    #[test]
    fn test_select_wrapping_adds_one_line_of_context() {
        let err = DatabaseError::select(DatabaseError::execute(
            "SELECT * FROM missing",
            DatabaseError::driver("no such table", None),
        ));
        assert_eq!(
            err.to_string(),
            "Error executing SELECT query: Execute failed for query: SELECT * FROM missing"
        );
        assert_eq!(err.kind(), ErrorKind::Statement);
        assert_eq!(err.sql(), Some("SELECT * FROM missing"));
        assert!(matches!(err.root_cause(), DatabaseError::Driver { .. }));
    }

    #[test]
    fn test_update_wrapping() {
        let err = DatabaseError::update(DatabaseError::connection_closed("tac"));
        assert_eq!(
            err.to_string(),
            "Error executing INSERT/UPDATE/DELETE query: Connection 'tac' is closed."
        );
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_empty_result_message() {
        let err = DatabaseError::empty_result("No proposal found.");
        assert_eq!(err.to_string(), "Empty result error: No proposal found.");
        assert_eq!(err.kind(), ErrorKind::EmptyResult);
    }

    #[test]
    fn test_row_count_messages() {
        let none = DatabaseError::row_count("Could not update proposal.", 1, 0);
        assert_eq!(
            none.to_string(),
            "Unexpected row-count error: Could not update proposal. No rows were affected."
        );

        let many = DatabaseError::row_count("Could not update proposal.", 1, 2);
        assert_eq!(
            many.to_string(),
            "Unexpected row-count error: Could not update proposal. Unexpected number of affected rows."
        );
        assert_eq!(many.kind(), ErrorKind::RowCount);
    }

    #[test]
    fn test_suggestion_from_root_cause() {
        let err = DatabaseError::select(DatabaseError::connection("refused", "Start the server"));
        assert_eq!(err.suggestion(), Some("Start the server"));
        assert_eq!(DatabaseError::empty_result("x").suggestion(), None);
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: DatabaseError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, DatabaseError::Driver { .. }));

        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err: DatabaseError = sqlx::Error::Io(io).into();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
