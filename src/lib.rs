//! TAC database access layer.
//!
//! Named MySQL/SQLite connections shared through a [`ConnectionRegistry`],
//! prepared and raw statement execution, explicit transactions, and the
//! query helpers domain services build on ([`QueryExecutor`]).

pub mod config;
pub mod db;
pub mod error;
pub mod service;
pub mod trace;

pub use config::{Config, ConfigSource, DbConfig, DbSettings};
pub use db::{Connection, ConnectionRegistry, QueryOutput, ResultMode, Row, Value};
pub use error::{DatabaseError, DbResult, ErrorKind};
pub use service::{QueryExecutor, QueryService, SortOrder};
pub use trace::{DebugSink, MemorySink, TracingSink};
