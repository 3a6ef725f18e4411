//! Database abstraction layer.
//!
//! This module provides database access functionality:
//! - Named connection registry with one shared connection per database
//! - Prepared and raw statement execution, explicit transactions
//! - Value and row types, type-code parameter binding
//! - Statement classification (result set vs. modification)
//! - Driver seam with sqlx and in-memory implementations
//! - Database dispatch macros for reducing code duplication

pub mod connection;
pub mod driver;
#[macro_use]
pub mod macros;
pub mod mock;
pub(crate) mod params;
pub mod registry;
pub mod row;
pub mod statement;
pub mod types;
pub mod value;

pub use connection::Connection;
pub use driver::{Connector, DbHandle, Driver, SqlxConnector, SqlxDriver, StatementResult};
pub use macros::DatabaseType;
pub use mock::{MockCall, MockConnector, MockDriver};
pub use registry::ConnectionRegistry;
pub use row::{ColumnKey, QueryOutput, ResultMode, Row};
pub use statement::{StatementShape, classify};
pub use value::{Value, bind_type_codes};
