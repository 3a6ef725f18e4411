//! Back-end dispatch and parameter-list macros.
//!
//! These declarative macros keep the per-back-end code paths linear to read.
//! They expand at compile time with zero runtime overhead.

use serde::{Deserialize, Serialize};

/// Database back end behind a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    /// Includes MariaDB
    #[default]
    #[serde(alias = "mariadb")]
    MySql,
    #[serde(alias = "sqlite3")]
    SQLite,
}

impl DatabaseType {
    /// Parse the back end from a connection URL scheme.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Self::MySql),
            "sqlite" | "sqlite3" => Some(Self::SQLite),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    pub fn default_port(&self) -> Option<u16> {
        match self {
            Self::MySql => Some(3306),
            Self::SQLite => None,
        }
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Macro for generating back-end dispatch match arms over `DbHandle`.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(handle, {
///     MySql(c) => do_mysql(c),
///     SQLite(c) => do_sqlite(c),
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($handle:expr, { $($variant:ident($c:ident) => $body:expr),+ $(,)? }) => {
        match $handle {
            $(
                $crate::db::driver::DbHandle::$variant($c) => $body,
            )+
        }
    };
}

/// Build a `Vec<Value>` parameter list from anything convertible into `Value`.
///
/// ```
/// use tac_db::params;
/// use tac_db::db::Value;
///
/// let p = params!["Jane Doe", 1];
/// assert_eq!(p, vec![Value::Text("Jane Doe".to_string()), Value::Int(1)]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        ::std::vec::Vec::<$crate::db::Value>::new()
    };
    ($($param:expr),+ $(,)?) => {
        ::std::vec![$($crate::db::Value::from($param)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Value;

    #[test]
    fn test_database_type_from_scheme() {
        assert_eq!(DatabaseType::from_scheme("mysql"), Some(DatabaseType::MySql));
        assert_eq!(DatabaseType::from_scheme("MariaDB"), Some(DatabaseType::MySql));
        assert_eq!(DatabaseType::from_scheme("sqlite"), Some(DatabaseType::SQLite));
        assert_eq!(DatabaseType::from_scheme("postgres"), None);
    }

    #[test]
    fn test_database_type_serde() {
        let t: DatabaseType = serde_json::from_str("\"sqlite\"").unwrap();
        assert_eq!(t, DatabaseType::SQLite);
        let t: DatabaseType = serde_json::from_str("\"mariadb\"").unwrap();
        assert_eq!(t, DatabaseType::MySql);
        assert_eq!(DatabaseType::default(), DatabaseType::MySql);
    }

    #[test]
    fn test_params_macro() {
        let empty = params![];
        assert!(empty.is_empty());

        let p = params!["x", 2, 1.5, None::<i64>];
        assert_eq!(
            p,
            vec![
                Value::Text("x".to_string()),
                Value::Int(2),
                Value::Float(1.5),
                Value::Null
            ]
        );
    }
}
