//! Named connection registry.
//!
//! One [`Connection`] per configured database name, created on first use and
//! shared afterwards. The registry is an ordinary value: construct one at
//! start-up and pass it (or a clone) to whatever needs database access.
//!
//! Each name gets its own `OnceCell`, so racing first lookups of one name
//! open a single connection while lookups of other names never wait on it.
//! The map lock is only held to find or insert a cell, never across a
//! connect.

use crate::config::ConfigSource;
use crate::db::connection::Connection;
use crate::db::driver::{Connector, Driver, SqlxConnector};
use crate::error::{DatabaseError, DbResult};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

type ConnectionCell = Arc<OnceCell<Arc<Connection>>>;

#[derive(Clone)]
pub struct ConnectionRegistry {
    config: Arc<dyn ConfigSource>,
    connector: Arc<dyn Connector>,
    connections: Arc<RwLock<HashMap<String, ConnectionCell>>>,
}

impl ConnectionRegistry {
    /// Create a registry that opens real connections.
    pub fn new(config: Arc<dyn ConfigSource>) -> Self {
        Self::with_connector(config, Arc::new(SqlxConnector))
    }

    /// Create a registry that opens handles through `connector`.
    pub fn with_connector(config: Arc<dyn ConfigSource>, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            connections: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get or create the cell for `name`.
    async fn cell(&self, name: &str) -> ConnectionCell {
        {
            let connections = self.connections.read().await;
            if let Some(cell) = connections.get(name) {
                return Arc::clone(cell);
            }
        }
        let mut connections = self.connections.write().await;
        // Double-check after acquiring write lock
        Arc::clone(
            connections
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new())),
        )
    }

    /// Shared connection for `name`, connecting on first use.
    ///
    /// `debug` only applies when the connection is created; later callers
    /// get the existing instance unchanged.
    pub async fn get_instance(&self, name: &str, debug: bool) -> DbResult<Arc<Connection>> {
        if let Some(existing) = self.existing(name).await {
            return Ok(existing);
        }

        let settings = self
            .config
            .database(name)
            .ok_or_else(|| DatabaseError::configuration(name))?;

        let cell = self.cell(name).await;
        let connection = cell
            .get_or_try_init(|| async move {
                info!(database = %name, db_type = %settings.driver, "Opening connection");
                let handle = self.connector.connect(name, &settings).await?;
                Ok::<_, DatabaseError>(Arc::new(Connection::new(name, debug, handle)))
            })
            .await?;
        Ok(Arc::clone(connection))
    }

    /// Like [`get_instance`](Self::get_instance), but registers `handle`
    /// instead of connecting.
    ///
    /// `name` must still be configured. When a connection for `name` already
    /// exists, `handle` is dropped and the existing instance returned.
    pub async fn get_instance_with_handle(
        &self,
        name: &str,
        debug: bool,
        handle: Box<dyn Driver>,
    ) -> DbResult<Arc<Connection>> {
        if let Some(existing) = self.existing(name).await {
            debug!(database = %name, "Connection exists, ignoring supplied handle");
            return Ok(existing);
        }

        if self.config.database(name).is_none() {
            return Err(DatabaseError::configuration(name));
        }

        let cell = self.cell(name).await;
        let connection = cell
            .get_or_init(|| async move { Arc::new(Connection::new(name, debug, handle)) })
            .await;
        Ok(Arc::clone(connection))
    }

    /// The initialized connection for `name`, if any.
    async fn existing(&self, name: &str) -> Option<Arc<Connection>> {
        let connections = self.connections.read().await;
        connections.get(name).and_then(|cell| cell.get()).cloned()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.existing(name).await.is_some()
    }

    /// Names with a live registry entry, sorted.
    pub async fn names(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        let mut names: Vec<String> = connections
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    pub async fn len(&self) -> usize {
        let connections = self.connections.read().await;
        connections.values().filter(|cell| cell.get().is_some()).count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Close and forget the connection for `name`.
    ///
    /// The next lookup creates a fresh connection. Holders of the old
    /// instance see it as closed. Returns `false` when nothing was registered.
    pub async fn reset(&self, name: &str) -> DbResult<bool> {
        let removed = self.connections.write().await.remove(name);
        match removed.as_ref().and_then(|cell| cell.get()) {
            Some(connection) => {
                info!(database = %name, "Resetting connection");
                connection.close_connection().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Close every registered connection and empty the registry.
    pub async fn close_all(&self) {
        let drained: Vec<(String, ConnectionCell)> =
            self.connections.write().await.drain().collect();
        for (name, cell) in drained {
            let Some(connection) = cell.get() else {
                continue;
            };
            if let Err(e) = connection.close_connection().await {
                warn!(database = %name, error = %e, "Failed to close connection");
            }
        }
    }
}

impl std::fmt::Debug for ConnectionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionRegistry").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DbConfig, DbSettings};
    use crate::db::mock::{MockCall, MockConnector, MockDriver};
    use crate::db::row::ResultMode;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Holds connects to "archive" until released.
    struct StallingConnector {
        inner: MockConnector,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Connector for StallingConnector {
        async fn connect(&self, name: &str, settings: &DbSettings) -> DbResult<Box<dyn Driver>> {
            if name == "archive" {
                self.release.notified().await;
            }
            self.inner.connect(name, settings).await
        }
    }

    fn config() -> Arc<dyn ConfigSource> {
        Arc::new(
            DbConfig::new()
                .with_database("test_db", DbSettings::mysql("localhost", "tac", "secret", "tac"))
                .with_database("archive", DbSettings::mysql("localhost", "tac", "secret", "old")),
        )
    }

    fn mock_registry() -> (ConnectionRegistry, MockConnector, MockDriver) {
        let mock = MockDriver::new();
        let connector = MockConnector::new(mock.clone());
        let registry = ConnectionRegistry::with_connector(config(), Arc::new(connector.clone()));
        (registry, connector, mock)
    }

    #[tokio::test]
    async fn test_same_name_returns_same_instance() {
        let (registry, connector, _) = mock_registry();

        let first = registry.get_instance("test_db", false).await.unwrap();
        let second = registry.get_instance("test_db", true).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        // Later debug flags are ignored
        assert!(!second.debug());
        assert_eq!(connector.connect_count(), 1);

        let other = registry.get_instance("archive", false).await.unwrap();
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(registry.names().await, vec!["archive", "test_db"]);
    }

    #[tokio::test]
    async fn test_unconfigured_name_is_rejected() {
        let (registry, connector, _) = mock_registry();

        let err = registry.get_instance("nope", false).await.unwrap_err();
        assert_eq!(err.to_string(), "Database configuration for 'nope' not found.");
        assert_eq!(connector.connect_count(), 0);
        assert!(registry.is_empty().await);

        let err = registry
            .get_instance_with_handle("nope", false, MockDriver::new().handle())
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_injected_handle_is_used() {
        let (registry, connector, _) = mock_registry();
        let injected = MockDriver::new();
        injected.push_affected(1);

        let conn = registry
            .get_instance_with_handle("test_db", false, injected.handle())
            .await
            .unwrap();
        conn.execute_query("DELETE FROM t", &[], ResultMode::Assoc)
            .await
            .unwrap();
        assert_eq!(injected.calls().len(), 1);
        assert_eq!(connector.connect_count(), 0);

        // An existing entry wins over a second handle
        let ignored = MockDriver::new();
        let again = registry
            .get_instance_with_handle("test_db", false, ignored.handle())
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&conn, &again));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_lookups_connect_once() {
        let (registry, connector, _) = mock_registry();

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.get_instance("test_db", false).await })
            })
            .collect();

        let mut connections = Vec::new();
        for task in tasks {
            connections.push(task.await.unwrap().unwrap());
        }
        assert_eq!(connector.connect_count(), 1);
        assert!(connections.iter().all(|c| Arc::ptr_eq(c, &connections[0])));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_slow_connect_does_not_block_other_names() {
        let connector = MockConnector::new(MockDriver::new());
        let release = Arc::new(Notify::new());
        let registry = ConnectionRegistry::with_connector(
            config(),
            Arc::new(StallingConnector {
                inner: connector.clone(),
                release: Arc::clone(&release),
            }),
        );
        let ready = registry.get_instance("test_db", false).await.unwrap();

        let stalled = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.get_instance("archive", false).await })
        };
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert!(!registry.contains("archive").await);

        let again = tokio::time::timeout(
            Duration::from_secs(5),
            registry.get_instance("test_db", false),
        )
        .await
        .expect("lookup of a registered name waited on another connect")
        .unwrap();
        assert!(Arc::ptr_eq(&ready, &again));

        release.notify_one();
        stalled.await.unwrap().unwrap();
        assert_eq!(registry.names().await, vec!["archive", "test_db"]);
        assert_eq!(connector.connect_count(), 2);
    }

    #[tokio::test]
    async fn test_reset_closes_and_recreates() {
        let (registry, connector, mock) = mock_registry();

        let old = registry.get_instance("test_db", false).await.unwrap();
        assert!(registry.reset("test_db").await.unwrap());
        assert!(old.is_closed().await);
        assert!(!registry.contains("test_db").await);
        assert!(!registry.reset("test_db").await.unwrap());

        let new = registry.get_instance("test_db", false).await.unwrap();
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(connector.connect_count(), 2);
        assert!(mock.calls().contains(&MockCall::Close));
    }

    #[tokio::test]
    async fn test_close_all_empties_registry() {
        let (registry, _, _) = mock_registry();
        let a = registry.get_instance("test_db", false).await.unwrap();
        let b = registry.get_instance("archive", false).await.unwrap();
        assert_eq!(registry.len().await, 2);

        registry.close_all().await;
        assert!(registry.is_empty().await);
        assert!(a.is_closed().await);
        assert!(b.is_closed().await);
    }
}
