//! In-memory driver for tests and failure injection.
//!
//! A [`MockDriver`] answers statements from a queue of scripted results and
//! records every call it receives. Clones share state, so a test keeps one
//! clone for inspection and hands another to a registry or connection.

use crate::config::DbSettings;
use crate::db::driver::{Connector, Driver, StatementResult};
use crate::db::statement::{StatementShape, classify};
use crate::db::{DatabaseType, Value};
use crate::error::{DatabaseError, DbResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// A call received by a [`MockDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Prepared { sql: String, params: Vec<Value> },
    Raw { sql: String },
    Begin,
    Commit,
    Rollback,
    Close,
}

#[derive(Default)]
struct MockState {
    responses: VecDeque<DbResult<StatementResult>>,
    control_errors: VecDeque<DatabaseError>,
    targeted_errors: Vec<(MockCall, DatabaseError)>,
    calls: Vec<MockCall>,
    closed: bool,
}

/// Scriptable [`Driver`].
#[derive(Clone)]
pub struct MockDriver {
    state: Arc<Mutex<MockState>>,
    db_type: DatabaseType,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::with_type(DatabaseType::MySql)
    }

    pub fn with_type(db_type: DatabaseType) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            db_type,
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a result set for the next statement.
    pub fn push_rows<C, R>(&self, columns: C, rows: R) -> &Self
    where
        C: IntoIterator,
        C::Item: Into<String>,
        R: IntoIterator<Item = Vec<Value>>,
    {
        let result = StatementResult::Rows {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: rows.into_iter().collect(),
        };
        self.state().responses.push_back(Ok(result));
        self
    }

    /// Queue an affected-row count for the next statement.
    pub fn push_affected(&self, rows: u64) -> &Self {
        self.state()
            .responses
            .push_back(Ok(StatementResult::Affected(rows)));
        self
    }

    /// Make the next statement fail with `error`.
    pub fn push_error(&self, error: DatabaseError) -> &Self {
        self.state().responses.push_back(Err(error));
        self
    }

    /// Make the next begin/commit/rollback fail with `error`.
    pub fn fail_next_control(&self, error: DatabaseError) -> &Self {
        self.state().control_errors.push_back(error);
        self
    }

    /// Make the next `call` (one of begin/commit/rollback) fail with
    /// `error`, leaving other control calls alone.
    pub fn fail_next(&self, call: MockCall, error: DatabaseError) -> &Self {
        self.state().targeted_errors.push((call, error));
        self
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state().calls.clone()
    }

    /// Number of scripted responses not consumed yet.
    pub fn pending(&self) -> usize {
        self.state().responses.len()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    /// A boxed handle sharing this driver's state.
    pub fn handle(&self) -> Box<dyn Driver> {
        Box::new(self.clone())
    }

    fn respond(&self, sql: &str, call: MockCall) -> DbResult<StatementResult> {
        let mut state = self.state();
        if state.closed {
            return Err(DatabaseError::driver("mock handle is closed", None));
        }
        state.calls.push(call);
        match state.responses.pop_front() {
            Some(response) => response,
            // Unscripted statements succeed with an empty outcome of the right shape
            None => Ok(match classify(sql, self.db_type) {
                StatementShape::ResultSet => StatementResult::Rows {
                    columns: Vec::new(),
                    rows: Vec::new(),
                },
                StatementShape::Modification => StatementResult::Affected(0),
            }),
        }
    }

    fn control(&self, call: MockCall) -> DbResult<()> {
        let mut state = self.state();
        if state.closed {
            return Err(DatabaseError::driver("mock handle is closed", None));
        }
        let targeted = state.targeted_errors.iter().position(|(c, _)| *c == call);
        state.calls.push(call);
        if let Some(idx) = targeted {
            return Err(state.targeted_errors.remove(idx).1);
        }
        match state.control_errors.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("MockDriver")
            .field("db_type", &self.db_type)
            .field("pending", &state.responses.len())
            .field("calls", &state.calls.len())
            .field("closed", &state.closed)
            .finish()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn db_type(&self) -> DatabaseType {
        self.db_type
    }

    async fn execute_prepared(&mut self, sql: &str, params: &[Value]) -> DbResult<StatementResult> {
        self.respond(
            sql,
            MockCall::Prepared {
                sql: sql.to_string(),
                params: params.to_vec(),
            },
        )
    }

    async fn execute_raw(&mut self, sql: &str) -> DbResult<StatementResult> {
        self.respond(
            sql,
            MockCall::Raw {
                sql: sql.to_string(),
            },
        )
    }

    async fn begin_transaction(&mut self) -> DbResult<()> {
        self.control(MockCall::Begin)
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.control(MockCall::Commit)
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.control(MockCall::Rollback)
    }

    async fn close(&mut self) -> DbResult<()> {
        let mut state = self.state();
        state.calls.push(MockCall::Close);
        state.closed = true;
        Ok(())
    }
}

/// [`Connector`] handing out clones of one [`MockDriver`].
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    driver: MockDriver,
    connects: Arc<AtomicUsize>,
}

impl MockConnector {
    pub fn new(driver: MockDriver) -> Self {
        Self {
            driver,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of handles opened so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _name: &str, _settings: &DbSettings) -> DbResult<Box<dyn Driver>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        // Widen the window for racing callers
        tokio::task::yield_now().await;
        Ok(self.driver.handle())
    }
}
