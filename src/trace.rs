//! Debug output for query helpers.
//!
//! Helpers report the SQL they run, their parameters and results through a
//! [`DebugSink`]. [`TracingSink`] turns these into `tracing` events;
//! [`MemorySink`] keeps them for inspection in tests.

use crate::error::DatabaseError;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error};

pub trait DebugSink: Send + Sync {
    /// Record a single line, e.g. `SQL: SELECT ...`.
    fn trace(&self, line: &str);

    /// Record a labelled structured value.
    fn dump(&self, label: &str, value: &serde_json::Value);

    /// Record a failure and hand the error back for propagation.
    fn fail_database(&self, error: DatabaseError) -> DatabaseError;
}

/// Emits debug output as `tracing` events.
///
/// `trace` and `dump` are silent unless the sink was built with `debug`
/// enabled; failures are always logged.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink {
    debug: bool,
}

impl TracingSink {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }

    pub fn shared(debug: bool) -> Arc<dyn DebugSink> {
        Arc::new(Self::new(debug))
    }
}

impl DebugSink for TracingSink {
    fn trace(&self, line: &str) {
        if self.debug {
            debug!(target: "tac_db::query", "{}", line);
        }
    }

    fn dump(&self, label: &str, value: &serde_json::Value) {
        if self.debug {
            debug!(target: "tac_db::query", label = %label, value = %value, "dump");
        }
    }

    fn fail_database(&self, error: DatabaseError) -> DatabaseError {
        error!(target: "tac_db::query", kind = ?error.kind(), error = %error, "Database failure");
        error
    }
}

/// One recorded [`MemorySink`] entry.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEntry {
    Trace(String),
    Dump(String, serde_json::Value),
    Failure(String),
}

/// Captures entries in memory. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<SinkEntry>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries_mut(&self) -> MutexGuard<'_, Vec<SinkEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.entries_mut().clone()
    }

    pub fn traces(&self) -> Vec<String> {
        self.entries_mut()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Trace(line) => Some(line.clone()),
                _ => None,
            })
            .collect()
    }

    /// Value of the most recent dump with `label`.
    pub fn last_dump(&self, label: &str) -> Option<serde_json::Value> {
        self.entries_mut().iter().rev().find_map(|e| match e {
            SinkEntry::Dump(l, value) if l == label => Some(value.clone()),
            _ => None,
        })
    }

    pub fn failures(&self) -> Vec<String> {
        self.entries_mut()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Failure(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.entries_mut().clear();
    }
}

impl DebugSink for MemorySink {
    fn trace(&self, line: &str) {
        self.entries_mut().push(SinkEntry::Trace(line.to_string()));
    }

    fn dump(&self, label: &str, value: &serde_json::Value) {
        self.entries_mut()
            .push(SinkEntry::Dump(label.to_string(), value.clone()));
    }

    fn fail_database(&self, error: DatabaseError) -> DatabaseError {
        self.entries_mut().push(SinkEntry::Failure(error.to_string()));
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_memory_sink_records_in_order() {
        let sink = MemorySink::new();
        sink.trace("SQL: SELECT 1");
        sink.dump("Parameters", &json!([]));
        sink.dump("Result", &json!([{"1": 1}]));

        assert_eq!(sink.traces(), vec!["SQL: SELECT 1"]);
        assert_eq!(sink.last_dump("Result"), Some(json!([{"1": 1}])));
        assert_eq!(sink.last_dump("Affected rows"), None);
        assert_eq!(sink.entries().len(), 3);

        sink.clear();
        assert!(sink.entries().is_empty());
    }

    #[test]
    fn test_fail_database_returns_the_error() {
        let sink = MemorySink::new();
        let clone = sink.clone();
        let err = clone.fail_database(DatabaseError::empty_result("No proposals found."));
        assert_eq!(err.to_string(), "Empty result error: No proposals found.");
        assert_eq!(sink.failures(), vec!["Empty result error: No proposals found."]);
    }

    #[test]
    fn test_tracing_sink_passes_errors_through() {
        let sink = TracingSink::new(false);
        sink.trace("not emitted");
        let err = sink.fail_database(DatabaseError::connection_closed("tac"));
        assert!(matches!(err, DatabaseError::ConnectionClosed { .. }));
    }
}
