//! Core traits for the connection boundary.
//!
//! - [`Session`]: one open database connection with its own transaction
//! - [`Connector`]: opens sessions from a [`ConnectionConfig`]
//!
//! Every engine operation is written against these traits and issues plain
//! SQL text. The only bound parameters are row values for the batched insert.
//! Sessions are blocking; the orchestrator runs each job on a blocking worker
//! and never shares a session between jobs.

use crate::config::ConnectionConfig;
use crate::error::Result;

use super::value::Row;

/// A blocking database session.
pub trait Session {
    /// Run a query and collect every row.
    fn query(&mut self, sql: &str) -> Result<Vec<Row>>;

    /// Column names a query would return, without fetching rows.
    fn describe(&mut self, sql: &str) -> Result<Vec<String>>;

    /// Run a query and hand rows to `sink` one at a time, fetching at most
    /// `fetch_size` rows per round trip. An error from `sink` stops the fetch
    /// and is returned unchanged.
    fn stream(
        &mut self,
        sql: &str,
        fetch_size: usize,
        sink: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<()>;

    /// Execute a statement, returning the affected row count (0 for DDL).
    fn execute(&mut self, sql: &str) -> Result<u64>;

    /// Execute a parameterized statement for every row of the batch.
    fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<()>;

    /// Switch auto-commit on or off.
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<()>;
}

/// Opens sessions.
pub trait Connector: Send + Sync {
    /// Open a new session; the caller owns it until dropped.
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>>;
}
