//! Scripted in-memory sessions for unit tests.
//!
//! A [`FakeDb`] answers queries whose SQL contains a registered needle, logs
//! every statement and transaction event, and tracks rows that reached a
//! commit. [`FakeConnector`] hands out sessions on fake databases keyed by the
//! connection's endpoint.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::config::ConnectionConfig;
use crate::core::traits::{Connector, Session};
use crate::core::value::{Row, SqlValue};
use crate::error::{MigrateError, Result};

/// Transaction and statement events recorded by a fake session.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Query(String),
    Execute(String),
    Batch(String, usize),
    AutoCommit(bool),
    Commit,
    Rollback,
}

#[derive(Default)]
struct State {
    responses: Vec<(String, Vec<Vec<Row>>)>,
    columns: Vec<(String, Vec<String>)>,
    failures: Vec<(String, String)>,
    deletable: Vec<(String, u64)>,
    events: Vec<Event>,
    staged_rows: usize,
    committed_rows: usize,
    staged_deletes: u64,
    committed_deletes: u64,
}

impl State {
    fn failure(&self, sql: &str) -> Option<String> {
        self.failures
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, msg)| msg.clone())
    }

    fn rows_for(&mut self, sql: &str) -> Vec<Row> {
        for (needle, queue) in self.responses.iter_mut() {
            if sql.contains(needle.as_str()) {
                return if queue.len() > 1 {
                    queue.remove(0)
                } else {
                    queue.first().cloned().unwrap_or_default()
                };
            }
        }
        Vec::new()
    }
}

/// A scripted database shared by every session opened on it.
#[derive(Clone, Default)]
pub struct FakeDb {
    state: Arc<Mutex<State>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer queries containing `needle` with `rows`. Registering the same
    /// needle again queues another answer; the last answer repeats.
    pub fn on_query(&self, needle: &str, rows: Vec<Row>) -> &Self {
        let mut state = self.state.lock().unwrap();
        if let Some((_, queue)) = state.responses.iter_mut().find(|(n, _)| n == needle) {
            queue.push(rows);
        } else {
            state.responses.push((needle.to_string(), vec![rows]));
        }
        self
    }

    /// Describe queries containing `needle` with these column names.
    pub fn on_describe(&self, needle: &str, columns: &[&str]) -> &Self {
        self.state.lock().unwrap().columns.push((
            needle.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Fail any statement containing `needle`.
    pub fn fail_on(&self, needle: &str, message: &str) -> &Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .push((needle.to_string(), message.to_string()));
        self
    }

    /// Let `DELETE` statements containing `needle` remove up to `rows` rows,
    /// honouring the `ROWNUM <= n` bound in the statement.
    pub fn deletable(&self, needle: &str, rows: u64) -> &Self {
        self.state
            .lock()
            .unwrap()
            .deletable
            .push((needle.to_string(), rows));
        self
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    /// Statements passed to `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Execute(sql) => Some(sql),
                _ => None,
            })
            .collect()
    }

    pub fn commits(&self) -> usize {
        self.events().iter().filter(|e| **e == Event::Commit).count()
    }

    pub fn committed_rows(&self) -> usize {
        self.state.lock().unwrap().committed_rows
    }

    pub fn committed_deletes(&self) -> u64 {
        self.state.lock().unwrap().committed_deletes
    }

    pub fn session(&self) -> FakeSession {
        FakeSession { db: self.clone() }
    }
}

/// Session over a [`FakeDb`].
pub struct FakeSession {
    db: FakeDb,
}

impl Session for FakeSession {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Query(sql.to_string()));
        if let Some(msg) = state.failure(sql) {
            return Err(MigrateError::Database(msg));
        }
        Ok(state.rows_for(sql))
    }

    fn describe(&mut self, sql: &str) -> Result<Vec<String>> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Query(sql.to_string()));
        if let Some(msg) = state.failure(sql) {
            return Err(MigrateError::Database(msg));
        }
        Ok(state
            .columns
            .iter()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, cols)| cols.clone())
            .unwrap_or_default())
    }

    fn stream(
        &mut self,
        sql: &str,
        _fetch_size: usize,
        sink: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<()> {
        // Release the lock before calling the sink; it may write to this db.
        let rows = self.query(sql)?;
        for row in rows {
            sink(row)?;
        }
        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Execute(sql.to_string()));
        if let Some(msg) = state.failure(sql) {
            return Err(MigrateError::Database(msg));
        }
        if !sql.trim_start().starts_with("DELETE") {
            return Ok(0);
        }
        let limit = sql
            .rsplit("ROWNUM <= ")
            .next()
            .and_then(|n| n.trim().parse::<u64>().ok())
            .unwrap_or(u64::MAX);
        let mut affected = 0;
        for (needle, remaining) in state.deletable.iter_mut() {
            if sql.contains(needle.as_str()) {
                affected = (*remaining).min(limit);
                *remaining -= affected;
                break;
            }
        }
        state.staged_deletes += affected;
        Ok(affected)
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<()> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Batch(sql.to_string(), rows.len()));
        if let Some(msg) = state.failure(sql) {
            return Err(MigrateError::Database(msg));
        }
        state.staged_rows += rows.len();
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.db
            .state
            .lock()
            .unwrap()
            .events
            .push(Event::AutoCommit(enabled));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Commit);
        state.committed_rows += state.staged_rows;
        state.staged_rows = 0;
        state.committed_deletes += state.staged_deletes;
        state.staged_deletes = 0;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let mut state = self.db.state.lock().unwrap();
        state.events.push(Event::Rollback);
        state.staged_rows = 0;
        state.staged_deletes = 0;
        Ok(())
    }
}

/// Connector resolving endpoints to fake databases.
#[derive(Clone, Default)]
pub struct FakeConnector {
    dbs: HashMap<String, FakeDb>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_db(mut self, endpoint: &str, db: FakeDb) -> Self {
        self.dbs.insert(endpoint.to_string(), db);
        self
    }
}

impl Connector for FakeConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>> {
        self.dbs
            .get(&config.endpoint)
            .map(|db| Box::new(db.session()) as Box<dyn Session>)
            .ok_or_else(|| MigrateError::Database(format!("no fake database for {}", config.endpoint)))
    }
}

/// Connection config pointing at a fake endpoint.
pub fn conn(endpoint: &str, schema: &str) -> ConnectionConfig {
    ConnectionConfig {
        endpoint: endpoint.to_string(),
        user: "scott".to_string(),
        secret: "tiger".to_string(),
        schema: schema.to_string(),
    }
}

/// Single-column rows of text values.
pub fn text_rows(values: &[&str]) -> Vec<Row> {
    values.iter().map(|v| vec![SqlValue::from(*v)]).collect()
}
