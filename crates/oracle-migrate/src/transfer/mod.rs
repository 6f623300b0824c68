//! Batched row transfer from a source table into a target table.
//!
//! Rows are streamed from a single `SELECT` with a bounded fetch buffer and
//! inserted through one parameterized `INSERT` in fixed-size batches. Each
//! full batch is executed and committed before the next row is staged, so
//! memory stays bounded regardless of table size and a failed or stopped
//! transfer leaves every earlier batch committed.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::core::identifier::quote_list;
use crate::core::schema::TableRef;
use crate::core::traits::Session;
use crate::core::value::Row;
use crate::error::{MigrateError, Result};
use crate::predicate::where_clause;

/// Default rows per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default rows per source fetch round trip.
pub const DEFAULT_FETCH_SIZE: usize = 1000;

/// Progress notification emitted at each batch boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Rows committed (or deleted) so far.
    pub units: u64,

    /// Rows per second since the operation started, rounded.
    pub rate: f64,
}

impl Progress {
    pub(crate) fn since(units: u64, started: Instant) -> Self {
        Self {
            units,
            rate: rate(units, started.elapsed()),
        }
    }
}

/// Rows per second, rounded to the nearest integer; 0 before any time passed.
pub fn rate(units: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 {
        (units as f64 / secs).round()
    } else {
        0.0
    }
}

/// One transfer invocation.
#[derive(Debug, Clone)]
pub struct TransferJob {
    /// Source table.
    pub table: TableRef,

    /// Schema receiving the rows; the table name is kept.
    pub target_schema: String,

    /// Optional row predicate applied to the source query.
    pub predicate: Option<String>,

    /// Rows per committed batch; must be at least 1.
    pub batch_size: usize,

    /// Rows per source fetch round trip.
    pub fetch_size: usize,

    /// Stop signal for this job only.
    pub stop: CancellationToken,
}

impl TransferJob {
    pub fn new(table: TableRef, target_schema: &str) -> Self {
        Self {
            table,
            target_schema: target_schema.to_string(),
            predicate: None,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_size: DEFAULT_FETCH_SIZE,
            stop: CancellationToken::new(),
        }
    }

    pub fn with_predicate(mut self, predicate: Option<String>) -> Self {
        self.predicate = predicate;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_fetch_size(mut self, fetch_size: usize) -> Self {
        self.fetch_size = fetch_size;
        self
    }

    pub fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }
}

/// Statistics from a completed transfer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferStats {
    /// Rows committed to the target.
    pub rows: u64,

    /// Committed batches, the trailing partial batch included.
    pub batches: u64,

    /// Wall-clock duration.
    pub elapsed: Duration,

    /// Overall rows per second, rounded.
    pub rows_per_sec: f64,
}

/// Statements for one transfer: the source `SELECT` and target `INSERT`.
pub fn build_statements(
    columns: &[String],
    source: &TableRef,
    target: &TableRef,
    predicate: Option<&str>,
) -> Result<(String, String)> {
    let col_list = quote_list(columns)?;
    let select = format!(
        "SELECT {} FROM {}{}",
        col_list,
        source.qualified()?,
        where_clause(predicate)
    );
    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        target.qualified()?,
        col_list,
        placeholders
    );
    Ok((select, insert))
}

/// Copy the job's rows from `source` into `target`.
///
/// Reports [`Progress`] after every committed batch, including the trailing
/// partial one. When the stop signal is observed the open target transaction
/// is rolled back and [`MigrateError::Stopped`] is returned; any other
/// statement failure is returned as [`MigrateError::Transfer`] carrying the
/// rows committed so far.
pub fn transfer(
    source: &mut dyn Session,
    target: &mut dyn Session,
    job: &TransferJob,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<TransferStats> {
    if job.batch_size == 0 {
        return Err(MigrateError::Config(
            "batch size must be at least 1".to_string(),
        ));
    }

    let table_name = job.table.to_string();
    let target_table = job.table.in_schema(&job.target_schema);

    let columns = catalog::probe_columns(source, &job.table)?;
    if columns.is_empty() {
        return Err(MigrateError::catalog(
            "probe_columns",
            format!("table {} not found or has no columns", job.table),
        ));
    }
    let (select, insert) =
        build_statements(&columns, &job.table, &target_table, job.predicate.as_deref())?;
    debug!("Transfer select: {}", select);
    debug!("Transfer insert: {}", insert);

    target
        .set_auto_commit(false)
        .map_err(|e| MigrateError::transfer(&table_name, 0, e))?;

    info!(
        "Transferring {} -> {} (batch size {})",
        job.table, target_table, job.batch_size
    );

    let started = Instant::now();
    let mut batch: Vec<Row> = Vec::with_capacity(job.batch_size);
    let mut committed: u64 = 0;
    let mut batches: u64 = 0;

    let streamed = {
        let mut sink = |row: Row| -> Result<()> {
            if job.stop.is_cancelled() {
                return Err(MigrateError::Stopped);
            }
            batch.push(row);
            if batch.len() >= job.batch_size {
                target.execute_batch(&insert, &batch)?;
                target.commit()?;
                committed += batch.len() as u64;
                batches += 1;
                batch.clear();
                on_progress(Progress::since(committed, started));
            }
            Ok(())
        };
        source.stream(&select, job.fetch_size.max(1), &mut sink)
    };

    let result = streamed.and_then(|()| {
        if batch.is_empty() {
            return Ok(());
        }
        if job.stop.is_cancelled() {
            return Err(MigrateError::Stopped);
        }
        target.execute_batch(&insert, &batch)?;
        target.commit()?;
        committed += batch.len() as u64;
        batches += 1;
        batch.clear();
        on_progress(Progress::since(committed, started));
        Ok(())
    });

    if let Err(e) = result {
        if let Err(rb) = target.rollback() {
            warn!("Rollback after failed transfer of {} failed: {}", job.table, rb);
        }
        if e.is_stopped() {
            info!("Transfer of {} stopped after {} committed rows", job.table, committed);
            return Err(MigrateError::Stopped);
        }
        return Err(MigrateError::transfer(&table_name, committed, e));
    }

    let elapsed = started.elapsed();
    let stats = TransferStats {
        rows: committed,
        batches,
        elapsed,
        rows_per_sec: rate(committed, elapsed),
    };

    info!(
        "Transferred {} rows into {} in {:.1}s ({} rows/sec)",
        stats.rows,
        target_table,
        elapsed.as_secs_f64(),
        stats.rows_per_sec
    );

    Ok(stats)
}
