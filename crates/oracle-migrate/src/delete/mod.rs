//! Batched delete bounded by `ROWNUM`.
//!
//! Each round deletes at most `batch_size` rows and commits. Looping ends
//! once a round affects fewer rows than the batch size, so a final round of
//! exactly `batch_size` rows is always followed by one confirming round.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::schema::TableRef;
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};
use crate::transfer::{rate, Progress, DEFAULT_BATCH_SIZE};

/// One delete invocation.
#[derive(Debug, Clone)]
pub struct DeleteJob {
    /// Table to delete from.
    pub table: TableRef,

    /// Optional row predicate; without one every row is deleted.
    pub predicate: Option<String>,

    /// Maximum rows per round; must be at least 1.
    pub batch_size: usize,

    /// Stop signal for this job only.
    pub stop: CancellationToken,
}

impl DeleteJob {
    pub fn new(table: TableRef) -> Self {
        Self {
            table,
            predicate: None,
            batch_size: DEFAULT_BATCH_SIZE,
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

    pub fn with_stop(mut self, stop: CancellationToken) -> Self {
        self.stop = stop;
        self
    }
}

/// Statistics from a completed delete.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteStats {
    /// Rows deleted and committed.
    pub rows: u64,

    /// Statements executed, the confirming round included.
    pub rounds: u64,

    /// Overall rows per second, rounded.
    pub rows_per_sec: f64,
}

/// The bounded `DELETE` statement for one round.
pub fn build_delete(table: &TableRef, predicate: Option<&str>, batch_size: usize) -> Result<String> {
    let base = table.qualified()?;
    Ok(match predicate.map(str::trim).filter(|p| !p.is_empty()) {
        Some(p) => format!("DELETE FROM {} WHERE ({}) AND ROWNUM <= {}", base, p, batch_size),
        None => format!("DELETE FROM {} WHERE ROWNUM <= {}", base, batch_size),
    })
}

/// Delete the job's rows in committed rounds, returning the total deleted.
///
/// The stop signal is checked before each round; when set, the open
/// transaction is rolled back and [`MigrateError::Stopped`] is returned.
/// Rows deleted by earlier rounds stay deleted.
pub fn delete_in_batches(
    session: &mut dyn Session,
    job: &DeleteJob,
    on_progress: &mut dyn FnMut(Progress),
) -> Result<DeleteStats> {
    if job.batch_size == 0 {
        return Err(MigrateError::Config(
            "batch size must be at least 1".to_string(),
        ));
    }

    let table_name = job.table.to_string();
    let sql = build_delete(&job.table, job.predicate.as_deref(), job.batch_size)?;
    debug!("Delete statement: {}", sql);

    session
        .set_auto_commit(false)
        .map_err(|e| MigrateError::delete(&table_name, 0, e))?;

    info!("Deleting from {} (batch size {})", job.table, job.batch_size);

    let started = Instant::now();
    let mut total: u64 = 0;
    let mut rounds: u64 = 0;

    loop {
        if job.stop.is_cancelled() {
            if let Err(e) = session.rollback() {
                warn!("Rollback after stopped delete on {} failed: {}", job.table, e);
            }
            info!("Delete on {} stopped after {} rows", job.table, total);
            return Err(MigrateError::Stopped);
        }

        let affected = session
            .execute(&sql)
            .and_then(|n| session.commit().map(|_| n))
            .map_err(|e| {
                if let Err(rb) = session.rollback() {
                    warn!("Rollback after failed delete on {} failed: {}", job.table, rb);
                }
                MigrateError::delete(&table_name, total, e)
            })?;

        rounds += 1;
        total += affected;
        on_progress(Progress::since(total, started));

        if affected < job.batch_size as u64 {
            break;
        }
    }

    let stats = DeleteStats {
        rows: total,
        rounds,
        rows_per_sec: rate(total, started.elapsed()),
    };
    info!(
        "Deleted {} rows from {} in {} rounds",
        stats.rows, job.table, stats.rounds
    );

    Ok(stats)
}
