//! Table-level job coordinator.
//!
//! Each table job runs on a blocking worker with its own sessions, bounded by
//! a semaphore sized from `migration.workers`. Jobs get a child of the
//! orchestrator's root cancellation token; stopping the orchestrator stops
//! every running job at its next batch boundary.

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::catalog;
use crate::config::Config;
use crate::core::schema::TableRef;
use crate::core::traits::{Connector, Session};
use crate::ddl::{self, DdlReport};
use crate::delete::{self, DeleteJob};
use crate::error::{MigrateError, Result};
use crate::predicate::{PredicateSource, PredicateStore, StaticPredicates};
use crate::range;
use crate::sizing::{self, TableSurvey};
use crate::transfer::{self, Progress, TransferJob};

/// Operation a table job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Survey,
    Create,
    Transfer,
    Delete,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobKind::Survey => "survey",
            JobKind::Create => "create",
            JobKind::Transfer => "transfer",
            JobKind::Delete => "delete",
        };
        f.write_str(s)
    }
}

/// Outcome of one table job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStatus {
    Done,
    Stopped,
    Failed,
    /// A table the job needs does not exist.
    Missing,
    /// Another job was already running on the table.
    Skipped,
}

impl fmt::Display for TableStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableStatus::Done => "done",
            TableStatus::Stopped => "stopped",
            TableStatus::Failed => "failed",
            TableStatus::Missing => "missing",
            TableStatus::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// Result of one table job.
#[derive(Debug, Clone, Serialize)]
pub struct TableReport {
    /// Source table the job was keyed on.
    pub table: TableRef,

    pub kind: JobKind,

    pub status: TableStatus,

    /// Human-readable summary or error message.
    pub detail: String,

    /// Rows measured, copied, or deleted, when the job got that far.
    pub rows: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub survey: Option<TableSurvey>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ddl: Option<DdlReport>,
}

impl TableReport {
    fn new(table: TableRef, kind: JobKind, status: TableStatus, detail: impl Into<String>) -> Self {
        Self {
            table,
            kind,
            status,
            detail: detail.into(),
            rows: None,
            survey: None,
            ddl: None,
        }
    }

    fn with_rows(mut self, rows: u64) -> Self {
        self.rows = Some(rows);
        self
    }

    pub fn is_done(&self) -> bool {
        self.status == TableStatus::Done
    }
}

/// Progress of a running table job.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    pub table: TableRef,
    pub kind: JobKind,
    pub units: u64,
    pub rate: f64,
}

/// Receives progress events on the worker thread; must not block.
pub type ProgressFn = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

type JobFn = fn(&JobContext) -> Result<TableReport>;

/// Tables with a job in flight.
#[derive(Clone, Default)]
struct RunningTables(Arc<Mutex<HashSet<TableRef>>>);

impl RunningTables {
    fn claim(&self, table: &TableRef) -> Option<TableClaim> {
        let mut running = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        running.insert(table.clone()).then(|| TableClaim {
            table: table.clone(),
            running: self.0.clone(),
        })
    }
}

/// Releases the table when the job ends.
struct TableClaim {
    table: TableRef,
    running: Arc<Mutex<HashSet<TableRef>>>,
}

impl Drop for TableClaim {
    fn drop(&mut self) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.table);
    }
}

/// Everything a job needs on its worker thread.
struct JobContext {
    table: TableRef,
    kind: JobKind,
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    predicate: Option<String>,
    stop: CancellationToken,
    progress: Option<ProgressFn>,
}

impl JobContext {
    fn source(&self) -> Result<Box<dyn Session>> {
        self.connector.connect(&self.config.source)
    }

    fn target(&self) -> Result<Box<dyn Session>> {
        self.connector.connect(&self.config.target)
    }

    fn target_table(&self) -> TableRef {
        self.table.in_schema(&self.config.target.schema)
    }

    fn predicate(&self) -> Option<&str> {
        self.predicate.as_deref()
    }

    fn report(&self, status: TableStatus, detail: impl Into<String>) -> TableReport {
        TableReport::new(self.table.clone(), self.kind, status, detail)
    }

    fn emit(&self, progress: Progress) {
        if let Some(f) = &self.progress {
            f(&ProgressEvent {
                table: self.table.clone(),
                kind: self.kind,
                units: progress.units,
                rate: progress.rate,
            });
        }
    }
}

enum Pending {
    Ready(TableReport),
    Running(TableRef, JoinHandle<Result<TableReport>>),
}

/// Runs table jobs against the configured source and target schemas.
pub struct Orchestrator {
    config: Arc<Config>,
    connector: Arc<dyn Connector>,
    predicates: Arc<dyn PredicateSource>,
    progress: Option<ProgressFn>,
    cancel: CancellationToken,
    semaphore: Arc<Semaphore>,
    running: RunningTables,
    run_id: String,
}

impl Orchestrator {
    /// Create an orchestrator. Saved predicates are read from
    /// `migration.predicates_dir` when set; otherwise no predicates apply.
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        let predicates: Arc<dyn PredicateSource> = match &config.migration.predicates_dir {
            Some(dir) => Arc::new(PredicateStore::new(dir.clone())),
            None => Arc::new(StaticPredicates::new()),
        };
        let workers = config.migration.workers().max(1);

        Self {
            config: Arc::new(config),
            connector,
            predicates,
            progress: None,
            cancel: CancellationToken::new(),
            semaphore: Arc::new(Semaphore::new(workers)),
            running: RunningTables::default(),
            run_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn with_predicates(mut self, predicates: Arc<dyn PredicateSource>) -> Self {
        self.predicates = predicates;
        self
    }

    pub fn with_progress<F>(mut self, f: F) -> Self
    where
        F: Fn(&ProgressEvent) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(f));
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Root stop token; cancelling it stops every running and queued job.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Arm a fresh root token after a stop so the orchestrator can be reused.
    pub fn reset_stop(&mut self) {
        self.cancel = CancellationToken::new();
    }

    /// Saved predicate for a source table.
    pub fn predicate_for(&self, table: &TableRef) -> Result<Option<String>> {
        self.predicates.predicate(&table.schema, &table.name)
    }

    /// Every table in the source schema.
    pub async fn list_source_tables(&self) -> Result<Vec<TableRef>> {
        let connector = self.connector.clone();
        let config = self.config.clone();
        blocking(move || {
            let mut session = connector.connect(&config.source)?;
            let schema = &config.source.schema;
            let names = catalog::list_tables(&mut *session, schema)?;
            Ok(names.iter().map(|n| TableRef::new(schema, n)).collect())
        })
        .await
    }

    /// Named tables, else `migration.tables`, else every source table.
    pub async fn resolve_tables(&self, names: &[String]) -> Result<Vec<TableRef>> {
        let schema = &self.config.source.schema;
        if !names.is_empty() {
            return Ok(names.iter().map(|n| TableRef::new(schema, n)).collect());
        }
        if let Some(tables) = self.config.migration.tables.as_ref().filter(|t| !t.is_empty()) {
            return Ok(tables.iter().map(|n| TableRef::new(schema, n)).collect());
        }
        self.list_source_tables().await
    }

    /// Suggest a bounding predicate from the table's key range, within the
    /// saved predicate when there is one.
    pub async fn suggest_predicate(&self, table: &TableRef) -> Result<Option<String>> {
        let connector = self.connector.clone();
        let config = self.config.clone();
        let table = table.clone();
        let predicate = self.predicate_for(&table)?;
        blocking(move || {
            let mut session = connector.connect(&config.source)?;
            range::suggest_predicate(&mut *session, &table, predicate.as_deref())
        })
        .await
    }

    /// Source count and size, target count or "missing", per table.
    pub async fn survey(&self, tables: Vec<TableRef>) -> Result<Vec<TableReport>> {
        self.run_jobs(JobKind::Survey, tables, survey_job).await
    }

    /// Create each table in the target schema like its source.
    pub async fn create_tables(&self, tables: Vec<TableRef>) -> Result<Vec<TableReport>> {
        self.run_jobs(JobKind::Create, tables, create_job).await
    }

    /// Count the source, copy into the target, and recount the target.
    pub async fn transfer_tables(&self, tables: Vec<TableRef>) -> Result<Vec<TableReport>> {
        self.run_jobs(JobKind::Transfer, tables, transfer_job).await
    }

    /// Count the target, delete matching rows in batches, and recount.
    pub async fn delete_tables(&self, tables: Vec<TableRef>) -> Result<Vec<TableReport>> {
        self.run_jobs(JobKind::Delete, tables, delete_job).await
    }

    async fn run_jobs(&self, kind: JobKind, tables: Vec<TableRef>, job: JobFn) -> Result<Vec<TableReport>> {
        let started = Instant::now();
        info!(
            "Run {}: {} {} tables with {} workers",
            self.run_id,
            kind,
            tables.len(),
            self.config.migration.workers()
        );

        let mut pending = Vec::with_capacity(tables.len());
        for table in tables {
            if self.cancel.is_cancelled() {
                pending.push(Pending::Ready(TableReport::new(
                    table,
                    kind,
                    TableStatus::Stopped,
                    "not started",
                )));
                continue;
            }

            let predicate = match self.predicate_for(&table) {
                Ok(p) => p,
                Err(e) => {
                    error!("{}: {} not started - {}", table, kind, e);
                    pending.push(Pending::Ready(TableReport::new(
                        table,
                        kind,
                        TableStatus::Failed,
                        e.to_string(),
                    )));
                    continue;
                }
            };

            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    pending.push(Pending::Ready(TableReport::new(
                        table,
                        kind,
                        TableStatus::Stopped,
                        "not started",
                    )));
                    continue;
                }
                permit = self.semaphore.clone().acquire_owned() => {
                    permit.map_err(|e| MigrateError::Task(e.to_string()))?
                }
            };

            let Some(claim) = self.running.claim(&table) else {
                warn!("{}: another job is running on this table, skipping {}", table, kind);
                pending.push(Pending::Ready(TableReport::new(
                    table,
                    kind,
                    TableStatus::Skipped,
                    "another job is running on this table",
                )));
                continue;
            };

            let ctx = JobContext {
                predicate,
                table: table.clone(),
                kind,
                config: self.config.clone(),
                connector: self.connector.clone(),
                stop: self.cancel.child_token(),
                progress: self.progress.clone(),
            };

            let handle = tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let _claim = claim;
                job(&ctx)
            });
            pending.push(Pending::Running(table, handle));
        }

        let reports = futures::future::join_all(pending.into_iter().map(|p| async move {
            match p {
                Pending::Ready(report) => report,
                Pending::Running(table, handle) => match handle.await {
                    Ok(Ok(report)) => report,
                    Ok(Err(e)) if e.is_stopped() => {
                        TableReport::new(table, kind, TableStatus::Stopped, "stopped")
                    }
                    Ok(Err(e)) => {
                        error!("{}: {} failed - {}", table, kind, e);
                        TableReport::new(table, kind, TableStatus::Failed, e.to_string())
                    }
                    Err(e) => {
                        error!("{}: task panicked - {}", table, e);
                        TableReport::new(table, kind, TableStatus::Failed, format!("task panicked: {}", e))
                    }
                },
            }
        }))
        .await;

        let done = reports.iter().filter(|r| r.is_done()).count();
        info!(
            "Run {}: {} finished in {:.1}s ({} of {} tables done)",
            self.run_id,
            kind,
            started.elapsed().as_secs_f64(),
            done,
            reports.len()
        );
        Ok(reports)
    }
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MigrateError::Task(e.to_string()))?
}

fn survey_job(ctx: &JobContext) -> Result<TableReport> {
    let mut source = ctx.source()?;
    let mut target = ctx.target()?;
    let survey = sizing::survey(
        &mut *source,
        &mut *target,
        &ctx.table,
        &ctx.config.target.schema,
        ctx.predicate(),
    )?;

    let detail = format!(
        "source {}; target {}",
        survey.source.human(),
        survey.target_display()
    );
    let mut report = ctx.report(TableStatus::Done, detail).with_rows(survey.source.rows);
    report.survey = Some(survey);
    Ok(report)
}

fn create_job(ctx: &JobContext) -> Result<TableReport> {
    let mut source = ctx.source()?;
    if !catalog::table_exists(&mut *source, &ctx.table)? {
        return Ok(ctx.report(TableStatus::Missing, "source table does not exist"));
    }
    let mut target = ctx.target()?;
    let ddl = ddl::create_like(&mut *source, &mut *target, &ctx.table, &ctx.config.target.schema)?;

    let failed = ddl.failures().count();
    let detail = if !ddl.created {
        "target already exists".to_string()
    } else if failed == 0 {
        format!("created ({} statements)", ddl.entries.len())
    } else {
        format!("created; {} of {} statements failed", failed, ddl.entries.len())
    };
    let mut report = ctx.report(TableStatus::Done, detail);
    report.ddl = Some(ddl);
    Ok(report)
}

fn transfer_job(ctx: &JobContext) -> Result<TableReport> {
    let mut source = ctx.source()?;
    let mut target = ctx.target()?;
    let target_table = ctx.target_table();

    if !catalog::table_exists(&mut *target, &target_table)? {
        return Ok(ctx.report(
            TableStatus::Missing,
            format!("target table {} does not exist", target_table),
        ));
    }

    let expected = sizing::count_rows(&mut *source, &ctx.table, ctx.predicate())?;
    info!("{}: {} source rows to copy", ctx.table, expected);

    let migration = &ctx.config.migration;
    let job = TransferJob::new(ctx.table.clone(), &ctx.config.target.schema)
        .with_predicate(ctx.predicate.clone())
        .with_batch_size(migration.batch_size())
        .with_fetch_size(migration.fetch_size())
        .with_stop(ctx.stop.clone());

    let mut copied = 0u64;
    let result = transfer::transfer(&mut *source, &mut *target, &job, &mut |p: Progress| {
        copied = p.units;
        ctx.emit(p);
    });
    let stats = match result {
        Ok(stats) => stats,
        Err(e) if e.is_stopped() => {
            return Ok(ctx
                .report(TableStatus::Stopped, format!("stopped after {} rows", copied))
                .with_rows(copied));
        }
        Err(e) => return Err(e),
    };

    let landed = sizing::count_rows(&mut *target, &target_table, ctx.predicate())?;
    Ok(ctx
        .report(
            TableStatus::Done,
            format!(
                "{} rows copied at {} rows/s; source {}, target {}",
                stats.rows, stats.rows_per_sec, expected, landed
            ),
        )
        .with_rows(stats.rows))
}

fn delete_job(ctx: &JobContext) -> Result<TableReport> {
    let mut target = ctx.target()?;
    let target_table = ctx.target_table();

    if !catalog::table_exists(&mut *target, &target_table)? {
        return Ok(ctx.report(
            TableStatus::Missing,
            format!("target table {} does not exist", target_table),
        ));
    }

    let before = sizing::count_rows(&mut *target, &target_table, ctx.predicate())?;
    if before == 0 {
        return Ok(ctx.report(TableStatus::Done, "nothing to delete").with_rows(0));
    }
    info!("{}: {} rows to delete", target_table, before);

    let job = DeleteJob::new(target_table.clone())
        .with_predicate(ctx.predicate.clone())
        .with_batch_size(ctx.config.migration.batch_size())
        .with_stop(ctx.stop.clone());

    let mut deleted = 0u64;
    let result = delete::delete_in_batches(&mut *target, &job, &mut |p: Progress| {
        deleted = p.units;
        ctx.emit(p);
    });
    let stats = match result {
        Ok(stats) => stats,
        Err(e) if e.is_stopped() => {
            return Ok(ctx
                .report(TableStatus::Stopped, format!("stopped after {} rows", deleted))
                .with_rows(deleted));
        }
        Err(e) => return Err(e),
    };

    let remaining = sizing::count_rows(&mut *target, &target_table, ctx.predicate())?;
    Ok(ctx
        .report(
            TableStatus::Done,
            format!(
                "{} rows deleted at {} rows/s; {} remain",
                stats.rows, stats.rows_per_sec, remaining
            ),
        )
        .with_rows(stats.rows))
}
