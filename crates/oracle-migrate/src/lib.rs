//! # oracle-migrate
//!
//! Schema-to-schema migration engine for Oracle databases.
//!
//! This library provides the pieces an operator needs to move tables between
//! two Oracle schemas:
//!
//! - **Catalog introspection** of columns, keys, indexes, and foreign keys
//! - **DDL synthesis** creating a target table like its source
//! - **Batched transfer** streaming rows and committing every batch
//! - **Batched delete** bounded by `ROWNUM`, committing every round
//! - **Sizing** with row counts and segment bytes
//! - **Range suggestion** building a bounding predicate from key MIN/MAX
//! - **Orchestration** of per-table jobs on a bounded worker pool
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use oracle_migrate::{Config, OdbcConnector, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> oracle_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::new(config, Arc::new(OdbcConnector::new()));
//!     let tables = orchestrator.resolve_tables(&[]).await?;
//!     for report in orchestrator.transfer_tables(tables).await? {
//!         println!("{}: {} ({})", report.table, report.status, report.detail);
//!     }
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod core;
pub mod ddl;
pub mod delete;
pub mod drivers;
pub mod error;
pub mod orchestrator;
pub mod predicate;
pub mod range;
pub mod sizing;
pub mod transfer;
pub mod typemap;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{Config, ConnectionConfig, MigrationConfig};
pub use crate::core::{Connector, Row, Session, SqlValue, TableRef};
pub use ddl::{create_like, DdlReport};
pub use delete::{delete_in_batches, DeleteJob, DeleteStats};
pub use drivers::OdbcConnector;
pub use error::{MigrateError, Result};
pub use orchestrator::{JobKind, Orchestrator, ProgressEvent, TableReport, TableStatus};
pub use predicate::{PredicateSource, PredicateStore, StaticPredicates};
pub use transfer::{transfer, Progress, TransferJob, TransferStats};
