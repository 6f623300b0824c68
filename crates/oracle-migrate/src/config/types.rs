//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::transfer::{DEFAULT_BATCH_SIZE, DEFAULT_FETCH_SIZE};

/// Default number of tables processed in parallel.
pub const DEFAULT_WORKERS: usize = 5;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Schema the tables are read from.
    pub source: ConnectionConfig,

    /// Schema the tables are created in, copied into, or deleted from.
    pub target: ConnectionConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,
}

/// How to reach one schema.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// ODBC data source name, or a full ODBC connection string (contains `=`).
    pub endpoint: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(alias = "password", default)]
    pub secret: String,

    /// Schema (owner) holding the tables.
    pub schema: String,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .field("secret", &"[REDACTED]")
            .field("schema", &self.schema)
            .finish()
    }
}

/// Migration behavior configuration.
///
/// Numeric settings are optional so validation can tell an explicit zero from
/// an absent value; use the accessor methods for effective values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Parallel table jobs (default: 5).
    #[serde(default)]
    pub workers: Option<usize>,

    /// Rows per committed batch for copy and delete (default: 1000).
    #[serde(default)]
    pub batch_size: Option<usize>,

    /// Rows per source fetch round trip (default: 1000).
    #[serde(default)]
    pub fetch_size: Option<usize>,

    /// Directory of saved predicates (default: `~/.oracle-migrator/where`).
    #[serde(default)]
    pub predicates_dir: Option<PathBuf>,

    /// Tables to operate on when none are named (default: every source table).
    #[serde(default)]
    pub tables: Option<Vec<String>>,
}

impl MigrationConfig {
    pub fn workers(&self) -> usize {
        self.workers.unwrap_or(DEFAULT_WORKERS)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE)
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size.unwrap_or(DEFAULT_FETCH_SIZE)
    }
}
