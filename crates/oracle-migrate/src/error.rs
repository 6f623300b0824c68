//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, bad batch size, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A catalog (metadata) query failed. Never retried.
    #[error("Catalog query '{operation}' failed: {message}")]
    Catalog { operation: String, message: String },

    /// The operator set the stop signal for the running job.
    #[error("stopped")]
    Stopped,

    /// Row transfer failed; batches committed before the failure stay committed.
    #[error("Transfer failed for table {table} after {rows_committed} committed rows: {message}")]
    Transfer {
        table: String,
        rows_committed: u64,
        message: String,
    },

    /// Batched delete failed; rounds committed before the failure stay deleted.
    #[error("Delete failed for table {table} after {rows_deleted} deleted rows: {message}")]
    Delete {
        table: String,
        rows_deleted: u64,
        message: String,
    },

    /// A DDL statement failed.
    #[error("DDL failed: {message}\n  Statement: {statement}")]
    Ddl { statement: String, message: String },

    /// Identifier rejected before it reached any SQL text.
    #[error("Invalid identifier: {0}")]
    Identifier(String),

    /// Statement failure outside a classified operation.
    #[error("Database error: {0}")]
    Database(String),

    /// ODBC driver manager or driver error
    #[error("ODBC error: {0}")]
    Odbc(#[from] odbc_api::Error),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A worker task panicked or was aborted.
    #[error("Worker task failed: {0}")]
    Task(String),
}

impl MigrateError {
    /// Create a Catalog error for the named metadata operation.
    pub fn catalog(operation: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Catalog {
            operation: operation.into(),
            message: message.to_string(),
        }
    }

    /// Create a Transfer error carrying the rows already committed.
    pub fn transfer(table: impl Into<String>, rows_committed: u64, message: impl ToString) -> Self {
        MigrateError::Transfer {
            table: table.into(),
            rows_committed,
            message: message.to_string(),
        }
    }

    /// Create a Delete error carrying the rows already deleted.
    pub fn delete(table: impl Into<String>, rows_deleted: u64, message: impl ToString) -> Self {
        MigrateError::Delete {
            table: table.into(),
            rows_deleted,
            message: message.to_string(),
        }
    }

    /// Create a Ddl error for a failed statement.
    pub fn ddl(statement: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Ddl {
            statement: statement.into(),
            message: message.to_string(),
        }
    }

    /// True when the error is an operator cancellation rather than a failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, MigrateError::Stopped)
    }

    /// Process exit code for this error category.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) | MigrateError::Identifier(_) => 2,
            MigrateError::Stopped => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
