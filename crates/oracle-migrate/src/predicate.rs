//! Saved row predicates.
//!
//! A predicate is an operator-authored SQL boolean expression (no `WHERE`
//! keyword) scoping an operation to a row subset. It is appended verbatim
//! after `WHERE`; it is trusted input and is never escaped or validated.
//!
//! Predicates are saved one per file, named `SCHEMA__TABLE.sql`, under
//! `~/.oracle-migrator/where` unless another directory is configured.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::identifier::predicate_key;
use crate::error::{MigrateError, Result};

/// `" WHERE <predicate>"` for a non-blank predicate, otherwise empty.
pub fn where_clause(predicate: Option<&str>) -> String {
    match predicate.map(str::trim) {
        Some(p) if !p.is_empty() => format!(" WHERE {}", p),
        _ => String::new(),
    }
}

/// Source of per-table predicates consumed by the orchestrator.
pub trait PredicateSource: Send + Sync {
    /// The saved predicate for `(schema, table)`, if any and non-blank.
    /// A predicate file that exists but cannot be read is an error.
    fn predicate(&self, schema: &str, table: &str) -> Result<Option<String>>;
}

/// File-backed predicate store.
#[derive(Debug, Clone)]
pub struct PredicateStore {
    dir: PathBuf,
}

impl PredicateStore {
    /// Store rooted at `dir`; the directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the user's home directory.
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            MigrateError::Config("cannot locate home directory for saved predicates".into())
        })?;
        Ok(Self::new(home.join(".oracle-migrator").join("where")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, schema: &str, table: &str) -> PathBuf {
        self.dir.join(format!("{}.sql", predicate_key(schema, table)))
    }

    /// Load the predicate text; `None` when no file exists or it is blank.
    pub fn load(&self, schema: &str, table: &str) -> Result<Option<String>> {
        let path = self.path(schema, table);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        let trimmed = text.trim();
        Ok((!trimmed.is_empty()).then(|| trimmed.to_string()))
    }

    /// Save (or overwrite) the predicate for a table.
    pub fn save(&self, schema: &str, table: &str, predicate: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(schema, table);
        fs::write(&path, predicate)?;
        debug!("Saved predicate to {}", path.display());
        Ok(())
    }

    /// Whether a predicate file exists for the table.
    pub fn has(&self, schema: &str, table: &str) -> bool {
        self.path(schema, table).exists()
    }

    /// Remove the predicate file; returns false if there was none.
    pub fn remove(&self, schema: &str, table: &str) -> Result<bool> {
        let path = self.path(schema, table);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)?;
        Ok(true)
    }
}

impl PredicateSource for PredicateStore {
    fn predicate(&self, schema: &str, table: &str) -> Result<Option<String>> {
        self.load(schema, table).map_err(|e| {
            MigrateError::Config(format!(
                "cannot read saved predicate {}: {}",
                self.path(schema, table).display(),
                e
            ))
        })
    }
}

/// In-memory predicates keyed like the file store.
#[derive(Debug, Clone, Default)]
pub struct StaticPredicates {
    entries: HashMap<String, String>,
}

impl StaticPredicates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, schema: &str, table: &str, predicate: &str) -> Self {
        self.entries
            .insert(predicate_key(schema, table), predicate.to_string());
        self
    }
}

impl PredicateSource for StaticPredicates {
    fn predicate(&self, schema: &str, table: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .get(&predicate_key(schema, table))
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()))
    }
}
