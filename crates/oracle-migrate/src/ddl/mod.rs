//! DDL synthesis for a structurally equivalent target table.
//!
//! [`create_like`] builds the base table first and then applies the primary
//! key, each index, and each foreign key as independent best-effort
//! statements. A failing secondary statement is recorded in the returned
//! [`DdlReport`] and logged; it never aborts the statements after it.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::catalog;
use crate::core::identifier::{qualify, quote, quote_list};
use crate::core::schema::{Column, Constraint, ForeignKey, Index, PrimaryKey, TableRef};
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};
use crate::typemap;

/// Outcome of one applied statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlEntry {
    /// What the statement creates (`table`, `primary key`, `index`, ...).
    pub kind: String,

    /// Object name.
    pub name: String,

    /// Statement text as executed.
    pub statement: String,

    /// Error text when the statement failed.
    pub error: Option<String>,
}

impl DdlEntry {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Result of [`create_like`] for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DdlReport {
    /// Target table.
    pub table: TableRef,

    /// False when the target already existed and nothing was executed.
    pub created: bool,

    /// Every executed statement with its outcome, base table first.
    pub entries: Vec<DdlEntry>,
}

impl DdlReport {
    fn skipped(table: TableRef) -> Self {
        Self {
            table,
            created: false,
            entries: Vec::new(),
        }
    }

    /// Entries whose statement failed.
    pub fn failures(&self) -> impl Iterator<Item = &DdlEntry> {
        self.entries.iter().filter(|e| !e.succeeded())
    }

    /// True when every executed statement succeeded.
    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// `CREATE TABLE` for `target` with the source's columns in ordinal order.
pub fn synthesize_create_table(target: &TableRef, columns: &[Column]) -> Result<String> {
    let mut defs = Vec::with_capacity(columns.len());
    for col in columns {
        let mut def = format!("{} {}", quote(&col.name)?, typemap::map_column(col));
        if let Some(default) = col.default_text() {
            def.push_str(" DEFAULT ");
            def.push_str(default);
        }
        if !col.nullable {
            def.push_str(" NOT NULL");
        }
        defs.push(def);
    }

    Ok(format!(
        "CREATE TABLE {} ({})",
        target.qualified()?,
        defs.join(", ")
    ))
}

/// `ALTER TABLE ... ADD CONSTRAINT ... PRIMARY KEY`, or `None` without a key.
pub fn synthesize_primary_key(target: &TableRef, pk: Option<&PrimaryKey>) -> Result<Option<String>> {
    match pk {
        Some(pk) if !pk.columns.is_empty() => Ok(Some(format!(
            "ALTER TABLE {} ADD CONSTRAINT {} PRIMARY KEY ({})",
            target.qualified()?,
            quote(&pk.name)?,
            quote_list(&pk.columns)?
        ))),
        _ => Ok(None),
    }
}

fn index_statement(target: &TableRef, idx: &Index) -> Result<Option<String>> {
    if idx.columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(format!(
        "CREATE {}INDEX {} ON {} ({})",
        if idx.unique { "UNIQUE " } else { "" },
        qualify(&target.schema, &idx.name)?,
        target.qualified()?,
        quote_list(&idx.columns)?
    )))
}

/// One `CREATE [UNIQUE] INDEX` per index that has columns.
pub fn synthesize_indexes(target: &TableRef, indexes: &[Index]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for idx in indexes {
        if let Some(sql) = index_statement(target, idx)? {
            out.push(sql);
        }
    }
    Ok(out)
}

fn foreign_key_statement(target: &TableRef, fk: &ForeignKey) -> Result<Option<String>> {
    if fk.referenced_columns.is_empty() || fk.columns.is_empty() {
        return Ok(None);
    }
    // The parent is expected in the target schema, migrated alongside.
    Ok(Some(format!(
        "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
        target.qualified()?,
        quote(&fk.name)?,
        quote_list(&fk.columns)?,
        qualify(&target.schema, &fk.referenced_table)?,
        quote_list(&fk.referenced_columns)?
    )))
}

/// One `ADD CONSTRAINT ... FOREIGN KEY` per resolved foreign key, reusing the
/// source constraint names.
pub fn synthesize_foreign_keys(target: &TableRef, fks: &[ForeignKey]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for fk in fks {
        if let Some(sql) = foreign_key_statement(target, fk)? {
            out.push(sql);
        }
    }
    Ok(out)
}

/// Statement for any constraint descriptor; `None` when it has nothing to create.
pub fn synthesize_constraint(target: &TableRef, constraint: &Constraint) -> Result<Option<String>> {
    match constraint {
        Constraint::PrimaryKey(pk) => synthesize_primary_key(target, Some(pk)),
        Constraint::Index(idx) => index_statement(target, idx),
        Constraint::ForeignKey(fk) => foreign_key_statement(target, fk),
    }
}

type ConstraintReader = fn(&mut dyn Session, &TableRef) -> Result<Vec<Constraint>>;

/// Secondary object families in application order.
const CONSTRAINT_FAMILIES: [(&str, ConstraintReader); 3] = [
    ("primary key", read_primary_key),
    ("index", read_indexes),
    ("foreign key", read_foreign_keys),
];

fn read_primary_key(source: &mut dyn Session, table: &TableRef) -> Result<Vec<Constraint>> {
    Ok(catalog::get_primary_key(source, table)?
        .map(Constraint::PrimaryKey)
        .into_iter()
        .collect())
}

fn read_indexes(source: &mut dyn Session, table: &TableRef) -> Result<Vec<Constraint>> {
    Ok(catalog::get_indexes(source, table)?
        .into_iter()
        .map(Constraint::Index)
        .collect())
}

fn read_foreign_keys(source: &mut dyn Session, table: &TableRef) -> Result<Vec<Constraint>> {
    Ok(catalog::get_foreign_keys(source, table)?
        .into_iter()
        .map(Constraint::ForeignKey)
        .collect())
}

/// Secondary objects of the source table in application order: primary key,
/// indexes, foreign keys.
pub fn read_constraints(source: &mut dyn Session, table: &TableRef) -> Result<Vec<Constraint>> {
    let mut constraints = Vec::new();
    for (_, read) in CONSTRAINT_FAMILIES {
        constraints.extend(read(source, table)?);
    }
    Ok(constraints)
}

fn apply(target: &mut dyn Session, sql: &str) -> Result<()> {
    target.execute(sql)?;
    target.commit()
}

/// Create the target table like the source one, unless it already exists.
///
/// Returns a [`MigrateError::Ddl`] only when the base `CREATE TABLE` fails.
/// Once the table exists, failures reading or applying its keys, indexes and
/// foreign keys are recorded in the report.
pub fn create_like(
    source: &mut dyn Session,
    target: &mut dyn Session,
    source_table: &TableRef,
    target_schema: &str,
) -> Result<DdlReport> {
    let target_table = source_table.in_schema(target_schema);

    if catalog::table_exists(target, &target_table)? {
        info!("{} already exists, skipping DDL", target_table);
        return Ok(DdlReport::skipped(target_table));
    }

    let columns = catalog::get_columns(source, source_table)?;
    if columns.is_empty() {
        return Err(MigrateError::catalog(
            "get_columns",
            format!("table {} not found or has no columns", source_table),
        ));
    }

    let create = synthesize_create_table(&target_table, &columns)?;
    debug!("DDL: {}", create);
    target
        .execute(&create)
        .map_err(|e| MigrateError::ddl(create.clone(), e))?;

    let mut report = DdlReport {
        table: target_table.clone(),
        created: true,
        entries: vec![DdlEntry {
            kind: "table".to_string(),
            name: target_table.name.clone(),
            statement: create,
            error: None,
        }],
    };

    for (family, read) in CONSTRAINT_FAMILIES {
        let constraints = match read(source, source_table) {
            Ok(constraints) => constraints,
            Err(e) => {
                warn!("Failed to read {} metadata of {}: {}", family, source_table, e);
                report.entries.push(DdlEntry {
                    kind: family.to_string(),
                    name: String::new(),
                    statement: String::new(),
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        for constraint in constraints {
            let sql = match synthesize_constraint(&target_table, &constraint) {
                Ok(Some(sql)) => sql,
                Ok(None) => {
                    debug!(
                        "Skipping {} {}: no resolved columns",
                        constraint.kind(),
                        constraint.name()
                    );
                    continue;
                }
                Err(e) => {
                    warn!("Cannot render {} {}: {}", constraint.kind(), constraint.name(), e);
                    report.entries.push(DdlEntry {
                        kind: constraint.kind().to_string(),
                        name: constraint.name().to_string(),
                        statement: String::new(),
                        error: Some(e.to_string()),
                    });
                    continue;
                }
            };
            debug!("DDL: {}", sql);

            let error = match apply(target, &sql) {
                Ok(()) => None,
                Err(e) => {
                    let err = MigrateError::ddl(sql.clone(), e);
                    warn!(
                        "Failed to create {} {} on {}: {}",
                        constraint.kind(),
                        constraint.name(),
                        target_table,
                        err
                    );
                    Some(err.to_string())
                }
            };

            report.entries.push(DdlEntry {
                kind: constraint.kind().to_string(),
                name: constraint.name().to_string(),
                statement: sql,
                error,
            });
        }
    }

    info!(
        "Created {} ({} statements, {} failed)",
        target_table,
        report.entries.len(),
        report.failures().count()
    );

    Ok(report)
}
