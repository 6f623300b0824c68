//! Bounding-predicate suggestions from per-column MIN/MAX.
//!
//! The ranging key is the primary key when there is one. Otherwise the first
//! column of the table is used; that is a heuristic with no selectivity
//! guarantee, and it is logged as such.

use tracing::{debug, warn};

use crate::catalog;
use crate::core::identifier::quote;
use crate::core::schema::{MinMax, TableRef};
use crate::core::traits::Session;
use crate::error::{MigrateError, Result};
use crate::predicate::where_clause;

/// MIN and MAX literals for each column, queried independently.
///
/// Columns whose aggregate query returns no row are left out of the result.
pub fn suggest_range(
    session: &mut dyn Session,
    table: &TableRef,
    columns: &[String],
    predicate: Option<&str>,
) -> Result<Vec<MinMax>> {
    let qualified = table.qualified()?;
    let filter = where_clause(predicate);
    let mut ranges = Vec::with_capacity(columns.len());

    for column in columns {
        let col = quote(column)?;
        let sql = format!("SELECT MIN({col}), MAX({col}) FROM {qualified}{filter}");
        debug!("suggest_range: {}", sql);

        let rows = session
            .query(&sql)
            .map_err(|e| MigrateError::catalog("suggest_range", e))?;
        let Some(row) = rows.first() else {
            continue;
        };
        let literal = |idx: usize| {
            row.get(idx)
                .map(|v| v.to_sql_literal())
                .unwrap_or_else(|| "NULL".to_string())
        };

        ranges.push(MinMax {
            column: column.clone(),
            min_literal: literal(0),
            max_literal: literal(1),
        });
    }

    Ok(ranges)
}

/// Columns to range on: the primary key, else the table's first column.
pub fn ranging_columns(session: &mut dyn Session, table: &TableRef) -> Result<Vec<String>> {
    let pk = catalog::get_primary_key_columns(session, table)?;
    if !pk.is_empty() {
        return Ok(pk);
    }

    let first = catalog::probe_columns(session, table)?
        .into_iter()
        .next()
        .map(|c| vec![c])
        .unwrap_or_default();
    if let Some(col) = first.first() {
        warn!(
            "{} has no primary key; ranging on first column {} (may not be selective)",
            table, col
        );
    }
    Ok(first)
}

/// `COL BETWEEN min AND max [AND ...]` over the given columns, in order,
/// skipping columns without a range. Empty when nothing could be ranged.
pub fn render_predicate(columns: &[String], ranges: &[MinMax]) -> String {
    columns
        .iter()
        .filter_map(|col| ranges.iter().find(|r| &r.column == col))
        .map(|r| format!("{} BETWEEN {} AND {}", r.column, r.min_literal, r.max_literal))
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Suggest a bounding predicate for the table, optionally within an existing
/// predicate. Returns `None` when the table has no rangeable column.
pub fn suggest_predicate(
    session: &mut dyn Session,
    table: &TableRef,
    predicate: Option<&str>,
) -> Result<Option<String>> {
    let columns = ranging_columns(session, table)?;
    let ranges = suggest_range(session, table, &columns, predicate)?;
    let rendered = render_predicate(&columns, &ranges);
    Ok((!rendered.is_empty()).then_some(rendered))
}
