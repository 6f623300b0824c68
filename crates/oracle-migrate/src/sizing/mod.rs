//! Row counts, segment sizes, and their display.

use serde::Serialize;

use crate::catalog;
use crate::core::schema::TableRef;
use crate::core::traits::Session;
use crate::error::Result;

const UNITS: [&str; 6] = ["KB", "MB", "GB", "TB", "PB", "EB"];

/// Base-1024 size with one decimal place; under 1024 bytes as a bare count.
///
/// ```
/// use oracle_migrate::sizing::human_readable_bytes;
/// assert_eq!(human_readable_bytes(1536), "1.5 KB");
/// ```
pub fn human_readable_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit - 1])
}

/// Exact row count, optionally filtered by a predicate.
pub fn count_rows(session: &mut dyn Session, table: &TableRef, predicate: Option<&str>) -> Result<u64> {
    catalog::get_row_count(session, table, predicate)
}

/// Approximate on-disk size: table, index, and LOB segments.
pub fn byte_size(session: &mut dyn Session, table: &TableRef) -> Result<u64> {
    catalog::get_byte_size(session, table)
}

/// Row count and bytes for one side of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TableMeasure {
    pub rows: u64,
    pub bytes: u64,
}

impl TableMeasure {
    /// Measure in a single round trip.
    pub fn measure(session: &mut dyn Session, table: &TableRef, predicate: Option<&str>) -> Result<Self> {
        let cs = catalog::count_and_size(session, table, predicate)?;
        Ok(Self {
            rows: cs.rows,
            bytes: cs.bytes,
        })
    }

    /// `"<rows> rows, <size>"`.
    pub fn human(&self) -> String {
        format!("{} rows, {}", self.rows, human_readable_bytes(self.bytes))
    }
}

/// Overview of one table on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSurvey {
    pub table: TableRef,

    /// Source rows (predicate applied) and segment bytes.
    pub source: TableMeasure,

    /// Target rows (predicate applied); `None` when the target table is missing.
    pub target_rows: Option<u64>,
}

impl TableSurvey {
    /// Target count for display, `"missing"` when absent.
    pub fn target_display(&self) -> String {
        self.target_rows
            .map(|n| n.to_string())
            .unwrap_or_else(|| "missing".to_string())
    }
}

/// Measure the source table and count the target table, if it exists.
pub fn survey(
    source: &mut dyn Session,
    target: &mut dyn Session,
    table: &TableRef,
    target_schema: &str,
    predicate: Option<&str>,
) -> Result<TableSurvey> {
    let measure = TableMeasure::measure(source, table, predicate)?;
    let target_table = table.in_schema(target_schema);
    let target_rows = if catalog::table_exists(target, &target_table)? {
        Some(count_rows(target, &target_table, predicate)?)
    } else {
        None
    };

    Ok(TableSurvey {
        table: table.clone(),
        source: measure,
        target_rows,
    })
}
