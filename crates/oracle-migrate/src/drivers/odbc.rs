//! ODBC sessions against Oracle.
//!
//! Requires an Oracle ODBC driver (Instant Client ODBC package or the full
//! client) registered with the driver manager (unixODBC on Linux/macOS).
//! The endpoint is either a DSN name or a complete connection string, e.g.
//! `Driver={Oracle 21 ODBC driver};Dbq=//db:1521/XEPDB1`.

use std::sync::OnceLock;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use odbc_api::buffers::{AnySliceMut, BufferDesc, TextRowSet};
use odbc_api::parameter::{InputParameter, VarBinaryBox, VarCharBox, WithDataType};
use odbc_api::{
    sys, Connection, ConnectionOptions, Cursor, DataType, Environment, Nullable, ResultSetMetadata,
};
use tracing::{debug, info};

use crate::config::ConnectionConfig;
use crate::core::traits::{Connector, Session};
use crate::core::value::{Row, SqlValue, ValueKind};
use crate::error::{MigrateError, Result};

/// Longest text value fetched per cell through the bulk buffers. Results with
/// LOB columns are fetched row by row instead, without a length limit.
const MAX_TEXT_BYTES: usize = 65536;

/// Longest value bound through the columnar insert buffers. A batch holding a
/// longer value is inserted row by row.
const MAX_ARRAY_PARAM_BYTES: usize = 32767;

/// Rows buffered per round trip for metadata queries.
const QUERY_FETCH_SIZE: usize = 1000;

static ENVIRONMENT: OnceLock<Environment> = OnceLock::new();

fn environment() -> Result<&'static Environment> {
    if let Some(env) = ENVIRONMENT.get() {
        return Ok(env);
    }
    let env = Environment::new().map_err(|e| {
        MigrateError::Database(format!(
            "Failed to create ODBC environment: {}. \
             Make sure unixODBC and an Oracle ODBC driver are installed.",
            e
        ))
    })?;
    Ok(ENVIRONMENT.get_or_init(|| env))
}

fn sql_error(e: odbc_api::Error, sql: &str) -> MigrateError {
    MigrateError::Database(format!("{} - SQL: {}", e, sql))
}

/// Opens [`OdbcSession`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct OdbcConnector;

impl OdbcConnector {
    pub fn new() -> Self {
        Self
    }
}

impl Connector for OdbcConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>> {
        let env = environment()?;
        let conn = env
            .connect_with_connection_string(&config.connection_string(), ConnectionOptions::default())
            .map_err(|e| {
                MigrateError::Database(format!(
                    "Failed to connect to {} as {}: {}",
                    config.endpoint, config.user, e
                ))
            })?;

        info!("Connected via ODBC: {} (schema {})", config.endpoint, config.schema);
        Ok(Box::new(OdbcSession { conn }))
    }
}

/// One ODBC connection.
pub struct OdbcSession {
    conn: Connection<'static>,
}

impl Session for OdbcSession {
    fn query(&mut self, sql: &str) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        self.stream(sql, QUERY_FETCH_SIZE, &mut |row| {
            rows.push(row);
            Ok(())
        })?;
        Ok(rows)
    }

    fn describe(&mut self, sql: &str) -> Result<Vec<String>> {
        let Some(mut cursor) = self.conn.execute(sql, ()).map_err(|e| sql_error(e, sql))? else {
            return Ok(Vec::new());
        };
        let num_cols = cursor.num_result_cols().map_err(|e| sql_error(e, sql))?;
        (1..=num_cols as u16)
            .map(|i| cursor.col_name(i).map_err(|e| sql_error(e, sql)))
            .collect()
    }

    fn stream(
        &mut self,
        sql: &str,
        fetch_size: usize,
        sink: &mut dyn FnMut(Row) -> Result<()>,
    ) -> Result<()> {
        debug!("ODBC stream (fetch {}): {}", fetch_size, sql);
        let Some(mut cursor) = self.conn.execute(sql, ()).map_err(|e| sql_error(e, sql))? else {
            return Ok(());
        };

        let num_cols = cursor.num_result_cols().map_err(|e| sql_error(e, sql))? as u16;
        let data_types = (1..=num_cols)
            .map(|i| cursor.col_data_type(i))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| sql_error(e, sql))?;
        let kinds: Vec<ValueKind> = data_types.iter().map(value_kind).collect();

        if data_types.iter().any(is_long) {
            debug!("Result has LOB columns, fetching row by row");
            let mut buf = Vec::new();
            while let Some(mut row) = cursor.next_row().map_err(|e| sql_error(e, sql))? {
                let mut values = Vec::with_capacity(kinds.len());
                for (idx, kind) in kinds.iter().enumerate() {
                    let col = idx as u16 + 1;
                    buf.clear();
                    let fetched = if *kind == ValueKind::Bytes {
                        row.get_binary(col, &mut buf)
                    } else {
                        row.get_text(col, &mut buf)
                    };
                    let present = fetched.map_err(|e| sql_error(e, sql))?;
                    values.push(long_value(*kind, present.then(|| std::mem::take(&mut buf))));
                }
                sink(values)?;
            }
            return Ok(());
        }

        let mut buffers = TextRowSet::for_cursor(fetch_size.max(1), &mut cursor, Some(MAX_TEXT_BYTES))
            .map_err(|e| sql_error(e, sql))?;
        let mut row_cursor = cursor.bind_buffer(&mut buffers).map_err(|e| sql_error(e, sql))?;

        while let Some(batch) = row_cursor
            .fetch_with_truncation_check(true)
            .map_err(|e| sql_error(e, sql))?
        {
            for row_idx in 0..batch.num_rows() {
                let row = kinds
                    .iter()
                    .enumerate()
                    .map(|(col_idx, kind)| {
                        let text = batch
                            .at(col_idx, row_idx)
                            .map(|bytes| String::from_utf8_lossy(bytes));
                        SqlValue::from_text(text.as_deref(), *kind)
                    })
                    .collect();
                sink(row)?;
            }
        }

        Ok(())
    }

    fn execute(&mut self, sql: &str) -> Result<u64> {
        debug!("ODBC execute: {}", sql);
        let mut statement = self.conn.preallocate().map_err(|e| sql_error(e, sql))?;
        let cursor = statement.execute(sql, ()).map_err(|e| sql_error(e, sql))?;
        drop(cursor);
        let affected = statement.row_count().map_err(|e| sql_error(e, sql))?;
        Ok(affected.unwrap_or(0) as u64)
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Row]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let mut prepared = self.conn.prepare(sql).map_err(|e| sql_error(e, sql))?;

        let Some(layout) = array_layout(rows) else {
            debug!("Batch holds long values, inserting {} rows one by one", rows.len());
            for row in rows {
                let params: Vec<Box<dyn InputParameter>> = row.iter().map(to_parameter).collect();
                prepared
                    .execute(params.as_slice())
                    .map_err(|e| sql_error(e, sql))?;
            }
            return Ok(());
        };

        let descs: Vec<BufferDesc> = layout.iter().map(ArrayColumn::buffer_desc).collect();
        let mut inserter = prepared
            .column_inserter(rows.len(), descs)
            .map_err(|e| sql_error(e, sql))?;
        inserter.set_num_rows(rows.len());
        for (col, column) in layout.iter().enumerate() {
            let cells = rows.iter().map(|row| row.get(col).unwrap_or(&SqlValue::Null));
            match (column, inserter.column_mut(col)) {
                (ArrayColumn::Int, AnySliceMut::NullableI64(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        slice.set_cell(i, if let SqlValue::Int(x) = v { Some(*x) } else { None });
                    }
                }
                (ArrayColumn::Float, AnySliceMut::NullableF64(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        let cell = match v {
                            SqlValue::Float(x) if x.is_finite() => Some(*x),
                            _ => None,
                        };
                        slice.set_cell(i, cell);
                    }
                }
                (ArrayColumn::Date, AnySliceMut::NullableDate(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        slice.set_cell(i, if let SqlValue::Date(d) = v { Some(date_param(d)) } else { None });
                    }
                }
                (ArrayColumn::Timestamp, AnySliceMut::NullableTimestamp(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        let cell = if let SqlValue::Timestamp(ts) = v {
                            Some(timestamp_param(ts))
                        } else {
                            None
                        };
                        slice.set_cell(i, cell);
                    }
                }
                (ArrayColumn::Binary(_), AnySliceMut::Binary(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        let cell = if let SqlValue::Bytes(b) = v { Some(b.as_slice()) } else { None };
                        slice.set_cell(i, cell);
                    }
                }
                (ArrayColumn::Text(_), AnySliceMut::Text(mut slice)) => {
                    for (i, v) in cells.enumerate() {
                        slice.set_cell(i, text_param(v).as_deref().map(str::as_bytes));
                    }
                }
                _ => {
                    return Err(MigrateError::Database(format!(
                        "parameter buffer {} does not match its layout - SQL: {}",
                        col + 1,
                        sql
                    )))
                }
            }
        }
        inserter.execute().map_err(|e| sql_error(e, sql))?;
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.conn.set_autocommit(enabled)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.rollback()?;
        Ok(())
    }
}

/// How fetched text of a given ODBC column type should be interpreted.
fn value_kind(data_type: &DataType) -> ValueKind {
    match data_type {
        DataType::TinyInt | DataType::SmallInt | DataType::Integer | DataType::BigInt | DataType::Bit => {
            ValueKind::Int
        }
        DataType::Numeric { precision, scale } | DataType::Decimal { precision, scale } => {
            if *scale == 0 && (1..=18).contains(precision) {
                ValueKind::Int
            } else {
                ValueKind::Decimal
            }
        }
        // Oracle FLOAT(p) is a decimal NUMBER; only BINARY_FLOAT and
        // BINARY_DOUBLE are binary floating point.
        DataType::Real | DataType::Double => ValueKind::Float,
        DataType::Float { .. } => ValueKind::Decimal,
        DataType::Date => ValueKind::Date,
        DataType::Timestamp { .. } => ValueKind::Timestamp,
        DataType::Binary { .. } | DataType::Varbinary { .. } | DataType::LongVarbinary { .. } => {
            ValueKind::Bytes
        }
        _ => ValueKind::Text,
    }
}

/// CLOB, NCLOB, BLOB and LONG columns, whose values can exceed any buffer.
fn is_long(data_type: &DataType) -> bool {
    match data_type {
        DataType::LongVarchar { .. } | DataType::LongVarbinary { .. } => true,
        DataType::Other { data_type, .. } => *data_type == sys::SqlDataType::EXT_W_LONG_VARCHAR,
        _ => false,
    }
}

/// Type a value fetched whole from a LOB-bearing row.
fn long_value(kind: ValueKind, bytes: Option<Vec<u8>>) -> SqlValue {
    match bytes {
        None => SqlValue::Null,
        Some(b) if kind == ValueKind::Bytes => SqlValue::Bytes(b),
        Some(b) => SqlValue::from_text(Some(&String::from_utf8_lossy(&b)), kind),
    }
}

/// Parameter buffer shape of one insert column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArrayColumn {
    Int,
    Float,
    Date,
    Timestamp,
    Binary(usize),
    Text(usize),
}

impl ArrayColumn {
    fn buffer_desc(&self) -> BufferDesc {
        match *self {
            ArrayColumn::Int => BufferDesc::I64 { nullable: true },
            ArrayColumn::Float => BufferDesc::F64 { nullable: true },
            ArrayColumn::Date => BufferDesc::Date { nullable: true },
            ArrayColumn::Timestamp => BufferDesc::Timestamp { nullable: true },
            ArrayColumn::Binary(length) => BufferDesc::Binary { length: length.max(1) },
            ArrayColumn::Text(max_str_len) => BufferDesc::Text {
                max_str_len: max_str_len.max(1),
            },
        }
    }
}

/// Text bound for a value in a text parameter column.
fn text_param(value: &SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Float(v) if !v.is_finite() => None,
        SqlValue::Decimal(d) => Some(d.normalize().to_string()),
        other => other.as_text(),
    }
}

/// Buffer layout binding every row of the batch in one array execute, or
/// `None` when a value is too long for the array buffers.
///
/// A column whose non-null values share one variant gets a typed buffer.
/// Mixed columns (wide numbers kept as text next to decimals) bind as text.
fn array_layout(rows: &[Row]) -> Option<Vec<ArrayColumn>> {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    let mut layout = Vec::with_capacity(width);

    for col in 0..width {
        let cells = || rows.iter().filter_map(|row| row.get(col));
        let mut shape: Option<ArrayColumn> = None;
        let mut mixed = false;
        for value in cells() {
            let this = match value {
                SqlValue::Null => continue,
                SqlValue::Float(v) if !v.is_finite() => continue,
                SqlValue::Int(_) => ArrayColumn::Int,
                SqlValue::Float(_) => ArrayColumn::Float,
                SqlValue::Date(_) => ArrayColumn::Date,
                SqlValue::Timestamp(_) => ArrayColumn::Timestamp,
                SqlValue::Bytes(b) => ArrayColumn::Binary(b.len()),
                SqlValue::Decimal(_) | SqlValue::Text(_) => ArrayColumn::Text(0),
            };
            shape = match (shape, this) {
                (None, this) => Some(this),
                (Some(ArrayColumn::Binary(a)), ArrayColumn::Binary(b)) => Some(ArrayColumn::Binary(a.max(b))),
                (Some(prev), this) if prev == this => Some(prev),
                (Some(_), _) => {
                    mixed = true;
                    Some(ArrayColumn::Text(0))
                }
            };
        }

        let column = match shape {
            // all NULL
            None => ArrayColumn::Text(1),
            Some(ArrayColumn::Text(_)) => {
                let longest = cells().filter_map(text_param).map(|t| t.len()).max().unwrap_or(0);
                ArrayColumn::Text(longest)
            }
            Some(other) => other,
        };
        if mixed {
            debug!("Insert column {} mixes value types, binding as text", col + 1);
        }
        match column {
            ArrayColumn::Text(len) | ArrayColumn::Binary(len) if len > MAX_ARRAY_PARAM_BYTES => return None,
            _ => layout.push(column),
        }
    }

    Some(layout)
}

fn date_param(d: &NaiveDate) -> sys::Date {
    sys::Date {
        year: d.year() as i16,
        month: d.month() as u16,
        day: d.day() as u16,
    }
}

fn timestamp_param(ts: &NaiveDateTime) -> sys::Timestamp {
    sys::Timestamp {
        year: ts.year() as i16,
        month: ts.month() as u16,
        day: ts.day() as u16,
        hour: ts.hour() as u16,
        minute: ts.minute() as u16,
        second: ts.second() as u16,
        // leap seconds carry nanoseconds past 1e9
        fraction: ts.nanosecond().min(999_999_999),
    }
}

/// Bind a single value as an input parameter. NULL binds as a null VARCHAR,
/// which Oracle accepts for any column type. Long text and binary values are
/// bound whole.
fn to_parameter(value: &SqlValue) -> Box<dyn InputParameter> {
    match value {
        SqlValue::Null => Box::new(VarCharBox::null()),
        SqlValue::Int(v) => Box::new(Nullable::new(*v)),
        SqlValue::Float(v) if v.is_finite() => Box::new(Nullable::new(*v)),
        SqlValue::Float(_) => Box::new(VarCharBox::null()),
        SqlValue::Decimal(d) => Box::new(VarCharBox::from_string(d.normalize().to_string())),
        SqlValue::Text(s) => Box::new(VarCharBox::from_string(s.clone())),
        SqlValue::Bytes(b) => Box::new(VarBinaryBox::from_vec(b.clone())),
        SqlValue::Date(d) => Box::new(WithDataType {
            value: date_param(d),
            data_type: DataType::Date,
        }),
        SqlValue::Timestamp(ts) => Box::new(WithDataType {
            value: timestamp_param(ts),
            data_type: DataType::Timestamp { precision: 9 },
        }),
    }
}
