//! SQL value types carried between sessions.
//!
//! Rows are fetched as text by the driver and typed from result-set metadata
//! into [`SqlValue`]. The same values are bound as insert parameters and, for
//! range suggestions, rendered back into SQL literal text.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;

/// Column value kind reported by result-set metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Int,
    Float,
    Decimal,
    Text,
    Bytes,
    Date,
    Timestamp,
}

/// SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL of any type.
    Null,

    /// Integer (NUMBER with zero scale that fits in 64 bits).
    Int(i64),

    /// Binary floating point (BINARY_DOUBLE/BINARY_FLOAT).
    Float(f64),

    /// Exact decimal (NUMBER, FLOAT) within 28 significant digits. Wider
    /// numbers are carried as [`SqlValue::Text`].
    Decimal(Decimal),

    /// Character data.
    Text(String),

    /// Binary data (RAW, BLOB).
    Bytes(Vec<u8>),

    /// Date without a time component.
    Date(NaiveDate),

    /// Date and time without zone.
    Timestamp(NaiveDateTime),
}

/// One fetched or staged row, in column order.
pub type Row = Vec<SqlValue>;

impl SqlValue {
    /// Check if this value is NULL.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }

    /// Type text fetched by a driver according to the column's kind.
    ///
    /// Unparsable text falls back to [`SqlValue::Text`] so no data is lost.
    pub fn from_text(text: Option<&str>, kind: ValueKind) -> Self {
        let Some(s) = text else {
            return SqlValue::Null;
        };

        match kind {
            ValueKind::Int => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Int)
                .unwrap_or_else(|_| SqlValue::Text(s.to_string())),
            ValueKind::Float => s
                .trim()
                .parse::<f64>()
                .map(SqlValue::Float)
                .unwrap_or_else(|_| SqlValue::Text(s.to_string())),
            // NUMBER carries up to 38 significant digits; anything `Decimal`
            // cannot hold exactly stays as the fetched text.
            ValueKind::Decimal => Decimal::from_str_exact(s.trim())
                .map(SqlValue::Decimal)
                .unwrap_or_else(|_| SqlValue::Text(s.trim().to_string())),
            ValueKind::Date => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(SqlValue::Date)
                .unwrap_or_else(|_| SqlValue::Text(s.to_string())),
            ValueKind::Timestamp => {
                let trimmed = s.trim();
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S"))
                    .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
                    .map(SqlValue::Timestamp)
                    .unwrap_or_else(|_| SqlValue::Text(s.to_string()))
            }
            ValueKind::Bytes => {
                let hex_str = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                hex::decode(hex_str)
                    .map(SqlValue::Bytes)
                    .unwrap_or_else(|_| SqlValue::Bytes(s.as_bytes().to_vec()))
            }
            ValueKind::Text => SqlValue::Text(s.to_string()),
        }
    }

    /// Render the value as SQL literal text for embedding in a predicate.
    ///
    /// | value     | literal                                                    |
    /// |-----------|------------------------------------------------------------|
    /// | NULL      | `NULL`                                                     |
    /// | timestamp | `TO_TIMESTAMP('2024-01-15 10:30:00.000000000','YYYY-MM-DD HH24:MI:SS.FF')` |
    /// | date      | `TO_DATE('2024-01-15','YYYY-MM-DD')`                       |
    /// | numeric   | decimal text, unquoted                                     |
    /// | binary    | `HEXTORAW('DEADBEEF')`                                     |
    /// | other     | single-quoted, embedded quotes doubled                     |
    pub fn to_sql_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Int(v) => v.to_string(),
            SqlValue::Float(v) if v.is_finite() => v.to_string(),
            SqlValue::Float(_) => "NULL".to_string(),
            SqlValue::Decimal(v) => v.normalize().to_string(),
            SqlValue::Timestamp(v) => format!(
                "TO_TIMESTAMP('{}','YYYY-MM-DD HH24:MI:SS.FF')",
                v.format("%Y-%m-%d %H:%M:%S%.9f")
            ),
            SqlValue::Date(v) => format!("TO_DATE('{}','YYYY-MM-DD')", v.format("%Y-%m-%d")),
            SqlValue::Bytes(v) => format!("HEXTORAW('{}')", hex::encode_upper(v)),
            SqlValue::Text(v) => format!("'{}'", v.replace('\'', "''")),
        }
    }

    /// Integer view used when reading catalog numbers.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SqlValue::Int(v) => Some(*v),
            SqlValue::Decimal(v) => v.trunc().to_string().parse().ok(),
            SqlValue::Float(v) if v.is_finite() => Some(*v as i64),
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Text view used when reading catalog names and flags.
    pub fn as_text(&self) -> Option<String> {
        match self {
            SqlValue::Null => None,
            SqlValue::Text(s) => Some(s.clone()),
            SqlValue::Int(v) => Some(v.to_string()),
            SqlValue::Float(v) => Some(v.to_string()),
            SqlValue::Decimal(v) => Some(v.to_string()),
            SqlValue::Date(v) => Some(v.to_string()),
            SqlValue::Timestamp(v) => Some(v.to_string()),
            SqlValue::Bytes(v) => Some(hex::encode_upper(v)),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
