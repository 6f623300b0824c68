//! Schema and metadata types for tables, columns, and constraints.
//!
//! Names held here are already normalized (trimmed, upper-cased); catalog
//! readers normalize on the way in and statement builders quote on the way
//! out.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::identifier;
use crate::error::Result;

/// A table identified by `(schema, name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableRef {
    /// Schema (owner) name.
    pub schema: String,

    /// Table name.
    pub name: String,
}

impl TableRef {
    /// Create a table reference, normalizing both parts.
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: identifier::normalize(schema),
            name: identifier::normalize(name),
        }
    }

    /// Quoted `"SCHEMA"."TABLE"` for statement text.
    pub fn qualified(&self) -> Result<String> {
        identifier::qualify(&self.schema, &self.name)
    }

    /// The same table name in another schema.
    pub fn in_schema(&self, schema: &str) -> Self {
        Self::new(schema, &self.name)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// Length units a character column was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CharSemantics {
    #[default]
    Bytes,
    Chars,
}

impl CharSemantics {
    /// Parse the catalog's `char_used` flag (`'C'` for characters, `'B'` or NULL for bytes).
    pub fn from_char_used(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some(f) if f.eq_ignore_ascii_case("C") => CharSemantics::Chars,
            _ => CharSemantics::Bytes,
        }
    }
}

/// Column metadata, in catalog ordinal order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Base type name as reported by the catalog (e.g. `NUMBER`, `VARCHAR2`).
    pub data_type: String,

    /// Declared length (bytes or characters, see `char_semantics`).
    pub length: i64,

    /// Length units for character columns.
    pub char_semantics: CharSemantics,

    /// Numeric precision, when declared.
    pub precision: Option<i64>,

    /// Numeric scale, when declared.
    pub scale: Option<i64>,

    /// Whether NULLs are allowed.
    pub nullable: bool,

    /// Default expression text, verbatim from the catalog.
    pub default_expr: Option<String>,
}

impl Column {
    /// Non-blank default expression, trimmed.
    pub fn default_text(&self) -> Option<&str> {
        self.default_expr
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Primary key constraint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryKey {
    pub name: String,
    pub columns: Vec<String>,
}

/// Secondary index, excluding catalog-generated ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<String>,
}

/// Foreign key constraint, resolved to its referenced table and columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Constraint name, reused on the target.
    pub name: String,

    /// Child columns in constraint position order.
    pub columns: Vec<String>,

    /// Owner of the referenced table.
    pub referenced_schema: String,

    /// Referenced table name.
    pub referenced_table: String,

    /// Name of the referenced (primary or unique) constraint.
    pub referenced_constraint: String,

    /// Referenced columns, from the referenced constraint's own column list.
    pub referenced_columns: Vec<String>,
}

/// Constraint descriptor applied after the base table exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Constraint {
    PrimaryKey(PrimaryKey),
    Index(Index),
    ForeignKey(ForeignKey),
}

impl Constraint {
    /// Constraint or index name.
    pub fn name(&self) -> &str {
        match self {
            Constraint::PrimaryKey(pk) => &pk.name,
            Constraint::Index(idx) => &idx.name,
            Constraint::ForeignKey(fk) => &fk.name,
        }
    }

    /// Short kind label for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Constraint::PrimaryKey(_) => "primary key",
            Constraint::Index(idx) if idx.unique => "unique index",
            Constraint::Index(_) => "index",
            Constraint::ForeignKey(_) => "foreign key",
        }
    }
}

/// Pre-rendered MIN/MAX literals for one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinMax {
    pub column: String,
    pub min_literal: String,
    pub max_literal: String,
}
