//! Core abstractions shared by the engine modules.
//!
//! - [`identifier`]: identifier normalization and quoting
//! - [`schema`]: table, column, and constraint metadata types
//! - [`value`]: SQL values and literal rendering
//! - [`traits`]: the session/connector boundary drivers implement

pub mod identifier;
pub mod schema;
pub mod traits;
pub mod value;

// Re-export commonly used types for convenience
pub use schema::{
    CharSemantics, Column, Constraint, ForeignKey, Index, MinMax, PrimaryKey, TableRef,
};
pub use traits::{Connector, Session};
pub use value::{Row, SqlValue, ValueKind};
