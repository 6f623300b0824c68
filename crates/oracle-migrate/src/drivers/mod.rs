//! Database driver implementations of [`Connector`](crate::core::traits::Connector).
//!
//! - [`odbc`]: Oracle over ODBC

pub mod odbc;

pub use odbc::{OdbcConnector, OdbcSession};
