//! Centralized identifier normalization and quoting.
//!
//! Every statement builder in the crate goes through this module, so the only
//! free-form SQL text that reaches the database unvalidated is the operator's
//! predicate.
//!
//! Identifiers are trimmed and upper-cased before use. This mirrors the
//! catalog's own case folding: `emp` and `EMP` name the same table, and the
//! catalog views store `EMP`. After normalization the name is wrapped in
//! double quotes, which is a no-op for ordinary upper-case names and keeps
//! reserved words and names with `$`/`#` working.

use crate::error::{MigrateError, Result};

/// Longest identifier the catalog accepts (12.2+ long identifiers).
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Separator used when keying saved predicates by `(schema, table)`.
pub const KEY_SEPARATOR: &str = "__";

/// Trim and upper-case an identifier.
pub fn normalize(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Validate an identifier for security issues.
///
/// Rejects empty names, null bytes, embedded double quotes (which cannot be
/// escaped inside a quoted identifier), and names over the length limit.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(MigrateError::Identifier(
            "identifier cannot be empty".to_string(),
        ));
    }

    if name.contains('\0') {
        return Err(MigrateError::Identifier(format!(
            "identifier contains null byte: {:?}",
            name
        )));
    }

    if name.contains('"') {
        return Err(MigrateError::Identifier(format!(
            "identifier contains a double quote: {:?}",
            name
        )));
    }

    if name.trim().len() > MAX_IDENTIFIER_LENGTH {
        return Err(MigrateError::Identifier(format!(
            "identifier exceeds {} bytes (got {}): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.trim().len(),
            name
        )));
    }

    Ok(())
}

/// Normalize, validate and quote an identifier.
///
/// ```ignore
/// assert_eq!(quote("emp")?, "\"EMP\"");
/// ```
pub fn quote(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("\"{}\"", normalize(name)))
}

/// Qualify a table name with its schema: `"SCHEMA"."TABLE"`.
pub fn qualify(schema: &str, table: &str) -> Result<String> {
    Ok(format!("{}.{}", quote(schema)?, quote(table)?))
}

/// Quote a list of column names and join them with commas.
pub fn quote_list<S: AsRef<str>>(names: &[S]) -> Result<String> {
    let quoted = names
        .iter()
        .map(|n| quote(n.as_ref()))
        .collect::<Result<Vec<_>>>()?;
    Ok(quoted.join(", "))
}

/// Render a normalized name as a string literal for catalog lookups.
///
/// Catalog views are filtered by value (`WHERE owner = 'HR'`); the name is
/// validated and upper-cased, and any single quote is doubled.
pub fn catalog_literal(name: &str) -> Result<String> {
    validate_identifier(name)?;
    Ok(format!("'{}'", normalize(name).replace('\'', "''")))
}

/// Key for saved predicates: upper-cased schema and table joined by `__`.
pub fn predicate_key(schema: &str, table: &str) -> String {
    format!("{}{}{}", normalize(schema), KEY_SEPARATOR, normalize(table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_upper_cases_and_trims() {
        assert_eq!(normalize("  hr "), "HR");
        assert_eq!(normalize("Emp_Hist"), "EMP_HIST");
    }

    #[test]
    fn test_quote() {
        assert_eq!(quote("emp").unwrap(), "\"EMP\"");
        assert_eq!(quote("ORDER").unwrap(), "\"ORDER\"");
        assert_eq!(quote("SYS$LOG").unwrap(), "\"SYS$LOG\"");
    }

    #[test]
    fn test_quote_rejects_bad_names() {
        assert!(quote("").is_err());
        assert!(quote("   ").is_err());
        assert!(quote("a\0b").is_err());
        assert!(quote("bad\"name").is_err());
        assert!(quote(&"X".repeat(129)).is_err());
        assert!(quote(&"X".repeat(128)).is_ok());
    }

    #[test]
    fn test_qualify() {
        assert_eq!(qualify("hr", "emp").unwrap(), "\"HR\".\"EMP\"");
    }

    #[test]
    fn test_quote_list() {
        assert_eq!(
            quote_list(&["id", "name"]).unwrap(),
            "\"ID\", \"NAME\""
        );
        let empty: [&str; 0] = [];
        assert_eq!(quote_list(&empty).unwrap(), "");
    }

    #[test]
    fn test_catalog_literal() {
        assert_eq!(catalog_literal("hr").unwrap(), "'HR'");
        assert_eq!(catalog_literal("o'neil").unwrap(), "'O''NEIL'");
        assert!(catalog_literal("").is_err());
    }

    #[test]
    fn test_predicate_key() {
        assert_eq!(predicate_key("hr", "emp"), "HR__EMP");
    }
}
