//! Column type rendering for synthesized DDL.
//!
//! The mapping is a pure function of the catalog's column description. The
//! target speaks the same dialect as the source, so most types are rendered
//! back with their declared length, precision, or scale; anything not listed
//! passes through unchanged.

use tracing::warn;

use crate::core::schema::{CharSemantics, Column};

/// Render the column type literal for a catalog column description.
pub fn map_type(
    data_type: &str,
    length: i64,
    char_semantics: CharSemantics,
    precision: Option<i64>,
    scale: Option<i64>,
) -> String {
    let t = data_type.trim().to_uppercase();

    match t.as_str() {
        // Numeric
        "NUMBER" | "DECIMAL" | "NUMERIC" | "FLOAT" => match (precision, scale) {
            (Some(p), Some(s)) if t != "FLOAT" => format!("{}({},{})", t, p, s),
            (Some(p), _) => format!("{}({})", t, p),
            _ => t,
        },

        // Character
        "VARCHAR2" | "CHAR" => {
            let sem = match char_semantics {
                CharSemantics::Chars => " CHAR",
                CharSemantics::Bytes => "",
            };
            format!("{}({}{})", t, length, sem)
        }

        // National character lengths are always characters and take no qualifier
        "NVARCHAR2" | "NCHAR" => format!("{}({})", t, length),

        // Binary
        "RAW" => format!("RAW({})", length),

        // Temporal and everything else
        _ => t,
    }
}

/// True when the type is one of the explicitly handled families.
pub fn is_known_type(data_type: &str) -> bool {
    let t = data_type.trim().to_uppercase();
    matches!(
        t.as_str(),
        "NUMBER"
            | "DECIMAL"
            | "NUMERIC"
            | "FLOAT"
            | "BINARY_FLOAT"
            | "BINARY_DOUBLE"
            | "VARCHAR2"
            | "NVARCHAR2"
            | "CHAR"
            | "NCHAR"
            | "RAW"
            | "DATE"
            | "CLOB"
            | "NCLOB"
            | "BLOB"
            | "LONG"
            | "ROWID"
    ) || t.starts_with("TIMESTAMP")
        || t.starts_with("INTERVAL")
}

/// Render a column's type, logging types outside the handled families.
pub fn map_column(col: &Column) -> String {
    if !is_known_type(&col.data_type) {
        warn!(
            "Column {} has unmapped type {}; passing it through unchanged",
            col.name, col.data_type
        );
    }
    map_type(
        &col.data_type,
        col.length,
        col.char_semantics,
        col.precision,
        col.scale,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_types() {
        assert_eq!(
            map_type("NUMBER", 22, CharSemantics::Bytes, Some(10), Some(2)),
            "NUMBER(10,2)"
        );
        assert_eq!(
            map_type("NUMBER", 22, CharSemantics::Bytes, Some(10), None),
            "NUMBER(10)"
        );
        assert_eq!(map_type("NUMBER", 22, CharSemantics::Bytes, None, None), "NUMBER");
        assert_eq!(map_type("NUMBER", 22, CharSemantics::Bytes, None, Some(0)), "NUMBER");
    }

    #[test]
    fn test_float_types() {
        assert_eq!(
            map_type("FLOAT", 22, CharSemantics::Bytes, Some(126), None),
            "FLOAT(126)"
        );
        assert_eq!(map_type("FLOAT", 22, CharSemantics::Bytes, None, None), "FLOAT");
    }

    #[test]
    fn test_character_semantics() {
        assert_eq!(
            map_type("VARCHAR2", 50, CharSemantics::Chars, None, None),
            "VARCHAR2(50 CHAR)"
        );
        assert_eq!(
            map_type("VARCHAR2", 50, CharSemantics::Bytes, None, None),
            "VARCHAR2(50)"
        );
        assert_eq!(map_type("char", 1, CharSemantics::Bytes, None, None), "CHAR(1)");
    }

    #[test]
    fn test_national_character_types_take_no_qualifier() {
        assert_eq!(
            map_type("NVARCHAR2", 100, CharSemantics::Chars, None, None),
            "NVARCHAR2(100)"
        );
        assert_eq!(map_type("NCHAR", 2, CharSemantics::Chars, None, None), "NCHAR(2)");
    }

    #[test]
    fn test_binary_and_temporal() {
        assert_eq!(map_type("RAW", 16, CharSemantics::Bytes, None, None), "RAW(16)");
        assert_eq!(map_type("DATE", 7, CharSemantics::Bytes, None, None), "DATE");
        assert_eq!(
            map_type("TIMESTAMP(6)", 11, CharSemantics::Bytes, None, Some(6)),
            "TIMESTAMP(6)"
        );
    }

    #[test]
    fn test_unknown_passes_through() {
        assert_eq!(map_type("XMLTYPE", 2000, CharSemantics::Bytes, None, None), "XMLTYPE");
        assert!(!is_known_type("XMLTYPE"));
        assert!(is_known_type("TIMESTAMP(6) WITH TIME ZONE"));
        assert!(is_known_type("clob"));
    }
}
