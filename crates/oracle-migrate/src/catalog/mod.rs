//! Read-only metadata queries against the catalog views.
//!
//! All lookups filter `all_*` views by upper-cased owner and table name,
//! rendered as escaped literals. Segment sizes come from the `user_*` views
//! (the connected schema's own segments). Any failed query surfaces as
//! [`MigrateError::Catalog`] naming the operation; nothing is retried.

use tracing::debug;

use crate::core::identifier::catalog_literal;
use crate::core::schema::{CharSemantics, Column, ForeignKey, Index, PrimaryKey, TableRef};
use crate::core::traits::Session;
use crate::core::value::Row;
use crate::error::{MigrateError, Result};
use crate::predicate::where_clause;

/// Row count and segment bytes for one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CountAndSize {
    pub rows: u64,
    pub bytes: u64,
}

fn run(session: &mut dyn Session, operation: &str, sql: &str) -> Result<Vec<Row>> {
    debug!("{}: {}", operation, sql.trim());
    session
        .query(sql)
        .map_err(|e| MigrateError::catalog(operation, e))
}

fn text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx).and_then(|v| v.as_text())
}

fn int(row: &Row, idx: usize) -> Option<i64> {
    row.get(idx).and_then(|v| v.as_i64())
}

fn scalar_u64(rows: &[Row], idx: usize) -> u64 {
    rows.first()
        .and_then(|r| int(r, idx))
        .map(|v| v.max(0) as u64)
        .unwrap_or(0)
}

/// Table names owned by `schema`, alphabetically.
pub fn list_tables(session: &mut dyn Session, schema: &str) -> Result<Vec<String>> {
    let sql = format!(
        "SELECT table_name FROM all_tables WHERE owner = {} ORDER BY table_name",
        catalog_literal(schema)?
    );
    let rows = run(session, "list_tables", &sql)?;
    Ok(rows.iter().filter_map(|r| text(r, 0)).collect())
}

/// Whether the table exists.
pub fn table_exists(session: &mut dyn Session, table: &TableRef) -> Result<bool> {
    let sql = format!(
        "SELECT COUNT(*) FROM all_tables WHERE owner = {} AND table_name = {}",
        catalog_literal(&table.schema)?,
        catalog_literal(&table.name)?
    );
    let rows = run(session, "table_exists", &sql)?;
    Ok(scalar_u64(&rows, 0) > 0)
}

/// Columns in ordinal order.
pub fn get_columns(session: &mut dyn Session, table: &TableRef) -> Result<Vec<Column>> {
    let sql = format!(
        r#"
        SELECT column_name, data_type, data_length, char_length, char_used,
               data_precision, data_scale, nullable, data_default
        FROM all_tab_columns
        WHERE owner = {} AND table_name = {}
        ORDER BY column_id
        "#,
        catalog_literal(&table.schema)?,
        catalog_literal(&table.name)?
    );
    let rows = run(session, "get_columns", &sql)?;

    let columns = rows
        .iter()
        .map(|row| {
            let char_semantics = CharSemantics::from_char_used(text(row, 4).as_deref());
            // data_length is always bytes; char_length holds the declared
            // character count.
            let length = match (char_semantics, int(row, 3)) {
                (CharSemantics::Chars, Some(chars)) if chars > 0 => chars,
                _ => int(row, 2).unwrap_or(0),
            };
            Column {
                name: text(row, 0).unwrap_or_default(),
                data_type: text(row, 1).unwrap_or_default(),
                length,
                char_semantics,
                precision: int(row, 5),
                scale: int(row, 6),
                nullable: !text(row, 7)
                    .map(|n| n.trim().eq_ignore_ascii_case("N"))
                    .unwrap_or(false),
                default_expr: text(row, 8),
            }
        })
        .collect();

    Ok(columns)
}

/// The primary key constraint and its columns, if any.
pub fn get_primary_key(session: &mut dyn Session, table: &TableRef) -> Result<Option<PrimaryKey>> {
    let sql = format!(
        r#"
        SELECT ac.constraint_name, acc.column_name
        FROM all_constraints ac
        JOIN all_cons_columns acc
          ON ac.owner = acc.owner
         AND ac.table_name = acc.table_name
         AND ac.constraint_name = acc.constraint_name
        WHERE ac.owner = {} AND ac.table_name = {} AND ac.constraint_type = 'P'
        ORDER BY acc.position
        "#,
        catalog_literal(&table.schema)?,
        catalog_literal(&table.name)?
    );
    let rows = run(session, "get_primary_key", &sql)?;

    let mut pk: Option<PrimaryKey> = None;
    for row in &rows {
        let (Some(name), Some(col)) = (text(row, 0), text(row, 1)) else {
            continue;
        };
        pk.get_or_insert_with(|| PrimaryKey {
            name,
            columns: Vec::new(),
        })
        .columns
        .push(col);
    }

    Ok(pk)
}

/// Primary key column names in key order; empty if the table has none.
pub fn get_primary_key_columns(session: &mut dyn Session, table: &TableRef) -> Result<Vec<String>> {
    Ok(get_primary_key(session, table)?
        .map(|pk| pk.columns)
        .unwrap_or_default())
}

/// Secondary indexes with their ordered columns.
///
/// Excludes indexes with system-generated names and the index backing the
/// primary key, which the primary key constraint recreates on its own.
pub fn get_indexes(session: &mut dyn Session, table: &TableRef) -> Result<Vec<Index>> {
    let owner = catalog_literal(&table.schema)?;
    let name = catalog_literal(&table.name)?;
    let sql = format!(
        r#"
        SELECT idx.index_name, idx.uniqueness, ic.column_name
        FROM all_indexes idx
        LEFT JOIN all_ind_columns ic
          ON ic.index_owner = idx.owner
         AND ic.index_name = idx.index_name
         AND ic.table_name = idx.table_name
        WHERE idx.owner = {owner} AND idx.table_name = {name} AND idx.generated = 'N'
          AND NOT EXISTS (
              SELECT 1 FROM all_constraints c
              WHERE c.owner = idx.table_owner AND c.table_name = idx.table_name
                AND c.constraint_type = 'P' AND c.index_name = idx.index_name)
        ORDER BY idx.index_name, ic.column_position
        "#
    );
    let rows = run(session, "get_indexes", &sql)?;

    let mut indexes: Vec<Index> = Vec::new();
    for row in &rows {
        let Some(index_name) = text(row, 0) else {
            continue;
        };
        if indexes.last().map(|i| i.name != index_name).unwrap_or(true) {
            indexes.push(Index {
                name: index_name,
                unique: text(row, 1)
                    .map(|u| u.trim().eq_ignore_ascii_case("UNIQUE"))
                    .unwrap_or(false),
                columns: Vec::new(),
            });
        }
        if let (Some(col), Some(current)) = (text(row, 2), indexes.last_mut()) {
            current.columns.push(col);
        }
    }

    Ok(indexes)
}

/// Foreign keys, each resolved through the referenced constraint's own
/// column list.
pub fn get_foreign_keys(session: &mut dyn Session, table: &TableRef) -> Result<Vec<ForeignKey>> {
    let sql = format!(
        r#"
        SELECT ac.constraint_name, acc.column_name, r.owner, r.table_name, r.constraint_name
        FROM all_constraints ac
        JOIN all_cons_columns acc
          ON ac.owner = acc.owner
         AND ac.constraint_name = acc.constraint_name
         AND ac.table_name = acc.table_name
        JOIN all_constraints r
          ON r.owner = ac.r_owner
         AND r.constraint_name = ac.r_constraint_name
        WHERE ac.owner = {} AND ac.table_name = {} AND ac.constraint_type = 'R'
        ORDER BY ac.constraint_name, acc.position
        "#,
        catalog_literal(&table.schema)?,
        catalog_literal(&table.name)?
    );
    let rows = run(session, "get_foreign_keys", &sql)?;

    let mut fks: Vec<ForeignKey> = Vec::new();
    for row in &rows {
        let (Some(name), Some(col)) = (text(row, 0), text(row, 1)) else {
            continue;
        };
        match fks.last_mut() {
            Some(fk) if fk.name == name => fk.columns.push(col),
            _ => fks.push(ForeignKey {
                name,
                columns: vec![col],
                referenced_schema: text(row, 2).unwrap_or_default(),
                referenced_table: text(row, 3).unwrap_or_default(),
                referenced_constraint: text(row, 4).unwrap_or_default(),
                referenced_columns: Vec::new(),
            }),
        }
    }

    for fk in fks.iter_mut() {
        let sql = format!(
            r#"
            SELECT column_name FROM all_cons_columns
            WHERE owner = {} AND table_name = {} AND constraint_name = {}
            ORDER BY position
            "#,
            catalog_literal(&fk.referenced_schema)?,
            catalog_literal(&fk.referenced_table)?,
            catalog_literal(&fk.referenced_constraint)?
        );
        let rows = run(session, "get_foreign_keys", &sql)?;
        fk.referenced_columns = rows.iter().filter_map(|r| text(r, 0)).collect();
    }

    Ok(fks)
}

/// Column names of the table as a query sees them, from a probe that
/// returns no rows.
pub fn probe_columns(session: &mut dyn Session, table: &TableRef) -> Result<Vec<String>> {
    let sql = format!("SELECT * FROM {} WHERE 1=0", table.qualified()?);
    debug!("probe_columns: {}", sql);
    session
        .describe(&sql)
        .map_err(|e| MigrateError::catalog("probe_columns", e))
}

/// Exact row count, optionally filtered by a predicate.
pub fn get_row_count(
    session: &mut dyn Session,
    table: &TableRef,
    predicate: Option<&str>,
) -> Result<u64> {
    let sql = format!(
        "SELECT COUNT(*) FROM {}{}",
        table.qualified()?,
        where_clause(predicate)
    );
    let rows = run(session, "get_row_count", &sql)?;
    Ok(scalar_u64(&rows, 0))
}

fn segment_bytes_sql(table: &TableRef) -> Result<String> {
    Ok(format!(
        r#"
        WITH t AS (SELECT {} AS table_name FROM dual),
             idx AS (SELECT ui.index_name AS segment_name
                     FROM user_indexes ui JOIN t ON ui.table_name = t.table_name),
             lob AS (SELECT ul.segment_name FROM user_lobs ul JOIN t ON ul.table_name = t.table_name
                     UNION ALL
                     SELECT ul.index_name FROM user_lobs ul JOIN t ON ul.table_name = t.table_name)
        SELECT NVL(SUM(us.bytes), 0)
        FROM user_segments us
        WHERE (us.segment_type = 'TABLE' AND us.segment_name = (SELECT table_name FROM t))
           OR us.segment_name IN (SELECT segment_name FROM idx)
           OR us.segment_name IN (SELECT segment_name FROM lob)
        "#,
        catalog_literal(&table.name)?
    ))
}

/// Bytes allocated to the table, its indexes, and its LOB segments.
pub fn get_byte_size(session: &mut dyn Session, table: &TableRef) -> Result<u64> {
    let sql = segment_bytes_sql(table)?;
    let rows = run(session, "get_byte_size", &sql)?;
    Ok(scalar_u64(&rows, 0))
}

/// Row count and segment bytes in a single round trip.
pub fn count_and_size(
    session: &mut dyn Session,
    table: &TableRef,
    predicate: Option<&str>,
) -> Result<CountAndSize> {
    let sql = format!(
        "SELECT (SELECT COUNT(*) FROM {}{}), ({}) FROM dual",
        table.qualified()?,
        where_clause(predicate),
        segment_bytes_sql(table)?.trim()
    );
    let rows = run(session, "count_and_size", &sql)?;
    Ok(CountAndSize {
        rows: scalar_u64(&rows, 0),
        bytes: scalar_u64(&rows, 1),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;
    use crate::testing::{text_rows, FakeDb};

    fn emp() -> TableRef {
        TableRef::new("hr", "emp")
    }

    #[test]
    fn test_list_tables_upper_cases_owner() {
        let db = FakeDb::new();
        db.on_query("FROM all_tables", text_rows(&["DEPT", "EMP"]));
        let mut session = db.session();

        let tables = list_tables(&mut session, "hr").unwrap();
        assert_eq!(tables, vec!["DEPT", "EMP"]);
        assert!(matches!(
            &db.events()[0],
            crate::testing::Event::Query(sql) if sql.contains("owner = 'HR'")
        ));
    }

    #[test]
    fn test_table_exists() {
        let db = FakeDb::new();
        db.on_query("COUNT(*) FROM all_tables", vec![vec![SqlValue::Int(1)]]);
        assert!(table_exists(&mut db.session(), &emp()).unwrap());

        let missing = FakeDb::new();
        missing.on_query("COUNT(*) FROM all_tables", vec![vec![SqlValue::Int(0)]]);
        assert!(!table_exists(&mut missing.session(), &emp()).unwrap());
    }

    #[test]
    fn test_get_columns_parses_catalog_rows() {
        let db = FakeDb::new();
        db.on_query(
            "all_tab_columns",
            vec![
                vec![
                    "ID".into(),
                    "NUMBER".into(),
                    SqlValue::Int(22),
                    SqlValue::Int(0),
                    SqlValue::Null,
                    SqlValue::Int(10),
                    SqlValue::Int(0),
                    "N".into(),
                    SqlValue::Null,
                ],
                vec![
                    "NAME".into(),
                    "VARCHAR2".into(),
                    SqlValue::Int(200),
                    SqlValue::Int(50),
                    "C".into(),
                    SqlValue::Null,
                    SqlValue::Null,
                    "Y".into(),
                    "'unknown' ".into(),
                ],
            ],
        );

        let cols = get_columns(&mut db.session(), &emp()).unwrap();
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].name, "ID");
        assert_eq!(cols[0].precision, Some(10));
        assert_eq!(cols[0].scale, Some(0));
        assert!(!cols[0].nullable);
        assert_eq!(cols[0].length, 22);
        assert_eq!(cols[1].char_semantics, CharSemantics::Chars);
        assert_eq!(cols[1].length, 50);
        assert!(cols[1].nullable);
        assert_eq!(cols[1].default_text(), Some("'unknown'"));
    }

    #[test]
    fn test_get_primary_key_groups_columns() {
        let db = FakeDb::new();
        db.on_query(
            "ac.constraint_type = 'P'",
            vec![
                vec!["EMP_PK".into(), "DEPT_ID".into()],
                vec!["EMP_PK".into(), "EMP_ID".into()],
            ],
        );
        let pk = get_primary_key(&mut db.session(), &emp()).unwrap().unwrap();
        assert_eq!(pk.name, "EMP_PK");
        assert_eq!(pk.columns, vec!["DEPT_ID", "EMP_ID"]);
    }

    #[test]
    fn test_get_primary_key_columns_empty_without_pk() {
        let db = FakeDb::new();
        let cols = get_primary_key_columns(&mut db.session(), &emp()).unwrap();
        assert!(cols.is_empty());
    }

    #[test]
    fn test_get_indexes_groups_and_keeps_empty() {
        let db = FakeDb::new();
        db.on_query(
            "FROM all_indexes",
            vec![
                vec!["EMP_NAME_IX".into(), "NONUNIQUE".into(), "LAST_NAME".into()],
                vec!["EMP_NAME_IX".into(), "NONUNIQUE".into(), "FIRST_NAME".into()],
                vec!["EMP_MAIL_UK".into(), "UNIQUE".into(), "EMAIL".into()],
                vec!["EMP_FN_IX".into(), "NONUNIQUE".into(), SqlValue::Null],
            ],
        );
        let idx = get_indexes(&mut db.session(), &emp()).unwrap();
        assert_eq!(idx.len(), 3);
        assert_eq!(idx[0].columns, vec!["LAST_NAME", "FIRST_NAME"]);
        assert!(!idx[0].unique);
        assert!(idx[1].unique);
        assert!(idx[2].columns.is_empty());
    }

    #[test]
    fn test_get_foreign_keys_resolves_referenced_columns() {
        let db = FakeDb::new();
        db.on_query(
            "constraint_type = 'R'",
            vec![vec![
                "EMP_DEPT_FK".into(),
                "DEPT_ID".into(),
                "HR".into(),
                "DEPT".into(),
                "DEPT_PK".into(),
            ]],
        );
        db.on_query("constraint_name = 'DEPT_PK'", text_rows(&["ID"]));

        let fks = get_foreign_keys(&mut db.session(), &emp()).unwrap();
        assert_eq!(fks.len(), 1);
        assert_eq!(fks[0].columns, vec!["DEPT_ID"]);
        assert_eq!(fks[0].referenced_table, "DEPT");
        assert_eq!(fks[0].referenced_columns, vec!["ID"]);
    }

    #[test]
    fn test_row_count_appends_predicate() {
        let db = FakeDb::new();
        db.on_query("SELECT COUNT(*) FROM \"HR\".\"EMP\"", vec![vec![SqlValue::Int(42)]]);
        let n = get_row_count(&mut db.session(), &emp(), Some("dept_id = 10")).unwrap();
        assert_eq!(n, 42);
        assert!(db.events().iter().any(|e| matches!(
            e,
            crate::testing::Event::Query(sql) if sql.ends_with("WHERE dept_id = 10")
        )));
    }

    #[test]
    fn test_probe_columns_uses_empty_query() {
        let db = FakeDb::new();
        db.on_describe("WHERE 1=0", &["ID", "NAME"]);
        let cols = probe_columns(&mut db.session(), &emp()).unwrap();
        assert_eq!(cols, vec!["ID", "NAME"]);
    }

    #[test]
    fn test_count_and_size() {
        let db = FakeDb::new();
        db.on_query(
            "FROM dual",
            vec![vec![SqlValue::Int(2500), SqlValue::Int(65536)]],
        );
        let cs = count_and_size(&mut db.session(), &emp(), None).unwrap();
        assert_eq!(cs, CountAndSize { rows: 2500, bytes: 65536 });
    }

    #[test]
    fn test_failure_is_catalog_error() {
        let db = FakeDb::new();
        db.fail_on("all_tab_columns", "ORA-00942: table or view does not exist");
        let err = get_columns(&mut db.session(), &emp()).unwrap_err();
        match err {
            MigrateError::Catalog { operation, message } => {
                assert_eq!(operation, "get_columns");
                assert!(message.contains("ORA-00942"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
