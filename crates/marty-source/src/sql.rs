//! Pure SQL text builders, kept free of any `tokio_postgres` types so they
//! can be unit tested without a live connection.

use marty_catalog::{Table, TupleId};

pub const SELECT_DATABASE_ID: &str = "SELECT oid FROM pg_database WHERE datname = current_database()";

pub const SELECT_SCHEMAS: &str = "SELECT ctid::text, oid, nspname FROM pg_namespace \
     WHERE nspname NOT LIKE 'pg\\_%' ESCAPE '\\' AND nspname <> 'information_schema' \
     ORDER BY oid";

pub const SELECT_TABLES_FOR_SCHEMA: &str = "SELECT ctid::text, oid, relname, pg_catalog.pg_relation_filenode(oid) \
     FROM pg_class WHERE relnamespace = $1 AND relkind = 'r' ORDER BY oid";

pub const SELECT_SYSTEM_TABLES: &str = "SELECT ctid::text, oid, relname, pg_catalog.pg_relation_filenode(oid) \
     FROM pg_class WHERE relname IN ('pg_namespace', 'pg_class', 'pg_attribute')";

pub const SELECT_COLUMNS_FOR_TABLE: &str = "SELECT pg_attribute.ctid::text, attname, attnum, typname, atttypmod \
     FROM pg_attribute LEFT JOIN pg_type ON pg_attribute.atttypid = pg_type.oid \
     WHERE attrelid = $1 AND attisdropped = false AND attnum > 0 ORDER BY attnum ASC";

pub const SELECT_SCHEMA_BY_OID: &str = "SELECT ctid::text, oid, nspname FROM pg_namespace WHERE oid = $1";
pub const SELECT_SCHEMA_BY_CTID: &str = "SELECT ctid::text, oid, nspname FROM pg_namespace WHERE ctid = $1::tid";

pub const SELECT_TABLE_BY_OID: &str = "SELECT ctid::text, oid, relname, relnamespace, pg_catalog.pg_relation_filenode(oid) \
     FROM pg_class WHERE relkind = 'r' AND oid = $1";
pub const SELECT_TABLE_BY_CTID: &str = "SELECT ctid::text, oid, relname, relnamespace, pg_catalog.pg_relation_filenode(oid) \
     FROM pg_class WHERE relkind = 'r' AND ctid = $1::tid";

pub const SELECT_COLUMN_BY_OID: &str = "SELECT pg_attribute.ctid::text, attrelid, attname, attnum, typname, atttypmod \
     FROM pg_attribute LEFT JOIN pg_type ON pg_attribute.atttypid = pg_type.oid \
     WHERE attrelid = $1 AND attisdropped = false AND attnum > 0 ORDER BY attnum ASC";
pub const SELECT_COLUMN_BY_CTID: &str = "SELECT pg_attribute.ctid::text, attrelid, attname, attnum, typname, atttypmod \
     FROM pg_attribute LEFT JOIN pg_type ON pg_attribute.atttypid = pg_type.oid \
     WHERE pg_attribute.ctid = $1::tid AND attisdropped = false AND attnum > 0";

pub const RESUME_RECOVERY: &str = "SELECT pg_xlog_replay_resume()";

/// `SELECT ctid::text, user_cols... FROM schema.table`, used by
/// [`crate::SourceInspector::all_rows`] to stream a full table for the
/// initial backfill. Never a bare `*`, so the result columns line up
/// positionally with `table.columns`.
pub fn select_all_rows(table: &Table) -> String {
    let cols = table
        .columns
        .iter()
        .map(|c| format!("\"{}\"", c.name))
        .collect::<Vec<_>>()
        .join(", ");
    format!("SELECT ctid::text, {cols} FROM {table}", cols = cols, table = table.long_name())
}

/// The literal `tid` text form Postgres accepts back, e.g. `'(3,7)'`.
pub fn tid_literal(tid: TupleId) -> String {
    format!("({},{})", tid.block, tid.offset)
}

/// `SELECT <cols> FROM schema.table WHERE ctid = $1::tid`, with `cols`
/// defaulting to the table's known user columns in ordinal order (never a
/// bare `*`, so the result aligns positionally with
/// [`marty_catalog::Table::internal_columns`]).
pub fn select_row_by_tid(table: &Table, cols: Option<&[String]>) -> String {
    let column_list = match cols {
        Some(cols) if !cols.is_empty() => cols.join(", "),
        _ => table
            .columns
            .iter()
            .map(|c| format!("\"{}\"", c.name))
            .collect::<Vec<_>>()
            .join(", "),
    };
    format!(
        "SELECT {cols} FROM {table} WHERE ctid = $1::tid",
        cols = column_list,
        table = table.long_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use marty_catalog::{Column, Oid, Schema};
    use pretty_assertions::assert_eq;

    fn sample_table() -> Table {
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");
        let mut table = Table::new(TupleId::new(0, 2), Oid(200), "t", schema, Oid(12345));
        table.add_column(Column::new(TupleId::new(0, 3), Oid(200), "id", 1, "int4", -1));
        table.add_column(Column::new(TupleId::new(0, 4), Oid(200), "v", 2, "text", -1));
        table
    }

    #[test]
    fn tid_literal_formats_block_and_offset() {
        assert_eq!(tid_literal(TupleId::new(3, 7)), "(3,7)");
    }

    #[test]
    fn select_row_defaults_to_table_columns_in_order() {
        assert_eq!(
            select_row_by_tid(&sample_table(), None),
            "SELECT \"id\", \"v\" FROM s.t WHERE ctid = $1::tid"
        );
    }

    #[test]
    fn select_all_rows_projects_user_columns_and_ctid() {
        assert_eq!(select_all_rows(&sample_table()), "SELECT ctid::text, \"id\", \"v\" FROM s.t");
    }

    #[test]
    fn select_row_honors_explicit_column_list() {
        let cols = vec!["\"id\"".to_string()];
        assert_eq!(
            select_row_by_tid(&sample_table(), Some(&cols)),
            "SELECT \"id\" FROM s.t WHERE ctid = $1::tid"
        );
    }
}
