//! Pure SQL text builders, kept free of any `tokio_postgres` types so they
//! can be unit tested without a live connection. Mirrors the split in
//! `marty_source::sql`.

use marty_catalog::Table;
use marty_error::HistoryError;

use crate::ident::quote_ident;

pub const INSERT_SCHEMA: &str = "INSERT INTO marty_schemas(_ctid, oid, name, start) VALUES($1::tid, $2, $3, $4)";
pub const RETIRE_SCHEMA: &str = "UPDATE marty_schemas SET stop = $1 WHERE _ctid = $2::tid AND stop IS NULL";
pub const EXISTS_LIVE_SCHEMA: &str = "SELECT 1 FROM marty_schemas WHERE _ctid = $1::tid AND stop IS NULL";

pub const INSERT_TABLE: &str =
    "INSERT INTO marty_tables(_ctid, oid, name, schema, internal_name, start) VALUES($1::tid, $2, $3, $4, $5, $6)";
pub const RETIRE_TABLE: &str = "UPDATE marty_tables SET stop = $1 WHERE _ctid = $2::tid AND stop IS NULL";
pub const EXISTS_LIVE_TABLE: &str = "SELECT 1 FROM marty_tables WHERE _ctid = $1::tid AND stop IS NULL";

pub const INSERT_COLUMN: &str = "INSERT INTO marty_columns(_ctid, table_oid, name, number, type, length, internal_name, start) \
     VALUES($1::tid, $2, $3, $4, $5, $6, $7, $8)";
pub const RETIRE_COLUMN: &str = "UPDATE marty_columns SET stop = $1 WHERE _ctid = $2::tid AND stop IS NULL";
pub const EXISTS_LIVE_COLUMN: &str = "SELECT 1 FROM marty_columns WHERE _ctid = $1::tid AND stop IS NULL";

pub const SELECT_TABLE_BY_CTID: &str = "SELECT t._ctid::text, t.oid, t.name, t.internal_name, t.schema, s.name \
     FROM marty_tables t JOIN marty_schemas s ON s.oid = t.schema \
     WHERE t._ctid = $1::tid AND t.stop IS NULL";
pub const SELECT_COLUMN_BY_CTID: &str = "SELECT _ctid::text, table_oid, name, number, type, length, internal_name \
     FROM marty_columns WHERE _ctid = $1::tid AND stop IS NULL";

pub const LOOKUP_RELATION_OID: &str = "SELECT oid FROM pg_class WHERE relname = $1";
pub const FIX_TYPE_MODIFIER: &str = "UPDATE pg_attribute SET atttypmod = $1 WHERE attrelid = $2 AND attname = $3";

/// `CREATE TABLE internal_name(internal_columns...)`.
pub fn create_data_table(table: &Table) -> Result<String, HistoryError> {
    let name = quote_ident(&table.internal_name())?;
    let mut cols = Vec::new();
    for col in table.internal_columns() {
        cols.push(format!("{} {}", quote_ident(&col.internal_name())?, col.sql_type()));
    }
    Ok(format!("CREATE TABLE {name}({cols})", name = name, cols = cols.join(", ")))
}

/// `ALTER TABLE internal_name ADD COLUMN internal_name type`.
pub fn add_data_column(table_internal_name: &str, column_internal_name: &str, sql_type: &str) -> Result<String, HistoryError> {
    let table = quote_ident(table_internal_name)?;
    let column = quote_ident(column_internal_name)?;
    Ok(format!("ALTER TABLE {table} ADD COLUMN {column} {sql_type}"))
}

/// `INSERT INTO internal_name(internal_columns...) VALUES($1::tid, $2, ..., $n)`.
///
/// `data_ctid` is cast explicitly because it is bound as text (there is no
/// `ToSql` impl for a `tid` literal) and Postgres otherwise can't infer the
/// placeholder's type from context alone.
pub fn insert_data_row(table: &Table) -> Result<String, HistoryError> {
    let name = quote_ident(&table.internal_name())?;
    let mut names = Vec::new();
    let mut placeholders = Vec::new();
    for (i, col) in table.internal_columns().enumerate() {
        names.push(quote_ident(&col.internal_name())?);
        let placeholder = if i == 0 { format!("${}::tid", i + 1) } else { format!("${}", i + 1) };
        placeholders.push(placeholder);
    }
    Ok(format!(
        "INSERT INTO {name}({cols}) VALUES({placeholders})",
        name = name,
        cols = names.join(", "),
        placeholders = placeholders.join(", ")
    ))
}

/// `UPDATE internal_name SET stop = $1 WHERE data_ctid = $2::tid AND stop IS NULL`.
pub fn delete_data_row(table: &Table) -> Result<String, HistoryError> {
    let name = quote_ident(&table.internal_name())?;
    Ok(format!("UPDATE {name} SET stop = $1 WHERE data_ctid = $2::tid AND stop IS NULL"))
}

/// `UPDATE internal_name SET stop = $1 WHERE stop IS NULL`.
pub fn delete_all(table: &Table) -> Result<String, HistoryError> {
    let name = quote_ident(&table.internal_name())?;
    Ok(format!("UPDATE {name} SET stop = $1 WHERE stop IS NULL"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marty_catalog::{Column, Oid, Schema, TupleId};
    use pretty_assertions::assert_eq;

    fn sample_table() -> Table {
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");
        let mut table = Table::new(TupleId::new(0, 2), Oid(200), "t", schema, Oid(12345));
        table.add_column(Column::new(TupleId::new(0, 3), Oid(200), "id", 1, "int4", -1));
        table.add_column(Column::new(TupleId::new(0, 4), Oid(200), "v", 2, "text", -1));
        table.bind_update(marty_catalog::UpdateId(1));
        table
    }

    #[test]
    fn create_data_table_lists_internal_columns_in_order() {
        assert_eq!(
            create_data_table(&sample_table()).unwrap(),
            "CREATE TABLE \"data_s_t_1\"(\"data_ctid\" tid, \"data_id_1\" int4, \"data_v_1\" text, \
             \"start\" bigint REFERENCES marty_updates(id) NOT NULL, \"stop\" bigint REFERENCES marty_updates(id))"
        );
    }

    #[test]
    fn insert_data_row_has_one_placeholder_per_internal_column() {
        assert_eq!(
            insert_data_row(&sample_table()).unwrap(),
            "INSERT INTO \"data_s_t_1\"(\"data_ctid\", \"data_id_1\", \"data_v_1\", \"start\", \"stop\") \
             VALUES($1::tid, $2, $3, $4, $5)"
        );
    }

    #[test]
    fn delete_data_row_matches_by_data_ctid() {
        assert_eq!(
            delete_data_row(&sample_table()).unwrap(),
            "UPDATE \"data_s_t_1\" SET stop = $1 WHERE data_ctid = $2::tid AND stop IS NULL"
        );
    }

}
