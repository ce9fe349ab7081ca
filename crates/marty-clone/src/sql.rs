//! Read-side queries against the history store's metadata tables, and the
//! DDL text builders for the per-table overlay/view/trigger set.

use marty_catalog::Table;
use marty_error::CloneError;

use crate::ident::quote_ident;

pub const SELECT_LATEST_UPDATE: &str = "SELECT id FROM marty_updates ORDER BY time DESC LIMIT 1";

pub const SELECT_SCHEMAS_AS_OF: &str = "SELECT _ctid::text, oid, name FROM marty_schemas \
    WHERE start <= $1 AND (stop IS NULL OR stop > $1)";

pub const SELECT_TABLES_FOR_SCHEMA_AS_OF: &str = "SELECT _ctid::text, oid, name, internal_name FROM marty_tables \
    WHERE schema = $1 AND start <= $2 AND (stop IS NULL OR stop > $2)";

pub const SELECT_COLUMNS_FOR_TABLE_AS_OF: &str = "SELECT _ctid::text, name, number, type, length, internal_name \
    FROM marty_columns WHERE table_oid = $1 AND start <= $2 AND (stop IS NULL OR stop > $2) ORDER BY number ASC";

pub const LOOKUP_RELATION_OID: &str = "SELECT oid FROM pg_class WHERE relname = $1";

pub const FIX_TYPE_MODIFIER: &str = "UPDATE pg_attribute SET atttypmod = $1 WHERE attrelid = $2 AND attname = $3";

/// `CREATE TABLE marty.<internal_name>(<user columns, unquoted type>)`: the
/// local overlay table a clone keeps its own inserts/updates/deletes in.
pub fn create_overlay_table(table: &Table) -> Result<String, CloneError> {
    let name = quote_ident(&table.internal_name())?;
    let mut cols = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        cols.push(format!("{} {}", quote_ident(&column.name)?, column.pg_type));
    }
    Ok(format!("CREATE TABLE marty.{name}({})", cols.join(",\n  ")))
}

/// The federated view selecting local overlay rows union'd with the history
/// store's as-of-`update` snapshot, fetched lazily through `view_select`.
pub fn create_federated_view(table: &Table) -> Result<String, CloneError> {
    let view_name = long_name_ident(table)?;
    let cols = column_list(table)?;
    let temp_table_def = temp_table_def(table)?;
    Ok(format!(
        "CREATE VIEW {view_name} AS SELECT {cols} FROM view_select('{raw}') AS {temp_table_def}",
        raw = table.long_name(),
    ))
}

pub fn insert_bookkeeping_row() -> &'static str {
    "INSERT INTO marty.bookkeeping(view_name, local_table, coldef, remote_select_stmt, temp_table_def) \
     VALUES($1, $2, $3, $4, $5)"
}

pub fn remote_select_stmt(table: &Table, update: i64) -> String {
    let internal_cols: Vec<String> = table.columns.iter().map(|c| c.internal_name()).collect();
    format!(
        "SELECT {cols} FROM {internal} WHERE start <= {update} AND (stop IS NULL OR stop > {update})",
        cols = internal_cols.join(", "),
        internal = table.internal_name(),
    )
}

pub fn column_list(table: &Table) -> Result<String, CloneError> {
    let quoted: Vec<String> = table.columns.iter().map(|c| quote_ident(&c.name)).collect::<Result<_, _>>()?;
    Ok(quoted.join(", "))
}

pub fn temp_table_def(table: &Table) -> Result<String, CloneError> {
    let mut cols = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        cols.push(format!("{} {}", quote_ident(&column.name)?, column.pg_type));
    }
    Ok(format!("t1({})", cols.join(", ")))
}

fn long_name_ident(table: &Table) -> Result<String, CloneError> {
    Ok(format!("{}.{}", quote_ident(&table.schema.name)?, quote_ident(&table.name)?))
}

/// The three `INSTEAD OF` trigger functions plus their triggers, so writes
/// against the view land in the local overlay table.
pub fn instead_of_triggers(table: &Table) -> Result<String, CloneError> {
    let trigger_base = table.long_name().replace('.', "_");
    let view_name = long_name_ident(table)?;
    let local_table = format!("marty.{}", quote_ident(&table.internal_name())?);
    let local_columns = column_list(table)?;

    let mut new_values_insert = Vec::with_capacity(table.columns.len());
    let mut new_values_update = Vec::with_capacity(table.columns.len());
    let mut old_values = Vec::with_capacity(table.columns.len());
    for column in &table.columns {
        let ident = quote_ident(&column.name)?;
        new_values_insert.push(format!("NEW.{ident}"));
        new_values_update.push(format!("{ident} = NEW.{ident}"));
        old_values.push(format!("{ident} = OLD.{ident}"));
    }

    Ok(format!(
        "CREATE FUNCTION {trigger_base}_insert() RETURNS trigger AS $$
            BEGIN
                INSERT INTO {local_table}({local_columns}) VALUES({new_insert});
                RETURN NEW;
            END;
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER {trigger_base}_insert_trigger
        INSTEAD OF INSERT ON {view_name}
        FOR EACH ROW EXECUTE PROCEDURE {trigger_base}_insert();

        CREATE FUNCTION {trigger_base}_update() RETURNS trigger AS $$
            BEGIN
                UPDATE {local_table} SET {new_update} WHERE {old_values};
                RETURN NEW;
            END;
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER {trigger_base}_update_trigger
        INSTEAD OF UPDATE ON {view_name}
        FOR EACH ROW EXECUTE PROCEDURE {trigger_base}_update();

        CREATE FUNCTION {trigger_base}_delete() RETURNS trigger AS $$
            BEGIN
                DELETE FROM {local_table} WHERE {old_values};
                RETURN OLD;
            END;
        $$ LANGUAGE plpgsql;
        CREATE TRIGGER {trigger_base}_delete_trigger
        INSTEAD OF DELETE ON {view_name}
        FOR EACH ROW EXECUTE PROCEDURE {trigger_base}_delete();",
        new_insert = new_values_insert.join(", "),
        new_update = new_values_update.join(", "),
        old_values = old_values.join(" AND "),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use marty_catalog::{Column, Oid, Schema, TupleId};
    use pretty_assertions::assert_eq;

    fn table() -> Table {
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "public");
        let mut t = Table::new(TupleId::new(0, 2), Oid(200), "orders", schema, Oid(200)).with_internal_name("data_public_orders_1");
        t.add_column(Column::new(TupleId::new(0, 3), Oid(200), "id", 1, "int4", -1).with_internal_name("data_id_1"));
        t
    }

    #[test]
    fn create_overlay_table_lists_user_columns_only() {
        let sql = create_overlay_table(&table()).unwrap();
        assert_eq!(sql, "CREATE TABLE marty.\"data_public_orders_1\"(\"id\" int4)");
    }

    #[test]
    fn remote_select_stmt_filters_by_as_of_interval() {
        let stmt = remote_select_stmt(&table(), 7);
        assert_eq!(stmt, "SELECT data_id_1 FROM data_public_orders_1 WHERE start <= 7 AND (stop IS NULL OR stop > 7)");
    }
}
