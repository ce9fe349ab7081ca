use marty_catalog::{Column, Oid, Schema, Table, TupleId};
use marty_error::CloneError;
use tokio_postgres::Client;

use crate::sql;

/// Reads the history store's as-of-latest-update catalog snapshot. Pins the
/// update id at construction time, so every query issued through the same
/// inspector sees one consistent point in time.
pub struct HistoryInspector {
    client: Client,
    update: i64,
}

impl HistoryInspector {
    pub async fn new(client: Client) -> Result<Self, CloneError> {
        let row = client
            .query_one(sql::SELECT_LATEST_UPDATE, &[])
            .await
            .map_err(CloneError::History)?;
        let update = row.get(0);
        tracing::debug!(update, "pinned snapshot to latest update");
        Ok(Self { client, update })
    }

    pub fn update(&self) -> i64 {
        self.update
    }

    pub async fn schemas(&self) -> Result<Vec<Schema>, CloneError> {
        let rows = self
            .client
            .query(sql::SELECT_SCHEMAS_AS_OF, &[&self.update])
            .await
            .map_err(CloneError::History)?;
        rows.iter().map(row_to_schema).collect()
    }

    pub async fn tables(&self, schema: &Schema) -> Result<Vec<Table>, CloneError> {
        let rows = self
            .client
            .query(sql::SELECT_TABLES_FOR_SCHEMA_AS_OF, &[&schema.oid.0, &self.update])
            .await
            .map_err(CloneError::History)?;
        rows.iter().map(|row| row_to_table(row, schema.clone())).collect()
    }

    pub async fn columns(&self, table: &mut Table) -> Result<(), CloneError> {
        let rows = self
            .client
            .query(sql::SELECT_COLUMNS_FOR_TABLE_AS_OF, &[&table.oid.0, &self.update])
            .await
            .map_err(CloneError::History)?;
        table.columns = rows.iter().map(|row| row_to_column(row, table.oid)).collect::<Result<_, _>>()?;
        Ok(())
    }
}

fn row_to_schema(row: &tokio_postgres::Row) -> Result<Schema, CloneError> {
    let ctid: String = row.get(0);
    let ctid: TupleId = ctid
        .parse()
        .map_err(|_| CloneError::UnsafeIdentifier(format!("bad ctid {ctid}")))?;
    Ok(Schema::new(ctid, Oid(row.get::<_, u32>(1)), row.get::<_, String>(2)))
}

fn row_to_table(row: &tokio_postgres::Row, schema: Schema) -> Result<Table, CloneError> {
    let ctid: String = row.get(0);
    let ctid: TupleId = ctid
        .parse()
        .map_err(|_| CloneError::UnsafeIdentifier(format!("bad ctid {ctid}")))?;
    let oid = Oid(row.get::<_, u32>(1));
    let name: String = row.get(2);
    let internal_name: String = row.get(3);
    Ok(Table::new(ctid, oid, name, schema, oid).with_internal_name(internal_name))
}

fn row_to_column(row: &tokio_postgres::Row, table_oid: Oid) -> Result<Column, CloneError> {
    let ctid: String = row.get(0);
    let ctid: TupleId = ctid
        .parse()
        .map_err(|_| CloneError::UnsafeIdentifier(format!("bad ctid {ctid}")))?;
    let name: String = row.get(1);
    let ordinal: i16 = row.get(2);
    let pg_type: String = row.get(3);
    let type_modifier: i32 = row.get(4);
    let internal_name: String = row.get(5);
    Ok(Column::new(ctid, table_oid, name, ordinal, pg_type, type_modifier).with_internal_name(internal_name))
}
