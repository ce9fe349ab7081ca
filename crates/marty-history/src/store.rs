use chrono::NaiveDateTime;
use marty_catalog::{Column, Oid, RawValue, Schema, Table, TupleId, UpdateId};
use marty_error::HistoryError;
use tokio_postgres::{Client, Transaction};

use crate::schema_ddl;
use crate::sql;

/// Wraps the history database connection. Owns schema creation; every
/// versioned write happens through a [`HistoryTxn`] returned by
/// [`HistoryStore::open_update`], one at a time.
pub struct HistoryStore {
    client: Client,
}

impl HistoryStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Idempotent `CREATE TABLE IF NOT EXISTS` for the four metadata tables.
    pub async fn ensure_schema(&self) -> Result<(), HistoryError> {
        self.client.batch_execute(schema_ddl::CREATE_MARTY_UPDATES).await?;
        self.client.batch_execute(schema_ddl::CREATE_MARTY_SCHEMAS).await?;
        self.client.batch_execute(schema_ddl::CREATE_MARTY_TABLES).await?;
        self.client.batch_execute(schema_ddl::CREATE_MARTY_COLUMNS).await?;
        Ok(())
    }

    /// Opens a new update: inserts a `marty_updates` row recording
    /// `master_time`, and returns a transaction handle scoped to the update
    /// it allocated. The whole drain of one source commit happens through
    /// the returned handle and is committed or rolled back as a unit.
    pub async fn open_update(&mut self, master_time: NaiveDateTime) -> Result<HistoryTxn<'_>, HistoryError> {
        let txn = self.client.transaction().await?;
        let row = txn
            .query_one("INSERT INTO marty_updates(mastertime) VALUES($1) RETURNING id", &[&master_time])
            .await?;
        let update_id = UpdateId(row.get(0));
        tracing::debug!(%update_id, "opened update");
        Ok(HistoryTxn { txn, update_id })
    }
}

/// A single open update: all catalog and data writes composing one drained
/// source commit. `commit()` or drop (rollback) are the only ways out.
pub struct HistoryTxn<'a> {
    txn: Transaction<'a>,
    update_id: UpdateId,
}

impl<'a> HistoryTxn<'a> {
    pub fn update_id(&self) -> UpdateId {
        self.update_id
    }

    pub async fn commit(self) -> Result<(), HistoryError> {
        self.txn.commit().await?;
        Ok(())
    }

    pub async fn add_schema(&self, schema: &Schema) -> Result<(), HistoryError> {
        self.check_no_live_row(sql::EXISTS_LIVE_SCHEMA, schema.ctid).await?;
        tracing::info!(name = %schema.name, "adding schema");
        self.txn
            .execute(
                sql::INSERT_SCHEMA,
                &[&schema.ctid.to_string(), &schema.oid.0, &schema.name, &self.update_id.0],
            )
            .await?;
        Ok(())
    }

    pub async fn retire_schema(&self, ctid: TupleId) -> Result<(), HistoryError> {
        tracing::info!(%ctid, "retiring schema");
        self.txn.execute(sql::RETIRE_SCHEMA, &[&self.update_id.0, &ctid.to_string()]).await?;
        Ok(())
    }

    /// Binds `table.update` to the current update id (making `internal_name`
    /// stable) and inserts the `marty_tables` row.
    pub async fn add_table(&self, table: &mut Table) -> Result<(), HistoryError> {
        self.check_no_live_row(sql::EXISTS_LIVE_TABLE, table.ctid).await?;
        table.bind_update(self.update_id);
        tracing::info!(name = %table.long_name(), "adding table");
        self.txn
            .execute(
                sql::INSERT_TABLE,
                &[
                    &table.ctid.to_string(),
                    &table.oid.0,
                    &table.name,
                    &table.schema.oid.0,
                    &table.internal_name(),
                    &self.update_id.0,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn retire_table(&self, ctid: TupleId) -> Result<(), HistoryError> {
        tracing::info!(%ctid, "retiring table");
        self.txn.execute(sql::RETIRE_TABLE, &[&self.update_id.0, &ctid.to_string()]).await?;
        Ok(())
    }

    pub async fn add_column(&self, column: &mut Column) -> Result<(), HistoryError> {
        self.check_no_live_row(sql::EXISTS_LIVE_COLUMN, column.ctid).await?;
        column.bind_update(self.update_id);
        tracing::info!(name = %column.name, "adding column");
        self.txn
            .execute(
                sql::INSERT_COLUMN,
                &[
                    &column.ctid.to_string(),
                    &column.table_oid.0,
                    &column.name,
                    &column.ordinal,
                    &column.pg_type,
                    &column.type_modifier,
                    &column.internal_name(),
                    &self.update_id.0,
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn retire_column(&self, ctid: TupleId) -> Result<(), HistoryError> {
        tracing::info!(%ctid, "retiring column");
        self.txn.execute(sql::RETIRE_COLUMN, &[&self.update_id.0, &ctid.to_string()]).await?;
        Ok(())
    }

    /// `CREATE TABLE internal_name(internal_columns...)`, then forces each
    /// user column's stored type modifier to the source value by a direct
    /// `pg_attribute` update (`atttypmod` can't be set through `CREATE
    /// TABLE` for most types, e.g. `varchar(n)`).
    pub async fn create_data_table(&self, table: &Table) -> Result<(), HistoryError> {
        tracing::info!(name = %table.internal_name(), "creating data table");
        self.txn.batch_execute(&sql::create_data_table(table)?).await?;
        let table_oid = self.relation_oid(&table.internal_name()).await?;
        for column in &table.columns {
            self.fix_type_modifier(table_oid, &column.internal_name(), column.type_modifier).await?;
        }
        Ok(())
    }

    /// `ALTER TABLE ... ADD COLUMN`, then the same type-modifier fixup.
    pub async fn add_data_column(&self, table: &Table, column: &Column) -> Result<(), HistoryError> {
        tracing::info!(table = %table.internal_name(), column = %column.internal_name(), "adding data column");
        self.txn
            .batch_execute(&sql::add_data_column(&table.internal_name(), &column.internal_name(), &column.pg_type)?)
            .await?;
        let table_oid = self.relation_oid(&table.internal_name()).await?;
        self.fix_type_modifier(table_oid, &column.internal_name(), column.type_modifier).await?;
        Ok(())
    }

    /// Guards the catalog invariant that at most one live (`stop IS NULL`)
    /// row exists per ctid: a redo stream that re-inserts a ctid already
    /// tracked live (without an intervening retire) would otherwise silently
    /// create two live rows for the same physical row.
    async fn check_no_live_row(&self, exists_query: &str, ctid: TupleId) -> Result<(), HistoryError> {
        if self.txn.query_opt(exists_query, &[&ctid.to_string()]).await?.is_some() {
            return Err(HistoryError::DuplicateLiveRow(ctid.to_string()));
        }
        Ok(())
    }

    async fn relation_oid(&self, relname: &str) -> Result<Oid, HistoryError> {
        let row = self.txn.query_one(sql::LOOKUP_RELATION_OID, &[&relname]).await?;
        Ok(Oid(row.get::<_, u32>(0)))
    }

    async fn fix_type_modifier(&self, table_oid: Oid, column_name: &str, type_modifier: i32) -> Result<(), HistoryError> {
        self.txn
            .execute(sql::FIX_TYPE_MODIFIER, &[&type_modifier, &table_oid.0, &column_name])
            .await?;
        Ok(())
    }

    /// Appends every given `(ctid, row)` pair with `start = current_update,
    /// stop = NULL, data_ctid = source ctid`. `rows` is the full contents of
    /// a newly tracked table, as fetched by the source side.
    pub async fn backfill(&self, table: &Table, rows: &[(TupleId, Vec<RawValue>)]) -> Result<(), HistoryError> {
        tracing::info!(name = %table.internal_name(), "backfilling table");
        for (ctid, values) in rows {
            self.insert(table, *ctid, values).await?;
        }
        Ok(())
    }

    pub async fn insert(&self, table: &Table, tid: TupleId, row: &[RawValue]) -> Result<(), HistoryError> {
        let query = sql::insert_data_row(table)?;
        let tid_text = tid.to_string();
        let mut params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> = Vec::with_capacity(row.len() + 3);
        params.push(&tid_text);
        for value in row {
            params.push(value);
        }
        params.push(&self.update_id.0);
        let stop: Option<i64> = None;
        params.push(&stop);
        self.txn.execute(&query, &params).await?;
        Ok(())
    }

    pub async fn delete(&self, table: &Table, tid: TupleId) -> Result<(), HistoryError> {
        let query = sql::delete_data_row(table)?;
        self.txn.execute(&query, &[&self.update_id.0, &tid.to_string()]).await?;
        Ok(())
    }

    pub async fn delete_all(&self, table: &Table) -> Result<(), HistoryError> {
        let query = sql::delete_all(table)?;
        self.txn.execute(&query, &[&self.update_id.0]).await?;
        Ok(())
    }

    pub async fn get_table(&self, ctid: TupleId) -> Result<Option<Table>, HistoryError> {
        let row = self.txn.query_opt(sql::SELECT_TABLE_BY_CTID, &[&ctid.to_string()]).await?;
        let Some(row) = row else { return Ok(None) };
        let ctid: String = row.get(0);
        let ctid = ctid
            .parse()
            .map_err(|_| HistoryError::UnsafeIdentifier(format!("malformed history ctid {ctid}")))?;
        let oid = Oid(row.get::<_, u32>(1));
        let name: String = row.get(2);
        let internal_name: String = row.get(3);
        let schema_oid = Oid(row.get::<_, u32>(4));
        let schema_name: String = row.get(5);
        // The history-side Schema's own ctid plays no role once a table is
        // resolved this way (only its oid/name are used downstream), so a
        // placeholder tuple id stands in for it.
        let schema = Schema::new(TupleId::new(0, 0), schema_oid, schema_name);
        Ok(Some(Table::new(ctid, oid, name, schema, oid).with_internal_name(internal_name)))
    }

    pub async fn get_column(&self, ctid: TupleId) -> Result<Option<Column>, HistoryError> {
        let row = self.txn.query_opt(sql::SELECT_COLUMN_BY_CTID, &[&ctid.to_string()]).await?;
        let Some(row) = row else { return Ok(None) };
        let ctid: String = row.get(0);
        let ctid = ctid
            .parse()
            .map_err(|_| HistoryError::UnsafeIdentifier(format!("malformed history ctid {ctid}")))?;
        let table_oid = Oid(row.get::<_, u32>(1));
        let name: String = row.get(2);
        let ordinal: i16 = row.get(3);
        let pg_type: String = row.get(4);
        let type_modifier: i32 = row.get(5);
        let internal_name: String = row.get(6);
        Ok(Some(
            Column::new(ctid, table_oid, name, ordinal, pg_type, type_modifier).with_internal_name(internal_name),
        ))
    }
}
