use std::collections::HashMap;

use marty_catalog::{Column, Oid, Schema, Table, TupleId};
use marty_error::SourceError;
use tokio_postgres::Client;

use crate::lookup::Lookup;
use crate::sql;

/// Queries the source replica for catalog metadata and row data.
///
/// Every method issues its query directly against `client`, which is kept
/// in autocommit mode by the caller (no transaction is ever opened here) so
/// that each query observes whatever state recovery is currently paused
/// at. Owns the `relation_file_node -> Table` index used to resolve a redo
/// record's `rel` to a tracked [`Table`], and a lazily materialised map of
/// the three system catalogs the capture engine treats as DDL sources.
pub struct SourceInspector {
    client: Client,
    database_id: Oid,
    relation_index: HashMap<Oid, Table>,
    system_tables: Option<HashMap<Oid, Table>>,
}

impl SourceInspector {
    /// Connects and caches [`Self::database_id`] once up front.
    pub async fn new(client: Client) -> Result<Self, SourceError> {
        let row = client.query_one(sql::SELECT_DATABASE_ID, &[]).await?;
        let database_id = Oid(row.get::<_, u32>(0));
        Ok(Self {
            client,
            database_id,
            relation_index: HashMap::new(),
            system_tables: None,
        })
    }

    pub fn database_id(&self) -> Oid {
        self.database_id
    }

    /// Look up a previously indexed table by its relation file node, as
    /// recorded by the most recent [`Self::tables`] call.
    pub fn table_by_relation_file_node(&self, relation_file_node: Oid) -> Option<&Table> {
        self.relation_index.get(&relation_file_node)
    }

    /// Registers or replaces the indexed entry for `table`, keyed by its
    /// relation file node. Called by the capture engine when DDL applies a
    /// new or renamed table so later redo on it resolves immediately,
    /// without waiting for the next full [`Self::tables`] enumeration.
    pub fn index_table(&mut self, table: Table) {
        self.relation_index.insert(table.relation_file_node, table);
    }

    pub async fn schemas(&self) -> Result<Vec<Schema>, SourceError> {
        let rows = self.client.query(sql::SELECT_SCHEMAS, &[]).await?;
        rows.iter().map(row_to_schema).collect()
    }

    /// Enumerates the ordinary relations of `schema`, indexing each by its
    /// relation file node for later redo-record resolution.
    pub async fn tables(&mut self, schema: &Schema) -> Result<Vec<Table>, SourceError> {
        let rows = self
            .client
            .query(sql::SELECT_TABLES_FOR_SCHEMA, &[&schema.oid.0])
            .await?;
        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let table = row_to_table(row, schema.clone())?;
            self.relation_index.insert(table.relation_file_node, table.clone());
            tables.push(table);
        }
        Ok(tables)
    }

    pub async fn populate_columns(&self, table: &mut Table) -> Result<(), SourceError> {
        let rows = self
            .client
            .query(sql::SELECT_COLUMNS_FOR_TABLE, &[&table.oid.0])
            .await?;
        table.columns = rows.iter().map(|row| row_to_column(row, table.oid)).collect::<Result<_, _>>()?;
        Ok(())
    }

    /// The three system catalogs the capture engine interprets as DDL
    /// sources, keyed by relation file node. Materialised on first access.
    pub async fn system_tables(&mut self) -> Result<&HashMap<Oid, Table>, SourceError> {
        if self.system_tables.is_none() {
            let pg_catalog = Schema::new(TupleId::new(0, 0), Oid(11), "pg_catalog");
            let rows = self.client.query(sql::SELECT_SYSTEM_TABLES, &[]).await?;
            let mut tables = HashMap::with_capacity(rows.len());
            for row in &rows {
                let table = row_to_table(row, pg_catalog.clone())?;
                tables.insert(table.relation_file_node, table);
            }
            self.system_tables = Some(tables);
        }
        Ok(self.system_tables.as_ref().expect("just populated"))
    }

    pub async fn get_schema(&self, lookup: Lookup) -> Result<Option<Schema>, SourceError> {
        let row = match lookup {
            Lookup::Oid(oid) => self.client.query_opt(sql::SELECT_SCHEMA_BY_OID, &[&oid.0]).await?,
            Lookup::Ctid(tid) => {
                self.client
                    .query_opt(sql::SELECT_SCHEMA_BY_CTID, &[&sql::tid_literal(tid)])
                    .await?
            }
        };
        row.as_ref().map(row_to_schema).transpose()
    }

    /// Resolves a table by ctid or oid, optionally preserving a known
    /// `internal_name` so a table's data table survives a catalog-row
    /// update (e.g. a rename) that changes its ctid but not its identity.
    pub async fn get_table(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Table>, SourceError> {
        let row = match lookup {
            Lookup::Oid(oid) => self.client.query_opt(sql::SELECT_TABLE_BY_OID, &[&oid.0]).await?,
            Lookup::Ctid(tid) => {
                self.client
                    .query_opt(sql::SELECT_TABLE_BY_CTID, &[&sql::tid_literal(tid)])
                    .await?
            }
        };
        let Some(row) = row else { return Ok(None) };
        let schema_oid = Oid(row.get::<_, u32>(3));
        let schema = self
            .get_schema(Lookup::Oid(schema_oid))
            .await?
            .ok_or_else(|| SourceError::MalformedRow(format!("schema oid {schema_oid} for table not found")))?;

        let ctid: String = row.get(0);
        let ctid = ctid
            .parse()
            .map_err(|_| SourceError::MalformedRow(format!("bad ctid {ctid}")))?;
        let oid = Oid(row.get::<_, u32>(1));
        let name: String = row.get(2);
        let relation_file_node = Oid(row.get::<_, u32>(4));
        let mut table = Table::new(ctid, oid, name, schema, relation_file_node);
        if let Some(internal_name) = internal_name {
            table = table.with_internal_name(internal_name);
        }
        Ok(Some(table))
    }

    /// Resolves a column by ctid or oid, optionally preserving a known
    /// `internal_name` so the data column survives a source-side rename.
    pub async fn get_column(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Column>, SourceError> {
        let row = match lookup {
            Lookup::Oid(oid) => self.client.query_opt(sql::SELECT_COLUMN_BY_OID, &[&oid.0]).await?,
            Lookup::Ctid(tid) => {
                self.client
                    .query_opt(sql::SELECT_COLUMN_BY_CTID, &[&sql::tid_literal(tid)])
                    .await?
            }
        };
        let Some(row) = row else { return Ok(None) };
        let table_oid = Oid(row.get::<_, u32>(1));
        let mut column = row_to_column(&row, table_oid)?;
        if let Some(internal_name) = internal_name {
            column = column.with_internal_name(internal_name);
        }
        Ok(Some(column))
    }

    /// Resumes redo replay until the next paused record.
    pub async fn resume(&self) -> Result<(), SourceError> {
        self.client.execute(sql::RESUME_RECOVERY, &[]).await?;
        Ok(())
    }

    /// Streams every row of `table`, paired with its source `ctid`, for the
    /// initial backfill of a newly tracked table.
    pub async fn all_rows(&self, table: &Table) -> Result<Vec<(TupleId, Vec<marty_catalog::RawValue>)>, SourceError> {
        let rows = self.client.query(&sql::select_all_rows(table), &[]).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in &rows {
            let ctid: String = row.get(0);
            let ctid: TupleId = ctid.parse().map_err(|_| SourceError::MalformedRow(format!("bad ctid {ctid}")))?;
            let values = (1..row.len()).map(|i| row.get::<_, marty_catalog::RawValue>(i)).collect();
            out.push((ctid, values));
        }
        Ok(out)
    }

    /// Fetches a single row by its physical tuple identifier, projecting
    /// `cols` (or all of `table`'s known user columns, in ordinal order, if
    /// `None`). Returns `None` if the tuple has already been superseded.
    pub async fn get(
        &self,
        table: &Table,
        tid: TupleId,
        cols: Option<&[String]>,
    ) -> Result<Option<Vec<marty_catalog::RawValue>>, SourceError> {
        let query = sql::select_row_by_tid(table, cols);
        let row = self.client.query_opt(&query, &[&sql::tid_literal(tid)]).await?;
        let Some(row) = row else { return Ok(None) };
        let values = (0..row.len())
            .map(|i| row.get::<_, marty_catalog::RawValue>(i))
            .collect();
        Ok(Some(values))
    }
}

fn row_to_schema(row: &tokio_postgres::Row) -> Result<Schema, SourceError> {
    let ctid: String = row.get(0);
    let ctid = ctid
        .parse()
        .map_err(|_| SourceError::MalformedRow(format!("bad ctid {ctid}")))?;
    Ok(Schema::new(ctid, Oid(row.get::<_, u32>(1)), row.get::<_, String>(2)))
}

/// Converts a `(ctid, oid, relname, filenode)` row, as returned by
/// [`sql::SELECT_TABLES_FOR_SCHEMA`] and [`sql::SELECT_SYSTEM_TABLES`].
fn row_to_table(row: &tokio_postgres::Row, schema: Schema) -> Result<Table, SourceError> {
    let ctid: String = row.get(0);
    let ctid = ctid
        .parse()
        .map_err(|_| SourceError::MalformedRow(format!("bad ctid {ctid}")))?;
    let oid = Oid(row.get::<_, u32>(1));
    let name: String = row.get(2);
    let relation_file_node = Oid(row.get::<_, u32>(3));
    Ok(Table::new(ctid, oid, name, schema, relation_file_node))
}

fn row_to_column(row: &tokio_postgres::Row, table_oid: Oid) -> Result<Column, SourceError> {
    let ctid: String = row.get(0);
    let ctid = ctid
        .parse()
        .map_err(|_| SourceError::MalformedRow(format!("bad ctid {ctid}")))?;
    // Shape differs between the by-name-lookup queries (ctid, name, num,
    // type, modifier) and the by-oid/ctid queries which also carry
    // `attrelid`; both are handled by the caller slicing from the right
    // offset, so `row_to_column` always reads from the tail four columns.
    let len = row.len();
    let name: String = row.get(len - 4);
    let ordinal: i16 = row.get(len - 3);
    let pg_type: String = row.get(len - 2);
    let type_modifier: i32 = row.get(len - 1);
    Ok(Column::new(ctid, table_oid, name, ordinal, pg_type, type_modifier))
}
