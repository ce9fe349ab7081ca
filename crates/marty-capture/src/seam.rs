//! The engine's view of the source and history connections, narrowed to
//! traits so the state machine and DDL/data dispatch in [`crate::engine`]
//! can be driven by a fake in tests, without a live Postgres connection on
//! either side.

use std::collections::HashMap;

use chrono::NaiveDateTime;
use marty_catalog::{Column, Oid, RawValue, Schema, Table, TupleId};
use marty_error::{HistoryError, SourceError};
use marty_source::Lookup;

/// The subset of [`marty_source::SourceInspector`] the capture engine needs.
pub trait Source {
    async fn schemas(&self) -> Result<Vec<Schema>, SourceError>;
    async fn tables(&mut self, schema: &Schema) -> Result<Vec<Table>, SourceError>;
    async fn populate_columns(&self, table: &mut Table) -> Result<(), SourceError>;
    async fn all_rows(&self, table: &Table) -> Result<Vec<(TupleId, Vec<RawValue>)>, SourceError>;
    async fn system_tables(&mut self) -> Result<HashMap<Oid, Table>, SourceError>;
    async fn get_schema(&self, lookup: Lookup) -> Result<Option<Schema>, SourceError>;
    async fn get_table(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Table>, SourceError>;
    async fn get_column(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Column>, SourceError>;
    async fn resume(&self) -> Result<(), SourceError>;
    async fn get(&self, table: &Table, tid: TupleId, cols: Option<&[String]>) -> Result<Option<Vec<RawValue>>, SourceError>;
    fn database_id(&self) -> Oid;
    fn table_by_relation_file_node(&self, relation_file_node: Oid) -> Option<Table>;
    fn index_table(&mut self, table: Table);
}

/// The subset of [`marty_history::HistoryStore`] the capture engine needs.
pub trait History {
    type Update<'a>: HistoryUpdate
    where
        Self: 'a;

    async fn ensure_schema(&self) -> Result<(), HistoryError>;
    async fn open_update(&mut self, master_time: NaiveDateTime) -> Result<Self::Update<'_>, HistoryError>;
}

/// The subset of [`marty_history::HistoryTxn`] the capture engine needs.
pub trait HistoryUpdate {
    async fn add_schema(&self, schema: &Schema) -> Result<(), HistoryError>;
    async fn retire_schema(&self, ctid: TupleId) -> Result<(), HistoryError>;
    async fn add_table(&self, table: &mut Table) -> Result<(), HistoryError>;
    async fn retire_table(&self, ctid: TupleId) -> Result<(), HistoryError>;
    async fn add_column(&self, column: &mut Column) -> Result<(), HistoryError>;
    async fn retire_column(&self, ctid: TupleId) -> Result<(), HistoryError>;
    async fn create_data_table(&self, table: &Table) -> Result<(), HistoryError>;
    async fn add_data_column(&self, table: &Table, column: &Column) -> Result<(), HistoryError>;
    async fn backfill(&self, table: &Table, rows: &[(TupleId, Vec<RawValue>)]) -> Result<(), HistoryError>;
    async fn insert(&self, table: &Table, tid: TupleId, row: &[RawValue]) -> Result<(), HistoryError>;
    async fn delete(&self, table: &Table, tid: TupleId) -> Result<(), HistoryError>;
    async fn delete_all(&self, table: &Table) -> Result<(), HistoryError>;
    async fn get_table(&self, ctid: TupleId) -> Result<Option<Table>, HistoryError>;
    async fn get_column(&self, ctid: TupleId) -> Result<Option<Column>, HistoryError>;
    async fn commit(self) -> Result<(), HistoryError>;
}

mod live {
    use super::*;
    use marty_history::{HistoryStore, HistoryTxn};
    use marty_source::SourceInspector;

    impl Source for SourceInspector {
        async fn schemas(&self) -> Result<Vec<Schema>, SourceError> {
            SourceInspector::schemas(self).await
        }

        async fn tables(&mut self, schema: &Schema) -> Result<Vec<Table>, SourceError> {
            SourceInspector::tables(self, schema).await
        }

        async fn populate_columns(&self, table: &mut Table) -> Result<(), SourceError> {
            SourceInspector::populate_columns(self, table).await
        }

        async fn all_rows(&self, table: &Table) -> Result<Vec<(TupleId, Vec<RawValue>)>, SourceError> {
            SourceInspector::all_rows(self, table).await
        }

        async fn system_tables(&mut self) -> Result<HashMap<Oid, Table>, SourceError> {
            Ok(SourceInspector::system_tables(self).await?.clone())
        }

        async fn get_schema(&self, lookup: Lookup) -> Result<Option<Schema>, SourceError> {
            SourceInspector::get_schema(self, lookup).await
        }

        async fn get_table(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Table>, SourceError> {
            SourceInspector::get_table(self, lookup, internal_name).await
        }

        async fn get_column(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Column>, SourceError> {
            SourceInspector::get_column(self, lookup, internal_name).await
        }

        async fn resume(&self) -> Result<(), SourceError> {
            SourceInspector::resume(self).await
        }

        async fn get(&self, table: &Table, tid: TupleId, cols: Option<&[String]>) -> Result<Option<Vec<RawValue>>, SourceError> {
            SourceInspector::get(self, table, tid, cols).await
        }

        fn database_id(&self) -> Oid {
            SourceInspector::database_id(self)
        }

        fn table_by_relation_file_node(&self, relation_file_node: Oid) -> Option<Table> {
            SourceInspector::table_by_relation_file_node(self, relation_file_node).cloned()
        }

        fn index_table(&mut self, table: Table) {
            SourceInspector::index_table(self, table)
        }
    }

    impl History for HistoryStore {
        type Update<'a>
            = HistoryTxn<'a>
        where
            Self: 'a;

        async fn ensure_schema(&self) -> Result<(), HistoryError> {
            HistoryStore::ensure_schema(self).await
        }

        async fn open_update(&mut self, master_time: NaiveDateTime) -> Result<Self::Update<'_>, HistoryError> {
            HistoryStore::open_update(self, master_time).await
        }
    }

    impl<'t> HistoryUpdate for HistoryTxn<'t> {
        async fn add_schema(&self, schema: &Schema) -> Result<(), HistoryError> {
            HistoryTxn::add_schema(self, schema).await
        }

        async fn retire_schema(&self, ctid: TupleId) -> Result<(), HistoryError> {
            HistoryTxn::retire_schema(self, ctid).await
        }

        async fn add_table(&self, table: &mut Table) -> Result<(), HistoryError> {
            HistoryTxn::add_table(self, table).await
        }

        async fn retire_table(&self, ctid: TupleId) -> Result<(), HistoryError> {
            HistoryTxn::retire_table(self, ctid).await
        }

        async fn add_column(&self, column: &mut Column) -> Result<(), HistoryError> {
            HistoryTxn::add_column(self, column).await
        }

        async fn retire_column(&self, ctid: TupleId) -> Result<(), HistoryError> {
            HistoryTxn::retire_column(self, ctid).await
        }

        async fn create_data_table(&self, table: &Table) -> Result<(), HistoryError> {
            HistoryTxn::create_data_table(self, table).await
        }

        async fn add_data_column(&self, table: &Table, column: &Column) -> Result<(), HistoryError> {
            HistoryTxn::add_data_column(self, table, column).await
        }

        async fn backfill(&self, table: &Table, rows: &[(TupleId, Vec<RawValue>)]) -> Result<(), HistoryError> {
            HistoryTxn::backfill(self, table, rows).await
        }

        async fn insert(&self, table: &Table, tid: TupleId, row: &[RawValue]) -> Result<(), HistoryError> {
            HistoryTxn::insert(self, table, tid, row).await
        }

        async fn delete(&self, table: &Table, tid: TupleId) -> Result<(), HistoryError> {
            HistoryTxn::delete(self, table, tid).await
        }

        async fn delete_all(&self, table: &Table) -> Result<(), HistoryError> {
            HistoryTxn::delete_all(self, table).await
        }

        async fn get_table(&self, ctid: TupleId) -> Result<Option<Table>, HistoryError> {
            HistoryTxn::get_table(self, ctid).await
        }

        async fn get_column(&self, ctid: TupleId) -> Result<Option<Column>, HistoryError> {
            HistoryTxn::get_column(self, ctid).await
        }

        async fn commit(self) -> Result<(), HistoryError> {
            HistoryTxn::commit(self).await
        }
    }
}
