use chrono::NaiveDateTime;
use marty_catalog::{Oid, Table, TupleId};
use marty_error::CaptureError;
use marty_source::Lookup;

use crate::redo::{self, Payload};
use crate::seam::{History, HistoryUpdate, Source};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    WaitingForReady,
    WaitingForCommit,
}

/// One insert/update/delete, stripped of the relation it targets (already
/// resolved by the caller) and the commit case (handled separately).
#[derive(Debug, Clone, Copy)]
enum Op {
    Insert(TupleId),
    Update(TupleId, TupleId),
    Delete(TupleId),
}

/// Drives the source and history connections from the redo-log line
/// stream. Owns the parse state, the current transaction's work buffer,
/// and the retry cap for history-store drain failures.
///
/// Generic over the [`Source`]/[`History`] seams rather than the concrete
/// `marty-source`/`marty-history` types, so the state machine and dispatch
/// logic below can be driven by a fake in tests without a live database on
/// either side; [`marty_source::SourceInspector`] and
/// [`marty_history::HistoryStore`] are the only real implementations.
pub struct Engine<S, H> {
    source: S,
    history: H,
    state: State,
    work: Vec<Payload>,
    committed: bool,
    pending_master_time: Option<NaiveDateTime>,
    last_known_up_at: Option<NaiveDateTime>,
}

const MAX_DRAIN_ATTEMPTS: u32 = 3;

impl<S: Source, H: History> Engine<S, H> {
    pub fn new(source: S, history: H) -> Self {
        Self {
            source,
            history,
            state: State::WaitingForReady,
            work: Vec::new(),
            committed: false,
            pending_master_time: None,
            last_known_up_at: None,
        }
    }

    /// The transition function of the capture state machine: called once
    /// per line read from the source server's log stream.
    pub async fn feed_line(&mut self, line: &str) -> Result<(), CaptureError> {
        let Some(parsed) = redo::parse_line(line) else { return Ok(()) };
        match self.state {
            State::WaitingForReady => match parsed {
                redo::Line::InterruptedLastKnownUpAt(t) => self.last_known_up_at = Some(t),
                redo::Line::ReadyToAcceptReadOnly => {
                    self.bootstrap().await?;
                    self.state = State::WaitingForCommit;
                }
                _ => {}
            },
            State::WaitingForCommit => match parsed {
                redo::Line::RecoveryPaused => self.source.resume().await?,
                redo::Line::Redo(payload) => self.on_redo(payload).await?,
                _ => {}
            },
        }
        Ok(())
    }

    /// Opens the bootstrap update (master time = the remembered "last known
    /// up at"), snapshots the full catalog, backfills every tracked table,
    /// commits, and resumes redo.
    async fn bootstrap(&mut self) -> Result<(), CaptureError> {
        self.history.ensure_schema().await?;
        let master_time = self
            .last_known_up_at
            .take()
            .unwrap_or_else(|| chrono::Utc::now().naive_utc());
        let txn = self.history.open_update(master_time).await?;

        for schema in self.source.schemas().await? {
            txn.add_schema(&schema).await?;
            let mut tables = self.source.tables(&schema).await?;
            for table in &mut tables {
                self.source.populate_columns(table).await?;
                txn.add_table(table).await?;
                for column in &mut table.columns {
                    txn.add_column(column).await?;
                }
                txn.create_data_table(table).await?;
                let rows = self.source.all_rows(table).await?;
                txn.backfill(table, &rows).await?;
                self.source.index_table(table.clone());
            }
        }

        txn.commit().await?;
        self.source.resume().await?;
        Ok(())
    }

    async fn on_redo(&mut self, payload: Payload) -> Result<(), CaptureError> {
        if self.committed {
            self.drain().await?;
        }
        if let Payload::Commit { at } = &payload {
            self.committed = true;
            self.pending_master_time = Some(*at);
        }
        self.work.push(payload);
        Ok(())
    }

    /// Drains the buffered work of the previously committed source
    /// transaction under a freshly opened update. Retries up to
    /// [`MAX_DRAIN_ATTEMPTS`] times on a history-store error (the buffer is
    /// untouched by a failed attempt, since the failing transaction is
    /// rolled back); a source-read error is never retried, per the "source
    /// errors are fatal" policy.
    async fn drain(&mut self) -> Result<(), CaptureError> {
        let master_time = self.pending_master_time.expect("drain is only invoked while committed");
        let mut attempts = 0;
        loop {
            attempts += 1;
            match self.try_drain(master_time).await {
                Ok(()) => {
                    self.work.clear();
                    self.committed = false;
                    self.pending_master_time = None;
                    return Ok(());
                }
                Err(CaptureError::History(source)) if attempts < MAX_DRAIN_ATTEMPTS => {
                    tracing::warn!(attempts, error = %source, "history store drain failed, retrying");
                }
                Err(CaptureError::History(source)) => {
                    return Err(CaptureError::DrainFailed { attempts, source });
                }
                Err(other) => return Err(other),
            }
        }
    }

    async fn try_drain(&mut self, master_time: NaiveDateTime) -> Result<(), CaptureError> {
        let work = self.work.clone();
        let txn = self.history.open_update(master_time).await?;
        for payload in work {
            apply_work(&mut self.source, &txn, payload).await?;
        }
        txn.commit().await?;
        Ok(())
    }
}

async fn apply_work<S: Source, U: HistoryUpdate>(source: &mut S, txn: &U, payload: Payload) -> Result<(), CaptureError> {
    let (rel, op) = match payload {
        Payload::Commit { .. } => return Ok(()),
        Payload::Insert { rel, tid } => (rel, Op::Insert(tid)),
        Payload::Update { rel, old_tid, new_tid } => (rel, Op::Update(old_tid, new_tid)),
        Payload::Delete { rel, tid } => (rel, Op::Delete(tid)),
    };

    if rel.database != source.database_id().0 {
        return Ok(());
    }

    let system_table = source.system_tables().await?.get(&Oid(rel.relation)).cloned();
    if let Some(system_table) = system_table {
        return apply_ddl(source, txn, &system_table.name, op).await;
    }

    let Some(table) = source.table_by_relation_file_node(Oid(rel.relation)) else {
        return Ok(());
    };
    apply_data(source, txn, &table, op).await
}

async fn apply_ddl<S: Source, U: HistoryUpdate>(
    source: &mut S,
    txn: &U,
    system_table_name: &str,
    op: Op,
) -> Result<(), CaptureError> {
    match system_table_name {
        "pg_namespace" => apply_schema_ddl(source, txn, op).await,
        "pg_class" => apply_table_ddl(source, txn, op).await,
        "pg_attribute" => apply_column_ddl(source, txn, op).await,
        _ => Ok(()),
    }
}

async fn apply_schema_ddl<S: Source, U: HistoryUpdate>(source: &S, txn: &U, op: Op) -> Result<(), CaptureError> {
    match op {
        Op::Insert(tid) => {
            if let Some(schema) = source.get_schema(Lookup::Ctid(tid)).await? {
                txn.add_schema(&schema).await?;
            } else {
                tracing::debug!(%tid, "pg_namespace insert already superseded");
            }
        }
        Op::Update(old_tid, new_tid) => {
            if let Some(schema) = source.get_schema(Lookup::Ctid(new_tid)).await? {
                txn.add_schema(&schema).await?;
            }
            txn.retire_schema(old_tid).await?;
        }
        Op::Delete(tid) => txn.retire_schema(tid).await?,
    }
    Ok(())
}

/// A freshly created table is materialised with zero user columns: within
/// one source transaction its `pg_attribute` rows are always emitted after
/// its `pg_class` row, so they are applied one at a time afterwards via
/// [`apply_column_ddl`]'s `add_data_column`.
async fn apply_table_ddl<S: Source, U: HistoryUpdate>(source: &mut S, txn: &U, op: Op) -> Result<(), CaptureError> {
    match op {
        Op::Insert(tid) => {
            if let Some(mut table) = source.get_table(Lookup::Ctid(tid), None).await? {
                txn.add_table(&mut table).await?;
                txn.create_data_table(&table).await?;
                source.index_table(table);
            } else {
                tracing::debug!(%tid, "pg_class insert already superseded");
            }
        }
        Op::Update(old_tid, new_tid) => {
            let preserved_name = txn.get_table(old_tid).await?.map(|t| t.internal_name());
            if let Some(mut table) = source.get_table(Lookup::Ctid(new_tid), preserved_name).await? {
                txn.add_table(&mut table).await?;
                source.index_table(table);
            }
            txn.retire_table(old_tid).await?;
        }
        Op::Delete(tid) => {
            txn.retire_table(tid).await?;
            if let Some(table) = txn.get_table(tid).await? {
                txn.delete_all(&table).await?;
            }
        }
    }
    Ok(())
}

async fn apply_column_ddl<S: Source, U: HistoryUpdate>(source: &mut S, txn: &U, op: Op) -> Result<(), CaptureError> {
    match op {
        Op::Insert(tid) => {
            if let Some(mut column) = source.get_column(Lookup::Ctid(tid), None).await? {
                txn.add_column(&mut column).await?;
                if let Some(table) = owning_table(source, column.table_oid).await? {
                    txn.add_data_column(&table, &column).await?;
                }
            } else {
                tracing::debug!(%tid, "pg_attribute insert already superseded");
            }
        }
        Op::Update(old_tid, new_tid) => {
            let preserved_name = txn.get_column(old_tid).await?.map(|c| c.internal_name());
            if let Some(mut column) = source.get_column(Lookup::Ctid(new_tid), preserved_name).await? {
                txn.add_column(&mut column).await?;
            }
            txn.retire_column(old_tid).await?;
        }
        Op::Delete(tid) => txn.retire_column(tid).await?,
    }
    Ok(())
}

/// Resolves a column's owning [`Table`] (carrying its stable
/// `internal_name`) via its oid, by way of the relation-file-node index
/// the table's own DDL application populated.
async fn owning_table<S: Source>(source: &mut S, table_oid: Oid) -> Result<Option<Table>, CaptureError> {
    let Some(basic) = source.get_table(Lookup::Oid(table_oid), None).await? else {
        return Ok(None);
    };
    Ok(source.table_by_relation_file_node(basic.relation_file_node))
}

async fn apply_data<S: Source, U: HistoryUpdate>(source: &S, txn: &U, table: &Table, op: Op) -> Result<(), CaptureError> {
    match op {
        Op::Insert(tid) => {
            if let Some(row) = source.get(table, tid, None).await? {
                txn.insert(table, tid, &row).await?;
            }
        }
        Op::Delete(tid) => txn.delete(table, tid).await?,
        Op::Update(old_tid, new_tid) => {
            txn.delete(table, old_tid).await?;
            if let Some(row) = source.get(table, new_tid, None).await? {
                txn.insert(table, new_tid, &row).await?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use marty_catalog::{Column, RawValue, Schema, UpdateId};
    use marty_error::{HistoryError, SourceError};
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::redo::RelationId;

    /// Records every call a fake makes, so tests can assert dispatch order
    /// and content without a real database underneath. `AddTable` and
    /// `AddColumn` carry the bound `internal_name` alongside the source
    /// name, so a test can assert that a rename preserved it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        AddSchema(String),
        RetireSchema(TupleId),
        AddTable(String, String),
        RetireTable(TupleId),
        AddColumn(String, String),
        RetireColumn(TupleId),
        CreateDataTable(String),
        AddDataColumn(String, String),
        Insert(TupleId),
        Delete(TupleId),
        DeleteAll(String),
    }

    #[derive(Default)]
    struct FakeSource {
        system_tables: HashMap<Oid, Table>,
        relation_index: HashMap<Oid, Table>,
        tables_by_ctid: HashMap<TupleId, Table>,
        tables_by_oid: HashMap<Oid, Table>,
        columns_by_ctid: HashMap<TupleId, Column>,
        rows: HashMap<(Oid, TupleId), Vec<RawValue>>,
        resumed: RefCell<u32>,
    }

    impl FakeSource {
        fn with_system_table(mut self, name: &str, oid: u32, relation_file_node: u32) -> Self {
            let schema = Schema::new(TupleId::new(0, 0), Oid(11), "pg_catalog");
            let table = Table::new(TupleId::new(0, oid as u16), Oid(oid), name, schema, Oid(relation_file_node));
            self.system_tables.insert(Oid(relation_file_node), table);
            self
        }
    }

    impl Source for FakeSource {
        async fn schemas(&self) -> Result<Vec<Schema>, SourceError> {
            Ok(Vec::new())
        }

        async fn tables(&mut self, _schema: &Schema) -> Result<Vec<Table>, SourceError> {
            Ok(Vec::new())
        }

        async fn populate_columns(&self, _table: &mut Table) -> Result<(), SourceError> {
            Ok(())
        }

        async fn all_rows(&self, _table: &Table) -> Result<Vec<(TupleId, Vec<RawValue>)>, SourceError> {
            Ok(Vec::new())
        }

        async fn system_tables(&mut self) -> Result<HashMap<Oid, Table>, SourceError> {
            Ok(self.system_tables.clone())
        }

        async fn get_schema(&self, _lookup: Lookup) -> Result<Option<Schema>, SourceError> {
            Ok(None)
        }

        async fn get_table(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Table>, SourceError> {
            let table = match lookup {
                Lookup::Ctid(tid) => self.tables_by_ctid.get(&tid).cloned(),
                Lookup::Oid(oid) => self.tables_by_oid.get(&oid).cloned(),
            };
            Ok(table.map(|t| match internal_name {
                Some(name) => t.with_internal_name(name),
                None => t,
            }))
        }

        async fn get_column(&self, lookup: Lookup, internal_name: Option<String>) -> Result<Option<Column>, SourceError> {
            let column = match lookup {
                Lookup::Ctid(tid) => self.columns_by_ctid.get(&tid).cloned(),
                Lookup::Oid(_) => None,
            };
            Ok(column.map(|c| match internal_name {
                Some(name) => c.with_internal_name(name),
                None => c,
            }))
        }

        async fn resume(&self) -> Result<(), SourceError> {
            *self.resumed.borrow_mut() += 1;
            Ok(())
        }

        async fn get(&self, table: &Table, tid: TupleId, _cols: Option<&[String]>) -> Result<Option<Vec<RawValue>>, SourceError> {
            Ok(self.rows.get(&(table.oid, tid)).cloned())
        }

        fn database_id(&self) -> Oid {
            Oid(1)
        }

        fn table_by_relation_file_node(&self, relation_file_node: Oid) -> Option<Table> {
            self.relation_index.get(&relation_file_node).cloned()
        }

        fn index_table(&mut self, table: Table) {
            self.relation_index.insert(table.relation_file_node, table);
        }
    }

    /// A history seam whose `open_update` fails the first `fail_times`
    /// attempts (to exercise the drain retry cap), recording every write
    /// into a shared log, and whose `get_table`/`get_column` echo back a
    /// preset row so a rename's preserved-name path can be exercised.
    #[derive(Default)]
    struct FakeHistory {
        log: RefCell<Vec<Call>>,
        fail_times: RefCell<u32>,
        preset_table: Option<Table>,
        preset_column: Option<Column>,
    }

    impl FakeHistory {
        fn failing(times: u32) -> Self {
            Self {
                fail_times: RefCell::new(times),
                ..Default::default()
            }
        }
    }

    impl History for FakeHistory {
        type Update<'a>
            = FakeUpdate<'a>
        where
            Self: 'a;

        async fn ensure_schema(&self) -> Result<(), HistoryError> {
            Ok(())
        }

        async fn open_update(&mut self, _master_time: NaiveDateTime) -> Result<Self::Update<'_>, HistoryError> {
            let mut remaining = self.fail_times.borrow_mut();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(HistoryError::UnsafeIdentifier("simulated drain failure".to_string()));
            }
            Ok(FakeUpdate {
                log: &self.log,
                preset_table: self.preset_table.clone(),
                preset_column: self.preset_column.clone(),
            })
        }
    }

    struct FakeUpdate<'a> {
        log: &'a RefCell<Vec<Call>>,
        preset_table: Option<Table>,
        preset_column: Option<Column>,
    }

    impl<'a> HistoryUpdate for FakeUpdate<'a> {
        async fn add_schema(&self, schema: &Schema) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::AddSchema(schema.name.clone()));
            Ok(())
        }

        async fn retire_schema(&self, ctid: TupleId) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::RetireSchema(ctid));
            Ok(())
        }

        async fn add_table(&self, table: &mut Table) -> Result<(), HistoryError> {
            if table.update.is_none() {
                table.bind_update(UpdateId(1));
            }
            self.log.borrow_mut().push(Call::AddTable(table.name.clone(), table.internal_name()));
            Ok(())
        }

        async fn retire_table(&self, ctid: TupleId) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::RetireTable(ctid));
            Ok(())
        }

        async fn add_column(&self, column: &mut Column) -> Result<(), HistoryError> {
            if column.start_update.is_none() {
                column.bind_update(UpdateId(1));
            }
            self.log
                .borrow_mut()
                .push(Call::AddColumn(column.name.clone(), column.internal_name()));
            Ok(())
        }

        async fn retire_column(&self, ctid: TupleId) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::RetireColumn(ctid));
            Ok(())
        }

        async fn create_data_table(&self, table: &Table) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::CreateDataTable(table.internal_name()));
            Ok(())
        }

        async fn add_data_column(&self, table: &Table, column: &Column) -> Result<(), HistoryError> {
            self.log
                .borrow_mut()
                .push(Call::AddDataColumn(table.internal_name(), column.internal_name()));
            Ok(())
        }

        async fn backfill(&self, _table: &Table, _rows: &[(TupleId, Vec<RawValue>)]) -> Result<(), HistoryError> {
            Ok(())
        }

        async fn insert(&self, _table: &Table, tid: TupleId, _row: &[RawValue]) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::Insert(tid));
            Ok(())
        }

        async fn delete(&self, _table: &Table, tid: TupleId) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::Delete(tid));
            Ok(())
        }

        async fn delete_all(&self, table: &Table) -> Result<(), HistoryError> {
            self.log.borrow_mut().push(Call::DeleteAll(table.internal_name()));
            Ok(())
        }

        async fn get_table(&self, _ctid: TupleId) -> Result<Option<Table>, HistoryError> {
            Ok(self.preset_table.clone())
        }

        async fn get_column(&self, _ctid: TupleId) -> Result<Option<Column>, HistoryError> {
            Ok(self.preset_column.clone())
        }

        async fn commit(self) -> Result<(), HistoryError> {
            Ok(())
        }
    }

    fn commit_at(secs: u32) -> Payload {
        Payload::Commit {
            at: NaiveDateTime::parse_from_str(&format!("2024-01-01 00:00:{secs:02}"), "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    #[tokio::test]
    async fn redo_for_a_user_table_insert_dispatches_to_history_insert() {
        let mut source = FakeSource::default();
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");
        let mut table = Table::new(TupleId::new(0, 2), Oid(200), "t", schema, Oid(12345));
        table.bind_update(UpdateId(0));
        let tid = TupleId::new(0, 5);
        source.rows.insert((Oid(200), tid), Vec::new());
        source.relation_index.insert(Oid(12345), table);

        let mut engine = Engine::new(source, FakeHistory::default());
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Insert {
                rel: RelationId { tablespace: 1, database: 1, relation: 12345 },
                tid,
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        // A second commit drains the first transaction before buffering the new one.
        engine.on_redo(commit_at(1)).await.unwrap();

        assert_eq!(engine.history.log.borrow().as_slice(), [Call::Insert(tid)]);
    }

    #[tokio::test]
    async fn table_rename_preserves_internal_name_across_the_ctid_change() {
        let old_tid = TupleId::new(0, 2);
        let new_tid = TupleId::new(0, 9);
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");

        let mut source = FakeSource::default();
        source
            .tables_by_ctid
            .insert(new_tid, Table::new(new_tid, Oid(200), "t_renamed", schema.clone(), Oid(12345)));
        let source = source.with_system_table("pg_class", 1259, 1259);

        let preset_table = Table::new(old_tid, Oid(200), "t", schema, Oid(777)).with_internal_name("data_s_t_1");
        let history = FakeHistory {
            preset_table: Some(preset_table),
            ..Default::default()
        };

        let mut engine = Engine::new(source, history);
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Update {
                rel: RelationId { tablespace: 1, database: 1, relation: 1259 },
                old_tid,
                new_tid,
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        engine.on_redo(commit_at(1)).await.unwrap();

        let log = engine.history.log.borrow();
        assert_eq!(
            log.as_slice(),
            [
                Call::AddTable("t_renamed".to_string(), "data_s_t_1".to_string()),
                Call::RetireTable(old_tid),
            ]
        );
        assert!(engine.source.table_by_relation_file_node(Oid(12345)).is_some());
    }

    #[tokio::test]
    async fn column_rename_preserves_internal_name_across_the_ctid_change() {
        let old_tid = TupleId::new(0, 4);
        let new_tid = TupleId::new(0, 11);

        let mut source = FakeSource::default();
        source
            .columns_by_ctid
            .insert(new_tid, Column::new(new_tid, Oid(200), "v_renamed", 2, "text", -1));
        let source = source.with_system_table("pg_attribute", 1249, 888);

        let preset_column = Column::new(old_tid, Oid(200), "v", 2, "text", -1).with_internal_name("data_v_1");
        let history = FakeHistory {
            preset_column: Some(preset_column),
            ..Default::default()
        };

        let mut engine = Engine::new(source, history);
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Update {
                rel: RelationId { tablespace: 1, database: 1, relation: 888 },
                old_tid,
                new_tid,
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        engine.on_redo(commit_at(1)).await.unwrap();

        let log = engine.history.log.borrow();
        assert_eq!(
            log.as_slice(),
            [
                Call::AddColumn("v_renamed".to_string(), "data_v_1".to_string()),
                Call::RetireColumn(old_tid),
            ]
        );
    }

    #[tokio::test]
    async fn column_delete_dispatches_to_retire_column() {
        let source = FakeSource::default().with_system_table("pg_attribute", 1249, 888);
        let mut engine = Engine::new(source, FakeHistory::default());
        engine.state = State::WaitingForCommit;

        let tid = TupleId::new(0, 4);
        engine
            .on_redo(Payload::Delete {
                rel: RelationId { tablespace: 1, database: 1, relation: 888 },
                tid,
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        engine.on_redo(commit_at(1)).await.unwrap();

        assert_eq!(engine.history.log.borrow().as_slice(), [Call::RetireColumn(tid)]);
    }

    #[tokio::test]
    async fn redo_for_a_different_database_is_ignored() {
        let mut engine = Engine::new(FakeSource::default(), FakeHistory::default());
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Insert {
                rel: RelationId { tablespace: 1, database: 999, relation: 12345 },
                tid: TupleId::new(0, 1),
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        engine.on_redo(commit_at(1)).await.unwrap();

        assert!(engine.history.log.borrow().is_empty());
    }

    #[tokio::test]
    async fn drain_retries_up_to_the_cap_then_fails() {
        let mut source = FakeSource::default();
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");
        let mut table = Table::new(TupleId::new(0, 2), Oid(200), "t", schema, Oid(12345));
        table.bind_update(UpdateId(0));
        source.relation_index.insert(Oid(12345), table);

        // Fails every attempt, so all MAX_DRAIN_ATTEMPTS are exhausted.
        let mut engine = Engine::new(source, FakeHistory::failing(10));
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Insert {
                rel: RelationId { tablespace: 1, database: 1, relation: 12345 },
                tid: TupleId::new(0, 5),
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();

        let err = engine.on_redo(commit_at(1)).await.unwrap_err();

        match err {
            CaptureError::DrainFailed { attempts, .. } => assert_eq!(attempts, MAX_DRAIN_ATTEMPTS),
            other => panic!("expected DrainFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn drain_succeeds_after_a_transient_failure_below_the_cap() {
        let mut source = FakeSource::default();
        let schema = Schema::new(TupleId::new(0, 1), Oid(100), "s");
        let mut table = Table::new(TupleId::new(0, 2), Oid(200), "t", schema, Oid(12345));
        table.bind_update(UpdateId(0));
        let tid = TupleId::new(0, 5);
        source.rows.insert((Oid(200), tid), Vec::new());
        source.relation_index.insert(Oid(12345), table);

        let mut engine = Engine::new(source, FakeHistory::failing(MAX_DRAIN_ATTEMPTS - 1));
        engine.state = State::WaitingForCommit;

        engine
            .on_redo(Payload::Insert {
                rel: RelationId { tablespace: 1, database: 1, relation: 12345 },
                tid,
            })
            .await
            .unwrap();
        engine.on_redo(commit_at(0)).await.unwrap();
        engine.on_redo(commit_at(1)).await.unwrap();

        // The first two open_update attempts failed and were retried; the
        // third succeeded, draining the insert through to history exactly once.
        assert_eq!(engine.history.log.borrow().as_slice(), [Call::Insert(tid)]);
    }
}
