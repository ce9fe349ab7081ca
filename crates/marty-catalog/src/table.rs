use crate::ids::{Oid, TupleId, UpdateId};
use crate::schema::Schema;

/// An ordinary relation (`relkind = 'r'`) tracked by the capture engine.
///
/// `internal_name()` is derived from the update id at which the table was
/// first added to the history store (`table.update`), and is stable once
/// bound: the per-version data table it names is never renamed, only
/// `ALTER ADD COLUMN`-ed in place (invariant 3 in the top level design
/// docs).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub ctid: TupleId,
    pub oid: Oid,
    pub name: String,
    pub schema: Schema,
    pub relation_file_node: Oid,
    pub columns: Vec<Column>,
    pub update: Option<UpdateId>,
    internal_name_override: Option<String>,
}

impl Table {
    pub fn new(ctid: TupleId, oid: Oid, name: impl Into<String>, schema: Schema, relation_file_node: Oid) -> Self {
        Self {
            ctid,
            oid,
            name: name.into(),
            schema,
            relation_file_node,
            columns: Vec::new(),
            update: None,
            internal_name_override: None,
        }
    }

    /// Reconstruct a table whose `internal_name` was already assigned by a
    /// previous capture (e.g. when resolving `marty_tables` rows read back
    /// from the history store).
    pub fn with_internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name_override = Some(internal_name.into());
        self
    }

    pub fn long_name(&self) -> String {
        format!("{}.{}", self.schema.name, self.name)
    }

    /// Binds this table to the update id under which it is (or was)
    /// inserted into `marty_tables`, making `internal_name()` stable.
    pub fn bind_update(&mut self, update: UpdateId) {
        self.update = Some(update);
    }

    /// The name of this table's per-version data table in the history
    /// store: `data_<schema>_<table>_<start_update>`.
    ///
    /// Panics if called before `bind_update` (or `with_internal_name`) —
    /// callers in the capture engine always bind the update before deriving
    /// this, matching the Python original's `table.update = update` step.
    pub fn internal_name(&self) -> String {
        if let Some(name) = &self.internal_name_override {
            return name.clone();
        }
        let update = self.update.expect("table must be bound to an update before naming");
        format!("data_{}_{}_{}", self.schema.name, self.name, update)
    }

    pub fn add_column(&mut self, column: Column) {
        self.columns.push(column);
    }

    /// Columns of the per-version data table, in on-disk order: the source
    /// tuple identifier, each user column, then the half-open `[start,
    /// stop)` interval columns.
    pub fn internal_columns(&self) -> impl Iterator<Item = InternalColumn<'_>> {
        std::iter::once(InternalColumn::DataCtid)
            .chain(self.columns.iter().map(InternalColumn::User))
            .chain([InternalColumn::Start, InternalColumn::Stop])
    }
}

/// A user column of a tracked table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub ctid: TupleId,
    pub table_oid: Oid,
    pub name: String,
    pub ordinal: i16,
    pub pg_type: String,
    pub type_modifier: i32,
    /// The update id at which this column version was first added; binds
    /// `internal_name()` the same way `Table::update` does.
    pub start_update: Option<UpdateId>,
    internal_name_override: Option<String>,
}

impl Column {
    pub fn new(
        ctid: TupleId,
        table_oid: Oid,
        name: impl Into<String>,
        ordinal: i16,
        pg_type: impl Into<String>,
        type_modifier: i32,
    ) -> Self {
        Self {
            ctid,
            table_oid,
            name: name.into(),
            ordinal,
            pg_type: pg_type.into(),
            type_modifier,
            start_update: None,
            internal_name_override: None,
        }
    }

    pub fn with_internal_name(mut self, internal_name: impl Into<String>) -> Self {
        self.internal_name_override = Some(internal_name.into());
        self
    }

    pub fn bind_update(&mut self, update: UpdateId) {
        self.start_update = Some(update);
    }

    /// `data_<column>_<start_update>`, or the preserved name carried over
    /// from a rename (see `SourceInspector::get_column`'s `internal_name`
    /// parameter).
    pub fn internal_name(&self) -> String {
        if let Some(name) = &self.internal_name_override {
            return name.clone();
        }
        let update = self
            .start_update
            .expect("column must be bound to an update before naming");
        format!("data_{}_{}", self.name, update)
    }
}

/// One column of a per-version data table: the appended bookkeeping
/// columns plus the user columns they wrap.
#[derive(Debug, Clone, Copy)]
pub enum InternalColumn<'a> {
    DataCtid,
    User(&'a Column),
    Start,
    Stop,
}

impl<'a> InternalColumn<'a> {
    pub fn internal_name(&self) -> String {
        match self {
            InternalColumn::DataCtid => "data_ctid".to_string(),
            InternalColumn::User(column) => column.internal_name(),
            InternalColumn::Start => "start".to_string(),
            InternalColumn::Stop => "stop".to_string(),
        }
    }

    /// The SQL type used to declare this column when materialising the
    /// data table with `CREATE TABLE`/`ALTER TABLE ... ADD COLUMN`.
    pub fn sql_type(&self) -> String {
        match self {
            InternalColumn::DataCtid => "tid".to_string(),
            InternalColumn::User(column) => column.pg_type.clone(),
            InternalColumn::Start => "bigint REFERENCES marty_updates(id) NOT NULL".to_string(),
            InternalColumn::Stop => "bigint REFERENCES marty_updates(id)".to_string(),
        }
    }
}
